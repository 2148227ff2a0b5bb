use crate::drag::DropPosition;

/// Per-row state handed to a [`crate::widget::NodeRenderer`].
#[derive(Clone, Copy, Debug)]
pub struct NodeRenderContext {
    pub depth: u16,
    pub is_group: bool,
    pub is_expanded: bool,
    pub is_selected: bool,
    pub is_focused: bool,
    pub is_loading: bool,
    /// The row is the node being dragged.
    pub is_dragged: bool,
    /// The row is the current drop target of a drag session.
    pub is_drop_target: bool,
    /// Placement indicator on the drop target row.
    pub drop_position: Option<DropPosition>,
}
