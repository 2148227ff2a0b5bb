use crate::drag::MoveDescriptor;
use crate::model::TreeNode;

/// Actions that a user or application can initiate on the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeAction<Custom = ()> {
    /// Move focus to the previous visible row.
    FocusPrev,
    /// Move focus to the next visible row.
    FocusNext,
    /// Move focus up and extend the range selection to it.
    FocusPrevExtend,
    /// Move focus down and extend the range selection to it.
    FocusNextExtend,
    /// Move focus to the first visible row.
    FocusFirst,
    /// Move focus to the last visible row.
    FocusLast,
    /// Move focus to the first visible row, extending the range selection.
    FocusFirstExtend,
    /// Move focus to the last visible row, extending the range selection.
    FocusLastExtend,
    /// Expand a collapsed group; otherwise descend to the first child, or
    /// climb to the parent on a leaf.
    ExpandOrDescend,
    /// Collapse an expanded group; otherwise climb to the parent.
    CollapseOrAscend,
    /// Select only the focused node.
    Select,
    /// Toggle the focused node's membership in a multiple selection;
    /// plain select in other modes.
    ToggleSelect,
    /// Select every visible node (multiple selection mode only).
    SelectAllVisible,
    /// Expand every loaded group in the tree.
    ExpandAll,
    /// Collapse every node.
    CollapseAll,
    /// Feed a typed character to the type-ahead search buffer.
    TypeAhead(char),
    /// Custom action forwarded to the caller without internal handling.
    Custom(Custom),
}

/// Result of handling an action or key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionOutcome<Custom = ()> {
    /// The action was handled and state was updated.
    Handled,
    /// The action was ignored (e.g., nothing focused / nothing to do).
    Ignored,
    /// A custom action forwarded to the caller.
    Custom(Custom),
}

/// Outputs of the tree engine, drained by the caller each cycle.
///
/// The caller owns the authoritative nested tree: `Structure` carries a full
/// replacement tree and the engine never assumes it was applied before the
/// next `sync`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeEvent<Id, T> {
    /// A structural change produced a replacement nested tree.
    Structure {
        /// The full replacement tree.
        tree: Vec<TreeNode<Id, T>>,
    },
    /// The selection changed; carries the full id list (order irrelevant).
    Selection {
        /// Currently selected ids.
        ids: Vec<Id>,
    },
    /// The expansion set changed; carries the full id list.
    Expansion {
        /// Currently expanded ids.
        ids: Vec<Id>,
    },
    /// A drag session started on this tree.
    DragStarted {
        /// The dragged node.
        id: Id,
    },
    /// A drop committed; emitted after the matching `Structure` event.
    DragEnded(MoveDescriptor<Id>),
    /// Expanding an unloaded group requested its children.
    ///
    /// The caller performs the load and completes it with
    /// `SortableTreeState::resolve_load`; at most one request per node is in
    /// flight at a time.
    LoadRequested {
        /// The group to load.
        id: Id,
    },
    /// A lazy load failed; the node stays collapsed and retriable.
    LoadFailed {
        /// The group that failed to load.
        id: Id,
        /// Normalized error description.
        error: String,
    },
}
