use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Borders;

/// Visual settings of the tree widget.
#[derive(Clone)]
pub struct SortableTreeStyle<'a> {
    pub title: Option<Line<'a>>,
    pub block_style: Style,
    pub border_style: Style,
    pub borders: Borders,
    /// Patched onto the focused row.
    pub focus_style: Style,
    /// Patched onto selected rows.
    pub selection_style: Style,
    /// Patched onto the node being dragged.
    pub drag_style: Style,
    /// Style of the drop placement marker.
    pub drop_style: Style,
    /// Style of the loading expander glyph.
    pub loading_style: Style,
}

impl Default for SortableTreeStyle<'_> {
    fn default() -> Self {
        Self {
            title: None,
            block_style: Style::default(),
            border_style: Style::default(),
            borders: Borders::ALL,
            focus_style: Style::default().add_modifier(Modifier::REVERSED),
            selection_style: Style::default().add_modifier(Modifier::BOLD),
            drag_style: Style::default().add_modifier(Modifier::DIM),
            drop_style: Style::default().add_modifier(Modifier::UNDERLINED),
            loading_style: Style::default().add_modifier(Modifier::DIM),
        }
    }
}
