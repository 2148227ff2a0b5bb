use std::hash::Hash;
use std::marker::PhantomData;

use ratatui::layout::Rect;
use ratatui::prelude::Buffer;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, StatefulWidget, Widget};
use smallvec::SmallVec;

use crate::context::NodeRenderContext;
use crate::glyphs::TreeGlyphs;
use crate::model::{FlatNode, TreeLabel};
use crate::state::SortableTreeState;
use crate::style::SortableTreeStyle;

/// Produces the row content for one node.
pub trait NodeRenderer<Id, T> {
    fn line<'a>(&'a self, node: &'a FlatNode<Id, T>, ctx: &NodeRenderContext) -> Line<'a>;
}

impl<Id, T, F> NodeRenderer<Id, T> for F
where
    F: for<'a> Fn(&'a FlatNode<Id, T>, &NodeRenderContext) -> Line<'a>,
{
    fn line<'a>(&'a self, node: &'a FlatNode<Id, T>, ctx: &NodeRenderContext) -> Line<'a> {
        self(node, ctx)
    }
}

/// Renders the payload's [`TreeLabel`] as plain text.
pub struct LabelRenderer;

impl<Id, T: TreeLabel> NodeRenderer<Id, T> for LabelRenderer {
    fn line<'a>(&'a self, node: &'a FlatNode<Id, T>, _ctx: &NodeRenderContext) -> Line<'a> {
        Line::raw(node.data.tree_label().unwrap_or_default())
    }
}

/// The tree widget.
///
/// Renders the visible window of rows with indentation, expander glyphs,
/// drag placement markers, and the renderer's content.
pub struct SortableTree<'a, Id, T, R> {
    renderer: &'a R,
    style: SortableTreeStyle<'a>,
    glyphs: TreeGlyphs<'a>,
    _node: PhantomData<fn() -> (Id, T)>,
}

impl<'a, Id, T, R: NodeRenderer<Id, T>> SortableTree<'a, Id, T, R> {
    pub const fn new(renderer: &'a R, style: SortableTreeStyle<'a>) -> Self {
        Self {
            renderer,
            style,
            glyphs: TreeGlyphs::unicode(),
            _node: PhantomData,
        }
    }

    pub const fn glyphs(mut self, glyphs: TreeGlyphs<'a>) -> Self {
        self.glyphs = glyphs;
        self
    }
}

impl<Id, T, R> StatefulWidget for SortableTree<'_, Id, T, R>
where
    Id: Clone + Eq + Hash,
    R: NodeRenderer<Id, T>,
{
    type State = SortableTreeState<Id, T>;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let mut block = Block::default()
            .borders(self.style.borders)
            .style(self.style.block_style)
            .border_style(self.style.border_style);
        if let Some(title) = self.style.title.clone() {
            block = block.title(title);
        }
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        state.ensure_focus_visible(inner.height as usize);
        let offset = state.scroll_offset();
        let end = state.visible_len().min(offset + inner.height as usize);

        for (row, y) in (offset..end).zip(inner.y..) {
            let Some(node) = state.visible_node(row) else {
                break;
            };
            let drop_target = state
                .drop_target()
                .filter(|(over, _)| **over == node.id)
                .map(|(_, position)| position);
            let ctx = NodeRenderContext {
                depth: node.depth,
                is_group: node.is_group,
                is_expanded: state.is_expanded(&node.id),
                is_selected: state.is_selected(&node.id),
                is_focused: state.focused_id() == Some(&node.id),
                is_loading: state.is_loading(&node.id),
                is_dragged: state.dragged_id() == Some(&node.id),
                is_drop_target: drop_target.is_some(),
                drop_position: drop_target,
            };

            let mut spans: SmallVec<[Span; 8]> = SmallVec::new();
            for _ in 0..ctx.depth {
                spans.push(Span::raw(self.glyphs.indent));
            }
            let expander = if ctx.is_loading {
                Span::styled(self.glyphs.loading, self.style.loading_style)
            } else if ctx.is_group {
                Span::raw(if ctx.is_expanded {
                    self.glyphs.expanded
                } else {
                    self.glyphs.collapsed
                })
            } else {
                Span::raw(self.glyphs.leaf)
            };
            spans.push(expander);
            spans.push(Span::raw(" "));
            spans.extend(self.renderer.line(node, &ctx).spans);
            if let Some(position) = ctx.drop_position {
                let marker = match position {
                    crate::drag::DropPosition::Inside => self.glyphs.drop_inside,
                    crate::drag::DropPosition::After => self.glyphs.drop_after,
                };
                spans.push(Span::styled(marker, self.style.drop_style));
            }

            let line: Line = spans.into_iter().collect();
            let row_area = Rect {
                x: inner.x,
                y,
                width: inner.width,
                height: 1,
            };
            buf.set_line(row_area.x, row_area.y, &line, row_area.width);
            if ctx.is_selected {
                buf.set_style(row_area, self.style.selection_style);
            }
            if ctx.is_dragged {
                buf.set_style(row_area, self.style.drag_style);
            }
            if ctx.is_focused {
                buf.set_style(row_area, self.style.focus_style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::DragOverEvent;
    use crate::model::TreeNode;
    use crate::state::TreeConfig;
    use ratatui::widgets::Borders;

    fn state() -> SortableTreeState<&'static str, &'static str> {
        let mut state = SortableTreeState::new(TreeConfig::default());
        state.sync(&[
            TreeNode::group("a", "alpha", vec![TreeNode::leaf("a1", "ant")]),
            TreeNode::leaf("b", "bee"),
        ]);
        state
    }

    fn row_text(buffer: &Buffer, y: u16) -> String {
        (0..buffer.area.width)
            .map(|x| buffer[(x, y)].symbol())
            .collect::<String>()
            .trim_end()
            .to_owned()
    }

    fn render(state: &mut SortableTreeState<&'static str, &'static str>) -> Buffer {
        let style = SortableTreeStyle {
            borders: Borders::NONE,
            ..SortableTreeStyle::default()
        };
        let widget = SortableTree::new(&LabelRenderer, style).glyphs(TreeGlyphs::ascii());
        let area = Rect::new(0, 0, 20, 4);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer, state);
        buffer
    }

    #[test]
    fn renders_visible_rows_with_expanders_and_indent() {
        let mut state = state();
        let buffer = render(&mut state);
        assert_eq!(row_text(&buffer, 0), "> alpha");
        assert_eq!(row_text(&buffer, 1), "* bee");
        assert_eq!(row_text(&buffer, 2), "");

        state.expand(&"a");
        let buffer = render(&mut state);
        assert_eq!(row_text(&buffer, 0), "v alpha");
        assert_eq!(row_text(&buffer, 1), "  * ant");
        assert_eq!(row_text(&buffer, 2), "* bee");
    }

    #[test]
    fn drop_target_row_carries_a_marker() {
        let mut state = state();
        state.drag_start(&"b");
        state.drag_over(DragOverEvent {
            active: "b",
            over: Some("a"),
            offset_x: 2,
        });
        let buffer = render(&mut state);
        assert_eq!(row_text(&buffer, 0), "> alpha <+");
    }

    #[test]
    fn scrolls_to_keep_the_focused_row_in_view() {
        let mut state: SortableTreeState<usize, String> =
            SortableTreeState::new(TreeConfig::default());
        let roots: Vec<_> = (0..10)
            .map(|i| TreeNode::leaf(i, format!("row-{i}")))
            .collect();
        state.sync(&roots);
        state.focus_last();

        let style = SortableTreeStyle {
            borders: Borders::NONE,
            ..SortableTreeStyle::default()
        };
        let widget = SortableTree::new(&LabelRenderer, style).glyphs(TreeGlyphs::ascii());
        let area = Rect::new(0, 0, 20, 4);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer, &mut state);

        assert_eq!(state.scroll_offset(), 6);
        assert_eq!(row_text(&buffer, 3), "* row-9");
    }
}
