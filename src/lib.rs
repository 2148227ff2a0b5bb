//! Sortable tree widget for ratatui with drag-and-drop, lazy loading, and
//! multi-selection.
//!
//! The caller owns the nested tree; [`SortableTreeState`] keeps the derived
//! flat and visible rows, expansion, selection, focus, and the drag session,
//! and reports every change through drained [`TreeEvent`]s.
//! [`DragCoordinator`] routes one pointer-driven drag across several trees.
//!
//! Feature flags:
//! - `keymap`: crossterm-based key bindings and `SortableTreeState::handle_key*` helpers.
//! - `serde`: serde support for `TreeSnapshot`.

mod action;
mod context;
mod coordinate;
mod drag;
mod flat;
mod glyphs;
#[cfg(feature = "keymap")]
mod keymap;
mod model;
mod ops;
pub mod prelude;
mod state;
mod style;
mod widget;

pub use action::{ActionOutcome, TreeAction, TreeEvent};
pub use context::NodeRenderContext;
pub use coordinate::{CrossTreeMove, DragCoordinator, DragParticipant};
pub use drag::{DragEndEvent, DragOverEvent, DropPosition, MoveDescriptor};
pub use flat::{build, flatten, visible_indices};
pub use glyphs::TreeGlyphs;
#[cfg(feature = "keymap")]
pub use keymap::{KeymapProfile, TreeKeyBindings};
pub use model::{FlatNode, TreeLabel, TreeNode};
pub use ops::{
    DropProjection, ancestor_ids, descendant_ids, insert_under, position_of, project_drop,
    remove_subtrees, sibling_count,
};
pub use state::{SelectionMode, SortableTreeState, TreeConfig, TreeSnapshot};
pub use style::SortableTreeStyle;
pub use widget::{LabelRenderer, NodeRenderer, SortableTree};
