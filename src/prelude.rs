pub use crate::{
    ActionOutcome, CrossTreeMove, DragCoordinator, DragEndEvent, DragOverEvent, DragParticipant,
    DropPosition, DropProjection, FlatNode, LabelRenderer, MoveDescriptor, NodeRenderContext,
    NodeRenderer, SelectionMode, SortableTree, SortableTreeState, SortableTreeStyle, TreeAction,
    TreeConfig, TreeEvent, TreeGlyphs, TreeLabel, TreeNode, TreeSnapshot, build, flatten,
    visible_indices,
};

#[cfg(feature = "keymap")]
pub use crate::{KeymapProfile, TreeKeyBindings};
