/// A node of the caller-owned nested tree.
///
/// The nested tree is the authoritative representation:
/// - `id` values must be unique within one tree (and across trees that share
///   a drag session);
/// - `children: None` on a group means "not loaded yet"; expanding it asks
///   the caller to load (see `SortableTreeState::resolve_load`);
/// - `children: Some(vec![])` means "loaded, currently empty".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode<Id, T> {
    /// Stable node identifier.
    pub id: Id,
    /// Opaque caller payload.
    pub data: T,
    /// Forces "can have children" even while the node has none.
    pub is_group: bool,
    /// Child nodes in display order, or `None` if not loaded.
    pub children: Option<Vec<TreeNode<Id, T>>>,
}

impl<Id, T> TreeNode<Id, T> {
    /// Creates a leaf node.
    pub const fn leaf(id: Id, data: T) -> Self {
        Self {
            id,
            data,
            is_group: false,
            children: None,
        }
    }

    /// Creates a loaded group node with the given children.
    pub fn group(id: Id, data: T, children: Vec<Self>) -> Self {
        Self {
            id,
            data,
            is_group: true,
            children: Some(children),
        }
    }

    /// Creates a group whose children have not been loaded yet.
    pub const fn lazy_group(id: Id, data: T) -> Self {
        Self {
            id,
            data,
            is_group: true,
            children: None,
        }
    }

    /// Replaces the children, marking the node as loaded.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = Some(children);
        self
    }

    /// Returns `true` if the node can have children.
    pub fn is_group(&self) -> bool {
        self.is_group || self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Returns `true` if the children of this node are loaded.
    pub const fn children_loaded(&self) -> bool {
        self.children.is_some()
    }
}

/// A node of the derived flat representation.
///
/// Flat arrays are pre-order: a node always appears before all of its
/// descendants and after the subtrees of its earlier siblings. Sibling
/// `index` values are contiguous starting at 0 per parent. Both invariants
/// are maintained by every operation in [`crate::flat`] and [`crate::ops`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatNode<Id, T> {
    /// Stable node identifier.
    pub id: Id,
    /// Opaque caller payload.
    pub data: T,
    /// Whether the node can have children.
    pub is_group: bool,
    /// Whether the children were present on the nested form.
    pub children_loaded: bool,
    /// Parent id, or `None` for a root.
    pub parent: Option<Id>,
    /// Nesting depth; roots are 0.
    pub depth: u16,
    /// Position among siblings (0-based, contiguous).
    pub index: usize,
}

/// Best-effort display label for a node payload, used by type-ahead search.
pub trait TreeLabel {
    /// Returns the label to match typed characters against, if any.
    fn tree_label(&self) -> Option<&str>;
}

impl TreeLabel for String {
    fn tree_label(&self) -> Option<&str> {
        Some(self)
    }
}

impl TreeLabel for &str {
    fn tree_label(&self) -> Option<&str> {
        Some(self)
    }
}

impl TreeLabel for () {
    fn tree_label(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_flag_derives_from_children() {
        let leaf: TreeNode<&str, ()> = TreeNode::leaf("a", ());
        assert!(!leaf.is_group());
        assert!(!leaf.children_loaded());

        let lazy: TreeNode<&str, ()> = TreeNode::lazy_group("g", ());
        assert!(lazy.is_group());
        assert!(!lazy.children_loaded());

        let implicit = TreeNode::leaf("p", ()).with_children(vec![TreeNode::leaf("c", ())]);
        assert!(implicit.is_group());
        assert!(implicit.children_loaded());
    }
}
