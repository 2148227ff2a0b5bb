use std::hash::Hash;

use rustc_hash::FxHashSet;

use crate::model::{FlatNode, TreeNode};

/// Flattens a nested tree into pre-order, assigning depth, parent, and
/// sibling index.
///
/// Children of unloaded groups do not exist and therefore produce no rows;
/// the group itself is emitted with `children_loaded = false`.
pub fn flatten<Id: Clone, T: Clone>(roots: &[TreeNode<Id, T>]) -> Vec<FlatNode<Id, T>> {
    let mut out = Vec::new();
    for (index, root) in roots.iter().enumerate() {
        flatten_into(root, None, 0, index, &mut out);
    }
    out
}

fn flatten_into<Id: Clone, T: Clone>(
    node: &TreeNode<Id, T>,
    parent: Option<&Id>,
    depth: u16,
    index: usize,
    out: &mut Vec<FlatNode<Id, T>>,
) {
    out.push(FlatNode {
        id: node.id.clone(),
        data: node.data.clone(),
        is_group: node.is_group(),
        children_loaded: node.children_loaded(),
        parent: parent.cloned(),
        depth,
        index,
    });
    if let Some(children) = &node.children {
        for (i, child) in children.iter().enumerate() {
            flatten_into(child, Some(&node.id), depth + 1, i, out);
        }
    }
}

/// Rebuilds the nested form from a pre-order flat array.
///
/// Inverse of [`flatten`]: nodes with `children_loaded = true` get a
/// `children` vector (possibly empty), unloaded ones keep `children: None`.
pub fn build<Id, T>(flat: Vec<FlatNode<Id, T>>) -> Vec<TreeNode<Id, T>> {
    let mut roots = Vec::new();
    // Ancestor chain of the row being processed; depth == stack position.
    let mut stack: Vec<TreeNode<Id, T>> = Vec::new();
    for row in flat {
        while stack.len() > row.depth as usize
            && let Some(done) = stack.pop()
        {
            attach(&mut stack, &mut roots, done);
        }
        stack.push(TreeNode {
            id: row.id,
            data: row.data,
            is_group: row.is_group,
            children: row.children_loaded.then(Vec::new),
        });
    }
    while let Some(done) = stack.pop() {
        attach(&mut stack, &mut roots, done);
    }
    roots
}

fn attach<Id, T>(
    stack: &mut [TreeNode<Id, T>],
    roots: &mut Vec<TreeNode<Id, T>>,
    node: TreeNode<Id, T>,
) {
    if let Some(parent) = stack.last_mut() {
        parent.children.get_or_insert_with(Vec::new).push(node);
    } else {
        roots.push(node);
    }
}

/// Computes the visible subset of a flat array as indices into it.
///
/// Single linear pass: a node is visible iff it is a root or its parent is
/// visible and expanded. The result is a prefix-preserving subsequence of the
/// input; relative order is never changed.
pub fn visible_indices<Id: Eq + Hash, T>(
    flat: &[FlatNode<Id, T>],
    expanded: &FxHashSet<Id>,
) -> Vec<usize> {
    let mut out = Vec::with_capacity(flat.len());
    let mut hidden: FxHashSet<&Id> = FxHashSet::default();
    for (idx, node) in flat.iter().enumerate() {
        let visible = node.parent.as_ref().is_none_or(|parent| {
            !hidden.contains(parent) && expanded.contains(parent)
        });
        if visible {
            out.push(idx);
        } else {
            hidden.insert(&node.id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TreeNode<&'static str, ()>> {
        vec![
            TreeNode::group(
                "a",
                (),
                vec![
                    TreeNode::leaf("a1", ()),
                    TreeNode::group("a2", (), vec![TreeNode::leaf("a2x", ())]),
                ],
            ),
            TreeNode::leaf("b", ()),
        ]
    }

    fn expanded(ids: &[&'static str]) -> FxHashSet<&'static str> {
        ids.iter().copied().collect()
    }

    #[test]
    fn flatten_is_preorder_with_depths_and_indices() {
        let flat = flatten(&sample());
        let ids: Vec<_> = flat.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "a1", "a2", "a2x", "b"]);

        let depths: Vec<_> = flat.iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0, 1, 1, 2, 0]);

        let indices: Vec<_> = flat.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![0, 0, 1, 0, 1]);

        assert_eq!(flat[1].parent, Some("a"));
        assert_eq!(flat[4].parent, None);
    }

    #[test]
    fn flatten_derives_group_from_children() {
        let roots = vec![TreeNode::leaf("p", ()).with_children(vec![TreeNode::leaf("c", ())])];
        let flat = flatten(&roots);
        assert!(flat[0].is_group);
        assert!(flat[0].children_loaded);
    }

    #[test]
    fn lazy_group_has_no_rows_for_children() {
        let roots = vec![TreeNode::lazy_group("g", ())];
        let flat = flatten(&roots);
        assert_eq!(flat.len(), 1);
        assert!(flat[0].is_group);
        assert!(!flat[0].children_loaded);
    }

    #[test]
    fn build_round_trips_flatten() {
        let roots = sample();
        assert_eq!(build(flatten(&roots)), roots);
    }

    #[test]
    fn build_round_trips_lazy_and_empty_groups() {
        let roots = vec![
            TreeNode::lazy_group("lazy", ()),
            TreeNode::group("empty", (), Vec::new()),
        ];
        assert_eq!(build(flatten(&roots)), roots);
    }

    #[test]
    fn visible_follows_expansion() {
        let flat = flatten(&sample());

        let vis: Vec<_> = visible_indices(&flat, &expanded(&["a"]))
            .into_iter()
            .map(|i| flat[i].id)
            .collect();
        assert_eq!(vis, vec!["a", "a1", "a2", "b"]);

        let vis: Vec<_> = visible_indices(&flat, &expanded(&[]))
            .into_iter()
            .map(|i| flat[i].id)
            .collect();
        assert_eq!(vis, vec!["a", "b"]);
    }

    #[test]
    fn collapsed_ancestor_suppresses_expanded_descendant() {
        let flat = flatten(&sample());
        // "a2" expanded but "a" collapsed: nothing under "a" is visible.
        let vis: Vec<_> = visible_indices(&flat, &expanded(&["a2"]))
            .into_iter()
            .map(|i| flat[i].id)
            .collect();
        assert_eq!(vis, vec!["a", "b"]);
    }

    #[test]
    fn visible_is_order_preserving_subsequence() {
        let flat = flatten(&sample());
        let vis = visible_indices(&flat, &expanded(&["a", "a2"]));
        assert!(vis.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(vis.len(), flat.len());
    }
}
