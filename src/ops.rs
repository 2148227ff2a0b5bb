use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::FlatNode;

/// Live candidate placement for a drag, before it is committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropProjection<Id> {
    /// Depth the dragged node would land at.
    pub depth: u16,
    /// Parent it would land under (`None` for root level).
    pub parent: Option<Id>,
}

/// Returns the flat position of the node with the given id.
pub fn position_of<Id: PartialEq, T>(flat: &[FlatNode<Id, T>], id: &Id) -> Option<usize> {
    flat.iter().position(|node| node.id == *id)
}

/// Returns the ids of all nodes transitively parented under `id`.
///
/// Single forward pass over a growing "is under" set; correct only because
/// flat arrays are pre-order, so every parent appears before its children.
pub fn descendant_ids<Id: Clone + Eq + Hash, T>(flat: &[FlatNode<Id, T>], id: &Id) -> Vec<Id> {
    let mut inside: FxHashSet<&Id> = FxHashSet::default();
    inside.insert(id);
    let mut out = Vec::new();
    for node in flat {
        if let Some(parent) = &node.parent
            && inside.contains(parent)
        {
            inside.insert(&node.id);
            out.push(node.id.clone());
        }
    }
    out
}

/// Returns the number of direct children of `parent` (`None` counts roots).
pub fn sibling_count<Id: PartialEq, T>(flat: &[FlatNode<Id, T>], parent: Option<&Id>) -> usize {
    flat.iter()
        .filter(|node| node.parent.as_ref() == parent)
        .count()
}

/// Returns the parent chain of `id`, nearest parent first, up to its root.
pub fn ancestor_ids<Id: Clone + Eq + Hash, T>(flat: &[FlatNode<Id, T>], id: &Id) -> Vec<Id> {
    let by_id: FxHashMap<&Id, &FlatNode<Id, T>> =
        flat.iter().map(|node| (&node.id, node)).collect();
    let mut out = Vec::new();
    let mut cursor = by_id.get(id).and_then(|node| node.parent.as_ref());
    while let Some(parent) = cursor {
        out.push(parent.clone());
        cursor = by_id.get(parent).and_then(|node| node.parent.as_ref());
    }
    out
}

/// Removes the given ids and all of their descendants, then reindexes.
pub fn remove_subtrees<Id: Clone + Eq + Hash, T>(
    flat: Vec<FlatNode<Id, T>>,
    ids: &FxHashSet<Id>,
) -> Vec<FlatNode<Id, T>> {
    let mut doomed = ids.clone();
    let mut kept = Vec::with_capacity(flat.len());
    for node in flat {
        let dead = doomed.contains(&node.id)
            || node.parent.as_ref().is_some_and(|parent| doomed.contains(parent));
        if dead {
            doomed.insert(node.id);
        } else {
            kept.push(node);
        }
    }
    reindex(&mut kept);
    kept
}

/// Splices `new_nodes` (already depth/parent-correct) in front of the
/// `index`-th child of `parent`, or after that parent's last child when
/// `index` exceeds the count, then reindexes.
///
/// An unknown parent id is a no-op.
pub fn insert_under<Id: Clone + Eq + Hash, T>(
    mut flat: Vec<FlatNode<Id, T>>,
    new_nodes: Vec<FlatNode<Id, T>>,
    parent: Option<&Id>,
    index: usize,
) -> Vec<FlatNode<Id, T>> {
    let Some(at) = splice_position(&flat, parent, index) else {
        return flat;
    };
    flat.splice(at..at, new_nodes);
    reindex(&mut flat);
    flat
}

fn splice_position<Id: Eq + Hash, T>(
    flat: &[FlatNode<Id, T>],
    parent: Option<&Id>,
    index: usize,
) -> Option<usize> {
    let Some(parent) = parent else {
        let mut seen = 0;
        for (pos, node) in flat.iter().enumerate() {
            if node.parent.is_none() {
                if seen == index {
                    return Some(pos);
                }
                seen += 1;
            }
        }
        return Some(flat.len());
    };

    let parent_pos = flat.iter().position(|node| node.id == *parent)?;
    let parent_depth = flat[parent_pos].depth;
    let mut seen = 0;
    for (pos, node) in flat.iter().enumerate().skip(parent_pos + 1) {
        if node.depth <= parent_depth {
            // Subtree ended before the requested index: append here.
            return Some(pos);
        }
        if node.parent.as_ref() == Some(parent) {
            if seen == index {
                return Some(pos);
            }
            seen += 1;
        }
    }
    Some(flat.len())
}

/// Recomputes sibling `index` values so each parent's children count
/// `0..n` contiguously in flat order.
pub fn reindex<Id: Clone + Eq + Hash, T>(flat: &mut [FlatNode<Id, T>]) {
    let mut counters: FxHashMap<Option<Id>, usize> = FxHashMap::default();
    for node in flat {
        let counter = counters.entry(node.parent.clone()).or_insert(0);
        node.index = *counter;
        *counter += 1;
    }
}

/// Infers where a dragged node would land from the horizontal pointer offset.
///
/// The candidate depth is the dragged node's own depth (or the hovered
/// node's, when the drag comes from another tree and `active` has no row
/// here) shifted by one level per `indent_width` of offset. It is clamped
/// between what the hovered node can accept (its depth, one deeper if it is
/// a group) and what the next visible row still allows. When the hovered row
/// is the last visible one the floor is 0: outdenting all the way to the
/// root is permitted there.
///
/// Returns `None` when `over` is not visible.
pub fn project_drop<Id: Clone + Eq + Hash, T>(
    flat: &[FlatNode<Id, T>],
    visible: &[usize],
    active: &Id,
    over: &Id,
    offset_x: i32,
    indent_width: u16,
) -> Option<DropProjection<Id>> {
    let over_vis = visible.iter().position(|&i| flat[i].id == *over)?;
    let over_node = &flat[visible[over_vis]];

    let base_depth = flat
        .iter()
        .find(|node| node.id == *active)
        .map_or(over_node.depth, |node| node.depth);
    let shift = (f64::from(offset_x) / f64::from(indent_width.max(1))).round() as i32;
    let candidate = u16::try_from((i32::from(base_depth) + shift).max(0)).unwrap_or(u16::MAX);

    let max_depth = if over_node.is_group {
        over_node.depth + 1
    } else {
        over_node.depth
    };
    let min_depth = visible
        .get(over_vis + 1)
        .map_or(0, |&next| flat[next].depth);

    // max wins if the window is ever inverted.
    let depth = candidate.max(min_depth).min(max_depth);

    let parent = if depth == 0 {
        None
    } else {
        visible[..=over_vis]
            .iter()
            .rev()
            .map(|&i| &flat[i])
            .find(|node| node.depth + 1 == depth)
            .map(|node| node.id.clone())
    };

    Some(DropProjection { depth, parent })
}
