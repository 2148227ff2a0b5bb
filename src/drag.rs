use std::hash::Hash;
use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::action::TreeEvent;
use crate::flat::build;
use crate::ops::{self, DropProjection};
use crate::state::{SelectionMode, SortableTreeState};

/// Where a dragged node lands relative to the hovered node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropPosition {
    /// As the next sibling chain entry after the hovered node's subtree
    /// (possibly outdented to an ancestor level).
    After,
    /// As the first child of the hovered node.
    Inside,
}

/// A committed move, reported through `TreeEvent::DragEnded`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveDescriptor<Id> {
    /// Moved subtree roots, in their pre-move flat order.
    pub moved: Vec<Id>,
    /// The node the drop landed on.
    pub target: Id,
    /// Placement relative to the target.
    pub position: DropPosition,
    /// Depth the moved roots landed at.
    pub depth: u16,
    /// Parent the moved roots landed under (`None` for root level).
    pub parent: Option<Id>,
}

/// Pointer movement during a drag.
#[derive(Clone, Debug)]
pub struct DragOverEvent<Id> {
    /// The dragged node; may belong to another tree.
    pub active: Id,
    /// The hovered node of this tree, if any.
    pub over: Option<Id>,
    /// Horizontal pointer offset from the drag origin, in cells.
    pub offset_x: i32,
}

/// Pointer release (or cancellation) ending a drag.
#[derive(Clone, Debug)]
pub struct DragEndEvent<Id> {
    /// The dragged node.
    pub active: Id,
    /// The hovered node at release time, if any.
    pub over: Option<Id>,
    /// Horizontal pointer offset from the drag origin, in cells.
    pub offset_x: i32,
    /// The drag was aborted (e.g. Escape); nothing moves.
    pub canceled: bool,
}

/// Live state of the drag session on one tree instance.
#[derive(Debug)]
pub(crate) struct DragSession<Id> {
    pub(crate) active: Option<Id>,
    pub(crate) over: Option<Id>,
    pub(crate) position: Option<DropPosition>,
    pub(crate) projection: Option<DropProjection<Id>>,
    pub(crate) offset_x: i32,
    // Hover target and the instant hovering over it began.
    pub(crate) hover: Option<(Id, Instant)>,
}

impl<Id> Default for DragSession<Id> {
    fn default() -> Self {
        Self {
            active: None,
            over: None,
            position: None,
            projection: None,
            offset_x: 0,
            hover: None,
        }
    }
}

impl<Id> DragSession<Id> {
    pub(crate) fn clear_target(&mut self) {
        self.over = None;
        self.position = None;
        self.projection = None;
        self.offset_x = 0;
        self.hover = None;
    }
}

impl<Id: Clone + Eq + Hash, T> SortableTreeState<Id, T> {
    /// Starts a drag session on a node of this tree.
    pub fn drag_start(&mut self, id: &Id) {
        if !self.config.drag_enabled || !self.contains(id) {
            return;
        }
        self.session = DragSession::default();
        self.session.active = Some(id.clone());
        self.events.push(TreeEvent::DragStarted { id: id.clone() });
    }

    /// Updates the drag session from pointer movement.
    ///
    /// Recomputes the live projection, and auto-expands a collapsed loaded
    /// group after the configured hover delay. A missing or hidden `over`
    /// clears the target (the pointer left this tree's rows).
    pub fn drag_over(&mut self, ev: DragOverEvent<Id>) {
        self.drag_over_at(ev, Instant::now());
    }

    pub(crate) fn drag_over_at(&mut self, ev: DragOverEvent<Id>, now: Instant) {
        if !self.config.drag_enabled {
            return;
        }
        self.session.active = Some(ev.active.clone());
        let Some(over) = ev.over else {
            self.session.clear_target();
            return;
        };
        if !self.visible_index.contains_key(&over) {
            self.session.clear_target();
            return;
        }
        self.session.offset_x = ev.offset_x;
        match self.projection_for(&ev.active, &over, ev.offset_x) {
            Some((position, projection)) => {
                self.session.position = Some(position);
                self.session.projection = Some(projection);
            }
            None => {
                self.session.position = None;
                self.session.projection = None;
            }
        }
        self.session.over = Some(over.clone());
        self.auto_expand_hover(&ev.active, &over, now);
    }

    /// Ends the drag session and applies the move.
    ///
    /// Equivalent to [`drag_end_with`](Self::drag_end_with) with a guard that
    /// accepts everything.
    pub fn drag_end(&mut self, ev: DragEndEvent<Id>)
    where
        T: Clone,
    {
        self.drag_end_with(ev, |_| true);
    }

    /// Ends the drag session, consulting `guard` before committing.
    ///
    /// The session is reset regardless of the outcome. Nothing moves when
    /// the event is canceled, the target is missing or hidden, the placement
    /// would move a node into its own subtree, or the guard declines. On a
    /// commit this emits `Structure` with the replacement tree followed by
    /// `DragEnded` with the move descriptor.
    pub fn drag_end_with<F>(&mut self, ev: DragEndEvent<Id>, guard: F)
    where
        T: Clone,
        F: FnOnce(&MoveDescriptor<Id>) -> bool,
    {
        if !self.config.drag_enabled {
            return;
        }
        let session = std::mem::take(&mut self.session);
        if ev.canceled {
            return;
        }
        let Some(over) = ev.over else {
            return;
        };
        if ops::position_of(&self.flat, &ev.active).is_none() {
            return;
        }
        let reusable = session.over.as_ref() == Some(&over)
            && session.offset_x == ev.offset_x
            && session.projection.is_some();
        let projected = if reusable {
            session.position.zip(session.projection)
        } else {
            self.projection_for(&ev.active, &over, ev.offset_x)
        };
        let Some((position, projection)) = projected else {
            return;
        };

        let roots = self.move_roots(&ev.active);
        let mut moving: FxHashSet<Id> = roots.iter().cloned().collect();
        for root in &roots {
            moving.extend(ops::descendant_ids(&self.flat, root));
        }
        if moving.contains(&over) {
            return;
        }
        if projection
            .parent
            .as_ref()
            .is_some_and(|parent| moving.contains(parent))
        {
            return;
        }

        let descriptor = MoveDescriptor {
            moved: roots.clone(),
            target: over.clone(),
            position,
            depth: projection.depth,
            parent: projection.parent.clone(),
        };
        if !guard(&descriptor) {
            return;
        }

        self.apply_move(&roots, &moving, &over, position, &projection);
        self.events.push(TreeEvent::Structure {
            tree: build(self.flat.clone()),
        });
        self.events.push(TreeEvent::DragEnded(descriptor));
    }

    /// Aborts the drag session without moving anything.
    pub fn drag_cancel(&mut self) {
        self.session = DragSession::default();
    }

    /// Returns the dragged node id while a session is live.
    pub const fn dragged_id(&self) -> Option<&Id> {
        self.session.active.as_ref()
    }

    /// Returns the hovered node and placement while the session has a valid
    /// target.
    pub fn drop_target(&self) -> Option<(&Id, DropPosition)> {
        self.session.over.as_ref().zip(self.session.position)
    }

    /// Returns the live placement projection.
    pub const fn drop_projection(&self) -> Option<&DropProjection<Id>> {
        self.session.projection.as_ref()
    }

    /// Classifies the placement for a drag over `over`.
    ///
    /// An empty expanded group always takes the drop as its first child;
    /// everything else projects from the pointer offset, landing `Inside`
    /// exactly when the projected parent is the hovered node itself.
    /// Returns `None` when the placement would move a node into its own
    /// subtree (or onto itself).
    pub(crate) fn projection_for(
        &self,
        active: &Id,
        over: &Id,
        offset_x: i32,
    ) -> Option<(DropPosition, DropProjection<Id>)> {
        let over_row = *self.visible_index.get(over)?;
        let over_node = &self.flat[self.visible[over_row]];

        let mut moving: FxHashSet<Id> = FxHashSet::default();
        if self.contains(active) {
            for root in self.move_roots(active) {
                moving.extend(ops::descendant_ids(&self.flat, &root));
                moving.insert(root);
            }
            if moving.contains(over) {
                return None;
            }
        }

        let empty_group = over_node.is_group
            && over_node.children_loaded
            && self.is_expanded(over)
            && self.flat.iter().all(|node| node.parent.as_ref() != Some(over));
        if empty_group {
            return Some((
                DropPosition::Inside,
                DropProjection {
                    depth: over_node.depth + 1,
                    parent: Some(over.clone()),
                },
            ));
        }

        let projection = ops::project_drop(
            &self.flat,
            &self.visible,
            active,
            over,
            offset_x,
            self.config.indent_width,
        )?;
        if projection
            .parent
            .as_ref()
            .is_some_and(|parent| moving.contains(parent))
        {
            return None;
        }
        let position = if projection.parent.as_ref() == Some(over) {
            DropPosition::Inside
        } else {
            DropPosition::After
        };
        Some((position, projection))
    }

    /// Returns the subtree roots a drag of `active` moves, in flat order.
    ///
    /// With a multiple selection containing the dragged node, every selected
    /// node without a selected ancestor moves; otherwise only `active` does.
    fn move_roots(&self, active: &Id) -> Vec<Id> {
        let selected = self.selected_set();
        let multi = self.config.selection_mode == SelectionMode::Multiple
            && selected.len() > 1
            && selected.contains(active);
        if !multi {
            return vec![active.clone()];
        }
        let mut roots = Vec::new();
        let mut covered: FxHashSet<&Id> = FxHashSet::default();
        for node in &self.flat {
            if node.parent.as_ref().is_some_and(|parent| covered.contains(parent)) {
                covered.insert(&node.id);
                continue;
            }
            if selected.contains(&node.id) {
                covered.insert(&node.id);
                roots.push(node.id.clone());
            }
        }
        roots
    }

    fn apply_move(
        &mut self,
        roots: &[Id],
        moving: &FxHashSet<Id>,
        over: &Id,
        position: DropPosition,
        projection: &DropProjection<Id>,
    ) {
        let Some(over_pos) = ops::position_of(&self.flat, over) else {
            return;
        };
        let insert_pos = match position {
            DropPosition::Inside => over_pos + 1,
            DropPosition::After => {
                let over_depth = self.flat[over_pos].depth;
                let mut end = over_pos + 1;
                while end < self.flat.len() && self.flat[end].depth > over_depth {
                    end += 1;
                }
                end
            }
        };
        // Splice index in the array with the moved rows taken out.
        let at = self.flat[..insert_pos]
            .iter()
            .filter(|node| !moving.contains(&node.id))
            .count();

        let root_set: FxHashSet<&Id> = roots.iter().collect();
        let mut kept = Vec::with_capacity(self.flat.len());
        let mut moved = Vec::new();
        // Depth shift of the subtree block currently being collected; every
        // moved row after a root belongs to that root (pre-order).
        let mut delta = 0i32;
        for mut row in std::mem::take(&mut self.flat) {
            if root_set.contains(&row.id) {
                delta = i32::from(projection.depth) - i32::from(row.depth);
                row.depth = projection.depth;
                row.parent = projection.parent.clone();
                moved.push(row);
            } else if moving.contains(&row.id) {
                row.depth = u16::try_from(i32::from(row.depth) + delta).unwrap_or(0);
                moved.push(row);
            } else {
                kept.push(row);
            }
        }
        kept.splice(at..at, moved);
        ops::reindex(&mut kept);
        self.flat = kept;
        self.refresh_visible();
    }

    fn auto_expand_hover(&mut self, active: &Id, over: &Id, now: Instant) {
        let collapsed_group = self
            .flat
            .iter()
            .find(|node| node.id == *over)
            .is_some_and(|node| node.is_group && node.children_loaded)
            && !self.is_expanded(over)
            && over != active;
        if !collapsed_group {
            self.session.hover = None;
            return;
        }
        match &self.session.hover {
            Some((id, since)) if id == over => {
                if now.duration_since(*since) >= self.config.auto_expand_delay {
                    self.expand(over);
                    self.session.hover = None;
                }
            }
            _ => self.session.hover = Some((over.clone(), now)),
        }
    }
}
