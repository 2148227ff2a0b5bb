use std::hash::Hash;

use crate::drag::{DragEndEvent, DragOverEvent, DropPosition};
use crate::ops::DropProjection;
use crate::state::SortableTreeState;

/// One tree instance taking part in a shared drag session.
///
/// Implemented by [`SortableTreeState`]; a wrapper type can implement it to
/// interpose on the session calls.
pub trait DragParticipant {
    /// Node identifier type, shared by all participants of one coordinator.
    type Id;

    /// Returns `true` if a node with this id exists in this tree.
    fn owns_node(&self, id: &Self::Id) -> bool;
    /// Starts a drag session on a node of this tree.
    fn begin_drag(&mut self, id: &Self::Id);
    /// Feeds pointer movement into this tree's session.
    fn update_drag(&mut self, ev: DragOverEvent<Self::Id>);
    /// Ends this tree's session, applying the move locally.
    fn finish_drag(&mut self, ev: DragEndEvent<Self::Id>);
    /// Aborts this tree's session without moving anything.
    fn cancel_drag(&mut self);
    /// Returns the live placement projection of this tree's session.
    fn live_projection(&self) -> Option<(DropPosition, DropProjection<Self::Id>)>;
}

impl<Id: Clone + Eq + Hash, T: Clone> DragParticipant for SortableTreeState<Id, T> {
    type Id = Id;

    fn owns_node(&self, id: &Id) -> bool {
        self.contains(id)
    }

    fn begin_drag(&mut self, id: &Id) {
        self.drag_start(id);
    }

    fn update_drag(&mut self, ev: DragOverEvent<Id>) {
        self.drag_over(ev);
    }

    fn finish_drag(&mut self, ev: DragEndEvent<Id>) {
        self.drag_end(ev);
    }

    fn cancel_drag(&mut self) {
        self.drag_cancel();
    }

    fn live_projection(&self) -> Option<(DropPosition, DropProjection<Id>)> {
        self.drop_target()
            .map(|(_, position)| position)
            .zip(self.drop_projection().cloned())
    }
}

/// A drop that crossed from one tree to another.
///
/// The coordinator only describes the move: the caller detaches the `active`
/// subtree from the source tree's nested data, inserts it under `parent` in
/// the target tree's data, and re-`sync`s both states. Neither state is
/// mutated by the coordinator beyond resetting the sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossTreeMove<K, Id> {
    /// Tree the dragged node came from.
    pub source_tree: K,
    /// Tree the drop landed in.
    pub target_tree: K,
    /// The dragged node.
    pub active: Id,
    /// The node the drop landed on in the target tree.
    pub over: Id,
    /// Placement relative to `over`.
    pub position: DropPosition,
    /// Depth the node lands at in the target tree.
    pub depth: u16,
    /// Parent it lands under in the target tree (`None` for root level).
    pub parent: Option<Id>,
}

/// Routes one pointer-driven drag session across several tree instances.
///
/// Participants are keyed by an application-chosen tag; when two trees both
/// claim an id, the one registered first wins. Within one tree the
/// coordinator delegates to the participant; across trees it returns a
/// [`CrossTreeMove`] for the caller to apply.
pub struct DragCoordinator<K, P: DragParticipant> {
    participants: Vec<(K, P)>,
    active: Option<(K, P::Id)>,
    hovered: Option<K>,
}

impl<K, P: DragParticipant> Default for DragCoordinator<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P: DragParticipant> DragCoordinator<K, P> {
    /// Creates a coordinator with no participants.
    pub const fn new() -> Self {
        Self {
            participants: Vec::new(),
            active: None,
            hovered: None,
        }
    }
}

impl<K: Clone + PartialEq, P: DragParticipant> DragCoordinator<K, P>
where
    P::Id: Clone,
{
    /// Adds a participant under the given key, replacing any previous one.
    pub fn register(&mut self, key: K, participant: P) {
        self.deregister(&key);
        self.participants.push((key, participant));
    }

    /// Removes and returns the participant under the given key.
    pub fn deregister(&mut self, key: &K) -> Option<P> {
        let pos = self.participants.iter().position(|(k, _)| k == key)?;
        if self.hovered.as_ref() == Some(key) {
            self.hovered = None;
        }
        if self.active.as_ref().is_some_and(|(k, _)| k == key) {
            self.active = None;
        }
        Some(self.participants.remove(pos).1)
    }

    /// Returns the participant under the given key.
    pub fn get(&self, key: &K) -> Option<&P> {
        self.participants
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p)
    }

    /// Returns the participant under the given key, mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut P> {
        self.participants
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p)
    }

    /// Returns the key of the first registered participant owning the id.
    pub fn owner_of(&self, id: &P::Id) -> Option<&K> {
        self.participants
            .iter()
            .find(|(_, p)| p.owns_node(id))
            .map(|(k, _)| k)
    }

    /// Starts a shared drag session on the tree owning `id`.
    ///
    /// Returns `false` when no participant owns it.
    pub fn drag_start(&mut self, id: &P::Id) -> bool {
        let Some(owner) = self.owner_of(id).cloned() else {
            return false;
        };
        if let Some(participant) = self.get_mut(&owner) {
            participant.begin_drag(id);
        }
        self.active = Some((owner.clone(), id.clone()));
        self.hovered = Some(owner);
        true
    }

    /// Routes pointer movement to the hovered tree.
    ///
    /// When the hover moves from one tree to another, the previous tree gets
    /// a synthetic clear (an update with no `over`) so its drop indicator
    /// disappears before the new tree picks the session up.
    pub fn drag_over(&mut self, tree: Option<&K>, over: Option<P::Id>, offset_x: i32) {
        let Some((_, active)) = self.active.clone() else {
            return;
        };
        if self.hovered.as_ref() != tree {
            let left = self.hovered.take();
            if let Some(participant) = left.as_ref().and_then(|key| self.get_mut(key)) {
                participant.update_drag(DragOverEvent {
                    active: active.clone(),
                    over: None,
                    offset_x,
                });
            }
        }
        let Some(tree) = tree else {
            return;
        };
        if let Some(participant) = self.get_mut(tree) {
            participant.update_drag(DragOverEvent {
                active,
                over,
                offset_x,
            });
            self.hovered = Some(tree.clone());
        }
    }

    /// Ends the shared session.
    ///
    /// A drop on the source tree is delegated to it and applied there; a
    /// drop on another tree resets both sessions and returns the
    /// [`CrossTreeMove`] for the caller to apply. A cancellation or an
    /// unresolved drop resets every session and returns `None`.
    pub fn drag_end(
        &mut self,
        tree: Option<&K>,
        over: Option<P::Id>,
        offset_x: i32,
        canceled: bool,
    ) -> Option<CrossTreeMove<K, P::Id>> {
        let Some((source, active)) = self.active.take() else {
            return None;
        };
        self.hovered = None;

        let resolved = (!canceled)
            .then_some(())
            .and(tree.cloned().zip(over));
        let Some((target, over)) = resolved else {
            self.cancel_all();
            return None;
        };

        if target == source {
            if let Some(participant) = self.get_mut(&source) {
                participant.finish_drag(DragEndEvent {
                    active,
                    over: Some(over),
                    offset_x,
                    canceled: false,
                });
            }
            return None;
        }

        // Refresh the target's projection with the final pointer state
        // before reading it off.
        let descriptor = self.get_mut(&target).and_then(|participant| {
            participant.update_drag(DragOverEvent {
                active: active.clone(),
                over: Some(over.clone()),
                offset_x,
            });
            let (position, projection) = participant.live_projection()?;
            Some(CrossTreeMove {
                source_tree: source.clone(),
                target_tree: target.clone(),
                active: active.clone(),
                over,
                position,
                depth: projection.depth,
                parent: projection.parent,
            })
        });
        self.cancel_all();
        descriptor
    }

    /// Aborts the shared session on every participant.
    pub fn cancel(&mut self) {
        self.active = None;
        self.hovered = None;
        self.cancel_all();
    }

    fn cancel_all(&mut self) {
        for (_, participant) in &mut self.participants {
            participant.cancel_drag();
        }
    }
}
