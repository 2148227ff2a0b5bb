use std::hash::Hash;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::action::{ActionOutcome, TreeAction, TreeEvent};
use crate::drag::DragSession;
use crate::flat::{build, flatten, visible_indices};
use crate::model::{FlatNode, TreeLabel, TreeNode};
use crate::ops;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "keymap")]
use crate::keymap::TreeKeyBindings;
#[cfg(feature = "keymap")]
use crossterm::event::KeyEvent;

/// Idle window after which the type-ahead buffer resets.
const TYPE_AHEAD_TIMEOUT: Duration = Duration::from_millis(1000);

/// Selection behavior of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Select and toggle are no-ops.
    None,
    /// At most one node is selected.
    #[default]
    Single,
    /// Full set semantics with range selection and select-all.
    Multiple,
}

/// Static configuration of a tree instance.
#[derive(Clone, Copy, Debug)]
pub struct TreeConfig {
    /// Selection behavior.
    pub selection_mode: SelectionMode,
    /// Horizontal cells per nesting level, used to project drag offsets.
    pub indent_width: u16,
    /// Hover time over a collapsed group before it auto-expands during a drag.
    pub auto_expand_delay: Duration,
    /// Enables the drag-and-drop session handlers.
    pub drag_enabled: bool,
    /// The caller owns the expansion set and re-supplies it after changes.
    pub controlled_expansion: bool,
    /// The caller owns the selection set and re-supplies it after changes.
    pub controlled_selection: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            selection_mode: SelectionMode::Single,
            indent_width: 2,
            auto_expand_delay: Duration::from_millis(500),
            drag_enabled: true,
            controlled_expansion: false,
            controlled_selection: false,
        }
    }
}

/// One piece of state that is owned either internally or by the caller.
///
/// Writes always emit the matching change event first and then update the
/// local copy; for a controlled cell the caller overwrites the copy through
/// `supply` whenever its own value changes, so behavior elsewhere is
/// indistinguishable.
#[derive(Debug)]
struct StateCell<V> {
    value: V,
    controlled: bool,
}

impl<V> StateCell<V> {
    const fn new(value: V, controlled: bool) -> Self {
        Self { value, controlled }
    }

    const fn get(&self) -> &V {
        &self.value
    }

    const fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    fn supply(&mut self, value: V) {
        self.value = value;
    }

    const fn is_controlled(&self) -> bool {
        self.controlled
    }
}

/// Snapshot of the persistent interaction state (expansion, selection, focus).
///
/// With the `serde` feature enabled, this type derives
/// `Serialize`/`Deserialize`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct TreeSnapshot<Id> {
    /// Expanded node ids.
    pub expanded: Vec<Id>,
    /// Selected node ids.
    pub selected: Vec<Id>,
    /// Focused node id.
    pub focus: Option<Id>,
}

struct TypeAhead {
    buffer: String,
    last_key: Option<Instant>,
}

impl TypeAhead {
    const fn new() -> Self {
        Self {
            buffer: String::new(),
            last_key: None,
        }
    }

    fn push(&mut self, ch: char, now: Instant) -> &str {
        if self
            .last_key
            .is_none_or(|last| now.duration_since(last) > TYPE_AHEAD_TIMEOUT)
        {
            self.buffer.clear();
        }
        self.buffer.extend(ch.to_lowercase());
        self.last_key = Some(now);
        &self.buffer
    }
}

/// Tree engine state: cached flat/visible rows, expansion, selection, focus,
/// lazy loading, and the drag session.
///
/// The caller owns the authoritative nested tree and re-supplies it through
/// [`sync`](Self::sync) after applying (or declining) emitted `Structure`
/// events. Everything here is derived or interaction state.
pub struct SortableTreeState<Id, T> {
    pub(crate) config: TreeConfig,
    pub(crate) flat: Vec<FlatNode<Id, T>>,
    // Indices into `flat`, in flat order.
    pub(crate) visible: Vec<usize>,
    // Fast lookup from node id to position in `visible`.
    pub(crate) visible_index: FxHashMap<Id, usize>,
    expanded: StateCell<FxHashSet<Id>>,
    selected: StateCell<FxHashSet<Id>>,
    // Last node selected by a plain select; range selection spans from here.
    anchor: Option<Id>,
    focus: Option<Id>,
    // Groups with an outstanding load request.
    loading: FxHashSet<Id>,
    pub(crate) session: DragSession<Id>,
    pub(crate) events: Vec<TreeEvent<Id, T>>,
    type_ahead: TypeAhead,
    // Scroll offset of the widget viewport, in visible rows.
    pub(crate) offset: usize,
    #[cfg(feature = "keymap")]
    keymap: TreeKeyBindings,
}

impl<Id: Clone + Eq + Hash, T> Default for SortableTreeState<Id, T> {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl<Id: Clone + Eq + Hash, T> SortableTreeState<Id, T> {
    /// Creates an empty state with the given configuration.
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            flat: Vec::new(),
            visible: Vec::new(),
            visible_index: FxHashMap::default(),
            expanded: StateCell::new(FxHashSet::default(), config.controlled_expansion),
            selected: StateCell::new(FxHashSet::default(), config.controlled_selection),
            anchor: None,
            focus: None,
            loading: FxHashSet::default(),
            session: DragSession::default(),
            events: Vec::new(),
            type_ahead: TypeAhead::new(),
            offset: 0,
            #[cfg(feature = "keymap")]
            keymap: TreeKeyBindings::new(),
        }
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Changes the selection mode, pruning the selection to fit.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.config.selection_mode = mode;
        let pruned: FxHashSet<Id> = match mode {
            SelectionMode::None => FxHashSet::default(),
            SelectionMode::Single => {
                let keep = self
                    .visible_nodes()
                    .find(|node| self.selected.get().contains(&node.id))
                    .map(|node| node.id.clone());
                keep.into_iter().collect()
            }
            SelectionMode::Multiple => return,
        };
        self.set_selection(pruned);
    }

    #[cfg(feature = "keymap")]
    /// Returns a mutable reference to the key binding set.
    pub const fn keymap_mut(&mut self) -> &mut TreeKeyBindings {
        &mut self.keymap
    }

    /// Rebuilds the cached flat and visible rows from the caller's tree.
    ///
    /// Interaction state referring to ids that no longer exist is pruned
    /// silently; the caller made that change itself.
    pub fn sync(&mut self, roots: &[TreeNode<Id, T>])
    where
        T: Clone,
    {
        // Ancestor chain of the focus, taken before the rebuild so a removed
        // focus can still fall back along it.
        let focus_chain: Vec<Id> = self
            .focus
            .as_ref()
            .map(|id| ops::ancestor_ids(&self.flat, id))
            .unwrap_or_default();
        self.flat = flatten(roots);
        let present: FxHashSet<Id> = self.flat.iter().map(|node| node.id.clone()).collect();
        self.expanded.get_mut().retain(|id| present.contains(id));
        self.selected.get_mut().retain(|id| present.contains(id));
        self.loading.retain(|id| present.contains(id));
        if self.anchor.as_ref().is_some_and(|id| !present.contains(id)) {
            self.anchor = None;
        }
        if self.focus.as_ref().is_some_and(|id| !present.contains(id)) {
            self.focus = focus_chain.into_iter().find(|id| present.contains(id));
        }
        // The drag session's active id may legitimately belong to another
        // tree; only the hover target has to exist here.
        if self
            .session
            .over
            .as_ref()
            .is_some_and(|id| !present.contains(id))
        {
            self.session.clear_target();
        }
        self.refresh_visible();
    }

    /// Overwrites the expansion set from caller-owned state (controlled
    /// mode); emits nothing.
    pub fn supply_expanded_ids<I: IntoIterator<Item = Id>>(&mut self, ids: I) {
        self.expanded.supply(ids.into_iter().collect());
        self.refresh_visible();
    }

    /// Overwrites the selection from caller-owned state (controlled mode);
    /// emits nothing.
    pub fn supply_selected_ids<I: IntoIterator<Item = Id>>(&mut self, ids: I) {
        self.selected.supply(ids.into_iter().collect());
    }

    /// Returns whether the expansion set is caller-owned.
    pub const fn expansion_is_controlled(&self) -> bool {
        self.expanded.is_controlled()
    }

    /// Returns whether the selection is caller-owned.
    pub const fn selection_is_controlled(&self) -> bool {
        self.selected.is_controlled()
    }

    /// Drains the pending output events.
    pub fn take_events(&mut self) -> Vec<TreeEvent<Id, T>> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Returns the cached flat rows (pre-order).
    pub fn flat_nodes(&self) -> &[FlatNode<Id, T>] {
        &self.flat
    }

    /// Returns the currently visible rows in order.
    pub fn visible_nodes(&self) -> impl Iterator<Item = &FlatNode<Id, T>> {
        self.visible.iter().map(|&i| &self.flat[i])
    }

    /// Returns the number of visible rows.
    pub const fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Returns the visible row at the given position.
    pub fn visible_node(&self, row: usize) -> Option<&FlatNode<Id, T>> {
        self.visible.get(row).map(|&i| &self.flat[i])
    }

    /// Returns `true` if a node with this id exists in the cached tree.
    pub fn contains(&self, id: &Id) -> bool {
        self.flat.iter().any(|node| node.id == *id)
    }

    /// Returns `true` if the node is expanded.
    pub fn is_expanded(&self, id: &Id) -> bool {
        self.expanded.get().contains(id)
    }

    /// Returns `true` if the node is selected.
    pub fn is_selected(&self, id: &Id) -> bool {
        self.selected.get().contains(id)
    }

    /// Returns `true` if the node has a load in flight.
    pub fn is_loading(&self, id: &Id) -> bool {
        self.loading.contains(id)
    }

    /// Returns the selected ids (order unspecified).
    pub fn selected_ids(&self) -> Vec<Id> {
        self.selected.get().iter().cloned().collect()
    }

    /// Returns the expanded ids (order unspecified).
    pub fn expanded_ids(&self) -> Vec<Id> {
        self.expanded.get().iter().cloned().collect()
    }

    /// Returns the focused node id.
    pub const fn focused_id(&self) -> Option<&Id> {
        self.focus.as_ref()
    }

    /// Returns the scroll offset of the widget viewport.
    pub const fn scroll_offset(&self) -> usize {
        self.offset
    }

    // ------------------------------------------------------------------
    // Expansion & lazy loading
    // ------------------------------------------------------------------

    /// Expands a group.
    ///
    /// On a group whose children are not loaded this emits
    /// `LoadRequested` (once per node while a load is in flight) instead of
    /// expanding; the node expands when the caller completes the load via
    /// [`resolve_load`](Self::resolve_load).
    pub fn expand(&mut self, id: &Id) {
        let Some(node) = self.flat.iter().find(|node| node.id == *id) else {
            return;
        };
        if !node.is_group {
            return;
        }
        if !node.children_loaded {
            if !self.loading.contains(id) {
                self.loading.insert(id.clone());
                self.events.push(TreeEvent::LoadRequested { id: id.clone() });
            }
            return;
        }
        if self.expanded.get().contains(id) {
            return;
        }
        self.expanded.get_mut().insert(id.clone());
        self.emit_expansion();
        self.refresh_visible();
    }

    /// Collapses a node, purging its descendants from the expansion set so a
    /// later re-expansion does not resurrect stale nested expansion.
    pub fn collapse(&mut self, id: &Id) {
        if !self.expanded.get().contains(id) {
            return;
        }
        self.expanded.get_mut().remove(id);
        for descendant in ops::descendant_ids(&self.flat, id) {
            self.expanded.get_mut().remove(&descendant);
        }
        self.emit_expansion();
        self.refresh_visible();
    }

    /// Toggles expansion of a node.
    pub fn toggle(&mut self, id: &Id) {
        if self.expanded.get().contains(id) {
            self.collapse(id);
        } else {
            self.expand(id);
        }
    }

    /// Expands every loaded group; unloaded groups are left alone.
    pub fn expand_all(&mut self) {
        let groups: FxHashSet<Id> = self
            .flat
            .iter()
            .filter(|node| node.is_group && node.children_loaded)
            .map(|node| node.id.clone())
            .collect();
        if groups == *self.expanded.get() {
            return;
        }
        self.expanded.supply(groups);
        self.emit_expansion();
        self.refresh_visible();
    }

    /// Collapses every node.
    pub fn collapse_all(&mut self) {
        if self.expanded.get().is_empty() {
            return;
        }
        self.expanded.get_mut().clear();
        self.emit_expansion();
        self.refresh_visible();
    }

    /// Completes a lazy load started by [`expand`](Self::expand).
    ///
    /// `Ok` splices the children under the node, marks it loaded, expands it,
    /// and emits a `Structure` replacement tree followed by the expansion
    /// change. `Err` emits `LoadFailed`; the node stays collapsed and
    /// unloaded, so the next expand attempt retries. Completions for nodes
    /// with no request in flight are ignored.
    pub fn resolve_load(&mut self, id: &Id, result: Result<Vec<TreeNode<Id, T>>, String>)
    where
        T: Clone,
    {
        if !self.loading.remove(id) {
            return;
        }
        let Some(pos) = ops::position_of(&self.flat, id) else {
            return;
        };
        let children = match result {
            Ok(children) => children,
            Err(error) => {
                self.events.push(TreeEvent::LoadFailed {
                    id: id.clone(),
                    error,
                });
                return;
            }
        };

        let child_depth = self.flat[pos].depth + 1;
        let mut rows = flatten(&children);
        for row in &mut rows {
            row.depth += child_depth;
            if row.parent.is_none() {
                row.parent = Some(id.clone());
            }
        }
        self.flat[pos].children_loaded = true;
        // The node had no flat descendants, so its subtree starts empty.
        self.flat.splice(pos + 1..pos + 1, rows);
        ops::reindex(&mut self.flat);

        self.events.push(TreeEvent::Structure {
            tree: build(self.flat.clone()),
        });
        self.expanded.get_mut().insert(id.clone());
        self.emit_expansion();
        self.refresh_visible();
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Replaces the selection with the given node and anchors ranges to it.
    pub fn select(&mut self, id: &Id) {
        if self.config.selection_mode == SelectionMode::None || !self.contains(id) {
            return;
        }
        self.anchor = Some(id.clone());
        let mut next = FxHashSet::default();
        next.insert(id.clone());
        self.set_selection(next);
    }

    /// Toggles a node's selection membership.
    ///
    /// In single mode, toggling the current selection clears it; toggling
    /// another node replaces it.
    pub fn toggle_select(&mut self, id: &Id) {
        if !self.contains(id) {
            return;
        }
        match self.config.selection_mode {
            SelectionMode::None => {}
            SelectionMode::Single => {
                if self.selected.get().contains(id) {
                    self.set_selection(FxHashSet::default());
                } else {
                    self.select(id);
                }
            }
            SelectionMode::Multiple => {
                let mut next = self.selected.get().clone();
                if !next.insert(id.clone()) {
                    next.remove(id);
                }
                self.set_selection(next);
            }
        }
    }

    /// Replaces the selection with the contiguous visible span between the
    /// anchor and `id`, inclusive, regardless of direction.
    ///
    /// Without a usable anchor this degrades to [`select`](Self::select);
    /// the anchor itself is left where the last plain select put it.
    pub fn select_range(&mut self, id: &Id) {
        match self.config.selection_mode {
            SelectionMode::None => return,
            SelectionMode::Single => {
                self.select(id);
                return;
            }
            SelectionMode::Multiple => {}
        }
        let anchor_pos = self
            .anchor
            .as_ref()
            .and_then(|anchor| self.visible_index.get(anchor))
            .copied();
        let target_pos = self.visible_index.get(id).copied();
        let (Some(a), Some(b)) = (anchor_pos, target_pos) else {
            self.select(id);
            return;
        };
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let span: FxHashSet<Id> = self.visible[lo..=hi]
            .iter()
            .map(|&i| self.flat[i].id.clone())
            .collect();
        self.set_selection(span);
    }

    /// Selects every visible node (multiple selection mode only).
    pub fn select_all_visible(&mut self) {
        if self.config.selection_mode != SelectionMode::Multiple {
            return;
        }
        let all: FxHashSet<Id> = self
            .visible
            .iter()
            .map(|&i| self.flat[i].id.clone())
            .collect();
        self.set_selection(all);
    }

    fn set_selection(&mut self, next: FxHashSet<Id>) {
        if next == *self.selected.get() {
            return;
        }
        self.events.push(TreeEvent::Selection {
            ids: next.iter().cloned().collect(),
        });
        self.selected.supply(next);
    }

    // ------------------------------------------------------------------
    // Focus & navigation
    // ------------------------------------------------------------------

    /// Moves focus to the given node if it is visible.
    pub fn set_focus(&mut self, id: &Id) {
        if self.visible_index.contains_key(id) {
            self.focus = Some(id.clone());
        }
    }

    fn focus_pos(&self) -> Option<usize> {
        self.focus
            .as_ref()
            .and_then(|id| self.visible_index.get(id))
            .copied()
    }

    fn focus_row(&mut self, row: usize) {
        if let Some(node) = self.visible_node(row) {
            self.focus = Some(node.id.clone());
        }
    }

    /// Moves focus to the next visible row.
    pub fn focus_next(&mut self) {
        if self.visible.is_empty() {
            self.focus = None;
            return;
        }
        let next = self
            .focus_pos()
            .map_or(0, |pos| (pos + 1).min(self.visible.len() - 1));
        self.focus_row(next);
    }

    /// Moves focus to the previous visible row.
    pub fn focus_prev(&mut self) {
        if self.visible.is_empty() {
            self.focus = None;
            return;
        }
        let prev = self.focus_pos().map_or(0, |pos| pos.saturating_sub(1));
        self.focus_row(prev);
    }

    /// Moves focus to the first visible row.
    pub fn focus_first(&mut self) {
        self.focus_row(0);
    }

    /// Moves focus to the last visible row.
    pub fn focus_last(&mut self) {
        if !self.visible.is_empty() {
            self.focus_row(self.visible.len() - 1);
        }
    }

    /// Expands a collapsed group; descends into an expanded one with a
    /// visible first child; climbs to the parent from a leaf.
    pub fn expand_or_descend(&mut self) {
        let Some(pos) = self.focus_pos() else {
            return;
        };
        let node = &self.flat[self.visible[pos]];
        let id = node.id.clone();
        let parent = node.parent.clone();
        if node.is_group && !self.expanded.get().contains(&id) {
            self.expand(&id);
            return;
        }
        if node.is_group {
            if let Some(child) = self
                .visible_node(pos + 1)
                .filter(|next| next.parent.as_ref() == Some(&id))
            {
                self.focus = Some(child.id.clone());
            }
            return;
        }
        if let Some(parent) = parent {
            self.set_focus(&parent);
        }
    }

    /// Collapses an expanded group; otherwise climbs to the parent.
    pub fn collapse_or_ascend(&mut self) {
        let Some(pos) = self.focus_pos() else {
            return;
        };
        let node = &self.flat[self.visible[pos]];
        let id = node.id.clone();
        let parent = node.parent.clone();
        if node.is_group && self.expanded.get().contains(&id) {
            self.collapse(&id);
            return;
        }
        if let Some(parent) = parent {
            self.set_focus(&parent);
        }
    }

    /// Feeds a typed character to the type-ahead buffer and moves focus to
    /// the first visible label matching it, scanning past the focus and
    /// wrapping around. Selection is not changed.
    pub fn type_ahead(&mut self, ch: char)
    where
        T: TreeLabel,
    {
        self.type_ahead_at(ch, Instant::now());
    }

    pub(crate) fn type_ahead_at(&mut self, ch: char, now: Instant)
    where
        T: TreeLabel,
    {
        if ch.is_control() || self.visible.is_empty() {
            return;
        }
        let needle = self.type_ahead.push(ch, now).to_owned();
        let start = self.focus_pos().map_or(0, |pos| pos + 1);
        let len = self.visible.len();
        for step in 0..len {
            let row = (start + step) % len;
            let node = &self.flat[self.visible[row]];
            let hit = node
                .data
                .tree_label()
                .is_some_and(|label| label.to_lowercase().starts_with(&needle));
            if hit {
                self.focus = Some(node.id.clone());
                return;
            }
        }
    }

    /// Handles a tree action and returns the outcome.
    pub fn handle_action<C>(&mut self, action: TreeAction<C>) -> ActionOutcome<C>
    where
        T: TreeLabel,
    {
        match action {
            TreeAction::Custom(custom) => return ActionOutcome::Custom(custom),
            _ if self.visible.is_empty() => return ActionOutcome::Ignored,
            TreeAction::FocusPrev => self.focus_prev(),
            TreeAction::FocusNext => self.focus_next(),
            TreeAction::FocusPrevExtend => {
                self.focus_prev();
                self.extend_to_focus();
            }
            TreeAction::FocusNextExtend => {
                self.focus_next();
                self.extend_to_focus();
            }
            TreeAction::FocusFirst => self.focus_first(),
            TreeAction::FocusLast => self.focus_last(),
            TreeAction::FocusFirstExtend => {
                self.focus_first();
                self.extend_to_focus();
            }
            TreeAction::FocusLastExtend => {
                self.focus_last();
                self.extend_to_focus();
            }
            TreeAction::ExpandOrDescend => self.expand_or_descend(),
            TreeAction::CollapseOrAscend => self.collapse_or_ascend(),
            TreeAction::Select => {
                let Some(id) = self.focus.clone() else {
                    return ActionOutcome::Ignored;
                };
                self.select(&id);
            }
            TreeAction::ToggleSelect => {
                let Some(id) = self.focus.clone() else {
                    return ActionOutcome::Ignored;
                };
                if self.config.selection_mode == SelectionMode::Multiple {
                    self.toggle_select(&id);
                } else {
                    self.select(&id);
                }
            }
            TreeAction::SelectAllVisible => {
                if self.config.selection_mode != SelectionMode::Multiple {
                    return ActionOutcome::Ignored;
                }
                self.select_all_visible();
            }
            TreeAction::ExpandAll => self.expand_all(),
            TreeAction::CollapseAll => self.collapse_all(),
            TreeAction::TypeAhead(ch) => self.type_ahead(ch),
        }
        ActionOutcome::Handled
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event into an action and handles it.
    pub fn handle_key(&mut self, key: KeyEvent) -> ActionOutcome
    where
        T: TreeLabel,
    {
        let Some(action) = self.keymap.resolve(key) else {
            return ActionOutcome::Ignored;
        };
        self.handle_action(action)
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event with a custom mapping and handles it.
    pub fn handle_key_with<C, F>(&mut self, key: KeyEvent, custom: F) -> ActionOutcome<C>
    where
        T: TreeLabel,
        F: Fn(KeyEvent) -> Option<C>,
    {
        let Some(action) = self.keymap.resolve_with(key, custom) else {
            return ActionOutcome::Ignored;
        };
        self.handle_action(action)
    }

    fn extend_to_focus(&mut self) {
        if let Some(id) = self.focus.clone() {
            self.select_range(&id);
        }
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Captures the persistent interaction state.
    pub fn snapshot(&self) -> TreeSnapshot<Id> {
        TreeSnapshot {
            expanded: self.expanded_ids(),
            selected: self.selected_ids(),
            focus: self.focus.clone(),
        }
    }

    /// Restores a previously captured snapshot; unknown ids are pruned on
    /// the next [`sync`](Self::sync).
    pub fn restore(&mut self, snapshot: TreeSnapshot<Id>) {
        self.expanded.supply(snapshot.expanded.into_iter().collect());
        self.selected.supply(snapshot.selected.into_iter().collect());
        self.focus = snapshot.focus;
        self.refresh_visible();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn emit_expansion(&mut self) {
        self.events.push(TreeEvent::Expansion {
            ids: self.expanded_ids(),
        });
    }

    pub(crate) fn refresh_visible(&mut self) {
        self.visible = visible_indices(&self.flat, self.expanded.get());
        self.visible_index.clear();
        for (row, &i) in self.visible.iter().enumerate() {
            self.visible_index.insert(self.flat[i].id.clone(), row);
        }
        self.repair_focus();
        if self.offset >= self.visible.len() {
            self.offset = self.visible.len().saturating_sub(1);
        }
    }

    // Focus must always name a visible node: when the focused row disappears
    // (collapse, removal, filter by a caller sync), fall back to the nearest
    // visible ancestor.
    fn repair_focus(&mut self) {
        let Some(focus) = self.focus.clone() else {
            return;
        };
        if self.visible_index.contains_key(&focus) {
            return;
        }
        self.focus = ops::ancestor_ids(&self.flat, &focus)
            .into_iter()
            .find(|ancestor| self.visible_index.contains_key(ancestor));
    }

    /// Adjusts the scroll offset so the focused row is within the viewport.
    pub fn ensure_focus_visible(&mut self, viewport_height: usize) {
        let Some(row) = self.focus_pos() else {
            return;
        };
        let viewport_height = viewport_height.max(1);
        if row < self.offset {
            self.offset = row;
        } else if row >= self.offset + viewport_height {
            self.offset = row + 1 - viewport_height;
        }
    }

    pub(crate) fn selected_set(&self) -> &FxHashSet<Id> {
        self.selected.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TreeNode;

    fn tree() -> Vec<TreeNode<&'static str, &'static str>> {
        vec![
            TreeNode::group(
                "a",
                "alpha",
                vec![
                    TreeNode::leaf("a1", "ant"),
                    TreeNode::group("a2", "anchor", vec![TreeNode::leaf("a2x", "axe")]),
                ],
            ),
            TreeNode::leaf("b", "bee"),
        ]
    }

    fn state_with(
        mode: SelectionMode,
    ) -> SortableTreeState<&'static str, &'static str> {
        let mut state = SortableTreeState::new(TreeConfig {
            selection_mode: mode,
            ..TreeConfig::default()
        });
        state.sync(&tree());
        state
    }

    fn visible_ids(state: &SortableTreeState<&'static str, &'static str>) -> Vec<&'static str> {
        state.visible_nodes().map(|node| node.id).collect()
    }

    fn selection_events(events: &[TreeEvent<&'static str, &'static str>]) -> Vec<Vec<&'static str>> {
        events
            .iter()
            .filter_map(|event| match event {
                TreeEvent::Selection { ids } => {
                    let mut ids = ids.clone();
                    ids.sort_unstable();
                    Some(ids)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn expansion_toggles_visibility() {
        let mut state = state_with(SelectionMode::Single);
        assert_eq!(visible_ids(&state), vec!["a", "b"]);

        state.expand(&"a");
        assert_eq!(visible_ids(&state), vec!["a", "a1", "a2", "b"]);

        state.collapse(&"a");
        assert_eq!(visible_ids(&state), vec!["a", "b"]);
    }

    #[test]
    fn collapse_purges_descendant_expansion() {
        let mut state = state_with(SelectionMode::Single);
        state.expand(&"a");
        state.expand(&"a2");
        assert_eq!(visible_ids(&state), vec!["a", "a1", "a2", "a2x", "b"]);

        state.collapse(&"a");
        state.expand(&"a");
        // "a2" must come back collapsed.
        assert_eq!(visible_ids(&state), vec!["a", "a1", "a2", "b"]);
        assert!(!state.is_expanded(&"a2"));
    }

    #[test]
    fn expanding_a_leaf_is_a_no_op() {
        let mut state = state_with(SelectionMode::Single);
        state.expand(&"b");
        assert!(!state.is_expanded(&"b"));
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn lazy_expand_requests_load_once() {
        let mut state: SortableTreeState<&str, &str> =
            SortableTreeState::new(TreeConfig::default());
        state.sync(&[TreeNode::lazy_group("g", "group")]);

        state.expand(&"g");
        assert!(state.is_loading(&"g"));
        assert!(!state.is_expanded(&"g"));
        let events = state.take_events();
        assert_eq!(events, vec![TreeEvent::LoadRequested { id: "g" }]);

        // A second rapid expand while in flight is a no-op.
        state.expand(&"g");
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn resolve_load_splices_children_and_expands() {
        let mut state: SortableTreeState<&str, &str> =
            SortableTreeState::new(TreeConfig::default());
        state.sync(&[TreeNode::lazy_group("g", "group"), TreeNode::leaf("z", "z")]);
        state.expand(&"g");
        state.take_events();

        state.resolve_load(&"g", Ok(vec![TreeNode::leaf("g1", "gone")]));
        assert!(!state.is_loading(&"g"));
        assert!(state.is_expanded(&"g"));
        assert_eq!(visible_ids(&state), vec!["g", "g1", "z"]);

        let events = state.take_events();
        let Some(TreeEvent::Structure { tree }) = events.first() else {
            panic!("expected a structure event, got {events:?}");
        };
        assert_eq!(tree[0].id, "g");
        assert!(tree[0].children_loaded());
        assert_eq!(tree[0].children.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn failed_load_is_reported_and_retriable() {
        let mut state: SortableTreeState<&str, &str> =
            SortableTreeState::new(TreeConfig::default());
        state.sync(&[TreeNode::lazy_group("g", "group")]);
        state.expand(&"g");
        state.take_events();

        state.resolve_load(&"g", Err("boom".to_owned()));
        assert!(!state.is_expanded(&"g"));
        assert_eq!(
            state.take_events(),
            vec![TreeEvent::LoadFailed {
                id: "g",
                error: "boom".to_owned()
            }]
        );

        // The next expand attempt retries.
        state.expand(&"g");
        assert_eq!(
            state.take_events(),
            vec![TreeEvent::LoadRequested { id: "g" }]
        );
    }

    #[test]
    fn unsolicited_load_completion_is_ignored() {
        let mut state = state_with(SelectionMode::Single);
        state.resolve_load(&"a", Ok(vec![TreeNode::leaf("x", "x")]));
        assert!(state.take_events().is_empty());
        assert_eq!(visible_ids(&state), vec!["a", "b"]);
    }

    #[test]
    fn none_mode_ignores_selection_calls() {
        let mut state = state_with(SelectionMode::None);
        state.select(&"a");
        state.toggle_select(&"a");
        state.select_range(&"b");
        assert!(state.selected_ids().is_empty());
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn single_mode_keeps_at_most_one() {
        let mut state = state_with(SelectionMode::Single);
        state.select(&"a");
        state.select(&"b");
        assert_eq!(state.selected_ids(), vec!["b"]);

        // Toggling the current selection clears it.
        state.toggle_select(&"b");
        assert!(state.selected_ids().is_empty());

        // Toggling another replaces.
        state.select(&"a");
        state.toggle_select(&"b");
        assert_eq!(state.selected_ids(), vec!["b"]);
    }

    #[test]
    fn multiple_mode_toggles_membership() {
        let mut state = state_with(SelectionMode::Multiple);
        state.toggle_select(&"a");
        state.toggle_select(&"b");
        let mut ids = state.selected_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b"]);

        state.toggle_select(&"a");
        assert_eq!(state.selected_ids(), vec!["b"]);
    }

    #[test]
    fn range_selects_visible_span_in_both_directions() {
        let mut state = state_with(SelectionMode::Multiple);
        state.expand(&"a");
        state.expand(&"a2");
        state.take_events();

        state.select(&"a1");
        state.select_range(&"b");
        let mut ids = state.selected_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a1", "a2", "a2x", "b"]);

        // Backwards from the same anchor.
        state.select_range(&"a");
        let mut ids = state.selected_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "a1"]);
    }

    #[test]
    fn range_spans_only_visible_rows() {
        let mut state = state_with(SelectionMode::Multiple);
        state.expand(&"a");
        state.select(&"a");
        state.select_range(&"b");
        let mut ids = state.selected_ids();
        ids.sort_unstable();
        // "a2x" is hidden ("a2" collapsed) and must not be selected.
        assert_eq!(ids, vec!["a", "a1", "a2", "b"]);
    }

    #[test]
    fn range_without_anchor_degrades_to_select() {
        let mut state = state_with(SelectionMode::Multiple);
        state.select_range(&"b");
        assert_eq!(state.selected_ids(), vec!["b"]);
    }

    #[test]
    fn select_all_only_in_multiple_mode() {
        let mut state = state_with(SelectionMode::Single);
        state.select_all_visible();
        assert!(state.selected_ids().is_empty());

        let mut state = state_with(SelectionMode::Multiple);
        state.select_all_visible();
        let mut ids = state.selected_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn selection_changes_emit_full_id_list() {
        let mut state = state_with(SelectionMode::Multiple);
        state.select(&"a");
        state.toggle_select(&"b");
        let events = state.take_events();
        assert_eq!(selection_events(&events), vec![vec!["a"], vec!["a", "b"]]);
    }

    #[test]
    fn focus_moves_over_visible_rows() {
        let mut state = state_with(SelectionMode::Single);
        state.expand(&"a");
        state.focus_first();
        assert_eq!(state.focused_id(), Some(&"a"));
        state.focus_next();
        assert_eq!(state.focused_id(), Some(&"a1"));
        state.focus_last();
        assert_eq!(state.focused_id(), Some(&"b"));
        state.focus_next();
        assert_eq!(state.focused_id(), Some(&"b"));
        state.focus_prev();
        assert_eq!(state.focused_id(), Some(&"a2"));
    }

    #[test]
    fn collapse_moves_focus_to_visible_ancestor() {
        let mut state = state_with(SelectionMode::Single);
        state.expand(&"a");
        state.expand(&"a2");
        state.set_focus(&"a2x");

        state.collapse(&"a");
        assert_eq!(state.focused_id(), Some(&"a"));
    }

    #[test]
    fn expand_or_descend_walks_into_groups() {
        let mut state = state_with(SelectionMode::Single);
        state.focus_first();

        state.expand_or_descend();
        assert!(state.is_expanded(&"a"));
        assert_eq!(state.focused_id(), Some(&"a"));

        state.expand_or_descend();
        assert_eq!(state.focused_id(), Some(&"a1"));

        // Leaf: climbs back to the parent.
        state.expand_or_descend();
        assert_eq!(state.focused_id(), Some(&"a"));
    }

    #[test]
    fn collapse_or_ascend_collapses_then_climbs() {
        let mut state = state_with(SelectionMode::Single);
        state.expand(&"a");
        state.set_focus(&"a1");

        state.collapse_or_ascend();
        assert_eq!(state.focused_id(), Some(&"a"));

        state.collapse_or_ascend();
        assert!(!state.is_expanded(&"a"));
    }

    #[test]
    fn type_ahead_matches_prefix_after_focus_and_wraps() {
        let mut state = state_with(SelectionMode::Single);
        state.expand(&"a");
        state.expand(&"a2");
        // Visible: alpha, ant, anchor, axe, bee.
        let t0 = Instant::now();
        state.set_focus(&"a1");

        state.type_ahead_at('a', t0);
        assert_eq!(state.focused_id(), Some(&"a2"));

        state.type_ahead_at('x', t0 + Duration::from_millis(100));
        // Buffer "ax" matches "axe".
        assert_eq!(state.focused_id(), Some(&"a2x"));

        // After the idle window the buffer resets and search wraps around.
        state.type_ahead_at('b', t0 + Duration::from_secs(5));
        assert_eq!(state.focused_id(), Some(&"b"));

        // Selection untouched throughout.
        assert!(state.selected_ids().is_empty());
    }

    #[test]
    fn handle_action_extends_range_with_focus() {
        let mut state = state_with(SelectionMode::Multiple);
        state.expand(&"a");
        state.focus_first();
        let _ = state.handle_action::<()>(TreeAction::Select);
        let _ = state.handle_action::<()>(TreeAction::FocusNextExtend);
        let _ = state.handle_action::<()>(TreeAction::FocusNextExtend);
        let mut ids = state.selected_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "a1", "a2"]);
    }

    #[test]
    fn sync_prunes_stale_interaction_state() {
        let mut state = state_with(SelectionMode::Multiple);
        state.expand(&"a");
        state.select(&"a1");
        state.set_focus(&"a1");
        state.take_events();

        // "a1" disappears from the caller's tree.
        state.sync(&[
            TreeNode::group("a", "alpha", vec![TreeNode::leaf("a2", "anchor")]),
            TreeNode::leaf("b", "bee"),
        ]);
        assert!(state.selected_ids().is_empty());
        assert_eq!(state.focused_id(), Some(&"a"));
        assert!(state.is_expanded(&"a"));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut state = state_with(SelectionMode::Multiple);
        state.expand(&"a");
        state.select(&"a1");
        state.set_focus(&"a1");
        let snapshot = state.snapshot();

        let mut restored = state_with(SelectionMode::Multiple);
        restored.restore(snapshot);
        assert!(restored.is_expanded(&"a"));
        assert_eq!(restored.selected_ids(), vec!["a1"]);
        assert_eq!(restored.focused_id(), Some(&"a1"));
    }
}
