//! Two trees sharing one drag session.
//!
//! Drag rows with the left mouse button, also across the panes; drag
//! horizontally to change nesting. Tab switches the focused pane, `q` quits.
//! The "assets" group on the left loads its children lazily.

use std::io::stdout;
use std::time::Duration;

use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyCode, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use tui_sortabletree::prelude::*;
use tui_sortabletree::{build, descendant_ids, flatten, position_of};

type Id = &'static str;
type Tree = Vec<TreeNode<Id, String>>;
type State = SortableTreeState<Id, String>;

fn leaf(id: Id) -> TreeNode<Id, String> {
    TreeNode::leaf(id, id.to_owned())
}

fn left_tree() -> Tree {
    vec![
        TreeNode::group(
            "src",
            "src".to_owned(),
            vec![leaf("main.rs"), leaf("lib.rs"), leaf("state.rs")],
        ),
        TreeNode::lazy_group("assets", "assets".to_owned()),
        leaf("Cargo.toml"),
        leaf("Readme.md"),
    ]
}

fn right_tree() -> Tree {
    vec![
        TreeNode::group("archive", "archive".to_owned(), vec![leaf("old-notes.txt")]),
        TreeNode::group("scratch", "scratch".to_owned(), Vec::new()),
    ]
}

struct Pane {
    key: Id,
    tree: Tree,
    area: Rect,
}

struct App {
    panes: [Pane; 2],
    coordinator: DragCoordinator<Id, State>,
    focused: usize,
    // Column where the current mouse drag started.
    press_x: Option<u16>,
}

impl App {
    fn new() -> Self {
        let mut coordinator = DragCoordinator::new();
        let panes = [
            Pane {
                key: "left",
                tree: left_tree(),
                area: Rect::ZERO,
            },
            Pane {
                key: "right",
                tree: right_tree(),
                area: Rect::ZERO,
            },
        ];
        for pane in &panes {
            let mut state = State::new(TreeConfig {
                selection_mode: SelectionMode::Multiple,
                ..TreeConfig::default()
            });
            state.sync(&pane.tree);
            coordinator.register(pane.key, state);
        }
        Self {
            panes,
            coordinator,
            focused: 0,
            press_x: None,
        }
    }

    fn state_mut(&mut self, key: Id) -> &mut State {
        self.coordinator
            .get_mut(&key)
            .unwrap_or_else(|| unreachable!("pane {key} is registered"))
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(frame.area());
        self.panes[0].area = left;
        self.panes[1].area = right;

        for (idx, area) in [left, right].into_iter().enumerate() {
            let key = self.panes[idx].key;
            let focused = idx == self.focused;
            let style = SortableTreeStyle {
                title: Some(Line::raw(if focused {
                    format!("[{key}]")
                } else {
                    key.to_owned()
                })),
                border_style: if focused {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default()
                },
                ..SortableTreeStyle::default()
            };
            let widget = SortableTree::new(&LabelRenderer, style);
            let state = self.state_mut(key);
            frame.render_stateful_widget(widget, area, state);
        }
    }

    /// Maps screen coordinates to a pane and the node row under them.
    fn hit(&self, x: u16, y: u16) -> Option<(Id, Option<Id>)> {
        let pane = self
            .panes
            .iter()
            .find(|pane| pane.area.contains((x, y).into()))?;
        let key = pane.key;
        // One cell of border on each side.
        let inner = pane.area.inner(ratatui::layout::Margin::new(1, 1));
        if !inner.contains((x, y).into()) {
            return Some((key, None));
        }
        let row = (y - inner.y) as usize + self.coordinator.get(&key)?.scroll_offset();
        let id = self
            .coordinator
            .get(&key)?
            .visible_node(row)
            .map(|node| node.id);
        Some((key, id))
    }

    fn on_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some((key, Some(id))) = self.hit(mouse.column, mouse.row) else {
                    return;
                };
                self.press_x = Some(mouse.column);
                if let Some(idx) = self.panes.iter().position(|pane| pane.key == key) {
                    self.focused = idx;
                }
                let state = self.state_mut(key);
                state.set_focus(&id);
                state.toggle(&id);
                state.select(&id);
                self.coordinator.drag_start(&id);
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let offset_x = self
                    .press_x
                    .map_or(0, |x| i32::from(mouse.column) - i32::from(x));
                match self.hit(mouse.column, mouse.row) {
                    Some((key, over)) => self.coordinator.drag_over(Some(&key), over, offset_x),
                    None => self.coordinator.drag_over(None, None, offset_x),
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let offset_x = self
                    .press_x
                    .take()
                    .map_or(0, |x| i32::from(mouse.column) - i32::from(x));
                let target = self.hit(mouse.column, mouse.row);
                let descriptor = match target {
                    Some((key, over)) => {
                        self.coordinator.drag_end(Some(&key), over, offset_x, false)
                    }
                    None => self.coordinator.drag_end(None, None, offset_x, false),
                };
                if let Some(descriptor) = descriptor {
                    self.apply_cross_move(&descriptor);
                }
            }
            _ => {}
        }
    }

    /// Detaches the dragged subtree from the source pane and splices it into
    /// the target pane at the described placement.
    fn apply_cross_move(&mut self, descriptor: &CrossTreeMove<Id, Id>) {
        let Some(source) = self
            .panes
            .iter_mut()
            .find(|pane| pane.key == descriptor.source_tree)
        else {
            return;
        };
        let mut source_flat = flatten(&source.tree);
        let Some(active_pos) = position_of(&source_flat, &descriptor.active) else {
            return;
        };
        let subtree_ids: Vec<Id> = std::iter::once(descriptor.active)
            .chain(descendant_ids(&source_flat, &descriptor.active))
            .collect();
        let base_depth = source_flat[active_pos].depth;
        let mut moved: Vec<_> = Vec::with_capacity(subtree_ids.len());
        source_flat.retain_mut(|node| {
            if subtree_ids.contains(&node.id) {
                moved.push(node.clone());
                false
            } else {
                true
            }
        });
        source.tree = build(source_flat);

        for node in &mut moved {
            if node.id == descriptor.active {
                node.depth = descriptor.depth;
                node.parent = descriptor.parent;
            } else {
                node.depth = node.depth - base_depth + descriptor.depth;
            }
        }

        let Some(target) = self
            .panes
            .iter_mut()
            .find(|pane| pane.key == descriptor.target_tree)
        else {
            return;
        };
        let mut target_flat = flatten(&target.tree);
        let Some(over_pos) = position_of(&target_flat, &descriptor.over) else {
            return;
        };
        let at = match descriptor.position {
            DropPosition::Inside => over_pos + 1,
            DropPosition::After => {
                let over_depth = target_flat[over_pos].depth;
                let mut end = over_pos + 1;
                while end < target_flat.len() && target_flat[end].depth > over_depth {
                    end += 1;
                }
                end
            }
        };
        target_flat.splice(at..at, moved);
        target.tree = build(target_flat);

        self.resync();
    }

    fn resync(&mut self) {
        for pane in &self.panes {
            if let Some(state) = self.coordinator.get_mut(&pane.key) {
                state.sync(&pane.tree);
            }
        }
    }

    /// Drains the engine outputs of both panes and applies them to the
    /// caller-owned trees.
    fn pump_events(&mut self) {
        for idx in 0..self.panes.len() {
            let key = self.panes[idx].key;
            let events = self.state_mut(key).take_events();
            for event in events {
                match event {
                    TreeEvent::Structure { tree } => {
                        self.panes[idx].tree = tree;
                        self.resync();
                    }
                    TreeEvent::LoadRequested { id } => {
                        // Simulated backend: the only lazy group is "assets".
                        let children = if id == "assets" {
                            Ok(vec![leaf("logo.svg"), leaf("icon.png"), leaf("theme.css")])
                        } else {
                            Err(format!("no loader for {id}"))
                        };
                        let state = self.state_mut(key);
                        state.resolve_load(&id, children);
                    }
                    _ => {}
                }
            }
        }
    }
}

fn main() -> std::io::Result<()> {
    let mut terminal = ratatui::init();
    execute!(stdout(), EnableMouseCapture)?;
    let mut app = App::new();

    let result = loop {
        if let Err(err) = terminal.draw(|frame| app.draw(frame)) {
            break Err(err);
        }
        if !crossterm::event::poll(Duration::from_millis(100))? {
            app.pump_events();
            continue;
        }
        match crossterm::event::read()? {
            Event::Key(key) if key.code == KeyCode::Char('q') => break Ok(()),
            Event::Key(key) if key.code == KeyCode::Tab => {
                app.focused = (app.focused + 1) % app.panes.len();
            }
            Event::Key(key) => {
                let pane_key = app.panes[app.focused].key;
                let _ = app.state_mut(pane_key).handle_key(key);
            }
            Event::Mouse(mouse) => app.on_mouse(mouse),
            _ => {}
        }
        app.pump_events();
    };

    execute!(stdout(), DisableMouseCapture)?;
    ratatui::restore();
    result
}
