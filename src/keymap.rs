use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::TreeAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeymapProfile {
    #[default]
    Default,
    Vim,
    Arrows,
}

#[derive(Clone, Copy, Debug)]
pub struct TreeKeyBindings {
    profile: KeymapProfile,
}

impl Default for TreeKeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeKeyBindings {
    pub const fn new() -> Self {
        Self {
            profile: KeymapProfile::Default,
        }
    }

    pub const fn with_profile(profile: KeymapProfile) -> Self {
        Self { profile }
    }

    pub const fn profile(&self) -> KeymapProfile {
        self.profile
    }

    pub const fn set_profile(&mut self, profile: KeymapProfile) {
        self.profile = profile;
    }

    pub fn resolve<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        if key.modifiers.contains(KeyModifiers::SHIFT) {
            match key.code {
                KeyCode::Up => return Some(TreeAction::FocusPrevExtend),
                KeyCode::Down => return Some(TreeAction::FocusNextExtend),
                KeyCode::Home => return Some(TreeAction::FocusFirstExtend),
                KeyCode::End => return Some(TreeAction::FocusLastExtend),
                _ => {}
            }
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('a') => Some(TreeAction::SelectAllVisible),
                _ => None,
            };
        }

        let nav_action = match self.profile {
            KeymapProfile::Default => self.resolve_default_nav(key),
            KeymapProfile::Vim => self.resolve_vim_nav(key),
            KeymapProfile::Arrows => self.resolve_arrow_nav(key),
        };
        if nav_action.is_some() {
            return nav_action;
        }
        if let Some(action) = self.resolve_common(key) {
            return Some(action);
        }

        // Anything still unclaimed feeds the type-ahead search.
        match key.code {
            KeyCode::Char(c) => Some(TreeAction::TypeAhead(c)),
            _ => None,
        }
    }

    pub fn resolve_with<C, F>(&self, key: KeyEvent, custom: F) -> Option<TreeAction<C>>
    where
        F: Fn(KeyEvent) -> Option<C>,
    {
        if let Some(action) = custom(key) {
            return Some(TreeAction::Custom(action));
        }

        self.resolve(key)
    }

    const fn resolve_default_nav<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(TreeAction::FocusPrev),
            KeyCode::Down | KeyCode::Char('j') => Some(TreeAction::FocusNext),
            KeyCode::Left | KeyCode::Char('h') => Some(TreeAction::CollapseOrAscend),
            KeyCode::Right | KeyCode::Char('l') => Some(TreeAction::ExpandOrDescend),
            _ => None,
        }
    }

    const fn resolve_vim_nav<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Char('k') => Some(TreeAction::FocusPrev),
            KeyCode::Char('j') => Some(TreeAction::FocusNext),
            KeyCode::Char('h') => Some(TreeAction::CollapseOrAscend),
            KeyCode::Char('l') => Some(TreeAction::ExpandOrDescend),
            _ => None,
        }
    }

    const fn resolve_arrow_nav<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Up => Some(TreeAction::FocusPrev),
            KeyCode::Down => Some(TreeAction::FocusNext),
            KeyCode::Left => Some(TreeAction::CollapseOrAscend),
            KeyCode::Right => Some(TreeAction::ExpandOrDescend),
            _ => None,
        }
    }

    const fn resolve_common<C>(&self, key: KeyEvent) -> Option<TreeAction<C>> {
        match key.code {
            KeyCode::Enter => Some(TreeAction::Select),
            KeyCode::Char(' ') => Some(TreeAction::ToggleSelect),
            KeyCode::Char('*') => Some(TreeAction::ExpandAll),
            KeyCode::Char('-') => Some(TreeAction::CollapseAll),
            KeyCode::Home => Some(TreeAction::FocusFirst),
            KeyCode::End => Some(TreeAction::FocusLast),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn shift_and_ctrl_bindings_come_first() {
        let bindings = TreeKeyBindings::new();
        assert_eq!(
            bindings.resolve::<()>(KeyEvent::new(KeyCode::Down, KeyModifiers::SHIFT)),
            Some(TreeAction::FocusNextExtend)
        );
        assert_eq!(
            bindings.resolve::<()>(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL)),
            Some(TreeAction::SelectAllVisible)
        );
    }

    #[test]
    fn unclaimed_characters_feed_type_ahead() {
        let bindings = TreeKeyBindings::new();
        // "k" is claimed by the default profile's navigation.
        assert_eq!(
            bindings.resolve::<()>(key(KeyCode::Char('k'))),
            Some(TreeAction::FocusPrev)
        );
        assert_eq!(
            bindings.resolve::<()>(key(KeyCode::Char('x'))),
            Some(TreeAction::TypeAhead('x'))
        );

        // The arrows profile leaves every letter to the search.
        let bindings = TreeKeyBindings::with_profile(KeymapProfile::Arrows);
        assert_eq!(
            bindings.resolve::<()>(key(KeyCode::Char('k'))),
            Some(TreeAction::TypeAhead('k'))
        );
    }

    #[test]
    fn custom_resolver_takes_precedence() {
        let bindings = TreeKeyBindings::new();
        let resolved = bindings.resolve_with(key(KeyCode::Enter), |key| {
            (key.code == KeyCode::Enter).then_some("submit")
        });
        assert_eq!(resolved, Some(TreeAction::Custom("submit")));
    }
}
