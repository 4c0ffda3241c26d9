//! Terminal-independent key values decoded from crossterm key events.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::fmt;

/// A decoded key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    CtrlC,
    /// Escape on its own; escape-prefixed sequences arrive as their own keys.
    Escape,
    Enter,
    Space,
    Backspace,
    Tab,
    Up,
    Down,
    /// A printable character, case-folded to lowercase.
    Char(char),
    /// Anything else, described for logging.
    Unrecognized(String),
}

impl Key {
    /// Decodes a crossterm event, ignoring key releases and repeats.
    pub fn from_event(event: KeyEvent) -> Option<Self> {
        if event.kind != KeyEventKind::Press {
            return None;
        }
        let key = match event.code {
            KeyCode::Char('c') | KeyCode::Char('C')
                if event.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Key::CtrlC
            },
            KeyCode::Char(c) if event.modifiers.contains(KeyModifiers::CONTROL) => {
                Key::Unrecognized(format!("ctrl+{}", c.to_ascii_lowercase()))
            },
            KeyCode::Char(' ') => Key::Space,
            KeyCode::Char(c) => Key::Char(c.to_lowercase().next().unwrap_or(c)),
            KeyCode::Esc => Key::Escape,
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Tab => Key::Tab,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            other => Key::Unrecognized(format!("{:?}", other)),
        };
        Some(key)
    }

    /// The name used in key bindings, e.g. `enter`, `escape`, `q`.
    pub fn name(&self) -> String {
        match self {
            Key::CtrlC => "ctrl+c".to_string(),
            Key::Escape => "escape".to_string(),
            Key::Enter => "enter".to_string(),
            Key::Space => "space".to_string(),
            Key::Backspace => "backspace".to_string(),
            Key::Tab => "tab".to_string(),
            Key::Up => "up".to_string(),
            Key::Down => "down".to_string(),
            Key::Char(c) => c.to_string(),
            Key::Unrecognized(desc) => desc.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use rstest::rstest;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[rstest]
    #[case(KeyCode::Char('c'), KeyModifiers::CONTROL, Key::CtrlC)]
    #[case(KeyCode::Esc, KeyModifiers::NONE, Key::Escape)]
    #[case(KeyCode::Enter, KeyModifiers::NONE, Key::Enter)]
    #[case(KeyCode::Char(' '), KeyModifiers::NONE, Key::Space)]
    #[case(KeyCode::Backspace, KeyModifiers::NONE, Key::Backspace)]
    #[case(KeyCode::Tab, KeyModifiers::NONE, Key::Tab)]
    #[case(KeyCode::Up, KeyModifiers::NONE, Key::Up)]
    #[case(KeyCode::Down, KeyModifiers::NONE, Key::Down)]
    #[case(KeyCode::Char('Q'), KeyModifiers::SHIFT, Key::Char('q'))]
    #[case(KeyCode::Char('7'), KeyModifiers::NONE, Key::Char('7'))]
    fn test_decode(#[case] code: KeyCode, #[case] modifiers: KeyModifiers, #[case] expected: Key) {
        assert_eq!(Key::from_event(press(code, modifiers)), Some(expected));
    }

    #[test]
    fn test_unrecognized_keys_are_described() {
        let key = Key::from_event(press(KeyCode::F(5), KeyModifiers::NONE)).unwrap();
        assert!(matches!(key, Key::Unrecognized(_)));
        let key = Key::from_event(press(KeyCode::Char('x'), KeyModifiers::CONTROL)).unwrap();
        assert_eq!(key, Key::Unrecognized("ctrl+x".into()));
    }

    #[test]
    fn test_release_events_are_ignored() {
        let mut event = press(KeyCode::Enter, KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(Key::from_event(event), None);
    }
}
