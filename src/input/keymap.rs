//! Key name to logical action lookup.

use crate::error::{MenuError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

const RUN_PREFIX: &str = "run:";

/// A terminal-independent action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    NavigateUp,
    NavigateDown,
    Select,
    Back,
    Quit,
    Help,
    History,
    Config,
    Preview,
    Refresh,
    /// Direct selection by number; the digit travels with the input event.
    SelectIndex,
    ClearHistory,
    /// Run the option with this command, bound from an option's own shortcut.
    Run(String),
}

impl Action {
    const NAMED: [Action; 12] = [
        Action::NavigateUp,
        Action::NavigateDown,
        Action::Select,
        Action::Back,
        Action::Quit,
        Action::Help,
        Action::History,
        Action::Config,
        Action::Preview,
        Action::Refresh,
        Action::SelectIndex,
        Action::ClearHistory,
    ];

    pub fn name(&self) -> String {
        let name = match self {
            Action::NavigateUp => "navigate-up",
            Action::NavigateDown => "navigate-down",
            Action::Select => "select",
            Action::Back => "back",
            Action::Quit => "quit",
            Action::Help => "help",
            Action::History => "history",
            Action::Config => "config",
            Action::Preview => "preview",
            Action::Refresh => "refresh",
            Action::SelectIndex => "select-index",
            Action::ClearHistory => "clear-history",
            Action::Run(command) => return format!("{}{}", RUN_PREFIX, command),
        };
        name.to_string()
    }

    pub fn description(&self) -> String {
        match self {
            Action::NavigateUp => "Move selection up".to_string(),
            Action::NavigateDown => "Move selection down".to_string(),
            Action::Select => "Run or preview the selected option".to_string(),
            Action::Back => "Go back / quit from the main list".to_string(),
            Action::Quit => "Quit".to_string(),
            Action::Help => "Show this help".to_string(),
            Action::History => "Show execution history".to_string(),
            Action::Config => "Edit preferences".to_string(),
            Action::Preview => "Preview the selected option".to_string(),
            Action::Refresh => "Refresh last-run status".to_string(),
            Action::SelectIndex => "Jump to option N".to_string(),
            Action::ClearHistory => "Clear history (history screen)".to_string(),
            Action::Run(command) => format!("Run '{}'", command),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Action {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(command) = s.strip_prefix(RUN_PREFIX) {
            if command.is_empty() {
                return Err(MenuError::UnknownAction(s.to_string()));
            }
            return Ok(Action::Run(command.to_string()));
        }
        Self::NAMED
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| MenuError::UnknownAction(s.to_string()))
    }
}

/// Maps key names (`enter`, `escape`, `q`, `1`) to actions.
#[derive(Debug, Clone, Default)]
pub struct KeyboardMapper {
    bindings: BTreeMap<String, Action>,
}

impl KeyboardMapper {
    /// A mapper with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock bindings.
    pub fn with_defaults() -> Self {
        let mut bindings = BTreeMap::new();
        let defaults = [
            ("enter", Action::Select),
            ("space", Action::Select),
            ("escape", Action::Back),
            ("q", Action::Quit),
            ("?", Action::Help),
            ("h", Action::History),
            ("c", Action::Config),
            ("p", Action::Preview),
            ("r", Action::Refresh),
            ("x", Action::ClearHistory),
            ("k", Action::NavigateUp),
            ("j", Action::NavigateDown),
            ("tab", Action::NavigateDown),
        ];
        for (key, action) in defaults {
            bindings.insert(key.to_string(), action);
        }
        for digit in '1'..='9' {
            bindings.insert(digit.to_string(), Action::SelectIndex);
        }
        Self { bindings }
    }

    /// Binds `key` to `action`.
    ///
    /// # Errors
    ///
    /// `MenuError::DuplicateShortcut` if `key` is already bound; the existing binding stays.
    pub fn register_shortcut(&mut self, key: &str, action: Action) -> Result<()> {
        let key = normalize(key);
        if let Some(existing) = self.bindings.get(&key) {
            return Err(MenuError::DuplicateShortcut {
                key,
                action: existing.name(),
            });
        }
        self.bindings.insert(key, action);
        Ok(())
    }

    pub fn get_action(&self, key: &str) -> Option<&Action> {
        self.bindings.get(&normalize(key))
    }

    /// The first key bound to `action`, for footer hints.
    pub fn key_for(&self, action: &Action) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, bound)| *bound == action)
            .map(|(key, _)| key.as_str())
    }

    /// All bindings ordered by key name.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Action)> {
        self.bindings.iter().map(|(k, a)| (k.as_str(), a))
    }

    /// Applies a key-to-action-name table, e.g. from the preferences file.
    ///
    /// Every entry is validated before any is applied; one unknown action or empty
    /// key rejects the whole table. Valid entries replace existing bindings.
    pub fn apply_remapping(&mut self, table: &BTreeMap<String, String>) -> Result<usize> {
        let parsed = table
            .iter()
            .map(|(key, action)| {
                if key.trim().is_empty() {
                    return Err(MenuError::InvalidPreference {
                        key: "shortcuts".to_string(),
                        reason: "empty key".to_string(),
                    });
                }
                Ok((normalize(key), action.parse::<Action>()?))
            })
            .collect::<Result<Vec<_>>>()?;

        let count = parsed.len();
        for (key, action) in parsed {
            self.bindings.insert(key, action);
        }
        if count > 0 {
            info!(count, "Applied shortcut remapping");
        }
        Ok(count)
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
