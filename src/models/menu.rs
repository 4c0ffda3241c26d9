//! Menu-facing data: options, screens, and the authoritative menu state.

use crate::error::MenuError;
use crate::models::ExecutionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How an option is presented and whether it needs extra care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptionCategory {
    #[default]
    Action,
    Info,
    Destructive,
    Utility,
}

/// What the preview screen shows before an option runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    /// The exact invocation that will be dispatched.
    pub invocation: String,
    /// External resources the command touches.
    #[serde(default)]
    pub affected: Vec<String>,
    pub estimated_duration: Option<String>,
    /// Shown prominently for destructive operations.
    pub warning: Option<String>,
}

/// One selectable entry in the menu.
///
/// Options are supplied once at startup. The engine only ever refreshes
/// `last_execution`, a copy of the newest matching history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub command: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub category: OptionCategory,
    pub shortcut: Option<char>,
    pub preview: Option<Preview>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
    #[serde(skip)]
    pub last_execution: Option<ExecutionRecord>,
}

impl MenuOption {
    /// Creates an `action` option with no icon, description or preview.
    pub fn new(command: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            label: label.into(),
            description: String::new(),
            icon: String::new(),
            category: OptionCategory::Action,
            shortcut: None,
            preview: None,
            args: Vec::new(),
            flags: BTreeMap::new(),
            last_execution: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn category(mut self, category: OptionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn shortcut(mut self, key: char) -> Self {
        self.shortcut = Some(key.to_ascii_lowercase());
        self
    }

    pub fn preview(mut self, preview: Preview) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }
}

/// The exclusive top-level screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Navigation,
    Preview,
    History,
    Config,
    Help,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Navigation,
        Mode::Preview,
        Mode::History,
        Mode::Config,
        Mode::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Navigation => "navigation",
            Mode::Preview => "preview",
            Mode::History => "history",
            Mode::Config => "config",
            Mode::Help => "help",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| MenuError::UnknownMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A one-line message shown under the menu, e.g. the outcome of the last run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// The single source of truth for what the menu shows.
///
/// Only `StateManager` writes it; everybody else gets clones.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuState {
    pub options: Vec<MenuOption>,
    /// Always a valid index into `options`.
    pub selected_index: usize,
    pub mode: Mode,
    /// Name of the command with an outstanding dispatch.
    pub executing: Option<String>,
    pub notice: Option<Notice>,
}

impl MenuState {
    pub fn new(options: Vec<MenuOption>) -> Self {
        Self {
            options,
            selected_index: 0,
            mode: Mode::Navigation,
            executing: None,
            notice: None,
        }
    }

    pub fn is_executing(&self) -> bool {
        self.executing.is_some()
    }

    pub fn selected(&self) -> Option<&MenuOption> {
        self.options.get(self.selected_index)
    }
}
