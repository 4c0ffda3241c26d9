//! Defines the menu engine's primary error type `MenuError`, a convenience `Result` alias,
//! and the `ErrorHandler` that turns failures into categorized, user-facing messages.
//!
//! Uses the `thiserror` crate for ergonomic error definition and provides `From`
//! implementations to convert common external errors into `MenuError` variants.
//! Errors that do not implement `Clone` are wrapped in `Arc` to allow `MenuError` to be cloneable.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// The primary error enumeration for all menu-engine errors.
#[derive(Error, Debug, Clone)]
pub enum MenuError {
    /// A selection index outside `0..len` was requested.
    #[error("Index {index} is out of range for {len} options")]
    IndexOutOfRange { index: isize, len: usize },

    /// A mode name that is not one of the five screens.
    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    /// A logical action name that the keyboard mapper does not recognize.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A key that already has a binding.
    #[error("Key '{key}' is already bound to '{action}'")]
    DuplicateShortcut { key: String, action: String },

    /// A preference key or value that failed validation.
    #[error("Invalid preference '{key}': {reason}")]
    InvalidPreference { key: String, reason: String },

    /// A menu-intrinsic command name was handed to the external dispatcher.
    #[error("'{0}' is a reserved menu command and cannot be dispatched")]
    ReservedCommand(String),

    /// An execution record or option without a command name.
    #[error("Command name must not be empty")]
    EmptyCommand,

    /// The menu option list handed to the engine was empty.
    #[error("The menu needs at least one option")]
    NoOptions,

    /// Interactive mode was requested without a real terminal.
    #[error("Not an interactive terminal: {0}")]
    NotInteractive(String),

    /// A theme could not be loaded.
    #[error("Theme Error: {0}")]
    Theme(String),

    /// Terminal setup, raw-mode or drawing failure.
    #[error("Terminal Error: {0}")]
    Terminal(String),

    /// Error during JSON parsing (`serde_json`). Wrapped in Arc as serde_json::Error is not Clone.
    #[error("JSON Parsing Error: {0}")]
    JsonParse(Arc<serde_json::Error>),

    /// Error related to standard I/O operations, mostly persistence.
    #[error("I/O Error: {0}")]
    Io(Arc<std::io::Error>),

    /// Error specific to CLI logic or argument handling.
    #[error("CLI Error: {0}")]
    Cli(String),

    /// Error originating from user interaction prompts (`dialoguer`).
    #[error("Dialoguer Error: {0}")]
    Dialoguer(Arc<dialoguer::Error>),

    /// Error related to progress bar style templating (`indicatif`).
    #[error("Progress Style Template Error: {0}")]
    Template(Arc<indicatif::style::TemplateError>),

    /// The external command failed.
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },
}

/// A specialized `Result` type using the engine's `MenuError`.
pub type Result<T> = std::result::Result<T, MenuError>;

// --- From implementations ---

impl From<std::io::Error> for MenuError {
    fn from(err: std::io::Error) -> Self {
        MenuError::Io(Arc::new(err))
    }
}

impl From<dialoguer::Error> for MenuError {
    fn from(err: dialoguer::Error) -> Self {
        MenuError::Dialoguer(Arc::new(err))
    }
}

impl From<indicatif::style::TemplateError> for MenuError {
    fn from(err: indicatif::style::TemplateError) -> Self {
        MenuError::Template(Arc::new(err))
    }
}

impl From<serde_json::Error> for MenuError {
    fn from(err: serde_json::Error) -> Self {
        MenuError::JsonParse(Arc::new(err))
    }
}

/// Broad failure classes used to pick the wording and log level of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller or user mistakes: bad index, bad mode, bad preference.
    UserInput,
    /// Filesystem and terminal failures.
    System,
    /// The dispatched external command failed.
    CommandExecution,
    /// Anything else.
    Runtime,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::UserInput => "user-input",
            ErrorCategory::System => "system",
            ErrorCategory::CommandExecution => "command-execution",
            ErrorCategory::Runtime => "runtime",
        };
        f.write_str(label)
    }
}

/// A failure rendered for humans: what happened and what to try next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingError {
    pub category: ErrorCategory,
    pub title: String,
    pub message: String,
    pub suggestion: String,
    /// Full `Debug` output, only filled in when debug reporting is on.
    pub details: Option<String>,
}

impl fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}\n  Suggestion: {}", self.title, self.message, self.suggestion)?;
        if let Some(details) = &self.details {
            write!(f, "\n  Details: {}", details)?;
        }
        Ok(())
    }
}

/// Classifies failures and produces the messages shown on screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler {
    debug: bool,
}

impl ErrorHandler {
    /// Creates a handler. With `debug` set, reports carry the raw error details.
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Assigns one of the four categories to an error.
    pub fn classify(err: &MenuError) -> ErrorCategory {
        match err {
            MenuError::IndexOutOfRange { .. }
            | MenuError::UnknownMode(_)
            | MenuError::UnknownAction(_)
            | MenuError::DuplicateShortcut { .. }
            | MenuError::InvalidPreference { .. }
            | MenuError::ReservedCommand(_)
            | MenuError::EmptyCommand
            | MenuError::NoOptions
            | MenuError::Cli(_) => ErrorCategory::UserInput,
            MenuError::Io(_)
            | MenuError::JsonParse(_)
            | MenuError::Terminal(_)
            | MenuError::NotInteractive(_) => ErrorCategory::System,
            MenuError::CommandFailed { .. } => ErrorCategory::CommandExecution,
            MenuError::Theme(_) | MenuError::Dialoguer(_) | MenuError::Template(_) => {
                ErrorCategory::Runtime
            },
        }
    }

    /// Builds the user-facing report for `err` and logs it once.
    pub fn report(&self, err: &MenuError) -> UserFacingError {
        let category = Self::classify(err);
        let (title, suggestion) = match (category, err) {
            (_, MenuError::NotInteractive(_)) => (
                "Interactive menu unavailable",
                "Run termenu from a real terminal, or use the `run`, `history` and `config` subcommands.",
            ),
            (_, MenuError::Io(io)) if io.kind() == std::io::ErrorKind::PermissionDenied => (
                "Permission denied",
                "Check that the configuration directory is writable by your user.",
            ),
            (ErrorCategory::UserInput, _) => (
                "Invalid input",
                "Check the value you entered; press ? in the menu to see the key bindings.",
            ),
            (ErrorCategory::System, _) => (
                "System error",
                "Check disk space and permissions of the configuration directory.",
            ),
            (ErrorCategory::CommandExecution, _) => (
                "Command failed",
                "See the history screen (h) for details; the menu is still usable.",
            ),
            (ErrorCategory::Runtime, _) => (
                "Unexpected error",
                "Re-run with --debug and check the log file for details.",
            ),
        };

        match category {
            ErrorCategory::UserInput | ErrorCategory::CommandExecution => {
                warn!(%category, error = %err, "Reported error");
            },
            ErrorCategory::System | ErrorCategory::Runtime => {
                error!(%category, error = ?err, "Reported error");
            },
        }

        UserFacingError {
            category,
            title: title.to_string(),
            message: err.to_string(),
            suggestion: suggestion.to_string(),
            details: self.debug.then(|| format!("{:?}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(MenuError::IndexOutOfRange { index: -1, len: 3 }, ErrorCategory::UserInput)]
    #[case(MenuError::UnknownMode("zoom".into()), ErrorCategory::UserInput)]
    #[case(MenuError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk")), ErrorCategory::System)]
    #[case(
        MenuError::CommandFailed { command: "upload".into(), message: "boom".into() },
        ErrorCategory::CommandExecution
    )]
    #[case(MenuError::Theme("missing".into()), ErrorCategory::Runtime)]
    fn test_classify(#[case] err: MenuError, #[case] expected: ErrorCategory) {
        assert_eq!(ErrorHandler::classify(&err), expected);
    }

    #[test]
    fn test_report_hides_details_without_debug() {
        let report = ErrorHandler::new(false).report(&MenuError::Theme("neon".into()));
        assert_eq!(report.title, "Unexpected error");
        assert!(report.message.contains("neon"));
        assert!(report.details.is_none());
    }

    #[test]
    fn test_report_includes_details_with_debug() {
        let report = ErrorHandler::new(true).report(&MenuError::EmptyCommand);
        assert_eq!(report.category, ErrorCategory::UserInput);
        assert!(report.details.unwrap().contains("EmptyCommand"));
    }

    #[test]
    fn test_permission_denied_gets_specific_suggestion() {
        let err = MenuError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        let report = ErrorHandler::new(false).report(&err);
        assert_eq!(report.title, "Permission denied");
        assert!(report.suggestion.contains("writable"));
    }
}
