//! Data exchanged with the external command dispatcher and stored in the history log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one execution, derived from the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

impl ExecutionStatus {
    /// Zero means success, anything else is a failure.
    pub fn from_exit_code(exit_code: i32) -> Self {
        if exit_code == 0 {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
        }
    }
}

/// Captured details of a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub message: String,
    pub stack: Option<String>,
    pub code: Option<String>,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            code: None,
        }
    }
}

/// One immutable row in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub command: String,
    pub timestamp: DateTime<Utc>,
    pub status: ExecutionStatus,
    /// Wall-clock duration in milliseconds.
    pub duration: u64,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// What `CommandHistory::add` accepts; the status is derived from `exit_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExecution {
    pub command: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub error: Option<ErrorDetails>,
    /// Defaults to now when not given.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewExecution {
    pub fn new(command: impl Into<String>, exit_code: i32) -> Self {
        Self {
            command: command.into(),
            exit_code,
            duration_ms: 0,
            error: None,
            timestamp: None,
        }
    }

    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn error(mut self, error: ErrorDetails) -> Self {
        self.error = Some(error);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A dispatch request handed to the external command function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    pub args: Vec<String>,
    pub flags: BTreeMap<String, String>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            flags: BTreeMap::new(),
        }
    }

    /// True when `--name` was passed with a truthy value.
    pub fn flag_enabled(&self, name: &str) -> bool {
        matches!(
            self.flags.get(name).map(String::as_str),
            Some("true" | "1" | "yes")
        )
    }
}

/// What an external command reports when it returns normally.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl CommandOutput {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// What an external command reports when it fails outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub message: String,
    pub stack: Option<String>,
    pub code: Option<String>,
    pub exit_code: Option<i32>,
}

impl CommandFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            code: None,
            exit_code: None,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }
}

impl From<&str> for CommandFailure {
    fn from(message: &str) -> Self {
        CommandFailure::new(message)
    }
}

impl From<String> for CommandFailure {
    fn from(message: String) -> Self {
        CommandFailure::new(message)
    }
}

/// The normalized shape of every execution, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub command: String,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration: u64,
    pub exit_code: i32,
    pub data: Option<serde_json::Value>,
    pub error: Option<ErrorDetails>,
}

impl ExecutionResult {
    /// The history entry describing this result.
    pub fn to_new_execution(&self) -> NewExecution {
        NewExecution {
            command: self.command.clone(),
            exit_code: self.exit_code,
            duration_ms: self.duration,
            error: self.error.clone(),
            timestamp: Some(self.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_from_exit_code() {
        assert_eq!(ExecutionStatus::from_exit_code(0), ExecutionStatus::Success);
        assert_eq!(ExecutionStatus::from_exit_code(2), ExecutionStatus::Failure);
        assert_eq!(ExecutionStatus::from_exit_code(-1), ExecutionStatus::Failure);
    }

    #[test]
    fn test_record_uses_camel_case_fields() {
        let record = ExecutionRecord {
            command: "upload".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            status: ExecutionStatus::Failure,
            duration: 42,
            exit_code: 1,
            error: Some(ErrorDetails::new("boom")),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["exitCode"], 1);
        assert_eq!(json["status"], "failure");
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(json["error"]["message"], "boom");
    }

    #[test]
    fn test_flag_enabled() {
        let mut request = CommandRequest::new("cleanup");
        request.flags.insert("force".into(), "true".into());
        request.flags.insert("dry-run".into(), "no".into());
        assert!(request.flag_enabled("force"));
        assert!(!request.flag_enabled("dry-run"));
        assert!(!request.flag_enabled("missing"));
    }
}
