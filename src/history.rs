//! A bounded, most-recent-first log of command executions persisted as JSON.
//!
//! On load, an unparsable file or any structurally invalid record triggers a
//! backup-then-reset: the file is copied aside with a timestamped suffix and the
//! history starts empty.

use crate::error::{MenuError, Result};
use crate::logging::OperationTimer;
use crate::models::{ExecutionRecord, ExecutionStatus, NewExecution};
use crate::storage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const HISTORY_VERSION: &str = "1.0.0";
pub const HISTORY_FILE_NAME: &str = "history.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryFile {
    version: String,
    max_size: usize,
    last_update: DateTime<Utc>,
    records: Vec<ExecutionRecord>,
}

/// Aggregate numbers for the history screen.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStatistics {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    /// Percentage of successful runs, 0 when the history is empty.
    pub success_rate: f64,
    pub average_duration_ms: u64,
    /// Commands by number of runs, most used first; ties ordered by name.
    pub most_used: Vec<(String, usize)>,
}

/// What happened during [`CommandHistory::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file yet.
    Fresh,
    Loaded(usize),
    /// The file was unusable, copied to the given path and reset.
    Recovered(PathBuf),
}

/// Owns the history file and the in-memory record list.
#[derive(Debug)]
pub struct CommandHistory {
    path: PathBuf,
    max_size: usize,
    records: Vec<ExecutionRecord>,
}

impl CommandHistory {
    /// Creates an empty history stored at `dir/history.json`, keeping at most `max_size` records.
    pub fn new(dir: &Path, max_size: usize) -> Self {
        Self {
            path: dir.join(HISTORY_FILE_NAME),
            max_size: max_size.max(1),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Changes the cap, dropping the oldest records if needed.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        self.records.truncate(self.max_size);
    }

    /// Appends a record at the front and truncates to the cap.
    ///
    /// # Errors
    ///
    /// Returns `MenuError::EmptyCommand` for a blank command name.
    pub fn add(&mut self, entry: NewExecution) -> Result<&ExecutionRecord> {
        if entry.command.trim().is_empty() {
            return Err(MenuError::EmptyCommand);
        }
        let record = ExecutionRecord {
            status: ExecutionStatus::from_exit_code(entry.exit_code),
            command: entry.command,
            timestamp: entry.timestamp.unwrap_or_else(Utc::now),
            duration: entry.duration_ms,
            exit_code: entry.exit_code,
            error: entry.error,
        };
        debug!(command = %record.command, status = record.status.as_str(), "History record added");
        self.records.insert(0, record);
        self.records.truncate(self.max_size);
        Ok(&self.records[0])
    }

    /// All records, most recent first.
    pub fn all(&self) -> &[ExecutionRecord] {
        &self.records
    }

    /// The first `n` records, most recent first.
    pub fn recent(&self, n: usize) -> &[ExecutionRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// The newest record for `command`, if any.
    pub fn last_execution(&self, command: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.command == command)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn statistics(&self) -> HistoryStatistics {
        let total = self.records.len();
        let successes = self
            .records
            .iter()
            .filter(|r| r.status == ExecutionStatus::Success)
            .count();
        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64 * 100.0
        };
        let average_duration_ms = if total == 0 {
            0
        } else {
            self.records.iter().map(|r| r.duration).sum::<u64>() / total as u64
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &self.records {
            *counts.entry(record.command.as_str()).or_default() += 1;
        }
        let mut most_used: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        most_used.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        HistoryStatistics {
            total,
            successes,
            failures: total - successes,
            success_rate,
            average_duration_ms,
            most_used,
        }
    }

    /// Writes the whole history file.
    pub fn save(&self) -> Result<()> {
        let timer = OperationTimer::start("history.save");
        let file = HistoryFile {
            version: HISTORY_VERSION.to_string(),
            max_size: self.max_size,
            last_update: Utc::now(),
            records: self.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        storage::atomic_write(&self.path, json.as_bytes())?;
        timer.finish();
        Ok(())
    }

    /// Replaces the in-memory records with the persisted ones.
    ///
    /// # Errors
    ///
    /// Only I/O failures while reading an existing file or writing its backup are
    /// returned; corruption is recovered from.
    pub fn load(&mut self) -> Result<LoadOutcome> {
        let timer = OperationTimer::start("history.load");
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.records.clear();
                return Ok(LoadOutcome::Fresh);
            },
            Err(e) => return Err(e.into()),
        };

        // Invalid UTF-8 surfaces here as a parse error and is recovered like any other.
        let parsed = serde_json::from_slice::<HistoryFile>(&raw)
            .map_err(|e| e.to_string())
            .and_then(|file| validate_records(&file.records).map(|_| file));

        let outcome = match parsed {
            Ok(file) => {
                self.records = file.records;
                self.records.truncate(self.max_size);
                info!(count = self.records.len(), "History loaded");
                LoadOutcome::Loaded(self.records.len())
            },
            Err(reason) => {
                let backup = storage::backup(&self.path)?;
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    %reason,
                    "History file is invalid, backed up and reset"
                );
                self.records.clear();
                self.save()?;
                LoadOutcome::Recovered(backup)
            },
        };
        timer.finish();
        Ok(outcome)
    }
}

fn validate_records(records: &[ExecutionRecord]) -> std::result::Result<(), String> {
    for (i, record) in records.iter().enumerate() {
        if record.command.trim().is_empty() {
            return Err(format!("record {} has an empty command name", i));
        }
        if record.status != ExecutionStatus::from_exit_code(record.exit_code) {
            return Err(format!(
                "record {} status '{}' contradicts exit code {}",
                i,
                record.status.as_str(),
                record.exit_code
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorDetails;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn history(max: usize) -> (TempDir, CommandHistory) {
        let dir = TempDir::new().unwrap();
        let history = CommandHistory::new(dir.path(), max);
        (dir, history)
    }

    fn commands(history: &CommandHistory) -> Vec<&str> {
        history.all().iter().map(|r| r.command.as_str()).collect()
    }

    #[test]
    fn test_add_derives_status_from_exit_code() {
        let (_dir, mut history) = history(10);
        assert_eq!(
            history.add(NewExecution::new("a", 0)).unwrap().status,
            ExecutionStatus::Success
        );
        assert_eq!(
            history.add(NewExecution::new("b", 3)).unwrap().status,
            ExecutionStatus::Failure
        );
    }

    #[test]
    fn test_add_rejects_empty_command() {
        let (_dir, mut history) = history(10);
        assert!(matches!(
            history.add(NewExecution::new("  ", 0)),
            Err(MenuError::EmptyCommand)
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn test_cap_keeps_most_recent_first() {
        let (_dir, mut history) = history(2);
        for name in ["A", "B", "C"] {
            history.add(NewExecution::new(name, 0)).unwrap();
        }
        assert_eq!(commands(&history), vec!["C", "B"]);
    }

    #[test]
    fn test_overflow_leaves_exactly_max_size() {
        let (_dir, mut history) = history(5);
        for i in 0..12 {
            history.add(NewExecution::new(format!("cmd{}", i), 0)).unwrap();
        }
        assert_eq!(history.len(), 5);
        assert_eq!(
            commands(&history),
            vec!["cmd11", "cmd10", "cmd9", "cmd8", "cmd7"]
        );
    }

    #[test]
    fn test_recent_and_last_execution() {
        let (_dir, mut history) = history(10);
        history.add(NewExecution::new("upload", 1)).unwrap();
        history.add(NewExecution::new("download", 0)).unwrap();
        history.add(NewExecution::new("upload", 0)).unwrap();

        assert_eq!(history.recent(2).len(), 2);
        assert_eq!(history.recent(50).len(), 3);
        let last = history.last_execution("upload").unwrap();
        assert_eq!(last.status, ExecutionStatus::Success);
        assert!(history.last_execution("migrate").is_none());
    }

    #[test]
    fn test_statistics_on_empty_history() {
        let (_dir, history) = history(10);
        let stats = history.statistics();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.successes, 0);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.most_used.is_empty());
    }

    #[test]
    fn test_statistics_ranks_by_frequency() {
        let (_dir, mut history) = history(10);
        history.add(NewExecution::new("b", 0).duration_ms(100)).unwrap();
        history.add(NewExecution::new("a", 1).duration_ms(300)).unwrap();
        history.add(NewExecution::new("b", 0).duration_ms(200)).unwrap();
        history.add(NewExecution::new("c", 0).duration_ms(400)).unwrap();

        let stats = history.statistics();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successes, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.success_rate, 75.0);
        assert_eq!(stats.average_duration_ms, 250);
        assert_eq!(
            stats.most_used,
            vec![("b".to_string(), 2), ("a".to_string(), 1), ("c".to_string(), 1)]
        );
    }

    #[test]
    fn test_save_then_fresh_load_round_trips() {
        let (dir, mut history) = history(10);
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        history
            .add(NewExecution::new("download", 0).duration_ms(1200).at(base))
            .unwrap();
        history
            .add(
                NewExecution::new("upload", 2)
                    .error(ErrorDetails::new("boom"))
                    .at(base + Duration::minutes(1)),
            )
            .unwrap();
        history.save().unwrap();

        let mut fresh = CommandHistory::new(dir.path(), 10);
        assert_eq!(fresh.load().unwrap(), LoadOutcome::Loaded(2));
        assert_eq!(fresh.all(), history.all());
    }

    #[test]
    fn test_missing_file_is_fresh() {
        let (_dir, mut history) = history(10);
        assert_eq!(history.load().unwrap(), LoadOutcome::Fresh);
        assert!(history.is_empty());
    }

    #[test]
    fn test_unparsable_file_is_backed_up_and_reset() {
        let (_dir, mut history) = history(10);
        fs::write(history.path(), "][").unwrap();

        let outcome = history.load().unwrap();

        let LoadOutcome::Recovered(backup) = outcome else {
            panic!("expected recovery, got {:?}", outcome);
        };
        assert_eq!(fs::read_to_string(backup).unwrap(), "][");
        assert!(history.is_empty());
        // The reset history is written back in place of the bad file.
        let mut fresh = CommandHistory::new(history.path().parent().unwrap(), 10);
        assert_eq!(fresh.load().unwrap(), LoadOutcome::Loaded(0));
    }

    #[test]
    fn test_non_utf8_file_is_backed_up_and_reset() {
        let (_dir, mut history) = history(10);
        let garbage = [0xff, 0xfe, 0x00, 0x7b];
        fs::write(history.path(), garbage).unwrap();

        let outcome = history.load().unwrap();

        let LoadOutcome::Recovered(backup) = outcome else {
            panic!("expected recovery, got {:?}", outcome);
        };
        assert_eq!(fs::read(backup).unwrap(), garbage);
        assert!(history.is_empty());
        let mut fresh = CommandHistory::new(history.path().parent().unwrap(), 10);
        assert_eq!(fresh.load().unwrap(), LoadOutcome::Loaded(0));
    }

    #[test]
    fn test_invalid_record_triggers_recovery() {
        let (_dir, mut history) = history(10);
        let bad = r#"{
            "version": "1.0.0",
            "maxSize": 10,
            "lastUpdate": "2024-01-01T00:00:00Z",
            "records": [
                {"command": "", "timestamp": "2024-01-01T00:00:00Z",
                 "status": "success", "duration": 1, "exitCode": 0}
            ]
        }"#;
        fs::write(history.path(), bad).unwrap();

        assert!(matches!(history.load().unwrap(), LoadOutcome::Recovered(_)));
        assert!(history.is_empty());
    }

    #[test]
    fn test_load_truncates_to_current_cap() {
        let (dir, mut history) = history(10);
        for i in 0..6 {
            history.add(NewExecution::new(format!("c{}", i), 0)).unwrap();
        }
        history.save().unwrap();

        let mut smaller = CommandHistory::new(dir.path(), 3);
        assert_eq!(smaller.load().unwrap(), LoadOutcome::Loaded(3));
        assert_eq!(smaller.all()[0].command, "c5");
    }
}
