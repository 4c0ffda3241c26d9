//! Loads, validates and persists user preferences.
//!
//! The preferences file is `{ "version": ..., "preferences": { ... } }`. A file that
//! cannot be read as that shape is never surfaced as an error: the manager falls back
//! to defaults and immediately writes them back.

mod preferences;

pub use preferences::*;

use crate::error::{MenuError, Result};
use crate::logging::OperationTimer;
use crate::storage;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_VERSION: &str = "1.0.0";
pub const CONFIG_FILE_NAME: &str = "preferences.json";

#[derive(Serialize)]
struct ConfigFile<'a> {
    version: &'static str,
    preferences: &'a UserPreferences,
}

/// Owns the preferences file and the in-memory copy of the preferences.
#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    preferences: UserPreferences,
}

impl ConfigManager {
    /// Creates a manager for `dir/preferences.json` holding defaults until [`load`](Self::load).
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CONFIG_FILE_NAME),
            preferences: UserPreferences::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    /// Reads and validates the persisted preferences.
    ///
    /// A missing file, a parse failure or a wrong structure resets to defaults and
    /// re-persists them. Individually invalid fields are dropped and the corrected
    /// record is written back.
    ///
    /// # Errors
    ///
    /// Returns `MenuError::Io` only when the file exists but cannot be read, or
    /// when writing the corrected file fails.
    pub fn load(&mut self) -> Result<&UserPreferences> {
        let timer = OperationTimer::start("config.load");
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No preferences file, writing defaults");
                self.preferences = UserPreferences::default();
                self.flush()?;
                timer.finish();
                return Ok(&self.preferences);
            },
            Err(e) => return Err(e.into()),
        };

        // Bytes that are not UTF-8 fail here and count as corruption.
        let object = serde_json::from_slice::<Value>(&raw)
            .ok()
            .and_then(|mut root| match root.get_mut("preferences").map(Value::take) {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            });

        match object {
            Some(object) => {
                let (preferences, corrected) = UserPreferences::from_json_lenient(&object);
                self.preferences = preferences;
                if !corrected.is_empty() {
                    warn!(
                        path = %self.path.display(),
                        fields = ?corrected,
                        "Dropped or defaulted invalid preference fields"
                    );
                    self.flush()?;
                }
            },
            None => {
                warn!(
                    path = %self.path.display(),
                    "Preferences file is corrupted, resetting to defaults"
                );
                self.preferences = UserPreferences::default();
                self.flush()?;
            },
        }

        debug!(preferences = ?self.preferences, "Preferences loaded");
        timer.finish();
        Ok(&self.preferences)
    }

    /// Validates `preferences`, replaces the current ones and writes them.
    pub fn save(&mut self, preferences: UserPreferences) -> Result<()> {
        preferences.validate()?;
        self.preferences = preferences;
        self.flush()
    }

    /// Re-validates and writes the current preferences.
    pub fn flush(&self) -> Result<()> {
        self.preferences.validate()?;
        let file = ConfigFile {
            version: CONFIG_VERSION,
            preferences: &self.preferences,
        };
        let json = serde_json::to_string_pretty(&file)?;
        storage::atomic_write(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }

    /// Reads one field.
    pub fn get(&self, key: &PreferenceKey) -> Option<PreferenceValue> {
        self.preferences.get(key)
    }

    /// Validates and writes one field, then persists. On error nothing changes.
    pub fn set(&mut self, key: &PreferenceKey, value: PreferenceValue) -> Result<()> {
        let mut updated = self.preferences.clone();
        updated.apply(key, value)?;
        info!(key = %key, "Preference updated");
        self.save(updated)
    }

    /// Dotted-path variant of [`set`](Self::set) for string input, e.g. from the command line.
    pub fn set_path(&mut self, path: &str, raw: &str) -> Result<()> {
        let key: PreferenceKey = path.parse()?;
        let value = key.parse_value(raw)?;
        self.set(&key, value)
    }

    /// Dotted-path variant of [`get`](Self::get).
    pub fn get_path(&self, path: &str) -> Result<PreferenceValue> {
        let key: PreferenceKey = path.parse()?;
        self.get(&key).ok_or_else(|| MenuError::InvalidPreference {
            key: path.to_string(),
            reason: "not set".to_string(),
        })
    }

    /// Restores and persists the defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.save(UserPreferences::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, ConfigManager) {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path());
        (dir, manager)
    }

    #[test]
    fn test_first_load_writes_defaults() {
        let (_dir, mut config) = manager();
        let prefs = config.load().unwrap().clone();
        assert_eq!(prefs, UserPreferences::default());
        assert!(config.path().exists());

        let raw: Value = serde_json::from_str(&fs::read_to_string(config.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], CONFIG_VERSION);
        assert_eq!(raw["preferences"]["historySize"], 100);
        assert_eq!(raw["preferences"]["animationSpeed"], "normal");
    }

    #[test]
    fn test_save_then_fresh_load_round_trips() {
        let (dir, mut config) = manager();
        let mut prefs = UserPreferences::default();
        prefs.theme = ThemeName::HighContrast;
        prefs.show_previews = false;
        prefs.history_size = 2;
        prefs.shortcuts.insert("d".into(), "run:download".into());
        config.save(prefs.clone()).unwrap();

        let mut fresh = ConfigManager::new(dir.path());
        assert_eq!(fresh.load().unwrap(), &prefs);
    }

    #[test]
    fn test_corrupted_file_resets_and_repersists() {
        let (_dir, mut config) = manager();
        fs::write(config.path(), "{ not json").unwrap();

        let prefs = config.load().unwrap().clone();

        assert_eq!(prefs, UserPreferences::default());
        let raw: Value = serde_json::from_str(&fs::read_to_string(config.path()).unwrap()).unwrap();
        assert_eq!(raw["preferences"]["theme"], "default");
    }

    #[test]
    fn test_non_utf8_file_resets_and_repersists() {
        let (_dir, mut config) = manager();
        fs::write(config.path(), [0xff, 0xfe, 0x00, 0x7b]).unwrap();

        assert_eq!(config.load().unwrap(), &UserPreferences::default());
        let raw: Value = serde_json::from_str(&fs::read_to_string(config.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], CONFIG_VERSION);
        assert_eq!(raw["preferences"]["historySize"], 100);
    }

    #[test]
    fn test_wrong_structure_resets_to_defaults() {
        let (_dir, mut config) = manager();
        fs::write(config.path(), r#"{"version":"1.0.0","preferences":[1,2,3]}"#).unwrap();
        assert_eq!(config.load().unwrap(), &UserPreferences::default());
    }

    #[test]
    fn test_invalid_fields_are_dropped_on_load() {
        let (_dir, mut config) = manager();
        fs::write(
            config.path(),
            r#"{"version":"1.0.0","preferences":{"theme":"light","historySize":-4,"extra":true}}"#,
        )
        .unwrap();

        let prefs = config.load().unwrap().clone();
        assert_eq!(prefs.theme, ThemeName::Light);
        assert_eq!(prefs.history_size, DEFAULT_HISTORY_SIZE);

        let raw: Value = serde_json::from_str(&fs::read_to_string(config.path()).unwrap()).unwrap();
        assert!(raw["preferences"].get("extra").is_none());
        assert_eq!(raw["preferences"]["historySize"], 100);
    }

    #[test]
    fn test_set_persists_and_rejects_invalid_values() {
        let (dir, mut config) = manager();
        config.load().unwrap();

        config
            .set(&PreferenceKey::AnimationSpeed, PreferenceValue::Text("fast".into()))
            .unwrap();
        assert!(config
            .set(&PreferenceKey::AnimationSpeed, PreferenceValue::Text("warp".into()))
            .is_err());

        let mut fresh = ConfigManager::new(dir.path());
        assert_eq!(fresh.load().unwrap().animation_speed, AnimationSpeed::Fast);
    }

    #[test]
    fn test_dotted_path_access() {
        let (_dir, mut config) = manager();
        config.load().unwrap();
        config.set_path("preferences.historySize", "250").unwrap();
        config.set_path("shortcuts.u", "run:upload").unwrap();

        assert_eq!(
            config.get_path("historySize").unwrap(),
            PreferenceValue::Number(250)
        );
        assert_eq!(
            config.get_path("preferences.shortcuts.u").unwrap(),
            PreferenceValue::Text("run:upload".into())
        );
        assert!(config.get_path("shortcuts.z").is_err());
        assert!(config.set_path("iconsEnabled", "maybe").is_err());
    }

    #[test]
    fn test_save_rejects_invalid_preferences() {
        let (_dir, mut config) = manager();
        let mut prefs = UserPreferences::default();
        prefs.history_size = 0;
        assert!(config.save(prefs).is_err());
        assert_eq!(config.preferences().history_size, DEFAULT_HISTORY_SIZE);
    }
}
