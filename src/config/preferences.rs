//! Strongly typed user preferences and the closed set of keys used to address them.

use crate::error::{MenuError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const MIN_HISTORY_SIZE: usize = 1;
pub const MAX_HISTORY_SIZE: usize = 1000;
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Steps the config editor cycles `historySize` through.
const HISTORY_SIZE_STEPS: [usize; 5] = [25, 50, 100, 500, 1000];

/// Named colour palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    #[default]
    Default,
    Dark,
    Light,
    HighContrast,
    Monochrome,
}

impl ThemeName {
    pub const ALL: [ThemeName; 5] = [
        ThemeName::Default,
        ThemeName::Dark,
        ThemeName::Light,
        ThemeName::HighContrast,
        ThemeName::Monochrome,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeName::Default => "default",
            ThemeName::Dark => "dark",
            ThemeName::Light => "light",
            ThemeName::HighContrast => "high-contrast",
            ThemeName::Monochrome => "monochrome",
        }
    }

    fn next(self) -> Self {
        let pos = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(pos + 1) % Self::ALL.len()]
    }
}

impl FromStr for ThemeName {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MenuError::InvalidPreference {
                key: "theme".to_string(),
                reason: format!("unknown theme '{}'", s),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnimationSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl AnimationSpeed {
    pub const ALL: [AnimationSpeed; 3] = [
        AnimationSpeed::Slow,
        AnimationSpeed::Normal,
        AnimationSpeed::Fast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnimationSpeed::Slow => "slow",
            AnimationSpeed::Normal => "normal",
            AnimationSpeed::Fast => "fast",
        }
    }

    /// Time between two spinner frames.
    pub fn frame_interval(self) -> Duration {
        match self {
            AnimationSpeed::Slow => Duration::from_millis(160),
            AnimationSpeed::Normal => Duration::from_millis(100),
            AnimationSpeed::Fast => Duration::from_millis(60),
        }
    }

    fn next(self) -> Self {
        match self {
            AnimationSpeed::Slow => AnimationSpeed::Normal,
            AnimationSpeed::Normal => AnimationSpeed::Fast,
            AnimationSpeed::Fast => AnimationSpeed::Slow,
        }
    }
}

impl FromStr for AnimationSpeed {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|speed| speed.as_str() == s)
            .ok_or_else(|| MenuError::InvalidPreference {
                key: "animationSpeed".to_string(),
                reason: format!("expected slow, normal or fast, got '{}'", s),
            })
    }
}

/// The persisted per-user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub theme: ThemeName,
    pub animations_enabled: bool,
    pub animation_speed: AnimationSpeed,
    pub icons_enabled: bool,
    pub show_descriptions: bool,
    pub show_previews: bool,
    pub history_size: usize,
    /// Key name to logical action name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shortcuts: BTreeMap<String, String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: ThemeName::Default,
            animations_enabled: true,
            animation_speed: AnimationSpeed::Normal,
            icons_enabled: true,
            show_descriptions: true,
            show_previews: true,
            history_size: DEFAULT_HISTORY_SIZE,
            shortcuts: BTreeMap::new(),
        }
    }
}

impl UserPreferences {
    /// Builds preferences from an untrusted JSON object, field by field.
    ///
    /// Invalid or unknown fields are dropped and missing ones take their default.
    /// The second element lists every field that was dropped or defaulted.
    pub fn from_json_lenient(object: &Map<String, Value>) -> (Self, Vec<String>) {
        let mut prefs = Self::default();
        let mut corrected = Vec::new();

        for key in PreferenceKey::SCALARS {
            let name = key.name();
            let Some(raw) = object.get(name) else {
                corrected.push(name.to_string());
                continue;
            };
            let applied = PreferenceValue::from_json(raw)
                .and_then(|value| prefs.apply(&key, value).ok());
            if applied.is_none() {
                corrected.push(name.to_string());
            }
        }

        match object.get("shortcuts") {
            None => {},
            Some(Value::Object(table)) => {
                for (key, action) in table {
                    match action.as_str() {
                        Some(action) if !key.is_empty() && !action.is_empty() => {
                            prefs.shortcuts.insert(key.clone(), action.to_string());
                        },
                        _ => corrected.push(format!("shortcuts.{}", key)),
                    }
                }
            },
            Some(_) => corrected.push("shortcuts".to_string()),
        }

        for unknown in object.keys() {
            let known = unknown == "shortcuts"
                || PreferenceKey::SCALARS
                    .iter()
                    .any(|k| k.name() == unknown.as_str());
            if !known {
                corrected.push(unknown.clone());
            }
        }

        (prefs, corrected)
    }

    /// Checks every field against its allowed domain.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_HISTORY_SIZE..=MAX_HISTORY_SIZE).contains(&self.history_size) {
            return Err(MenuError::InvalidPreference {
                key: "historySize".to_string(),
                reason: format!(
                    "must be between {} and {}, got {}",
                    MIN_HISTORY_SIZE, MAX_HISTORY_SIZE, self.history_size
                ),
            });
        }
        if let Some((key, _)) = self
            .shortcuts
            .iter()
            .find(|(key, action)| key.is_empty() || action.is_empty())
        {
            return Err(MenuError::InvalidPreference {
                key: format!("shortcuts.{}", key),
                reason: "key and action must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Reads one field.
    pub fn get(&self, key: &PreferenceKey) -> Option<PreferenceValue> {
        let value = match key {
            PreferenceKey::Theme => PreferenceValue::Text(self.theme.as_str().to_string()),
            PreferenceKey::AnimationsEnabled => PreferenceValue::Bool(self.animations_enabled),
            PreferenceKey::AnimationSpeed => {
                PreferenceValue::Text(self.animation_speed.as_str().to_string())
            },
            PreferenceKey::IconsEnabled => PreferenceValue::Bool(self.icons_enabled),
            PreferenceKey::ShowDescriptions => PreferenceValue::Bool(self.show_descriptions),
            PreferenceKey::ShowPreviews => PreferenceValue::Bool(self.show_previews),
            PreferenceKey::HistorySize => PreferenceValue::Number(self.history_size as i64),
            PreferenceKey::Shortcut(name) => {
                return self.shortcuts.get(name).cloned().map(PreferenceValue::Text);
            },
        };
        Some(value)
    }

    /// Validates `value` for `key` and writes it. On error nothing changes.
    pub fn apply(&mut self, key: &PreferenceKey, value: PreferenceValue) -> Result<()> {
        let mismatch = |expected: &str| MenuError::InvalidPreference {
            key: key.name().to_string(),
            reason: format!("expected {}, got {}", expected, value),
        };
        match (key, &value) {
            (PreferenceKey::Theme, PreferenceValue::Text(name)) => {
                self.theme = name.parse()?;
            },
            (PreferenceKey::AnimationSpeed, PreferenceValue::Text(name)) => {
                self.animation_speed = name.parse()?;
            },
            (PreferenceKey::AnimationsEnabled, PreferenceValue::Bool(flag)) => {
                self.animations_enabled = *flag;
            },
            (PreferenceKey::IconsEnabled, PreferenceValue::Bool(flag)) => {
                self.icons_enabled = *flag;
            },
            (PreferenceKey::ShowDescriptions, PreferenceValue::Bool(flag)) => {
                self.show_descriptions = *flag;
            },
            (PreferenceKey::ShowPreviews, PreferenceValue::Bool(flag)) => {
                self.show_previews = *flag;
            },
            (PreferenceKey::HistorySize, PreferenceValue::Number(n)) => {
                let size = usize::try_from(*n).unwrap_or(0);
                if !(MIN_HISTORY_SIZE..=MAX_HISTORY_SIZE).contains(&size) {
                    return Err(MenuError::InvalidPreference {
                        key: key.name().to_string(),
                        reason: format!(
                            "must be between {} and {}, got {}",
                            MIN_HISTORY_SIZE, MAX_HISTORY_SIZE, n
                        ),
                    });
                }
                self.history_size = size;
            },
            (PreferenceKey::Shortcut(name), PreferenceValue::Text(action)) => {
                if action.is_empty() {
                    self.shortcuts.remove(name);
                } else {
                    self.shortcuts.insert(name.clone(), action.clone());
                }
            },
            (PreferenceKey::Theme, _) => return Err(mismatch("a theme name")),
            (PreferenceKey::AnimationSpeed, _) => return Err(mismatch("an animation speed")),
            (PreferenceKey::HistorySize, _) => return Err(mismatch("a number")),
            (PreferenceKey::Shortcut(_), _) => return Err(mismatch("an action name")),
            (_, _) => return Err(mismatch("true or false")),
        }
        Ok(())
    }

    /// The value the config editor moves `key` to next: toggles booleans, cycles enums.
    pub fn cycled(&self, key: &PreferenceKey) -> Option<PreferenceValue> {
        let value = match key {
            PreferenceKey::Theme => PreferenceValue::Text(self.theme.next().as_str().to_string()),
            PreferenceKey::AnimationSpeed => {
                PreferenceValue::Text(self.animation_speed.next().as_str().to_string())
            },
            PreferenceKey::AnimationsEnabled => PreferenceValue::Bool(!self.animations_enabled),
            PreferenceKey::IconsEnabled => PreferenceValue::Bool(!self.icons_enabled),
            PreferenceKey::ShowDescriptions => PreferenceValue::Bool(!self.show_descriptions),
            PreferenceKey::ShowPreviews => PreferenceValue::Bool(!self.show_previews),
            PreferenceKey::HistorySize => {
                let next = HISTORY_SIZE_STEPS
                    .iter()
                    .copied()
                    .find(|step| *step > self.history_size)
                    .unwrap_or(HISTORY_SIZE_STEPS[0]);
                PreferenceValue::Number(next as i64)
            },
            PreferenceKey::Shortcut(_) => return None,
        };
        Some(value)
    }
}

/// Addresses one preference field.
///
/// Parses the dotted paths used on the command line (`preferences.theme`,
/// `theme`, `shortcuts.d`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    Theme,
    AnimationsEnabled,
    AnimationSpeed,
    IconsEnabled,
    ShowDescriptions,
    ShowPreviews,
    HistorySize,
    Shortcut(String),
}

impl PreferenceKey {
    /// Every non-table field, in the order the config editor lists them.
    pub const SCALARS: [PreferenceKey; 7] = [
        PreferenceKey::Theme,
        PreferenceKey::AnimationsEnabled,
        PreferenceKey::AnimationSpeed,
        PreferenceKey::IconsEnabled,
        PreferenceKey::ShowDescriptions,
        PreferenceKey::ShowPreviews,
        PreferenceKey::HistorySize,
    ];

    /// The field's name in the persisted file.
    pub fn name(&self) -> &str {
        match self {
            PreferenceKey::Theme => "theme",
            PreferenceKey::AnimationsEnabled => "animationsEnabled",
            PreferenceKey::AnimationSpeed => "animationSpeed",
            PreferenceKey::IconsEnabled => "iconsEnabled",
            PreferenceKey::ShowDescriptions => "showDescriptions",
            PreferenceKey::ShowPreviews => "showPreviews",
            PreferenceKey::HistorySize => "historySize",
            PreferenceKey::Shortcut(key) => key.as_str(),
        }
    }

    /// Human label for the config editor.
    pub fn label(&self) -> &str {
        match self {
            PreferenceKey::Theme => "Theme",
            PreferenceKey::AnimationsEnabled => "Animations",
            PreferenceKey::AnimationSpeed => "Animation speed",
            PreferenceKey::IconsEnabled => "Icons",
            PreferenceKey::ShowDescriptions => "Descriptions",
            PreferenceKey::ShowPreviews => "Previews",
            PreferenceKey::HistorySize => "History size",
            PreferenceKey::Shortcut(_) => "Shortcut",
        }
    }

    /// Parses a command-line string into the value type this key expects.
    pub fn parse_value(&self, raw: &str) -> Result<PreferenceValue> {
        let invalid = |reason: String| MenuError::InvalidPreference {
            key: self.name().to_string(),
            reason,
        };
        match self {
            PreferenceKey::Theme | PreferenceKey::AnimationSpeed | PreferenceKey::Shortcut(_) => {
                Ok(PreferenceValue::Text(raw.to_string()))
            },
            PreferenceKey::HistorySize => raw
                .trim()
                .parse::<i64>()
                .map(PreferenceValue::Number)
                .map_err(|e| invalid(format!("'{}' is not a number: {}", raw, e))),
            _ => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(PreferenceValue::Bool(true)),
                "false" | "off" | "no" | "0" => Ok(PreferenceValue::Bool(false)),
                _ => Err(invalid(format!("'{}' is not a boolean", raw))),
            },
        }
    }
}

impl FromStr for PreferenceKey {
    type Err = MenuError;

    fn from_str(path: &str) -> Result<Self> {
        let path = path.strip_prefix("preferences.").unwrap_or(path);
        if let Some(key) = path.strip_prefix("shortcuts.") {
            if key.is_empty() {
                return Err(MenuError::InvalidPreference {
                    key: path.to_string(),
                    reason: "missing shortcut key".to_string(),
                });
            }
            return Ok(PreferenceKey::Shortcut(key.to_string()));
        }
        let normalized: String = path.chars().filter(|c| *c != '-' && *c != '_').collect();
        Self::SCALARS
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| MenuError::InvalidPreference {
                key: path.to_string(),
                reason: "unknown preference".to_string(),
            })
    }
}

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceKey::Shortcut(key) => write!(f, "shortcuts.{}", key),
            other => f.write_str(other.name()),
        }
    }
}

/// A preference value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl PreferenceValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(PreferenceValue::Bool(*b)),
            Value::Number(n) => n.as_i64().map(PreferenceValue::Number),
            Value::String(s) => Some(PreferenceValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceValue::Bool(b) => write!(f, "{}", b),
            PreferenceValue::Number(n) => write!(f, "{}", n),
            PreferenceValue::Text(s) => f.write_str(s),
        }
    }
}
