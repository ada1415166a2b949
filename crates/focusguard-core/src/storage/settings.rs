//! TOML-based user settings.
//!
//! Stores default session durations, notification preferences and the block
//! rule set at `~/.config/focusguard/settings.toml`. A missing or corrupt
//! file falls back to defaults (logged, never an error to the caller);
//! invalid settings are rejected before being applied, leaving the previous
//! file untouched.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use super::data_dir;
use crate::block::{shared, BlockRuleSet, SharedRuleSet};
use crate::error::{ConfigError, CoreError, Result, ValidationError};
use crate::timer::TimerMode;

/// Default session durations in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationSettings {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
}

/// Notification/sound preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_volume")]
    pub volume: u32,
}

/// Application settings.
///
/// Serialized to/from TOML at `~/.config/focusguard/settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub durations: DurationSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub rules: BlockRuleSet,
    /// Start the next session automatically when one completes.
    #[serde(default = "default_true")]
    pub auto_continue: bool,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_sessions_before_long_break() -> u32 {
    4
}
fn default_true() -> bool {
    true
}
fn default_volume() -> u32 {
    50
}

impl Default for DurationSettings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            sessions_before_long_break: default_sessions_before_long_break(),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sound_enabled: true,
            volume: default_volume(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            durations: DurationSettings::default(),
            notifications: NotificationSettings::default(),
            rules: BlockRuleSet::default(),
            auto_continue: true,
        }
    }
}

impl DurationSettings {
    /// Duration for a mode, in milliseconds. `Custom` uses the focus
    /// duration as its starting point; callers override it explicitly.
    pub fn duration_ms(&self, mode: TimerMode) -> u64 {
        let minutes = match mode {
            TimerMode::Focus | TimerMode::Custom => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        };
        u64::from(minutes) * 60 * 1000
    }
}

impl Settings {
    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("settings.toml"))
    }

    /// Load from disk. Missing or corrupt files yield defaults; corruption
    /// is logged, never surfaced as an error.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<Settings>(&content) {
                Ok(settings) => Ok(settings),
                Err(err) => {
                    log::warn!(
                        "settings file {} is corrupt ({err}), using defaults",
                        path.display()
                    );
                    Ok(Self::default())
                }
            },
            Err(_) => Ok(Self::default()),
        }
    }

    /// Validate, then persist to disk. Invalid settings are rejected and
    /// the previous file is left as it was.
    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|err| {
            CoreError::Config(ConfigError::SaveFailed {
                path: path.clone(),
                message: err.to_string(),
            })
        })?;
        std::fs::write(&path, content).map_err(|err| {
            CoreError::Config(ConfigError::SaveFailed {
                path,
                message: err.to_string(),
            })
        })?;
        Ok(())
    }

    /// Duration and rule-set constraints from the settings contract:
    /// every duration positive, short break strictly shorter than focus,
    /// rule ids unique.
    pub fn validate(&self) -> Result<()> {
        let d = &self.durations;
        for (field, value) in [
            ("durations.focus_minutes", d.focus_minutes),
            ("durations.short_break_minutes", d.short_break_minutes),
            ("durations.long_break_minutes", d.long_break_minutes),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidDuration {
                    field: field.into(),
                    message: "must be greater than zero".into(),
                }
                .into());
            }
        }
        if d.short_break_minutes >= d.focus_minutes {
            return Err(ValidationError::InvalidDuration {
                field: "durations.short_break_minutes".into(),
                message: format!(
                    "short break ({}) must be shorter than focus ({})",
                    d.short_break_minutes, d.focus_minutes
                ),
            }
            .into());
        }
        self.rules.validate()?;
        Ok(())
    }

    /// Get a settings value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        match current {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a settings value by dot-separated key, then validate and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        set_json_value_by_path(&mut json, key, value)?;
        let candidate: Settings = serde_json::from_value(json)?;
        candidate.save()?;
        *self = candidate;
        Ok(())
    }
}

fn set_json_value_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<()> {
    let mut parts = key.split('.').peekable();
    if parts.peek().is_none() {
        return Err(ConfigError::UnknownKey(key.into()).into());
    }

    let mut current = root;
    while let Some(part) = parts.next() {
        let is_leaf = parts.peek().is_none();
        if is_leaf {
            let obj = current
                .as_object_mut()
                .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;
            let existing = obj
                .get(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                        key: key.into(),
                        message: format!("cannot parse '{value}' as bool"),
                    })?,
                ),
                serde_json::Value::Number(_) => {
                    let n = value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                        key: key.into(),
                        message: format!("cannot parse '{value}' as number"),
                    })?;
                    serde_json::Value::Number(n.into())
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|err| ConfigError::InvalidValue {
                        key: key.into(),
                        message: err.to_string(),
                    })?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        current = current
            .get_mut(part)
            .ok_or_else(|| ConfigError::UnknownKey(key.into()))?;
    }

    Err(ConfigError::UnknownKey(key.into()).into())
}

/// Single owner of the settings and the rule set shared with the monitor.
///
/// Consumers hold the manager (or the shared rule-set handle it hands out),
/// never the mutable record itself: updates validate first, persist, then
/// replace the shared rule set wholesale so concurrent readers never see a
/// half-updated rule.
pub struct SettingsManager {
    settings: Mutex<Settings>,
    rules: SharedRuleSet,
}

impl SettingsManager {
    /// Load settings from disk (defaults on missing/corrupt) and publish
    /// the rule set for sharing.
    pub fn load() -> Result<Self> {
        let settings = Settings::load()?;
        let rules = shared(settings.rules.clone());
        Ok(Self {
            settings: Mutex::new(settings),
            rules,
        })
    }

    /// Build a manager over explicit settings without reading disk. Used
    /// when a frontend overrides loaded settings (CLI flags) and in tests.
    pub fn from_settings(settings: Settings) -> Self {
        let rules = shared(settings.rules.clone());
        Self {
            settings: Mutex::new(settings),
            rules,
        }
    }

    /// Handle to the rule set shared with the block monitor.
    pub fn rule_set(&self) -> SharedRuleSet {
        std::sync::Arc::clone(&self.rules)
    }

    /// Read-snapshot of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    /// Apply an edit, validate, persist, and publish the new rule set.
    /// On validation failure nothing changes, on disk failure the previous
    /// in-memory settings are retained.
    pub fn update(&self, edit: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut guard = self.settings.lock().unwrap();
        let mut candidate = guard.clone();
        edit(&mut candidate);
        candidate.validate()?;
        candidate.save()?;
        *self.rules.write().unwrap() = candidate.rules.clone();
        *guard = candidate;
        Ok(())
    }
}
