use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SETTINGS_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub exercise: ExerciseSettings,
    #[serde(default)]
    pub locale: LocaleSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSettings {
    /// "m:ss" budget before an unfinished exercise is skipped.
    #[serde(default = "default_auto_skip_time")]
    pub auto_skip_time: String,
    #[serde(default = "default_wpm_decay_per_day")]
    pub wpm_decay_per_day: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocaleSettings {
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_auto_skip_time() -> String {
    "3:00".to_string()
}
fn default_wpm_decay_per_day() -> f64 {
    2.5
}
fn default_date_format() -> String {
    "MM/DD/YYYY".to_string()
}

impl Default for ExerciseSettings {
    fn default() -> Self {
        Self {
            auto_skip_time: default_auto_skip_time(),
            wpm_decay_per_day: default_wpm_decay_per_day(),
        }
    }
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exercise: ExerciseSettings::default(),
            locale: LocaleSettings::default(),
        }
    }
}

impl ExerciseSettings {
    /// Parse `auto_skip_time`. Accepts "m:ss" or a bare number of minutes.
    pub fn auto_skip_duration(&self) -> Option<Duration> {
        let raw = self.auto_skip_time.trim();
        let secs = match raw.split_once(':') {
            Some((m, s)) => m.trim().parse::<u64>().ok()? * 60 + s.trim().parse::<u64>().ok()?,
            None => raw.parse::<u64>().ok()? * 60,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

impl LocaleSettings {
    /// Render a date with the `DD`/`MM`/`YYYY` tokens of `date_format`.
    pub fn format_date(&self, date: chrono::NaiveDate) -> String {
        use chrono::Datelike;
        self.date_format
            .replace("YYYY", &format!("{:04}", date.year()))
            .replace("MM", &format!("{:02}", date.month()))
            .replace("DD", &format!("{:02}", date.day()))
    }
}

/// Upgrade a persisted settings document written by an older version.
pub fn migrate_settings(old: Value, old_version: u32) -> anyhow::Result<Settings> {
    let mut doc = old;
    if old_version < 1 {
        if let Value::Object(map) = &mut doc {
            map.insert(
                "locale".to_string(),
                serde_json::to_value(LocaleSettings::default())?,
            );
        }
    }
    Ok(serde_json::from_value(doc)?)
}
