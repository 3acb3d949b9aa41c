use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const WORD_STAT_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WpmInfo {
    pub wpm: f64,
    pub date: DateTime<Utc>,
}

impl WpmInfo {
    pub fn new(wpm: f64, date: DateTime<Utc>) -> Self {
        Self { wpm, date }
    }
}

/// Historical speed of a single practiced word.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordStat {
    pub word: String,
    pub highest: WpmInfo,
    pub last_practice: WpmInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord_highest: Option<WpmInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord_last_practice: Option<WpmInfo>,
    #[serde(default)]
    pub version: u32,
}

/// Shape of word documents written before `WORD_STAT_VERSION` 1.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyWordStat {
    word: String,
    #[serde(default)]
    highest_wpm: f64,
    highest_wpm_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    last_practice_wpm: f64,
    last_practice_datetime: Option<DateTime<Utc>>,
}

impl WordStat {
    /// Zero-valued stat, used for words that were never practiced.
    pub fn new(word: &str, now: DateTime<Utc>) -> Self {
        Self {
            word: word.to_string(),
            highest: WpmInfo::new(0.0, now),
            last_practice: WpmInfo::new(0.0, now),
            chord_highest: None,
            chord_last_practice: None,
            version: WORD_STAT_VERSION,
        }
    }

    /// Stable document key for a word.
    pub fn hash(word: &str) -> String {
        format!("{:x}", Sha256::digest(word.as_bytes()))
    }

    pub fn update_wpm(&mut self, wpm: f64, now: DateTime<Utc>) {
        if wpm > self.highest.wpm {
            self.highest = WpmInfo::new(wpm, now);
        }
        self.last_practice = WpmInfo::new(wpm, now);
    }

    pub fn update_chord_wpm(&mut self, wpm: f64, now: DateTime<Utc>) {
        let highest = self.chord_highest.get_or_insert(WpmInfo::new(0.0, now));
        if wpm > highest.wpm {
            *highest = WpmInfo::new(wpm, now);
        }
        self.chord_last_practice = Some(WpmInfo::new(wpm, now));
    }

    /// Record a finished attempt in the stats matching the lesson's mode.
    pub fn record(&mut self, wpm: f64, chorded: bool, now: DateTime<Utc>) {
        if chorded {
            self.update_chord_wpm(wpm, now);
        } else {
            self.update_wpm(wpm, now);
        }
    }

    pub fn highest_wpm(&self, chorded: bool) -> f64 {
        if chorded {
            self.chord_highest.map(|h| h.wpm).unwrap_or(0.0)
        } else {
            self.highest.wpm
        }
    }

    pub fn last_practiced(&self, chorded: bool) -> DateTime<Utc> {
        if chorded {
            self.chord_last_practice
                .map(|p| p.date)
                .unwrap_or(self.last_practice.date)
        } else {
            self.last_practice.date
        }
    }

    pub fn is_latest(doc: &Value) -> bool {
        doc.get("version").and_then(Value::as_u64) == Some(WORD_STAT_VERSION as u64)
    }

    /// Decode a stored word document, upgrading old layouts.
    pub fn from_document(doc: Value, now: DateTime<Utc>) -> Result<Self> {
        if Self::is_latest(&doc) {
            return serde_json::from_value(doc).context("malformed word document");
        }
        let legacy: LegacyWordStat =
            serde_json::from_value(doc).context("malformed legacy word document")?;
        let mut stat = Self::new(&legacy.word, now);
        stat.highest = WpmInfo::new(
            legacy.highest_wpm,
            legacy.highest_wpm_datetime.unwrap_or(now),
        );
        stat.last_practice = WpmInfo::new(
            legacy.last_practice_wpm,
            legacy.last_practice_datetime.unwrap_or(now),
        );
        Ok(stat)
    }
}
