use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Local cache entry for one persisted store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope {
    pub state: Value,
    #[serde(default)]
    pub version: u32,
    /// Epoch milliseconds after which the entry is refreshed from remote.
    #[serde(default)]
    pub cache_expiry: i64,
}

impl CacheEnvelope {
    pub fn new(state: Value, version: u32, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            state,
            version,
            cache_expiry: (now + ttl).timestamp_millis(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.cache_expiry < now.timestamp_millis()
    }
}

/// Remote document for one persisted store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteEnvelope {
    pub state: Value,
    #[serde(default)]
    pub version: u32,
}
