//! Dual-layer persistence for application state.
//!
//! A [`PersistedStore`] owns one piece of state and mirrors it into a fast
//! local cache and a durable remote document after every mutation. Remote
//! I/O runs on a dedicated writer thread fed through an mpsc queue, so writes
//! reach the remote in the order they were issued. Remote reads ("refreshes")
//! come back over a second channel and are applied by [`PersistedStore::poll`]
//! on the owning thread, and only if the state has not been mutated since
//! the refresh was requested.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::engine::clock::SharedClock;
use crate::store::cache::LocalCache;
use crate::store::remote::{RemoteStore, data_path};
use crate::store::schema::{CacheEnvelope, RemoteEnvelope};

pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 30;

pub type Partialize<S> = Arc<dyn Fn(&S) -> serde_json::Result<Value> + Send + Sync>;
pub type Migrate<S> = Arc<dyn Fn(Value, u32) -> Result<S> + Send + Sync>;
pub type Merge<S> = Arc<dyn Fn(Value, &S) -> Result<S> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("'{name}' is stored at version {found} but expects {expected} and has no migration")]
    MissingMigration {
        name: String,
        found: u32,
        expected: u32,
    },

    #[error("migrating '{name}' from version {from} failed: {source}")]
    Migration {
        name: String,
        from: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("merging stored state into '{name}' failed: {source}")]
    Merge {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct PersistOptions<S> {
    pub name: String,
    pub user_id: Option<String>,
    pub version: u32,
    pub cache_ttl: chrono::Duration,
    pub partialize: Partialize<S>,
    pub migrate: Option<Migrate<S>>,
    pub merge: Merge<S>,
    pub skip_hydration: bool,
}

impl<S: Serialize + DeserializeOwned + 'static> PersistOptions<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_id: None,
            version: 0,
            cache_ttl: chrono::Duration::minutes(DEFAULT_CACHE_TTL_MINUTES),
            partialize: Arc::new(|state: &S| serde_json::to_value(state)),
            migrate: None,
            merge: Arc::new(|persisted: Value, current: &S| shallow_merge(persisted, current)),
            skip_hydration: false,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_partialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> serde_json::Result<Value> + Send + Sync + 'static,
    {
        self.partialize = Arc::new(f);
        self
    }

    pub fn with_migrate<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, u32) -> Result<S> + Send + Sync + 'static,
    {
        self.migrate = Some(Arc::new(f));
        self
    }

    pub fn with_merge<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &S) -> Result<S> + Send + Sync + 'static,
    {
        self.merge = Arc::new(f);
        self
    }

    pub fn skip_hydration(mut self, skip: bool) -> Self {
        self.skip_hydration = skip;
        self
    }

    pub fn remote_path(&self) -> String {
        data_path(self.user_id.as_deref(), &self.name)
    }
}

/// Overlay the top-level fields of `persisted` onto `current`.
pub fn shallow_merge<S: Serialize + DeserializeOwned>(persisted: Value, current: &S) -> Result<S> {
    let mut base = serde_json::to_value(current)?;
    match (&mut base, persisted) {
        (_, Value::Null) => {}
        (Value::Object(fields), Value::Object(overlay)) => fields.extend(overlay),
        (slot, other) => *slot = other,
    }
    Ok(serde_json::from_value(base)?)
}

enum Job {
    Write { path: String, doc: Value },
    Refresh { path: String, revision: u64 },
    Flush(mpsc::Sender<()>),
}

struct Refreshed {
    revision: u64,
    doc: Result<Option<Value>>,
}

fn spawn_writer(
    name: String,
    remote: Arc<dyn RemoteStore>,
    results: mpsc::Sender<Refreshed>,
) -> mpsc::Sender<Job> {
    let (tx, rx) = mpsc::channel::<Job>();
    thread::spawn(move || {
        while let Ok(job) = rx.recv() {
            match job {
                Job::Write { path, doc } => {
                    if let Err(e) = remote.set(&path, &doc) {
                        warn!(store = %name, %path, error = %e, "remote write failed");
                    }
                }
                Job::Refresh { path, revision } => {
                    let doc = remote.get(&path);
                    if results.send(Refreshed { revision, doc }).is_err() {
                        return;
                    }
                }
                Job::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    });
    tx
}

pub struct PersistedStore<S> {
    state: S,
    options: PersistOptions<S>,
    cache: Option<Arc<dyn LocalCache>>,
    clock: SharedClock,
    jobs: mpsc::Sender<Job>,
    refreshes: mpsc::Receiver<Refreshed>,
    revision: u64,
    hydrated: bool,
}

impl<S: Serialize + DeserializeOwned + 'static> PersistedStore<S> {
    /// Build a store without hydrating it.
    pub fn new(
        initial: S,
        options: PersistOptions<S>,
        cache: Option<Arc<dyn LocalCache>>,
        remote: Arc<dyn RemoteStore>,
        clock: SharedClock,
    ) -> Self {
        if cache.is_none() {
            warn!(
                store = %options.name,
                "local cache unavailable, state will not be persisted"
            );
        }
        let (results_tx, refreshes) = mpsc::channel();
        let jobs = spawn_writer(options.name.clone(), remote, results_tx);
        Self {
            state: initial,
            options,
            cache,
            clock,
            jobs,
            refreshes,
            revision: 0,
            hydrated: false,
        }
    }

    /// Build a store and hydrate it unless `skip_hydration` is set. A failed
    /// hydration is logged and leaves the initial state in place.
    pub fn open(
        initial: S,
        options: PersistOptions<S>,
        cache: Option<Arc<dyn LocalCache>>,
        remote: Arc<dyn RemoteStore>,
        clock: SharedClock,
    ) -> Self {
        let mut store = Self::new(initial, options, cache, remote, clock);
        if !store.options.skip_hydration
            && let Err(e) = store.rehydrate()
        {
            error!(store = %store.options.name, error = %e, "hydration failed");
        }
        store
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn options(&self) -> &PersistOptions<S> {
        &self.options
    }

    pub fn has_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Apply a mutation and persist the result.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut S) -> R) -> R {
        let out = f(&mut self.state);
        self.revision += 1;
        self.persist();
        out
    }

    pub fn replace(&mut self, state: S) {
        self.update(|s| *s = state);
    }

    fn persist(&self) {
        let Some(cache) = &self.cache else {
            debug!(store = %self.options.name, "skipping persist, no cache");
            return;
        };
        let state = match (self.options.partialize)(&self.state) {
            Ok(state) => state,
            Err(e) => {
                error!(store = %self.options.name, error = %e, "failed to serialize state");
                return;
            }
        };

        let entry = CacheEnvelope::new(
            state.clone(),
            self.options.version,
            self.clock.now(),
            self.options.cache_ttl,
        );
        if let Err(e) = cache.write(&self.options.name, &entry) {
            warn!(store = %self.options.name, error = %e, "cache write failed");
        }

        let doc = RemoteEnvelope {
            state,
            version: self.options.version,
        };
        match serde_json::to_value(&doc) {
            Ok(doc) => self.send(Job::Write {
                path: self.options.remote_path(),
                doc,
            }),
            Err(e) => error!(store = %self.options.name, error = %e, "failed to encode remote document"),
        }
    }

    fn send(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            warn!(store = %self.options.name, "persistence writer has stopped");
        }
    }

    fn request_refresh(&self) {
        debug!(store = %self.options.name, revision = self.revision, "requesting remote refresh");
        self.send(Job::Refresh {
            path: self.options.remote_path(),
            revision: self.revision,
        });
    }

    /// Restore state from the local cache, falling back to the remote store
    /// on a cache miss or an expired entry.
    pub fn rehydrate(&mut self) -> Result<(), PersistError> {
        self.hydrated = false;
        let Some(cache) = self.cache.clone() else {
            return Ok(());
        };

        let entry = match cache.read(&self.options.name) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(store = %self.options.name, error = %e, "unreadable cache entry, treating as a miss");
                None
            }
        };

        match entry {
            None => self.request_refresh(),
            Some(entry) if entry.version != self.options.version => {
                let migrated = self.migrate(entry.state, entry.version)?;
                self.state = self.merge(migrated)?;
                self.persist();
            }
            Some(entry) => {
                if entry.is_expired(self.clock.now()) {
                    self.request_refresh();
                }
                self.state = self.merge(entry.state)?;
            }
        }

        self.hydrated = true;
        debug!(store = %self.options.name, "hydrated");
        Ok(())
    }

    fn migrate(&self, state: Value, from: u32) -> Result<Value, PersistError> {
        let Some(migrate) = &self.options.migrate else {
            error!(
                store = %self.options.name,
                found = from,
                expected = self.options.version,
                "stored state cannot be migrated, no migrate function was provided"
            );
            return Err(PersistError::MissingMigration {
                name: self.options.name.clone(),
                found: from,
                expected: self.options.version,
            });
        };
        let migrated = migrate(state, from).map_err(|source| PersistError::Migration {
            name: self.options.name.clone(),
            from,
            source,
        })?;
        Ok(serde_json::to_value(&migrated)?)
    }

    fn merge(&self, persisted: Value) -> Result<S, PersistError> {
        (self.options.merge)(persisted, &self.state).map_err(|source| PersistError::Merge {
            name: self.options.name.clone(),
            source,
        })
    }

    /// Apply finished remote refreshes. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(Refreshed { revision, doc }) = self.refreshes.try_recv() {
            if revision != self.revision {
                debug!(
                    store = %self.options.name,
                    requested_at = revision,
                    current = self.revision,
                    "discarding stale refresh"
                );
                continue;
            }
            match doc {
                Ok(Some(doc)) => match self.apply_remote(doc) {
                    Ok(()) => applied += 1,
                    Err(e) => warn!(store = %self.options.name, error = %e, "remote refresh not applied"),
                },
                Ok(None) => debug!(store = %self.options.name, "no remote document"),
                Err(e) => warn!(store = %self.options.name, error = %e, "remote refresh failed"),
            }
        }
        applied
    }

    fn apply_remote(&mut self, doc: Value) -> Result<(), PersistError> {
        let remote: RemoteEnvelope = serde_json::from_value(doc)?;
        let state = if remote.version != self.options.version {
            self.migrate(remote.state, remote.version)?
        } else {
            remote.state
        };

        if let Some(cache) = &self.cache {
            let entry = CacheEnvelope::new(
                state.clone(),
                self.options.version,
                self.clock.now(),
                self.options.cache_ttl,
            );
            if let Err(e) = cache.write(&self.options.name, &entry) {
                warn!(store = %self.options.name, error = %e, "cache write failed");
            }
        }

        self.state = self.merge(state)?;
        Ok(())
    }

    /// Wait until every queued write and refresh has been handled, then
    /// apply finished refreshes.
    pub fn settle(&mut self, timeout: Duration) -> usize {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(Job::Flush(ack_tx));
        if ack_rx.recv_timeout(timeout).is_err() {
            warn!(store = %self.options.name, "timed out waiting for persistence writer");
        }
        self.poll()
    }

    /// Drop the local cache entry. The remote document is kept.
    pub fn clear_storage(&self) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.remove(&self.options.name)
        {
            warn!(store = %self.options.name, error = %e, "failed to clear cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::engine::clock::{Clock, ManualClock};
    use crate::store::cache::MemoryCache;
    use crate::store::remote::MemoryRemote;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Prefs {
        theme: String,
        size: u32,
        #[serde(skip)]
        scratch: u32,
    }

    struct Harness {
        cache: Arc<MemoryCache>,
        remote: Arc<MemoryRemote>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                cache: Arc::new(MemoryCache::new()),
                remote: Arc::new(MemoryRemote::new()),
                clock: Arc::new(ManualClock::new(
                    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                )),
            }
        }

        fn open(&self, options: PersistOptions<Prefs>) -> PersistedStore<Prefs> {
            PersistedStore::open(
                Prefs::default(),
                options,
                Some(self.cache.clone()),
                self.remote.clone(),
                self.clock.clone(),
            )
        }

        fn seed_cache(&self, state: Value, version: u32, expiry_offset_min: i64) {
            let entry = CacheEnvelope {
                state,
                version,
                cache_expiry: (self.clock.now() + chrono::Duration::minutes(expiry_offset_min))
                    .timestamp_millis(),
            };
            self.cache.write("prefs", &entry).unwrap();
        }

        fn seed_remote(&self, state: Value, version: u32) {
            self.remote
                .set(
                    "users/default/data/prefs",
                    &json!({"state": state, "version": version}),
                )
                .unwrap();
        }
    }

    #[test]
    fn mutation_writes_both_layers() {
        let h = Harness::new();
        let mut store = h.open(PersistOptions::new("prefs").with_version(2));
        store.settle(WAIT);

        store.update(|p| {
            p.theme = "dark".into();
            p.scratch = 9;
        });
        store.settle(WAIT);

        let entry = h.cache.read("prefs").unwrap().unwrap();
        assert_eq!(entry.version, 2);
        assert_eq!(entry.state["theme"], "dark");
        assert_eq!(
            entry.cache_expiry,
            (h.clock.now() + chrono::Duration::minutes(30)).timestamp_millis()
        );

        let doc = h.remote.get("users/default/data/prefs").unwrap().unwrap();
        assert_eq!(doc, json!({"state": {"theme": "dark", "size": 0}, "version": 2}));
    }

    #[test]
    fn remote_path_uses_user_id() {
        let h = Harness::new();
        let mut store = h.open(PersistOptions::new("prefs").with_user_id(Some("u7".into())));
        store.update(|p| p.size = 3);
        store.settle(WAIT);
        assert!(h.remote.get("users/u7/data/prefs").unwrap().is_some());
        assert!(h.remote.get("users/default/data/prefs").unwrap().is_none());
    }

    #[test]
    fn fresh_cache_hit_merges_without_refresh() {
        let h = Harness::new();
        h.seed_cache(json!({"theme": "cached"}), 0, 10);
        h.seed_remote(json!({"theme": "remote", "size": 5}), 0);

        let mut store = h.open(PersistOptions::new("prefs"));
        assert!(store.has_hydrated());
        assert_eq!(store.state().theme, "cached");

        assert_eq!(store.settle(WAIT), 0);
        assert_eq!(store.state().theme, "cached");
    }

    #[test]
    fn cache_miss_refreshes_from_remote() {
        let h = Harness::new();
        h.seed_remote(json!({"theme": "remote", "size": 5}), 0);

        let mut store = h.open(PersistOptions::new("prefs"));
        assert_eq!(store.state(), &Prefs::default());
        assert_eq!(store.settle(WAIT), 1);
        assert_eq!(store.state().size, 5);

        let entry = h.cache.read("prefs").unwrap().unwrap();
        assert_eq!(entry.state["theme"], "remote");
    }

    #[test]
    fn expired_cache_is_used_then_refreshed() {
        let h = Harness::new();
        h.seed_cache(json!({"theme": "cached", "size": 1}), 0, -1);
        h.seed_remote(json!({"theme": "remote"}), 0);

        let mut store = h.open(PersistOptions::new("prefs"));
        assert_eq!(store.state().theme, "cached");

        assert_eq!(store.settle(WAIT), 1);
        assert_eq!(store.state().theme, "remote");
        // shallow overlay keeps fields the remote document lacks
        assert_eq!(store.state().size, 1);
    }

    #[test]
    fn refresh_after_local_mutation_is_discarded() {
        let h = Harness::new();
        h.seed_cache(json!({"theme": "cached"}), 0, -1);
        h.seed_remote(json!({"theme": "remote"}), 0);

        let mut store = h.open(PersistOptions::new("prefs"));
        store.update(|p| p.theme = "local".into());

        assert_eq!(store.settle(WAIT), 0);
        assert_eq!(store.state().theme, "local");
        let doc = h.remote.get("users/default/data/prefs").unwrap().unwrap();
        assert_eq!(doc["state"]["theme"], "local");
    }

    #[test]
    fn version_mismatch_migrates_once_and_writes_back() {
        let h = Harness::new();
        h.seed_cache(json!({"colour": "blue"}), 1, 10);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let options = PersistOptions::new("prefs")
            .with_version(2)
            .with_migrate(move |old, from| {
                counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(from, 1);
                Ok(Prefs {
                    theme: old["colour"].as_str().unwrap_or_default().to_string(),
                    size: 12,
                    scratch: 0,
                })
            });

        let mut store = h.open(options);
        store.settle(WAIT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.state().theme, "blue");

        let entry = h.cache.read("prefs").unwrap().unwrap();
        assert_eq!(entry.version, 2);
        let doc = h.remote.get("users/default/data/prefs").unwrap().unwrap();
        assert_eq!(doc["version"], 2);
        assert_eq!(doc["state"]["size"], 12);
    }

    #[test]
    fn missing_migrator_keeps_defaults() {
        let h = Harness::new();
        h.seed_cache(json!({"theme": "old"}), 0, 10);

        let mut store = PersistedStore::new(
            Prefs::default(),
            PersistOptions::new("prefs").with_version(1),
            Some(h.cache.clone() as Arc<dyn LocalCache>),
            h.remote.clone(),
            h.clock.clone(),
        );
        let err = store.rehydrate().unwrap_err();
        assert!(matches!(
            err,
            PersistError::MissingMigration {
                found: 0,
                expected: 1,
                ..
            }
        ));
        assert_eq!(store.state(), &Prefs::default());
        assert!(!store.has_hydrated());
    }

    #[test]
    fn partialize_limits_persisted_fields() {
        let h = Harness::new();
        let options = PersistOptions::new("prefs").with_partialize(|p: &Prefs| {
            Ok(json!({"theme": p.theme}))
        });
        let mut store = h.open(options);
        store.update(|p| {
            p.theme = "light".into();
            p.size = 40;
        });
        store.settle(WAIT);

        let entry = h.cache.read("prefs").unwrap().unwrap();
        assert_eq!(entry.state, json!({"theme": "light"}));
    }

    #[test]
    fn custom_merge_is_used() {
        let h = Harness::new();
        h.seed_cache(json!({"theme": "cached", "size": 4}), 0, 10);
        let options = PersistOptions::new("prefs").with_merge(|_persisted, current: &Prefs| {
            Ok(current.clone())
        });
        let store = h.open(options);
        assert_eq!(store.state(), &Prefs::default());
    }

    #[test]
    fn skip_hydration_defers_until_rehydrate() {
        let h = Harness::new();
        h.seed_cache(json!({"theme": "cached"}), 0, 10);
        let mut store = h.open(PersistOptions::new("prefs").skip_hydration(true));
        assert!(!store.has_hydrated());
        assert_eq!(store.state().theme, "");

        store.rehydrate().unwrap();
        assert!(store.has_hydrated());
        assert_eq!(store.state().theme, "cached");
    }

    #[test]
    fn clear_storage_removes_cache_entry_only() {
        let h = Harness::new();
        let mut store = h.open(PersistOptions::new("prefs"));
        store.update(|p| p.size = 2);
        store.settle(WAIT);

        store.clear_storage();
        assert!(h.cache.read("prefs").unwrap().is_none());
        assert!(h.remote.get("users/default/data/prefs").unwrap().is_some());
    }

    #[test]
    fn unavailable_cache_runs_in_memory() {
        let h = Harness::new();
        let mut store = PersistedStore::open(
            Prefs::default(),
            PersistOptions::new("prefs"),
            None,
            h.remote.clone(),
            h.clock.clone(),
        );
        store.update(|p| p.theme = "x".into());
        store.settle(WAIT);
        assert_eq!(store.state().theme, "x");
        assert!(h.remote.is_empty());
    }

    struct Offline {
        reads: AtomicUsize,
        writes: AtomicUsize,
    }

    impl RemoteStore for Offline {
        fn get(&self, _path: &str) -> Result<Option<Value>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        }

        fn set(&self, _path: &str, _doc: &Value) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        }

        fn list(&self, _collection: &str) -> Result<Vec<(String, Value)>> {
            anyhow::bail!("connection refused")
        }

        fn delete(&self, _path: &str) -> Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn remote_failures_keep_local_state() {
        let h = Harness::new();
        let remote = Arc::new(Offline {
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        });
        let mut store = PersistedStore::open(
            Prefs::default(),
            PersistOptions::new("prefs"),
            Some(h.cache.clone()),
            remote.clone(),
            h.clock.clone(),
        );
        assert_eq!(store.settle(WAIT), 0);
        assert_eq!(remote.reads.load(Ordering::SeqCst), 1);
        assert_eq!(store.state(), &Prefs::default());

        store.update(|p| p.theme = "offline".into());
        assert_eq!(store.settle(WAIT), 0);
        assert_eq!(remote.writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.state().theme, "offline");
        assert_eq!(h.cache.read("prefs").unwrap().unwrap().state["theme"], "offline");

        // an expired entry asks the failing remote again
        h.clock.advance(chrono::Duration::minutes(31));
        store.rehydrate().unwrap();
        assert_eq!(store.settle(WAIT), 0);
        assert_eq!(remote.reads.load(Ordering::SeqCst), 2);
        assert_eq!(store.state().theme, "offline");
    }

    #[test]
    fn shallow_merge_overlays_top_level_fields() {
        let current = Prefs {
            theme: "a".into(),
            size: 1,
            scratch: 0,
        };
        let merged: Prefs = shallow_merge(json!({"size": 7}), &current).unwrap();
        assert_eq!(merged.theme, "a");
        assert_eq!(merged.size, 7);

        let untouched: Prefs = shallow_merge(Value::Null, &current).unwrap();
        assert_eq!(untouched, current);
    }
}
