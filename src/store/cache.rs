use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};

use crate::store::schema::CacheEnvelope;

/// Fast local layer, one slot per store name.
pub trait LocalCache: Send + Sync {
    fn read(&self, name: &str) -> Result<Option<CacheEnvelope>>;
    fn write(&self, name: &str, entry: &CacheEnvelope) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
}

pub struct FileCache {
    base_dir: PathBuf,
}

impl FileCache {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("creating cache dir {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.json"))
    }
}

impl LocalCache for FileCache {
    fn read(&self, name: &str) -> Result<Option<CacheEnvelope>> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let entry = serde_json::from_str(&content)
            .with_context(|| format!("parsing cache entry {}", path.display()))?;
        Ok(Some(entry))
    }

    fn write(&self, name: &str, entry: &CacheEnvelope) -> Result<()> {
        let path = self.file_path(name);
        let tmp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(entry)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.file_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEnvelope>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn read(&self, name: &str) -> Result<Option<CacheEnvelope>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        Ok(entries.get(name).cloned())
    }

    fn write(&self, name: &str, entry: &CacheEnvelope) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        entries.insert(name.to_string(), entry.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("cache lock poisoned"))?;
        entries.remove(name);
        Ok(())
    }
}
