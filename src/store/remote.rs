use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Durable per-user document store. Paths are slash-separated, e.g.
/// `users/default/data/settings`.
pub trait RemoteStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<Value>>;
    fn set(&self, path: &str, doc: &Value) -> Result<()>;
    /// Documents directly under `collection`, keyed by their last path segment.
    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>>;
    fn delete(&self, path: &str) -> Result<()>;
}

pub fn user_segment(user_id: Option<&str>) -> &str {
    user_id.filter(|u| !u.is_empty()).unwrap_or("default")
}

pub fn data_path(user_id: Option<&str>, name: &str) -> String {
    format!("users/{}/data/{name}", user_segment(user_id))
}

fn check_path(path: &str) -> Result<()> {
    if path.is_empty()
        || path
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        bail!("invalid document path: {path:?}");
    }
    Ok(())
}

/// One JSON file per document under a base directory.
pub struct DirRemote {
    base_dir: PathBuf,
}

impl DirRemote {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("creating {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_path(&self, path: &str) -> Result<PathBuf> {
        check_path(path)?;
        Ok(self.base_dir.join(format!("{path}.json")))
    }
}

impl RemoteStore for DirRemote {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        let file = self.file_path(path)?;
        if !file.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
        let doc = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", file.display()))?;
        Ok(Some(doc))
    }

    fn set(&self, path: &str, doc: &Value) -> Result<()> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = file.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(doc)?;
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &file)?;
        Ok(())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        check_path(collection)?;
        let dir = self.base_dir.join(collection);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut docs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|x| x.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path)?;
            let doc = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            docs.push((id.to_string(), doc));
        }
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(docs)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let file = self.file_path(path)?;
        if file.exists() {
            fs::remove_file(&file)?;
        }
        Ok(())
    }
}

/// In-process store, used by tests.
#[derive(Default)]
pub struct MemoryRemote {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RemoteStore for MemoryRemote {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        check_path(path)?;
        let docs = self.docs.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(docs.get(path).cloned())
    }

    fn set(&self, path: &str, doc: &Value) -> Result<()> {
        check_path(path)?;
        let mut docs = self.docs.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        docs.insert(path.to_string(), doc.clone());
        Ok(())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        check_path(collection)?;
        let prefix = format!("{collection}/");
        let docs = self.docs.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(docs
            .iter()
            .filter_map(|(path, doc)| {
                let id = path.strip_prefix(&prefix)?;
                (!id.contains('/')).then(|| (id.to_string(), doc.clone()))
            })
            .collect())
    }

    fn delete(&self, path: &str) -> Result<()> {
        check_path(path)?;
        let mut docs = self.docs.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        docs.remove(path);
        Ok(())
    }
}
