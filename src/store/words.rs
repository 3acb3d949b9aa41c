use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::engine::clock::SharedClock;
use crate::model::word::WordStat;
use crate::store::remote::{RemoteStore, user_segment};

/// Per-word speed history.
pub trait WordStatSource {
    /// One stat per requested word, same order. Words never practiced come
    /// back as zero stats.
    fn fetch(&self, words: &[String]) -> Result<Vec<WordStat>>;
    fn save(&self, stat: &WordStat) -> Result<()>;
}

/// Word documents at `users/<uid>/words/<sha256(word)>`.
pub struct RemoteWordStats {
    remote: Arc<dyn RemoteStore>,
    user_id: Option<String>,
    clock: SharedClock,
}

impl RemoteWordStats {
    pub fn new(remote: Arc<dyn RemoteStore>, user_id: Option<String>, clock: SharedClock) -> Self {
        Self {
            remote,
            user_id,
            clock,
        }
    }

    fn collection(&self) -> String {
        format!("users/{}/words", user_segment(self.user_id.as_deref()))
    }

    fn doc_path(&self, word: &str) -> String {
        format!("{}/{}", self.collection(), WordStat::hash(word))
    }

    /// Every stored word, for listings.
    pub fn all(&self) -> Result<Vec<WordStat>> {
        let now = self.clock.now();
        let mut stats = Vec::new();
        for (id, doc) in self.remote.list(&self.collection())? {
            match WordStat::from_document(doc, now) {
                Ok(stat) => stats.push(stat),
                Err(e) => warn!(%id, error = %e, "skipping unreadable word document"),
            }
        }
        stats.sort_by(|a, b| a.word.cmp(&b.word));
        Ok(stats)
    }
}

impl WordStatSource for RemoteWordStats {
    fn fetch(&self, words: &[String]) -> Result<Vec<WordStat>> {
        let now = self.clock.now();
        words
            .iter()
            .map(|word| {
                let doc = self
                    .remote
                    .get(&self.doc_path(word))
                    .with_context(|| format!("reading word document for {word:?}"))?;
                Ok(match doc {
                    Some(doc) => WordStat::from_document(doc, now).unwrap_or_else(|e| {
                        warn!(%word, error = %e, "unreadable word document, starting from zero");
                        WordStat::new(word, now)
                    }),
                    None => WordStat::new(word, now),
                })
            })
            .collect()
    }

    fn save(&self, stat: &WordStat) -> Result<()> {
        let doc = serde_json::to_value(stat)?;
        self.remote.set(&self.doc_path(&stat.word), &doc)
    }
}
