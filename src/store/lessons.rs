use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::lesson::{Lesson, default_lessons};
use crate::store::remote::RemoteStore;

/// Lesson documents at `users/<uid>/lessons/<id>`.
pub struct LessonStore {
    remote: Arc<dyn RemoteStore>,
    user_id: Option<String>,
}

impl LessonStore {
    pub fn new(remote: Arc<dyn RemoteStore>, user_id: Option<String>) -> Self {
        Self {
            remote,
            user_id: user_id.filter(|u| !u.is_empty()),
        }
    }

    fn collection(uid: &str) -> String {
        format!("users/{uid}/lessons")
    }

    /// Built-in lessons, followed by the user's own when signed in.
    pub fn list(&self) -> Result<Vec<Lesson>> {
        let mut lessons = default_lessons();
        let Some(uid) = &self.user_id else {
            return Ok(lessons);
        };

        for (id, doc) in self.remote.list(&Self::collection(uid))? {
            match serde_json::from_value::<Lesson>(doc) {
                Ok(mut lesson) => {
                    lesson.id = Some(id);
                    lessons.push(lesson);
                }
                Err(e) => warn!(%id, error = %e, "skipping unreadable lesson"),
            }
        }
        Ok(lessons)
    }

    /// Store a lesson. New lessons get a fresh id and are marked custom.
    pub fn upsert(&self, lesson: &Lesson) -> Result<Lesson> {
        let Some(uid) = &self.user_id else {
            bail!("saving lessons requires a user id");
        };

        let mut stored = lesson.clone();
        let id = match stored.id.take() {
            Some(id) => id,
            None => {
                stored.custom = true;
                Uuid::new_v4().to_string()
            }
        };

        let path = format!("{}/{id}", Self::collection(uid));
        let doc = serde_json::to_value(&stored)?;
        self.remote
            .set(&path, &doc)
            .with_context(|| format!("saving lesson {:?}", stored.title))?;
        info!(%id, title = %stored.title, "lesson saved");

        stored.id = Some(id);
        Ok(stored)
    }
}
