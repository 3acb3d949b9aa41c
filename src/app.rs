use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};

use wordpace::config::Config;
use wordpace::engine::clock::{Clock, SharedClock, system_clock};
use wordpace::model::exercise::{EXERCISES_VERSION, Exercises};
use wordpace::model::lesson::{Lesson, default_lessons};
use wordpace::model::settings::{SETTINGS_VERSION, Settings, migrate_settings};
use wordpace::model::ui_layout::{UI_LAYOUT_VERSION, UiLayout};
use wordpace::session::{PracticeEvent, PracticeSession};
use wordpace::store::{
    DirRemote, FileCache, LessonStore, LocalCache, PersistOptions, PersistedStore, RemoteStore,
    RemoteWordStats,
};

use crate::ui::components::lesson_menu::LessonMenuState;
use crate::ui::theme::Theme;

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// The storage layers every store of one user shares.
pub struct Backends {
    clock: SharedClock,
    remote: Arc<dyn RemoteStore>,
    cache: Option<Arc<dyn LocalCache>>,
    user_id: Option<String>,
    cache_ttl: chrono::Duration,
}

impl Backends {
    pub fn new(config: &Config) -> Result<Self> {
        let remote: Arc<dyn RemoteStore> = Arc::new(DirRemote::new(config.remote_dir())?);
        let cache: Option<Arc<dyn LocalCache>> = match FileCache::new(config.cache_dir()) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                warn!(error = %e, dir = %config.cache_dir().display(), "local cache unavailable");
                None
            }
        };
        Ok(Self {
            clock: system_clock(),
            remote,
            cache,
            user_id: config.user(),
            cache_ttl: config.cache_ttl(),
        })
    }

    fn options<S>(&self, name: &str, version: u32) -> PersistOptions<S>
    where
        S: serde::Serialize + serde::de::DeserializeOwned + 'static,
    {
        PersistOptions::new(name)
            .with_user_id(self.user_id.clone())
            .with_version(version)
            .with_cache_ttl(self.cache_ttl)
    }

    fn open<S>(&self, initial: S, options: PersistOptions<S>) -> PersistedStore<S>
    where
        S: serde::Serialize + serde::de::DeserializeOwned + 'static,
    {
        let mut store = PersistedStore::open(
            initial,
            options,
            self.cache.clone(),
            self.remote.clone(),
            self.clock.clone(),
        );
        // pick up the remote copy on a cache miss before the first frame
        store.settle(SETTLE_TIMEOUT);
        store
    }

    pub fn settings_store(&self) -> PersistedStore<Settings> {
        let options = self
            .options("settings", SETTINGS_VERSION)
            .with_migrate(migrate_settings);
        self.open(Settings::default(), options)
    }

    pub fn exercise_store(&self) -> PersistedStore<Exercises> {
        self.open(
            Exercises::default(),
            self.options("exercise", EXERCISES_VERSION),
        )
    }

    pub fn ui_layout_store(&self) -> PersistedStore<UiLayout> {
        self.open(
            UiLayout::default(),
            self.options("ui-layout", UI_LAYOUT_VERSION),
        )
    }

    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    pub fn word_stats(&self) -> RemoteWordStats {
        RemoteWordStats::new(self.remote.clone(), self.user_id.clone(), self.clock.clone())
    }

    pub fn lesson_store(&self) -> LessonStore {
        LessonStore::new(self.remote.clone(), self.user_id.clone())
    }
}

pub struct App {
    pub theme: Theme,
    pub settings: PersistedStore<Settings>,
    pub exercises: PersistedStore<Exercises>,
    pub layout: PersistedStore<UiLayout>,
    pub word_stats: RemoteWordStats,
    pub lessons: Vec<Lesson>,
    pub lesson_menu: LessonMenuState,
    pub session: PracticeSession,
    pub status: Option<String>,
    pub should_quit: bool,
    time_limit_noted: bool,
    clock: SharedClock,
    rng: SmallRng,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let backends = Backends::new(config)?;
        let theme = Theme::load(&config.theme);

        let lessons = match backends.lesson_store().list() {
            Ok(lessons) => lessons,
            Err(e) => {
                warn!(error = %e, "failed to list lessons, showing built-in ones");
                default_lessons()
            }
        };

        let mut app = Self {
            settings: backends.settings_store(),
            exercises: backends.exercise_store(),
            layout: backends.ui_layout_store(),
            word_stats: backends.word_stats(),
            session: PracticeSession::new(backends.clock()),
            lessons,
            lesson_menu: LessonMenuState::default(),
            status: None,
            should_quit: false,
            time_limit_noted: false,
            clock: backends.clock(),
            rng: SmallRng::from_entropy(),
            theme,
        };

        app.lesson_menu.selected = app.active_lesson().unwrap_or(0);
        if app.exercises.state().all_exercises.is_empty() {
            app.regenerate();
        } else {
            app.session.load(app.exercises.state(), &app.word_stats);
        }
        info!(
            lesson = %app.exercises.state().lesson.title,
            batches = app.exercises.state().all_exercises.len(),
            "practice ready"
        );
        Ok(app)
    }

    /// Index of the stored lesson in the menu list.
    pub fn active_lesson(&self) -> Option<usize> {
        let current = &self.exercises.state().lesson;
        self.lessons.iter().position(|l| match (&l.id, &current.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => l.title == current.title,
            _ => false,
        })
    }

    pub fn menu_open(&self) -> bool {
        self.layout.state().lesson_menu_open
    }

    pub fn regenerate(&mut self) {
        let now = self.clock.now();
        self.session.regenerate(
            &mut self.exercises,
            self.settings.state(),
            &self.word_stats,
            &mut self.rng,
            now,
        );
        self.time_limit_noted = false;
    }

    pub fn on_tick(&mut self) {
        self.settings.poll();
        self.layout.poll();
        if self.exercises.poll() > 0 {
            info!("exercise progress refreshed from remote");
            self.session.load(self.exercises.state(), &self.word_stats);
        }

        if let Some(skipped) =
            self.session
                .tick(&mut self.exercises, self.settings.state(), &self.word_stats)
        {
            self.status = Some(format!("Skipped after {}", skipped.elapsed_time));
            self.regenerate_if_completed();
        }

        let max_time = self.exercises.state().max_time;
        if max_time.enabled
            && !self.time_limit_noted
            && self.session.timer().total_elapsed()
                >= Duration::from_secs(u64::from(max_time.minutes) * 60)
        {
            self.time_limit_noted = true;
            self.status = Some(format!("{} minute practice limit reached", max_time.minutes));
        }
    }

    pub fn type_char(&mut self, ch: char) {
        let event = self
            .session
            .type_char(ch, &mut self.exercises, &self.word_stats);
        self.handle_event(event);
    }

    pub fn backspace(&mut self) {
        let event = self.session.backspace(&mut self.exercises, &self.word_stats);
        self.handle_event(event);
    }

    pub fn paste(&mut self, text: &str) {
        let value = format!("{}{}", self.session.input(), text.trim_end_matches(['\r', '\n']));
        let event = self
            .session
            .set_input(&value, &mut self.exercises, &self.word_stats);
        self.handle_event(event);
    }

    pub fn reset_input(&mut self) {
        self.session.reset_input();
    }

    fn handle_event(&mut self, event: PracticeEvent) {
        match event {
            PracticeEvent::Retry => {
                self.status = Some("A mistake was made, type it once more".to_string());
            }
            PracticeEvent::Missed(attempt) => {
                self.status = Some(format!(
                    "Target missed by {:.1} WPM, try again",
                    attempt.total_shortfall()
                ));
            }
            PracticeEvent::Unevaluated => {
                self.status = Some("Word stats unavailable, attempt not scored".to_string());
            }
            PracticeEvent::Completed(previous) => {
                self.status = Some(format!("Target met in {}", previous.elapsed_time));
                self.regenerate_if_completed();
            }
            PracticeEvent::Ignored
            | PracticeEvent::Typing
            | PracticeEvent::Wrong
            | PracticeEvent::Stale => {}
        }
    }

    /// After the last batch a fresh round is scheduled from the new stats.
    fn regenerate_if_completed(&mut self) {
        if self.exercises.state().completed {
            info!("all batches done, scheduling a new round");
            self.regenerate();
        }
    }

    pub fn toggle_lesson_menu(&mut self) {
        self.layout
            .update(|layout| layout.lesson_menu_open = !layout.lesson_menu_open);
        if self.menu_open() {
            self.lesson_menu.selected = self.active_lesson().unwrap_or(0);
        }
    }

    pub fn menu_next(&mut self) {
        self.lesson_menu.next(self.lessons.len());
    }

    pub fn menu_prev(&mut self) {
        self.lesson_menu.prev(self.lessons.len());
    }

    pub fn select_lesson(&mut self) {
        self.lesson_menu.clamp(self.lessons.len());
        let Some(lesson) = self.lessons.get(self.lesson_menu.selected).cloned() else {
            return;
        };
        let title = lesson.title.clone();
        self.session.select_lesson(
            &mut self.exercises,
            lesson,
            self.settings.state(),
            &self.word_stats,
            &mut self.rng,
        );
        self.time_limit_noted = false;
        self.status = Some(format!("Practicing {title}"));
        self.layout.update(|layout| layout.lesson_menu_open = false);
    }

    /// Wait for queued remote writes before exiting.
    pub fn shutdown(&mut self) {
        self.settings.settle(SETTLE_TIMEOUT);
        self.exercises.settle(SETTLE_TIMEOUT);
        self.layout.settle(SETTLE_TIMEOUT);
        info!("stores settled");
    }
}
