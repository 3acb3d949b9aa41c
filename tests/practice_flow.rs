use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tempfile::TempDir;

use wordpace::engine::clock::{Clock, ManualClock};
use wordpace::model::exercise::{EXERCISES_VERSION, ExerciseGeneration, Exercises};
use wordpace::model::lesson::Lesson;
use wordpace::model::settings::Settings;
use wordpace::session::{PracticeEvent, PracticeSession};
use wordpace::store::{
    DirRemote, FileCache, LessonStore, PersistOptions, PersistedStore, RemoteWordStats,
};

const WAIT: Duration = Duration::from_secs(5);

struct World {
    _dir: TempDir,
    cache: Arc<FileCache>,
    remote: Arc<DirRemote>,
    clock: Arc<ManualClock>,
}

impl World {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            cache: Arc::new(FileCache::new(dir.path().join("cache")).unwrap()),
            remote: Arc::new(DirRemote::new(dir.path().join("remote")).unwrap()),
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 9, 2, 18, 30, 0).unwrap(),
            )),
            _dir: dir,
        }
    }

    fn exercises(&self) -> PersistedStore<Exercises> {
        let mut initial = Exercises::default();
        initial.generation = ExerciseGeneration {
            combinations: 1,
            repetitions: 1,
            ..ExerciseGeneration::default()
        };
        let mut store = PersistedStore::open(
            initial,
            PersistOptions::new("exercise")
                .with_user_id(Some("ada".into()))
                .with_version(EXERCISES_VERSION),
            Some(self.cache.clone()),
            self.remote.clone(),
            self.clock.clone(),
        );
        store.settle(WAIT);
        store
    }

    fn stats(&self) -> RemoteWordStats {
        RemoteWordStats::new(self.remote.clone(), Some("ada".into()), self.clock.clone())
    }

    fn type_text(
        &self,
        session: &mut PracticeSession,
        store: &mut PersistedStore<Exercises>,
        stats: &RemoteWordStats,
        gap_ms: i64,
    ) -> PracticeEvent {
        let text = session.text().to_string();
        let mut last = PracticeEvent::Ignored;
        for (i, ch) in text.chars().enumerate() {
            if i > 0 {
                self.clock.advance_ms(gap_ms);
            }
            last = session.type_char(ch, store, stats);
        }
        last
    }
}

#[test]
fn weakest_word_comes_first_after_a_round() {
    let world = World::new();
    let lessons = LessonStore::new(world.remote.clone(), Some("ada".into()));
    let saved = lessons
        .upsert(&Lesson::new_custom(
            "pets",
            vec!["cat".to_string(), "dog".to_string()],
        ))
        .unwrap();
    assert!(saved.custom);
    let listed = lessons.list().unwrap();
    assert_eq!(listed.last().map(|l| &l.id), Some(&saved.id));

    let stats = world.stats();
    let settings = Settings::default();
    let mut store = world.exercises();
    let mut session = PracticeSession::new(world.clock.clone());
    session.select_lesson(
        &mut store,
        saved.clone(),
        &settings,
        &stats,
        &mut SmallRng::seed_from_u64(11),
    );
    assert_eq!(
        store.state().all_exercises,
        vec![vec!["cat".to_string()], vec!["dog".to_string()]]
    );

    // 2 timed characters in 0.2 s is 120 WPM
    assert_eq!(session.text(), "cat");
    let first = world.type_text(&mut session, &mut store, &stats, 100);
    assert!(matches!(first, PracticeEvent::Completed(_)));

    world.clock.advance_ms(2_000);
    assert_eq!(session.text(), "dog");
    let second = world.type_text(&mut session, &mut store, &stats, 300);
    let previous = match second {
        PracticeEvent::Completed(previous) => previous,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(previous.words[0].word, "dog");
    assert_eq!(previous.words[0].wpm, 40.0);
    assert!(store.state().completed);

    let recorded = stats.all().unwrap();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].word, "cat");
    assert!((recorded[0].highest.wpm - 120.0).abs() < 0.01);

    world.clock.advance_ms(2_000);
    let now = world.clock.now();
    session.regenerate(
        &mut store,
        &settings,
        &stats,
        &mut SmallRng::seed_from_u64(11),
        now,
    );
    assert_eq!(store.state().current_words(), ["dog".to_string()]);
    assert!(!store.state().completed);
    store.settle(WAIT);

    let reopened = world.exercises();
    assert_eq!(reopened.state().lesson.id, saved.id);
    assert_eq!(reopened.state().all_exercises, store.state().all_exercises);
    assert_eq!(reopened.state().previous_exercise, previous);
}

#[test]
fn other_users_do_not_see_stats() {
    let world = World::new();
    let stats = world.stats();
    let settings = Settings::default();
    let mut store = world.exercises();
    let mut session = PracticeSession::new(world.clock.clone());
    session.select_lesson(
        &mut store,
        Lesson::new_custom("solo", vec!["ox".to_string()]),
        &settings,
        &stats,
        &mut SmallRng::seed_from_u64(2),
    );
    world.type_text(&mut session, &mut store, &stats, 150);
    assert_eq!(stats.all().unwrap().len(), 1);

    let stranger = RemoteWordStats::new(world.remote.clone(), Some("bob".into()), world.clock.clone());
    assert!(stranger.all().unwrap().is_empty());
}
