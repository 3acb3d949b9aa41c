use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::engine::clock::SharedClock;
use crate::engine::scheduler::Scheduler;
use crate::engine::target::{AttemptEvaluation, BestAttempt, WordAttempt, calculate_target_wpm, round1};
use crate::engine::timer::ExerciseTimer;
use crate::engine::wpm::WpmTracker;
use crate::model::exercise::{Exercises, PreviousExercise, PreviousWord, Target};
use crate::model::lesson::Lesson;
use crate::model::settings::Settings;
use crate::model::word::WordStat;
use crate::session::input::{InputBuffer, InputStatus, InputUpdate};
use crate::store::persist::PersistedStore;
use crate::store::words::WordStatSource;

/// Identifies the batch a completion check was started under.
pub type BatchId = u64;

#[derive(Clone, Debug, PartialEq)]
pub enum PracticeEvent {
    Ignored,
    Typing,
    Wrong,
    /// Text finished after a mistake; cleared for another go.
    Retry,
    /// Text finished but the batch's stats were unavailable.
    Unevaluated,
    Missed(AttemptEvaluation),
    Completed(PreviousExercise),
    /// Check belonged to a batch that has since been replaced.
    Stale,
}

/// Drives one learner through the batches of the `exercise` store.
pub struct PracticeSession {
    clock: SharedClock,
    tracker: WpmTracker,
    timer: ExerciseTimer,
    input: InputBuffer,
    best: BestAttempt,
    words: Vec<String>,
    stats: Option<Vec<WordStat>>,
    chorded: bool,
    batch: BatchId,
}

impl PracticeSession {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            tracker: WpmTracker::new(clock.clone()),
            timer: ExerciseTimer::new(clock.clone()),
            clock,
            input: InputBuffer::default(),
            best: BestAttempt::default(),
            words: Vec::new(),
            stats: None,
            chorded: false,
            batch: 0,
        }
    }

    /// Prepare the current batch of `exercises` for typing.
    pub fn load(&mut self, exercises: &Exercises, stats: &dyn WordStatSource) {
        let lesson = &exercises.lesson;
        let sequence = exercises.current_words();
        let text = lesson.exercise_text(sequence);

        self.batch += 1;
        self.chorded = lesson.is_chorded();
        self.tracker.set_delimiter(lesson.delimiter());
        self.tracker.set_exercise(&text, sequence);
        self.input = InputBuffer::new(&text);
        self.best = BestAttempt::default();
        self.timer.reset_exercise();
        self.words = exercises.unique_words();
        self.stats = match stats.fetch(&self.words) {
            Ok(fetched) if fetched.len() == self.words.len() => Some(fetched),
            Ok(fetched) => {
                warn!(
                    requested = self.words.len(),
                    received = fetched.len(),
                    "incomplete word stats for batch"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "failed to load word stats for batch");
                None
            }
        };
        debug!(batch = self.batch, words = self.words.len(), "batch loaded");
    }

    /// Schedule a fresh set of batches for the stored lesson.
    pub fn regenerate<R: Rng + ?Sized>(
        &mut self,
        store: &mut PersistedStore<Exercises>,
        settings: &Settings,
        stats: &dyn WordStatSource,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> BatchId {
        let state = store.state();
        let scheduler = Scheduler::new(
            state.generation,
            state.scope,
            settings.exercise.wpm_decay_per_day,
        )
        .chorded(state.lesson.is_chorded());
        let batches = scheduler.generate(&state.lesson.words, stats, rng, now);
        info!(
            lesson = %state.lesson.title,
            batches = batches.len(),
            "exercises regenerated"
        );
        store.update(|ex| ex.set_all_exercises(batches));
        self.load(store.state(), stats);
        self.batch
    }

    pub fn select_lesson<R: Rng + ?Sized>(
        &mut self,
        store: &mut PersistedStore<Exercises>,
        lesson: Lesson,
        settings: &Settings,
        stats: &dyn WordStatSource,
        rng: &mut R,
    ) -> BatchId {
        store.update(|ex| ex.lesson = lesson);
        let now = self.now();
        self.regenerate(store, settings, stats, rng, now)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch
    }

    pub fn text(&self) -> &str {
        self.input.target()
    }

    pub fn input(&self) -> &str {
        self.input.value()
    }

    pub fn is_wrong(&self) -> bool {
        self.input.is_wrong()
    }

    pub fn had_error(&self) -> bool {
        self.input.had_error()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn timer(&self) -> &ExerciseTimer {
        &self.timer
    }

    pub fn best_attempt(&self) -> &BestAttempt {
        &self.best
    }

    pub fn wpm(&self) -> f64 {
        self.tracker.wpm()
    }

    pub fn word_wpm(&self, word: &str) -> f64 {
        self.tracker.word_wpm(word, self.chorded)
    }

    /// Target speed per unique word. Zero when stats are unavailable.
    pub fn targets(&self, target: &Target) -> Vec<f64> {
        match &self.stats {
            Some(stats) => stats
                .iter()
                .map(|s| calculate_target_wpm(target, s.highest_wpm(self.chorded)))
                .collect(),
            None => vec![0.0; self.words.len()],
        }
    }

    /// Escape/Tab: start the current text over.
    pub fn reset_input(&mut self) {
        self.input.reset();
    }

    pub fn type_char(
        &mut self,
        ch: char,
        store: &mut PersistedStore<Exercises>,
        stats: &dyn WordStatSource,
    ) -> PracticeEvent {
        let update = self.input.process_char(ch);
        self.apply(update, store, stats)
    }

    pub fn backspace(
        &mut self,
        store: &mut PersistedStore<Exercises>,
        stats: &dyn WordStatSource,
    ) -> PracticeEvent {
        let update = self.input.process_backspace();
        self.apply(update, store, stats)
    }

    /// Replace the whole typed buffer.
    pub fn set_input(
        &mut self,
        value: &str,
        store: &mut PersistedStore<Exercises>,
        stats: &dyn WordStatSource,
    ) -> PracticeEvent {
        let update = self.input.set_value(value);
        self.apply(update, store, stats)
    }

    fn apply(
        &mut self,
        update: InputUpdate,
        store: &mut PersistedStore<Exercises>,
        stats: &dyn WordStatSource,
    ) -> PracticeEvent {
        if update.status == InputStatus::Ignored {
            return PracticeEvent::Ignored;
        }
        if let Some(index) = update.confirmed {
            self.tracker.update_char_time(index);
        }
        self.timer.key_pressed();

        match update.status {
            InputStatus::Ignored => PracticeEvent::Ignored,
            InputStatus::Typing => PracticeEvent::Typing,
            InputStatus::Wrong => PracticeEvent::Wrong,
            InputStatus::Retry => PracticeEvent::Retry,
            InputStatus::Complete => self.evaluate(self.batch, store, stats),
        }
    }

    /// Check the attempt just finished on batch `batch` against the targets.
    pub fn evaluate(
        &mut self,
        batch: BatchId,
        store: &mut PersistedStore<Exercises>,
        stats: &dyn WordStatSource,
    ) -> PracticeEvent {
        if batch != self.batch {
            debug!(batch, current = self.batch, "ignoring completion for replaced batch");
            return PracticeEvent::Stale;
        }
        let Some(known) = self.stats.clone() else {
            warn!("word stats unavailable, attempt not evaluated");
            return PracticeEvent::Unevaluated;
        };

        let target = store.state().target;
        let attempt = AttemptEvaluation::new(
            self.words
                .iter()
                .zip(&known)
                .map(|(word, stat)| WordAttempt {
                    word: word.clone(),
                    wpm: self.tracker.word_wpm(word, self.chorded),
                    target_wpm: calculate_target_wpm(&target, stat.highest_wpm(self.chorded)),
                })
                .collect(),
        );

        if !attempt.met_target() {
            if self.best.consider(&attempt) {
                debug!(shortfall = attempt.total_shortfall(), "new best attempt");
            }
            return PracticeEvent::Missed(attempt);
        }

        let now = self.clock.now();
        let mut words = Vec::with_capacity(attempt.words.len());
        for (result, stat) in attempt.words.iter().zip(known) {
            let mut stat = stat;
            words.push(PreviousWord {
                word: result.word.clone(),
                wpm: round1(result.wpm),
                target_wpm: round1(result.target_wpm),
                is_highscore: result.wpm > stat.highest_wpm(self.chorded),
            });
            stat.record(result.wpm, self.chorded, now);
            if let Err(e) = stats.save(&stat) {
                warn!(word = %stat.word, error = %e, "failed to save word stats");
            }
        }

        let previous = PreviousExercise {
            met_target: true,
            elapsed_time: self.timer.elapsed_time(),
            words,
        };
        info!(elapsed = %previous.elapsed_time, "exercise completed");
        self.advance(store, stats, previous.clone());
        PracticeEvent::Completed(previous)
    }

    /// Advance the timer; skips the batch once it ran past the configured
    /// auto-skip time.
    pub fn tick(
        &mut self,
        store: &mut PersistedStore<Exercises>,
        settings: &Settings,
        stats: &dyn WordStatSource,
    ) -> Option<PreviousExercise> {
        self.timer.tick();
        let limit = settings.exercise.auto_skip_duration()?;
        if self.words.is_empty() || self.timer.elapsed() < limit {
            return None;
        }

        let targets = self.targets(&store.state().target);
        let words = self
            .words
            .iter()
            .zip(targets)
            .map(|(word, target_wpm)| PreviousWord {
                word: word.clone(),
                wpm: round1(self.best.wpm_for(word)),
                target_wpm: round1(target_wpm),
                is_highscore: false,
            })
            .collect();
        let previous = PreviousExercise {
            met_target: false,
            elapsed_time: self.timer.elapsed_time(),
            words,
        };
        info!(elapsed = %previous.elapsed_time, "exercise auto-skipped");
        self.advance(store, stats, previous.clone());
        Some(previous)
    }

    fn advance(
        &mut self,
        store: &mut PersistedStore<Exercises>,
        stats: &dyn WordStatSource,
        previous: PreviousExercise,
    ) {
        store.update(|ex| {
            ex.previous_exercise = previous;
            ex.next_exercise();
        });
        self.load(store.state(), stats);
    }
}
