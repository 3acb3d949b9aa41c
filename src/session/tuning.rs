use std::str::FromStr;

use rand::Rng;
use tracing::info;

use crate::model::exercise::{Exercises, OrderType, Scope, Target, TargetKind};
use crate::model::settings::{ExerciseSettings, Settings};
use crate::session::practice::PracticeSession;
use crate::store::persist::PersistedStore;
use crate::store::words::WordStatSource;

#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("auto skip time {0:?} is not \"m:ss\" or a number of minutes")]
    AutoSkipTime(String),
    #[error("wpm decay per day must be a finite number >= 0, got {0}")]
    Decay(f64),
    #[error("target percentage must be in (0, 1000], got {0}")]
    Percentage(f64),
    #[error("relative target must be a finite number, got {0}")]
    Relative(f64),
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("unknown scope {0:?}, expected \"all\", a word count or a percentage like \"25%\"")]
    Scope(String),
}

/// Changes to scheduling and scoring. `None` keeps the stored value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tuning {
    pub combinations: Option<usize>,
    pub repetitions: Option<usize>,
    pub order: Option<OrderType>,
    pub max_exercises: Option<usize>,
    pub max_exercises_enabled: Option<bool>,
    pub scope: Option<Scope>,
    pub target: Option<Target>,
    pub max_time_minutes: Option<u32>,
    pub max_time_enabled: Option<bool>,
    pub auto_skip_time: Option<String>,
    pub wpm_decay_per_day: Option<f64>,
    pub date_format: Option<String>,
}

impl Tuning {
    pub fn percentage_target(percentage: f64) -> Target {
        Target {
            selected: TargetKind::Percentage,
            percentage: Some(percentage),
            relative: None,
        }
    }

    pub fn relative_target(relative: f64) -> Target {
        Target {
            selected: TargetKind::Relative,
            percentage: None,
            relative: Some(relative),
        }
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        for (name, value) in [
            ("combinations", self.combinations),
            ("repetitions", self.repetitions),
            ("max exercises", self.max_exercises),
        ] {
            if value == Some(0) {
                return Err(TuningError::Zero(name));
            }
        }
        if self.max_time_minutes == Some(0) {
            return Err(TuningError::Zero("max time"));
        }
        if let Some(Scope::Worst(0)) | Some(Scope::WorstPercent(0)) = self.scope {
            return Err(TuningError::Zero("scope"));
        }
        if let Some(raw) = &self.auto_skip_time {
            let candidate = ExerciseSettings {
                auto_skip_time: raw.clone(),
                ..ExerciseSettings::default()
            };
            if candidate.auto_skip_duration().is_none() {
                return Err(TuningError::AutoSkipTime(raw.clone()));
            }
        }
        if let Some(decay) = self.wpm_decay_per_day
            && !(decay.is_finite() && decay >= 0.0)
        {
            return Err(TuningError::Decay(decay));
        }
        if let Some(target) = &self.target {
            match target.selected {
                TargetKind::Percentage => {
                    let p = target.percentage.unwrap_or(100.0);
                    if !(p > 0.0 && p <= 1000.0) {
                        return Err(TuningError::Percentage(p));
                    }
                }
                TargetKind::Relative => {
                    let r = target.relative.unwrap_or(0.0);
                    if !r.is_finite() {
                        return Err(TuningError::Relative(r));
                    }
                }
            }
        }
        Ok(())
    }

    fn touches_settings(&self) -> bool {
        self.auto_skip_time.is_some()
            || self.wpm_decay_per_day.is_some()
            || self.date_format.is_some()
    }

    fn touches_exercises(&self) -> bool {
        self.reschedules()
            || self.target.is_some()
            || self.max_time_minutes.is_some()
            || self.max_time_enabled.is_some()
    }

    /// Whether the stored batches no longer match the new scheduling.
    pub fn reschedules(&self) -> bool {
        self.combinations.is_some()
            || self.repetitions.is_some()
            || self.order.is_some()
            || self.max_exercises.is_some()
            || self.max_exercises_enabled.is_some()
            || self.scope.is_some()
            || self.wpm_decay_per_day.is_some()
    }

    pub fn apply_settings(&self, settings: &mut Settings) {
        if let Some(raw) = &self.auto_skip_time {
            settings.exercise.auto_skip_time = raw.trim().to_string();
        }
        if let Some(decay) = self.wpm_decay_per_day {
            settings.exercise.wpm_decay_per_day = decay;
        }
        if let Some(format) = &self.date_format {
            settings.locale.date_format = format.clone();
        }
    }

    pub fn apply_exercises(&self, exercises: &mut Exercises) {
        let generation = &mut exercises.generation;
        if let Some(n) = self.combinations {
            generation.combinations = n;
        }
        if let Some(n) = self.repetitions {
            generation.repetitions = n;
        }
        if let Some(order) = self.order {
            generation.order = order;
        }
        if let Some(n) = self.max_exercises {
            generation.max_exercises = n;
        }
        if let Some(enabled) = self.max_exercises_enabled {
            generation.max_exercises_enabled = enabled;
        }
        if let Some(scope) = self.scope {
            exercises.scope = scope;
        }
        if let Some(target) = self.target {
            exercises.target = target;
        }
        if let Some(minutes) = self.max_time_minutes {
            exercises.max_time.minutes = minutes;
        }
        if let Some(enabled) = self.max_time_enabled {
            exercises.max_time.enabled = enabled;
        }
    }
}

impl PracticeSession {
    /// Store new tuning and, when scheduling changed, lay out a fresh round.
    /// Returns whether the batches were regenerated.
    pub fn configure<R: Rng + ?Sized>(
        &mut self,
        tuning: &Tuning,
        exercises: &mut PersistedStore<Exercises>,
        settings: &mut PersistedStore<Settings>,
        stats: &dyn WordStatSource,
        rng: &mut R,
    ) -> Result<bool, TuningError> {
        tuning.validate()?;
        if tuning.touches_settings() {
            settings.update(|s| tuning.apply_settings(s));
        }
        if tuning.touches_exercises() {
            exercises.update(|ex| tuning.apply_exercises(ex));
        }
        info!(?tuning, "practice tuning changed");

        if !tuning.reschedules() {
            return Ok(false);
        }
        let now = self.now();
        self.regenerate(exercises, settings.state(), stats, rng, now);
        Ok(true)
    }
}

impl FromStr for Scope {
    type Err = TuningError;

    /// `all`, a word count such as `10`, or a percentage such as `25%`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Ok(Scope::All);
        }
        let invalid = || TuningError::Scope(s.to_string());
        match raw.strip_suffix('%') {
            Some(p) => {
                let p: u8 = p.trim().parse().map_err(|_| invalid())?;
                if p == 0 || p > 100 {
                    return Err(invalid());
                }
                Ok(Scope::WorstPercent(p))
            }
            None => raw.parse().map(Scope::Worst).map_err(|_| invalid()),
        }
    }
}
