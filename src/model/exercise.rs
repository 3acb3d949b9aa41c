use serde::{Deserialize, Serialize};

use crate::model::lesson::Lesson;

pub const EXERCISES_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    Slowest,
    Random,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    #[default]
    Percentage,
    #[serde(rename = "Fixed")]
    Relative,
}

/// Speed a word has to reach, relative to its best-ever speed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub selected: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<f64>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            selected: TargetKind::Percentage,
            percentage: Some(95.0),
            relative: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExerciseGeneration {
    pub combinations: usize,
    pub repetitions: usize,
    #[serde(default)]
    pub order: OrderType,
    #[serde(default = "default_max_exercises")]
    pub max_exercises: usize,
    #[serde(default)]
    pub max_exercises_enabled: bool,
}

fn default_max_exercises() -> usize {
    20
}

impl Default for ExerciseGeneration {
    fn default() -> Self {
        Self {
            combinations: 2,
            repetitions: 4,
            order: OrderType::Slowest,
            max_exercises: default_max_exercises(),
            max_exercises_enabled: false,
        }
    }
}

impl ExerciseGeneration {
    /// Clamp values that would make tiling degenerate.
    pub fn normalized(mut self) -> Self {
        self.combinations = self.combinations.max(1);
        self.repetitions = self.repetitions.max(1);
        self.max_exercises = self.max_exercises.max(1);
        self
    }
}

/// Which part of the ordered word list is scheduled at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    All,
    Worst(usize),
    WorstPercent(u8),
}

impl Scope {
    pub fn limit(self, len: usize) -> usize {
        match self {
            Scope::All => len,
            Scope::Worst(n) => n.min(len),
            Scope::WorstPercent(p) => {
                let p = usize::from(p.min(100));
                (len * p).div_ceil(100).min(len)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxTime {
    pub minutes: u32,
    pub enabled: bool,
}

impl Default for MaxTime {
    fn default() -> Self {
        Self {
            minutes: 10,
            enabled: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviousWord {
    pub word: String,
    pub wpm: f64,
    pub target_wpm: f64,
    pub is_highscore: bool,
}

/// Summary of the most recently finished (or skipped) batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviousExercise {
    pub met_target: bool,
    pub elapsed_time: String,
    pub words: Vec<PreviousWord>,
}

/// Persisted exercise progress for the selected lesson.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exercises {
    pub lesson: Lesson,
    pub all_exercises: Vec<Vec<String>>,
    pub current_exercise_index: usize,
    #[serde(default)]
    pub completed: bool,
    pub generation: ExerciseGeneration,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub max_time: MaxTime,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub previous_exercise: PreviousExercise,
}

impl Default for Exercises {
    fn default() -> Self {
        Self {
            lesson: Lesson::default(),
            all_exercises: Vec::new(),
            current_exercise_index: 0,
            completed: false,
            generation: ExerciseGeneration::default(),
            scope: Scope::All,
            max_time: MaxTime::default(),
            target: Target::default(),
            previous_exercise: PreviousExercise::default(),
        }
    }
}

impl Exercises {
    pub fn current_words(&self) -> &[String] {
        self.all_exercises
            .get(self.current_exercise_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Current batch words in first-appearance order, without repeats.
    pub fn unique_words(&self) -> Vec<String> {
        let mut unique: Vec<String> = Vec::new();
        for word in self.current_words() {
            if !unique.contains(word) {
                unique.push(word.clone());
            }
        }
        unique
    }

    pub fn set_all_exercises(&mut self, exercises: Vec<Vec<String>>) {
        self.all_exercises = exercises;
        self.current_exercise_index = 0;
        self.completed = false;
    }

    /// Move to the next batch, wrapping to the first one and flagging the
    /// set as completed after the last.
    pub fn next_exercise(&mut self) {
        if self.current_exercise_index + 1 < self.all_exercises.len() {
            self.current_exercise_index += 1;
        } else {
            self.current_exercise_index = 0;
            self.completed = true;
        }
    }
}
