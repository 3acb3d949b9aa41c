pub mod exercise;
pub mod lesson;
pub mod settings;
pub mod ui_layout;
pub mod word;

pub use exercise::{
    ExerciseGeneration, Exercises, MaxTime, OrderType, PreviousExercise, PreviousWord, Scope,
    Target, TargetKind,
};
pub use lesson::{Lesson, LessonSettings, SingleSetting};
pub use settings::Settings;
pub use ui_layout::UiLayout;
pub use word::{WordStat, WpmInfo};
