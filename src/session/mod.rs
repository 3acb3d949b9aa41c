pub mod input;
pub mod practice;
pub mod tuning;

pub use practice::{BatchId, PracticeEvent, PracticeSession};
pub use tuning::{Tuning, TuningError};
