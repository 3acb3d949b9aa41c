pub mod clock;
pub mod scheduler;
pub mod target;
pub mod timer;
pub mod wpm;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use scheduler::Scheduler;
pub use timer::ExerciseTimer;
pub use wpm::WpmTracker;
