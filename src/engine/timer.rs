use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::engine::clock::SharedClock;

const TICK_INTERVAL_MS: i64 = 1000;
/// Typing is considered paused once no key was pressed for this long.
const IDLE_AFTER_MS: i64 = 5000;

/// Elapsed-time counter that only advances while the learner is typing.
///
/// Ticks are driven by the caller's event loop. After the first keystroke a
/// tick is scheduled one second out; each due tick reschedules itself only
/// while the last keystroke is within the idle window, so the chain stops on
/// its own and restarts with the next key press.
pub struct ExerciseTimer {
    clock: SharedClock,
    elapsed: TimeDelta,
    total: TimeDelta,
    last_keystroke: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
    next_tick: Option<DateTime<Utc>>,
}

impl ExerciseTimer {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            elapsed: TimeDelta::zero(),
            total: TimeDelta::zero(),
            last_keystroke: None,
            last_update: None,
            next_tick: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn key_pressed(&mut self) {
        let now = self.clock.now();
        self.last_keystroke = Some(now);
        if self.next_tick.is_none() {
            self.last_update = Some(now);
            self.next_tick = Some(now + TimeDelta::milliseconds(TICK_INTERVAL_MS));
        }
    }

    /// Run the scheduled tick if it is due. Returns true when time advanced.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        match self.next_tick {
            Some(due) if now >= due => {}
            _ => return false,
        }

        let since = self
            .last_update
            .map(|last| now - last)
            .unwrap_or_else(TimeDelta::zero)
            .max(TimeDelta::zero());
        self.elapsed += since;
        self.total += since;
        self.last_update = Some(now);

        let still_typing = self
            .last_keystroke
            .is_some_and(|last| last >= now - TimeDelta::milliseconds(IDLE_AFTER_MS));
        self.next_tick = still_typing.then(|| now + TimeDelta::milliseconds(TICK_INTERVAL_MS));
        true
    }

    pub fn reset_exercise(&mut self) {
        self.elapsed = TimeDelta::zero();
        self.last_keystroke = None;
        self.last_update = None;
        self.next_tick = None;
    }

    pub fn reset_total(&mut self) {
        self.reset_exercise();
        self.total = TimeDelta::zero();
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.to_std().unwrap_or_default()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.total.to_std().unwrap_or_default()
    }

    pub fn elapsed_time(&self) -> String {
        format_elapsed(self.elapsed())
    }

    pub fn total_elapsed_time(&self) -> String {
        format_elapsed(self.total_elapsed())
    }
}

/// Format as "m:ss".
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
