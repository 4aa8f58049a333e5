//! A count-debounced alarm that fires after a condition holds for a
//! number of consecutive checks.
//!
//! Useful for safety trips evaluated on a fixed poll cadence: a single
//! noisy reading must not fire the alarm, but a sustained condition
//! reliably does.
//!
//! # State
//!
//! ```text
//!            check(true)                 count == threshold
//!  count 0 ──────────────► count 1..n ──────────────────────► Triggered
//!      ▲                        │                                  │
//!      │      check(false)      │                                  │
//!      └────────────────────────┘◄─────── count reset ─────────────┘
//! ```
//!
//! `check()` returns an [`AlarmStatus`] describing the run so callers
//! can act on exactly the edges they care about. After `Triggered` the
//! count resets, so a still-true condition starts a fresh episode.

/// Result of [`ConsecutiveAlarm::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmStatus {
    /// Condition is false; any run in progress was abandoned.
    Idle,

    /// Condition is true but the run is still short of the threshold.
    Pending,

    /// The threshold was just reached. The count resets, so the next
    /// true check starts a new run.
    Triggered,
}

/// Counts consecutive true conditions up to a threshold.
#[derive(Debug)]
pub struct ConsecutiveAlarm {
    threshold: u32,
    count: u32,
}

impl ConsecutiveAlarm {
    /// Create an alarm firing on the `threshold`-th consecutive true
    /// check. A threshold of 1 fires immediately on any true check.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            count: 0,
        }
    }

    /// Update the alarm with the current condition.
    pub fn check(&mut self, condition: bool) -> AlarmStatus {
        if !condition {
            self.count = 0;
            return AlarmStatus::Idle;
        }

        self.count += 1;
        if self.count >= self.threshold {
            self.count = 0;
            AlarmStatus::Triggered
        } else {
            AlarmStatus::Pending
        }
    }

    /// Abandon any run in progress.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
