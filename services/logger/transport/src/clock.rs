//! Clock service.
//!
//! Timestamps are monotonic microseconds; the first query defines time zero.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of monotonic microsecond timestamps
pub trait Clock {
    /// Microseconds since the first call
    fn now_us(&self) -> u64;
}

/// Clock backed by [`Instant`]
#[derive(Debug, Default)]
pub struct MonotonicClock {
    origin: OnceCell<Instant>,
}

impl MonotonicClock {
    /// Create a clock; time zero is fixed by the first [`Clock::now_us`] call
    pub fn new() -> Self {
        Self {
            origin: OnceCell::new(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        let origin = self.origin.get_or_init(Instant::now);
        origin.elapsed().as_micros() as u64
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same time. With a non-zero step every query advances the
/// clock after reading it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    step: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock that advances by `step_us` on every query
    pub fn with_step(step_us: u64) -> Self {
        let clock = Self::new();
        clock.step.store(step_us, Ordering::SeqCst);
        clock
    }

    /// Set the current time
    pub fn set(&self, now_us: u64) {
        self.now.store(now_us, Ordering::SeqCst);
    }

    /// Move the current time forward
    pub fn advance(&self, delta_us: u64) {
        self.now.fetch_add(delta_us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        let step = self.step.load(Ordering::SeqCst);
        self.now.fetch_add(step, Ordering::SeqCst)
    }
}
