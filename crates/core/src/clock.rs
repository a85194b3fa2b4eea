//! Monotonic time source for bounded waits

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Elapsed time since an arbitrary fixed origin
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to, or by a fixed step on every reading
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<(Duration, Duration)>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to [`Clock::now`] returns the current time, then advances by `step`
    pub fn with_step(step: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new((Duration::ZERO, step))),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.0 += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        match self.state.lock() {
            Ok(mut state) => {
                let now = state.0;
                let step = state.1;
                state.0 += step;
                now
            }
            Err(_) => Duration::ZERO,
        }
    }
}
