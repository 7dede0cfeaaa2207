//! Simulation time
//!
//! Every expiry decision in the overlay is taken against a monotonic clock
//! owned by the external scheduler. The core only reads it.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A point on the simulation clock, measured from the start of the run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimTime(Duration);

impl SimTime {
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    #[inline]
    pub fn from_secs(secs: u64) -> Self {
        SimTime(Duration::from_secs(secs))
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        SimTime(Duration::from_millis(millis))
    }

    #[inline]
    pub fn since_start(&self) -> Duration {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn saturating_since(&self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// True once `created_at + ttl <= self`
    #[inline]
    pub fn has_expired(&self, created_at: SimTime, ttl: Duration) -> bool {
        created_at + ttl <= *self
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

/// Read-only view of the simulation clock
pub trait Clock: Send + Sync {
    /// Current simulation time
    fn now(&self) -> SimTime;
}

/// Clock advanced explicitly by the scheduler that owns it
#[derive(Debug, Default)]
pub struct ManualClock {
    now: RwLock<SimTime>,
}

impl ManualClock {
    /// Create a clock starting at `start`
    pub fn starting_at(start: SimTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Move the clock forward by `step`
    pub fn advance(&self, step: Duration) -> SimTime {
        let mut now = self.now.write();
        *now = *now + step;
        *now
    }

    /// Jump to `time`; earlier values are ignored so the clock stays monotonic
    pub fn set(&self, time: SimTime) {
        let mut now = self.now.write();
        if time > *now {
            *now = time;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SimTime {
        *self.now.read()
    }
}
