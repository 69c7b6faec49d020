//! Wall-clock source
//!
//! Every time-dependent engine operation reads "now" through this trait, so
//! tests drive time by hand instead of sleeping.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Current wall-clock time in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// The real system clock
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
