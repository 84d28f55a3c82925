//! Wall-clock access behind a trait so tests can drive time manually.

use crate::config::NANOS_PER_SEC;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanosecond and second wall-clock readers.
pub trait Clock: Send + Sync {
    /// Unix time in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Unix time in whole seconds.
    fn now_sec(&self) -> u64 {
        self.now_ns() / NANOS_PER_SEC
    }
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}
