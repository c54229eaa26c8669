//! Time sources for instruments.
//!
//! Every `MetricsContext` carries a shared clock. Production code uses
//! `SystemClock`; tests inject `ManualClock` and advance it explicitly so
//! recorded durations are exact.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::unit::TimeUnit;

/// Monotonic nanosecond source.
pub trait Clock: Send + Sync {
    fn nanoseconds(&self) -> i64;

    fn seconds(&self) -> f64 {
        self.nanoseconds() as f64 / 1e9
    }
}

/// Wall-free monotonic clock anchored at construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn nanoseconds(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, unit: TimeUnit, value: i64) {
        self.nanos.fetch_add(unit.to_nanos(value), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn nanoseconds(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
