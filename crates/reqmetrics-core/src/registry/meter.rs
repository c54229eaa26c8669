use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::unit::{TimeUnit, Unit};

/// Event counter with a mean rate since creation (or last reset).
pub struct Meter {
    unit: Unit,
    rate_unit: TimeUnit,
    count: AtomicU64,
    start_nanos: AtomicI64,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeterValue {
    pub count: u64,
    /// Events per `rate_unit`.
    pub mean_rate: f64,
    pub unit: Unit,
    pub rate_unit: TimeUnit,
}

impl Meter {
    pub fn new(unit: Unit, rate_unit: TimeUnit, clock: Arc<dyn Clock>) -> Self {
        let start = clock.nanoseconds();
        Self {
            unit,
            rate_unit,
            count: AtomicU64::new(0),
            start_nanos: AtomicI64::new(start),
            clock,
        }
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        let elapsed = self.clock.nanoseconds() - self.start_nanos.load(Ordering::Relaxed);
        if count == 0 || elapsed <= 0 {
            return 0.0;
        }
        count as f64 / self.rate_unit.from_nanos(elapsed)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.start_nanos.store(self.clock.nanoseconds(), Ordering::Relaxed);
    }

    pub fn value(&self) -> MeterValue {
        MeterValue {
            count: self.count(),
            mean_rate: self.mean_rate(),
            unit: self.unit.clone(),
            rate_unit: self.rate_unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn mean_rate_follows_clock() {
        let clock = Arc::new(ManualClock::new());
        let m = Meter::new(Unit::Errors, TimeUnit::Seconds, clock.clone());
        assert_eq!(m.mean_rate(), 0.0);

        m.mark();
        m.mark_n(3);
        clock.advance(TimeUnit::Seconds, 2);

        assert_eq!(m.count(), 4);
        assert_eq!(m.mean_rate(), 2.0);

        m.reset();
        assert_eq!(m.value().count, 0);
    }
}
