use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::registry::histogram::{Histogram, HistogramValue};
use crate::registry::meter::{Meter, MeterValue};
use crate::unit::{TimeUnit, Unit};

/// Rate meter plus duration histogram. Durations are stored in nanoseconds
/// and reported in `duration_unit`.
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
    duration_unit: TimeUnit,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerValue {
    pub rate: MeterValue,
    pub histogram: HistogramValue,
    pub duration_unit: TimeUnit,
}

impl Timer {
    pub fn new(unit: Unit, rate_unit: TimeUnit, duration_unit: TimeUnit, clock: Arc<dyn Clock>) -> Self {
        Self {
            meter: Meter::new(unit.clone(), rate_unit, Arc::clone(&clock)),
            histogram: Histogram::new(unit),
            duration_unit,
            clock,
        }
    }

    /// Token marking the start of a recording.
    pub fn start_recording(&self) -> i64 {
        self.clock.nanoseconds()
    }

    /// Token marking the end of a recording; subtract the start token to get
    /// the elapsed nanoseconds.
    pub fn end_recording(&self) -> i64 {
        self.clock.nanoseconds()
    }

    /// Record an externally measured duration. Negative durations are dropped.
    pub fn record(&self, elapsed: i64, unit: TimeUnit) {
        let nanos = unit.to_nanos(elapsed);
        if nanos < 0 {
            return;
        }
        self.histogram.update(nanos);
        self.meter.mark();
    }

    /// Run `f` and record how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = self.start_recording();
        let out = f();
        self.record(self.end_recording() - start, TimeUnit::Nanoseconds);
        out
    }

    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    pub fn reset(&self) {
        self.meter.reset();
        self.histogram.reset();
    }

    pub fn value(&self) -> TimerValue {
        let divisor = self.duration_unit.scale_nanos() as f64;
        TimerValue {
            rate: self.meter.value(),
            histogram: self
                .histogram
                .scaled_value(divisor, Unit::custom(self.duration_unit.suffix())),
            duration_unit: self.duration_unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn timer(clock: Arc<ManualClock>) -> Timer {
        Timer::new(Unit::Requests, TimeUnit::Seconds, TimeUnit::Milliseconds, clock)
    }

    #[test]
    fn records_in_duration_unit() {
        let clock = Arc::new(ManualClock::new());
        let t = timer(clock.clone());

        let start = t.start_recording();
        clock.advance(TimeUnit::Milliseconds, 100);
        t.record(t.end_recording() - start, TimeUnit::Nanoseconds);

        t.record(200, TimeUnit::Milliseconds);

        let v = t.value();
        assert_eq!(v.rate.count, 2);
        assert_eq!(v.histogram.count, 2);
        assert_eq!(v.histogram.min, 100.0);
        assert_eq!(v.histogram.max, 200.0);
    }

    #[test]
    fn negative_durations_are_dropped() {
        let t = timer(Arc::new(ManualClock::new()));
        t.record(-5, TimeUnit::Nanoseconds);
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn time_closure() {
        let clock = Arc::new(ManualClock::new());
        let t = timer(clock.clone());
        let out = t.time(|| {
            clock.advance(TimeUnit::Milliseconds, 5);
            42
        });
        assert_eq!(out, 42);
        assert_eq!(t.value().histogram.last, 5.0);
    }
}
