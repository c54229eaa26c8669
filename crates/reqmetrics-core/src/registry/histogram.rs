use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use crate::unit::Unit;

/// Lock-free distribution summary (count / sum / min / max / last).
#[derive(Debug)]
pub struct Histogram {
    unit: Unit,
    count: AtomicU64,
    sum: AtomicI64,
    min: AtomicI64,
    max: AtomicI64,
    last: AtomicI64,
}

/// Point-in-time view of a histogram. Empty histograms report zeros.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramValue {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub last: f64,
    pub unit: Unit,
}

impl Histogram {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            count: AtomicU64::new(0),
            sum: AtomicI64::new(0),
            min: AtomicI64::new(i64::MAX),
            max: AtomicI64::new(i64::MIN),
            last: AtomicI64::new(0),
        }
    }

    pub fn update(&self, v: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(v, Ordering::Relaxed);
        self.min.fetch_min(v, Ordering::Relaxed);
        self.max.fetch_max(v, Ordering::Relaxed);
        self.last.store(v, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.sum.store(0, Ordering::Relaxed);
        self.min.store(i64::MAX, Ordering::Relaxed);
        self.max.store(i64::MIN, Ordering::Relaxed);
        self.last.store(0, Ordering::Relaxed);
    }

    pub fn value(&self) -> HistogramValue {
        self.scaled_value(1.0, self.unit.clone())
    }

    /// Snapshot with every statistic divided by `divisor`.
    pub(crate) fn scaled_value(&self, divisor: f64, unit: Unit) -> HistogramValue {
        let count = self.count();
        if count == 0 {
            return HistogramValue {
                count: 0,
                sum: 0.0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                last: 0.0,
                unit,
            };
        }
        let sum = self.sum.load(Ordering::Relaxed) as f64;
        HistogramValue {
            count,
            sum: sum / divisor,
            min: self.min.load(Ordering::Relaxed) as f64 / divisor,
            max: self.max.load(Ordering::Relaxed) as f64 / divisor,
            mean: sum / count as f64 / divisor,
            last: self.last.load(Ordering::Relaxed) as f64 / divisor,
            unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_min_max_mean() {
        let h = Histogram::new(Unit::Bytes);
        assert_eq!(h.value().min, 0.0);

        for v in [7, 3, 11] {
            h.update(v);
        }
        let v = h.value();
        assert_eq!(v.count, 3);
        assert_eq!(v.min, 3.0);
        assert_eq!(v.max, 11.0);
        assert_eq!(v.mean, 7.0);
        assert_eq!(v.last, 11.0);
    }
}
