use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;

use crate::unit::Unit;

/// Signed running total. Updates are single atomic operations, so concurrent
/// increments and decrements never lose a step.
#[derive(Debug)]
pub struct Counter {
    unit: Unit,
    value: AtomicI64,
}

/// Point-in-time view of a counter.
#[derive(Debug, Clone, Serialize)]
pub struct CounterValue {
    pub count: i64,
    pub unit: Unit,
}

impl Counter {
    pub fn new(unit: Unit) -> Self {
        Self { unit, value: AtomicI64::new(0) }
    }

    /// Increment by 1.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Decrement by 1.
    pub fn decrement(&self) {
        self.add(-1);
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, v: i64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }

    pub fn value(&self) -> CounterValue {
        CounterValue { count: self.count(), unit: self.unit.clone() }
    }
}
