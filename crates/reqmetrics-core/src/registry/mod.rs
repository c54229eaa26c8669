//! In-process metric registry.
//!
//! Instruments are atomics behind `Arc`s and are organised in a tree of named
//! `MetricsContext`s. Handles are cheap to clone and safe to update from any
//! number of concurrent requests.

pub mod context;
pub mod counter;
pub mod histogram;
pub mod meter;
pub mod snapshot;
pub mod timer;

use std::sync::{Arc, OnceLock};

pub use context::MetricsContext;
pub use counter::{Counter, CounterValue};
pub use histogram::{Histogram, HistogramValue};
pub use meter::{Meter, MeterValue};
pub use snapshot::{MetricsData, Named};
pub use timer::{Timer, TimerValue};

static GLOBAL: OnceLock<Arc<MetricsContext>> = OnceLock::new();

/// Process-wide root context, created on first use.
pub fn global() -> Arc<MetricsContext> {
    Arc::clone(GLOBAL.get_or_init(|| MetricsContext::new("Application")))
}
