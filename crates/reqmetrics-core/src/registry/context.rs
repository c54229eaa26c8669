//! Named metric contexts.
//!
//! A context owns its instruments and child contexts. Instruments are keyed by
//! name per kind in a `DashMap`; creation goes through `entry().or_insert_with`,
//! which holds the shard lock, so racing first callers collapse to one
//! instrument.

use std::sync::Arc;

use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};
use crate::registry::counter::{Counter, CounterValue};
use crate::registry::histogram::{Histogram, HistogramValue};
use crate::registry::meter::{Meter, MeterValue};
use crate::registry::snapshot::{MetricsData, Named};
use crate::registry::timer::{Timer, TimerValue};
use crate::unit::{TimeUnit, Unit};

pub struct MetricsContext {
    name: String,
    clock: Arc<dyn Clock>,
    counters: DashMap<String, Arc<Counter>>,
    meters: DashMap<String, Arc<Meter>>,
    histograms: DashMap<String, Arc<Histogram>>,
    timers: DashMap<String, Arc<Timer>>,
    children: DashMap<String, Arc<MetricsContext>>,
}

impl MetricsContext {
    /// Root context on the system clock.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_clock(name, SystemClock::shared())
    }

    /// Root context on a caller-supplied clock. Child contexts inherit it.
    pub fn with_clock(name: impl Into<String>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            clock,
            counters: DashMap::new(),
            meters: DashMap::new(),
            histograms: DashMap::new(),
            timers: DashMap::new(),
            children: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Get or create the child context `name`.
    pub fn context(&self, name: &str) -> Arc<MetricsContext> {
        self.children
            .entry(name.to_string())
            .or_insert_with(|| Self::with_clock(name, Arc::clone(&self.clock)))
            .value()
            .clone()
    }

    pub fn child(&self, name: &str) -> Option<Arc<MetricsContext>> {
        self.children.get(name).map(|c| c.value().clone())
    }

    pub fn counter(&self, name: &str, unit: Unit) -> Arc<Counter> {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Counter::new(unit)))
            .value()
            .clone()
    }

    pub fn meter(&self, name: &str, unit: Unit, rate_unit: TimeUnit) -> Arc<Meter> {
        self.meters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Meter::new(unit, rate_unit, Arc::clone(&self.clock))))
            .value()
            .clone()
    }

    pub fn histogram(&self, name: &str, unit: Unit) -> Arc<Histogram> {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new(unit)))
            .value()
            .clone()
    }

    /// Timer with rates per second and durations in milliseconds.
    pub fn timer(&self, name: &str, unit: Unit) -> Arc<Timer> {
        self.timer_with(name, unit, TimeUnit::Seconds, TimeUnit::Milliseconds)
    }

    pub fn timer_with(
        &self,
        name: &str,
        unit: Unit,
        rate_unit: TimeUnit,
        duration_unit: TimeUnit,
    ) -> Arc<Timer> {
        self.timers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Timer::new(unit, rate_unit, duration_unit, Arc::clone(&self.clock)))
            })
            .value()
            .clone()
    }

    pub fn counter_value(&self, name: &str) -> Option<CounterValue> {
        self.counters.get(name).map(|c| c.value().value())
    }

    pub fn meter_value(&self, name: &str) -> Option<MeterValue> {
        self.meters.get(name).map(|m| m.value().value())
    }

    pub fn histogram_value(&self, name: &str) -> Option<HistogramValue> {
        self.histograms.get(name).map(|h| h.value().value())
    }

    pub fn timer_value(&self, name: &str) -> Option<TimerValue> {
        self.timers.get(name).map(|t| t.value().value())
    }

    pub fn timer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.timers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Zero every instrument in this context and its children.
    pub fn reset(&self) {
        self.counters.iter().for_each(|c| c.reset());
        self.meters.iter().for_each(|m| m.reset());
        self.histograms.iter().for_each(|h| h.reset());
        self.timers.iter().for_each(|t| t.reset());
        self.children.iter().for_each(|c| c.reset());
    }

    /// Serializable view of this context tree, sorted by name.
    pub fn snapshot(&self) -> MetricsData {
        fn collect<I, V>(map: &DashMap<String, Arc<I>>, f: impl Fn(&I) -> V) -> Vec<Named<V>> {
            let mut out: Vec<Named<V>> = map
                .iter()
                .map(|e| Named { name: e.key().clone(), value: f(e.value().as_ref()) })
                .collect();
            out.sort_by(|a, b| a.name.cmp(&b.name));
            out
        }

        let mut child_contexts: Vec<MetricsData> =
            self.children.iter().map(|c| c.value().snapshot()).collect();
        child_contexts.sort_by(|a, b| a.context.cmp(&b.context));

        MetricsData {
            context: self.name.clone(),
            counters: collect(&self.counters, Counter::value),
            meters: collect(&self.meters, Meter::value),
            histograms: collect(&self.histograms, Histogram::value),
            timers: collect(&self.timers, Timer::value),
            child_contexts,
        }
    }
}
