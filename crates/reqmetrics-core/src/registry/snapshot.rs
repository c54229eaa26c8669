use serde::Serialize;

use crate::registry::counter::CounterValue;
use crate::registry::histogram::HistogramValue;
use crate::registry::meter::MeterValue;
use crate::registry::timer::TimerValue;

/// A value tagged with its instrument name.
#[derive(Debug, Clone, Serialize)]
pub struct Named<V> {
    pub name: String,
    #[serde(flatten)]
    pub value: V,
}

/// Snapshot of one context and its children, as fed to the report generators.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsData {
    pub context: String,
    pub counters: Vec<Named<CounterValue>>,
    pub meters: Vec<Named<MeterValue>>,
    pub histograms: Vec<Named<HistogramValue>>,
    pub timers: Vec<Named<TimerValue>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_contexts: Vec<MetricsData>,
}

impl MetricsData {
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.meters.is_empty()
            && self.histograms.is_empty()
            && self.timers.is_empty()
            && self.child_contexts.iter().all(MetricsData::is_empty)
    }
}
