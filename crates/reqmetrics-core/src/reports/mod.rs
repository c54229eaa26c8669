//! Report generators over `MetricsData` snapshots.
//!
//! - `json`       : machine-readable snapshot (serde_json)
//! - `text`       : human-readable listing
//! - `prometheus` : Prometheus text exposition format

pub mod json;
pub mod prometheus;
pub mod text;

pub use json::{health_json, json_report};
pub use prometheus::prometheus_report;
pub use text::text_report;
