//! Top-level facade crate for reqmetrics.
//!
//! Re-exports the registry/report core and the axum integration so users can depend on a single crate.

pub mod core {
    pub use reqmetrics_core::*;
}

pub mod axum {
    pub use reqmetrics_axum::*;
}

pub use reqmetrics_axum::{GlobalMetrics, MetricsModule, Pipelines, ReqMetricsConfig, RouteMetrics};
pub use reqmetrics_core::{HealthChecks, MetricsContext, MetricsEndpointReports};
