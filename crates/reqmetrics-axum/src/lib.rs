//! reqmetrics axum integration.
//!
//! Request metrics installed as pipeline hooks around an axum `Router`, plus
//! the exposition module serving reports under a mount path. Consumed by the
//! sample binary (`main.rs`) and by integration tests.

pub mod config;
pub mod global_metrics;
pub mod metrics_config;
pub mod module;
pub mod pipeline;
pub mod route_metrics;
pub mod route_name;
pub mod router;

pub use global_metrics::GlobalMetrics;
pub use metrics_config::{ReqMetricsConfig, DEFAULT_CONTEXT};
pub use module::{MetricsModule, ModuleConfig, ModuleCustomizer, DEFAULT_MODULE_PATH};
pub use pipeline::{HandlerPanic, PipelineContext, Pipelines, RequestItems, ResponseInfo};
pub use route_metrics::RouteMetrics;
pub use route_name::{route_metric_name, ResolvedRoute};
