//! Top-level configuration entry point.
//!
//! `ReqMetricsConfig` ties the registry root and health checks to the two
//! axum-facing pieces: request metrics installed into a `Pipelines`, and the
//! process-wide exposition module. A disabled configuration accepts every
//! call and does nothing.

use std::sync::Arc;

use reqmetrics_core::{HealthChecks, MetricsContext, MetricsEndpointReports};

use crate::config::Settings;
use crate::global_metrics::{
    GlobalMetrics, DEFAULT_ACTIVE_REQUESTS, DEFAULT_ERRORS_METER, DEFAULT_REQUEST_SIZE,
    DEFAULT_REQUEST_TIMER,
};
use crate::module::{MetricsModule, ModuleCustomizer};
use crate::pipeline::Pipelines;

/// Context the request metrics are registered under unless told otherwise.
pub const DEFAULT_CONTEXT: &str = "Axum";

#[derive(Clone)]
pub struct ReqMetricsConfig {
    inner: Option<Inner>,
}

#[derive(Clone)]
struct Inner {
    root: Arc<MetricsContext>,
    health: HealthChecks,
}

impl ReqMetricsConfig {
    pub fn new(root: Arc<MetricsContext>, health: HealthChecks) -> Self {
        Self { inner: Some(Inner { root, health }) }
    }

    /// Process-wide root context and a fresh set of health checks.
    pub fn global() -> Self {
        Self::new(reqmetrics_core::registry::global(), HealthChecks::new())
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.is_none()
    }

    pub fn root(&self) -> Option<&Arc<MetricsContext>> {
        self.inner.as_ref().map(|i| &i.root)
    }

    pub fn health(&self) -> Option<&HealthChecks> {
        self.inner.as_ref().map(|i| &i.health)
    }

    /// Install request metrics into `pipelines`, registered under the child
    /// context `context_name`. `setup` picks the metrics, e.g.
    /// `|m| m.with_all_metrics()`.
    pub fn with_global_metrics<F>(self, pipelines: &mut Pipelines, context_name: &str, setup: F) -> Self
    where
        F: for<'p> FnOnce(GlobalMetrics<'p>) -> GlobalMetrics<'p>,
    {
        if let Some(inner) = &self.inner {
            let context = inner.root.context(context_name);
            setup(GlobalMetrics::new(context, pipelines));
        }
        self
    }

    /// Mount the module at `path` with the default endpoints.
    pub fn with_metrics_module(self, path: &str) -> Self {
        self.with_metrics_module_reports(|_| {}, path)
    }

    /// Mount the module at `path`; `configure` adjusts the default endpoint
    /// table.
    pub fn with_metrics_module_reports<F>(self, configure: F, path: &str) -> Self
    where
        F: FnOnce(&mut MetricsEndpointReports),
    {
        self.configure_module(configure, path, None)
    }

    /// As `with_metrics_module_reports`, plus a hook applied to the module
    /// router (authentication, extra layers).
    pub fn with_metrics_module_customized<F>(
        self,
        configure: F,
        path: &str,
        customize: ModuleCustomizer,
    ) -> Self
    where
        F: FnOnce(&mut MetricsEndpointReports),
    {
        self.configure_module(configure, path, Some(customize))
    }

    fn configure_module<F>(self, configure: F, path: &str, customize: Option<ModuleCustomizer>) -> Self
    where
        F: FnOnce(&mut MetricsEndpointReports),
    {
        if let Some(inner) = &self.inner {
            let mut reports = MetricsEndpointReports::new(Arc::clone(&inner.root), inner.health.clone());
            configure(&mut reports);
            MetricsModule::configure(path, reports, customize);
        }
        self
    }

    /// Install what `settings` enables: the toggled request metrics under
    /// `settings.context`, and the module at `settings.module.path`.
    pub fn apply_settings(self, settings: &Settings, pipelines: &mut Pipelines) -> Self {
        let toggles = settings.global_metrics.clone();
        self.with_global_metrics(pipelines, &settings.context, |mut m| {
            if toggles.request_timer {
                m = m.with_request_timer(DEFAULT_REQUEST_TIMER);
            }
            if toggles.errors_meter {
                m = m.with_errors_meter(DEFAULT_ERRORS_METER);
            }
            if toggles.active_requests {
                m = m.with_active_request_counter(DEFAULT_ACTIVE_REQUESTS);
            }
            if toggles.request_size {
                m = m.with_request_size_histogram(DEFAULT_REQUEST_SIZE);
            }
            if toggles.per_route_timer {
                m = m.with_timer_for_each_request();
            }
            m
        })
        .with_metrics_module(&settings.module.path)
    }
}
