//! Metrics scoped to a group of routes.
//!
//! Where `GlobalMetrics` sees every request, `RouteMetrics` is applied to one
//! sub-router with `route_layer` and filters on method and path prefix. Paths
//! are matched as the sub-router sees them, so a router later nested under
//! `/test` matches `/action`, not `/test/action`.

use std::sync::Arc;

use axum::{http::Method, Router};

use reqmetrics_core::{MetricsContext, TimeUnit, Unit};

use crate::global_metrics::declared_size;
use crate::pipeline::{PipelineContext, Pipelines};

pub struct RouteMetrics {
    context: Arc<MetricsContext>,
    pipelines: Pipelines,
}

fn applies(ctx: &PipelineContext, method: &Method, path_prefix: &str) -> bool {
    ctx.method() == method && ctx.path().starts_with(path_prefix)
}

impl RouteMetrics {
    pub fn new(context: Arc<MetricsContext>) -> Self {
        Self { context, pipelines: Pipelines::new() }
    }

    /// Timer `name` over matching requests, plus a histogram of the same name
    /// over their response sizes.
    pub fn metric_for_request_time_and_response_size(
        self,
        name: &str,
        method: Method,
        path_prefix: &str,
    ) -> Self {
        self.metric_for_request_time(name, method.clone(), path_prefix)
            .metric_for_response_size(name, method, path_prefix)
    }

    pub fn metric_for_request_time(mut self, name: &str, method: Method, path_prefix: &str) -> Self {
        let timer = self.context.timer(name, Unit::Requests);
        let hook = format!("reqmetrics.route.request_time.{name}");
        let key = format!("__reqmetrics.RouteRequestTime__.{name}");
        let prefix = path_prefix.to_string();

        let start = Arc::clone(&timer);
        let start_key = key.clone();
        self.pipelines.add_before_to_start(&hook, move |ctx| {
            if applies(ctx, &method, &prefix) {
                ctx.items_mut().insert(start_key.clone(), start.start_recording());
            }
            None
        });

        self.pipelines.add_after_to_end(&hook, move |ctx| {
            if let Some(start) = ctx.items_mut().take::<i64>(&key) {
                timer.record(timer.end_recording() - start, TimeUnit::Nanoseconds);
            }
        });
        self
    }

    pub fn metric_for_response_size(mut self, name: &str, method: Method, path_prefix: &str) -> Self {
        let histogram = self.context.histogram(name, Unit::Bytes);
        let hook = format!("reqmetrics.route.response_size.{name}");
        let prefix = path_prefix.to_string();

        self.pipelines.add_after_to_end(&hook, move |ctx| {
            if !applies(ctx, &method, &prefix) {
                return;
            }
            let size = ctx
                .response()
                .and_then(|r| r.content_length)
                .and_then(|l| i64::try_from(l).ok());
            if let Some(size) = size {
                histogram.update(size);
            }
        });
        self
    }

    /// Histogram `name` over the declared body size of matching requests;
    /// a missing Content-Length is sampled as 0.
    pub fn metric_for_request_size(mut self, name: &str, method: Method, path_prefix: &str) -> Self {
        let histogram = self.context.histogram(name, Unit::Bytes);
        let hook = format!("reqmetrics.route.request_size.{name}");
        let prefix = path_prefix.to_string();

        self.pipelines.add_before_to_start(&hook, move |ctx| {
            if applies(ctx, &method, &prefix) {
                histogram.update(declared_size(ctx.content_length()));
            }
            None
        });
        self
    }

    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        tracing::debug!(context = self.context.name(), hooks = self.pipelines.before.len() + self.pipelines.after.len(), "route metrics applied");
        self.pipelines.apply_to_routes(router)
    }
}
