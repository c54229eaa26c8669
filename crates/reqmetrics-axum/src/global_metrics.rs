//! Application-wide request metrics installed as pipeline hooks.
//!
//! Each `with_*` call registers an independent set of hooks, so the order of
//! calls does not matter. Hooks are named after the metric; calling the same
//! method twice with the same name replaces the earlier hooks and reuses the
//! instrument.

use std::sync::Arc;

use axum::http::Method;

use reqmetrics_core::{MetricsContext, TimeUnit, Unit};

use crate::pipeline::Pipelines;
use crate::route_name::route_metric_name;

/// Correlation key prefix holding a request timer's start token; the timer
/// name is appended.
pub const REQUEST_START_TIME_KEY: &str = "__reqmetrics.RequestStartTime__";
/// Correlation key holding the per-route timer's start timestamp.
pub const ROUTE_START_TIME_KEY: &str = "__reqmetrics.RouteStartTime__";
const ACTIVE_REQUEST_KEY: &str = "__reqmetrics.ActiveRequest__";

pub const DEFAULT_REQUEST_TIMER: &str = "Requests";
pub const DEFAULT_ERRORS_METER: &str = "Errors";
pub const DEFAULT_ACTIVE_REQUESTS: &str = "Active Requests";
pub const DEFAULT_REQUEST_SIZE: &str = "Post, Put & Patch Request Size";

pub struct GlobalMetrics<'a> {
    context: Arc<MetricsContext>,
    pipelines: &'a mut Pipelines,
}

impl<'a> GlobalMetrics<'a> {
    pub fn new(context: Arc<MetricsContext>, pipelines: &'a mut Pipelines) -> Self {
        Self { context, pipelines }
    }

    pub fn context(&self) -> &Arc<MetricsContext> {
        &self.context
    }

    /// Request timer, errors meter, active request counter, request size
    /// histogram, and a timer per route, all under their default names.
    pub fn with_all_metrics(self) -> Self {
        self.with_request_timer(DEFAULT_REQUEST_TIMER)
            .with_errors_meter(DEFAULT_ERRORS_METER)
            .with_active_request_counter(DEFAULT_ACTIVE_REQUESTS)
            .with_request_size_histogram(DEFAULT_REQUEST_SIZE)
            .with_timer_for_each_request()
    }

    /// Timer over every request: rate of requests handled plus a duration
    /// histogram.
    pub fn with_request_timer(self, name: &str) -> Self {
        let timer = self.context.timer(name, Unit::Requests);
        let hook = format!("reqmetrics.request_timer.{name}");
        let key = format!("{REQUEST_START_TIME_KEY}.{name}");

        let start = Arc::clone(&timer);
        let start_key = key.clone();
        self.pipelines.add_before_to_start(&hook, move |ctx| {
            ctx.items_mut().insert(start_key.clone(), start.start_recording());
            None
        });

        self.pipelines.add_after_to_end(&hook, move |ctx| {
            let Some(start) = ctx.items_mut().take::<i64>(&key) else {
                return;
            };
            let end = timer.end_recording();
            timer.record(end - start, TimeUnit::Nanoseconds);
        });

        tracing::debug!(metric = name, context = self.context.name(), "request timer installed");
        self
    }

    /// Meter marked once for each request whose handler panicked. The panic
    /// itself is left to the pipeline.
    pub fn with_errors_meter(self, name: &str) -> Self {
        let meter = self.context.meter(name, Unit::Errors, TimeUnit::Seconds);
        let hook = format!("reqmetrics.errors_meter.{name}");

        self.pipelines.add_on_error_to_start(&hook, move |_, _| {
            meter.mark();
            None
        });

        tracing::debug!(metric = name, context = self.context.name(), "errors meter installed");
        self
    }

    /// Counter of requests currently in flight. The decrement runs in the
    /// after phase, which also runs for panicking handlers, and only for
    /// requests that were counted in.
    pub fn with_active_request_counter(self, name: &str) -> Self {
        let counter = self.context.counter(name, Unit::custom("ActiveRequests"));
        let hook = format!("reqmetrics.active_requests.{name}");
        let key = format!("{ACTIVE_REQUEST_KEY}.{name}");

        let inc = Arc::clone(&counter);
        let inc_key = key.clone();
        self.pipelines.add_before_to_start(&hook, move |ctx| {
            inc.increment();
            ctx.items_mut().insert(inc_key.clone(), ());
            None
        });

        self.pipelines.add_after_to_end(&hook, move |ctx| {
            if ctx.items_mut().take::<()>(&key).is_some() {
                counter.decrement();
            }
        });

        tracing::debug!(metric = name, context = self.context.name(), "active request counter installed");
        self
    }

    /// Histogram of the declared body size of POST, PUT and PATCH requests. A
    /// request without a Content-Length header is sampled as 0.
    pub fn with_request_size_histogram(self, name: &str) -> Self {
        let histogram = self.context.histogram(name, Unit::Bytes);
        let hook = format!("reqmetrics.request_size.{name}");

        self.pipelines.add_before_to_start(&hook, move |ctx| {
            if matches!(*ctx.method(), Method::POST | Method::PUT | Method::PATCH) {
                histogram.update(declared_size(ctx.content_length()));
            }
            None
        });

        tracing::debug!(metric = name, context = self.context.name(), "request size histogram installed");
        self
    }

    /// One timer per matched route, named `"{METHOD} {PATH_TEMPLATE}"` and
    /// created on the first request that matches it. Requests that match no
    /// route are not recorded here.
    pub fn with_timer_for_each_request(self) -> Self {
        let clock = self.context.clock();
        let hook = "reqmetrics.route_timers";

        let start_clock = Arc::clone(&clock);
        self.pipelines.add_before_to_start(hook, move |ctx| {
            ctx.items_mut().insert(ROUTE_START_TIME_KEY, start_clock.nanoseconds());
            None
        });

        let context = Arc::clone(&self.context);
        self.pipelines.add_after_to_end(hook, move |ctx| {
            let Some(start) = ctx.items_mut().take::<i64>(ROUTE_START_TIME_KEY) else {
                return;
            };
            let Some(name) = route_metric_name(ctx.resolved_route()) else {
                return;
            };
            let elapsed = clock.nanoseconds() - start;
            context.timer(&name, Unit::Requests).record(elapsed, TimeUnit::Nanoseconds);
        });

        tracing::debug!(context = self.context.name(), "per-route timers installed");
        self
    }
}

/// Declared body size as a sample; absent counts as 0, oversized saturates.
pub(crate) fn declared_size(content_length: Option<u64>) -> i64 {
    content_length.map_or(0, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_install_named_hooks() {
        let mut pipelines = Pipelines::new();
        let ctx = MetricsContext::new("Axum");
        GlobalMetrics::new(Arc::clone(&ctx), &mut pipelines).with_all_metrics();

        assert_eq!(pipelines.before.len(), 4);
        assert_eq!(pipelines.after.len(), 3);
        assert_eq!(pipelines.on_error.len(), 1);

        let snap = ctx.snapshot();
        assert_eq!(snap.timers.len(), 1);
        assert_eq!(snap.meters[0].name, "Errors");
        assert_eq!(snap.counters[0].name, "Active Requests");
        assert_eq!(snap.histograms[0].name, "Post, Put & Patch Request Size");
    }

    #[test]
    fn declared_size_defaults_to_zero() {
        assert_eq!(declared_size(None), 0);
        assert_eq!(declared_size(Some(42)), 42);
        assert_eq!(declared_size(Some(u64::MAX)), i64::MAX);
    }

    #[test]
    fn reinstalling_replaces_hooks() {
        let mut pipelines = Pipelines::new();
        let ctx = MetricsContext::new("Axum");
        GlobalMetrics::new(Arc::clone(&ctx), &mut pipelines)
            .with_request_timer("Requests")
            .with_request_timer("Requests")
            .with_request_timer("Other");

        assert_eq!(pipelines.before.len(), 2);
        assert_eq!(pipelines.after.len(), 2);
        assert_eq!(ctx.timer_names(), vec!["Other".to_string(), "Requests".to_string()]);
    }
}
