#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use tower::ServiceExt;

use reqmetrics_axum::{MetricsModule, ReqMetricsConfig};
use reqmetrics_core::{HealthChecks, MetricsContext, MetricsEndpointReports};

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn app() -> Router {
    Router::new()
        .route("/other", get(|| async { "other" }))
        .merge(MetricsModule::router())
}

// Single test: the module configuration is process-wide and this binary
// checks its transitions in order.
#[tokio::test]
async fn empty_path_disables_module() {
    // unconfigured
    assert!(MetricsModule::config().is_none());
    let resp = app().oneshot(get_req("/metrics/json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let root = MetricsContext::new("Application");
    ReqMetricsConfig::new(root.clone(), HealthChecks::new()).with_metrics_module("");

    let config = MetricsModule::config().unwrap();
    assert!(!config.is_enabled());
    assert_eq!(config.path(), "");

    for uri in ["/metrics", "/metrics/", "/metrics/json", "/json", "/"] {
        let resp = app().oneshot(get_req(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    let resp = app().oneshot(get_req("/other")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // first configuration wins
    let reports = MetricsEndpointReports::new(root, HealthChecks::new());
    assert!(!MetricsModule::configure("/metrics", reports, None));
    let resp = app().oneshot(get_req("/metrics/json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[test]
fn disabled_config_never_touches_module() {
    let cfg = ReqMetricsConfig::disabled().with_metrics_module("/never");
    assert!(cfg.is_disabled());
    assert!(MetricsModule::config().map_or(true, |c| c.path() != "/never"));
}
