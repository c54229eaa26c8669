//! Sample application router.
//!
//! Demo routes instrumented by the request pipelines, with the metrics
//! module merged in after instrumentation so scrapes do not count as
//! application traffic.

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::module::MetricsModule;
use crate::pipeline::Pipelines;

pub fn build_router(pipelines: Pipelines) -> Router {
    let app = Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/users/:id", get(user))
        .route("/echo", post(echo))
        .route("/slow/:ms", get(slow))
        .route("/boom", get(boom));

    pipelines.apply(app).merge(MetricsModule::router())
}

async fn index() -> &'static str {
    "reqmetrics sample: try /users/7, POST /echo, /slow/250, /boom, /metrics/"
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn user(Path(id): Path<u64>) -> String {
    format!("user {id}")
}

async fn echo(body: String) -> String {
    body
}

async fn slow(Path(ms): Path<u64>) -> String {
    tokio::time::sleep(std::time::Duration::from_millis(ms.min(5_000))).await;
    format!("slept {ms} ms")
}

#[allow(clippy::panic)]
async fn boom() -> &'static str {
    panic!("sample handler failure")
}
