#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Path,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use futures_util::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tower::ServiceExt;

use reqmetrics_axum::{GlobalMetrics, Pipelines};
use reqmetrics_core::{ManualClock, MetricsContext, TimeUnit};

const ACTIVE: &str = "Active Requests";

fn instrumented(ctx: &Arc<MetricsContext>) -> Pipelines {
    let mut pipelines = Pipelines::new();
    GlobalMetrics::new(Arc::clone(ctx), &mut pipelines).with_all_metrics();
    pipelines
}

fn test_routes(clock: Arc<ManualClock>) -> Router {
    Router::new()
        .route("/test/action", get(|| async { "action" }))
        .route(
            "/test/delay/:ms",
            get(move |Path(ms): Path<i64>| {
                let clock = Arc::clone(&clock);
                async move {
                    clock.advance(TimeUnit::Milliseconds, ms);
                    "delayed"
                }
            }),
        )
        .route("/test/post", post(|body: String| async move { body }))
        .route("/test/boom", get(boom))
}

async fn boom() -> &'static str {
    panic!("handler failure")
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send_req(method: &str, uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-length", body.len().to_string())
        .body(Body::from(body))
        .unwrap()
}

fn active(ctx: &MetricsContext) -> i64 {
    ctx.counter_value(ACTIVE).unwrap().count
}

#[tokio::test]
async fn request_timer_records_elapsed_time() {
    let clock = Arc::new(ManualClock::new());
    let ctx = MetricsContext::with_clock("Axum", clock.clone());
    let app = instrumented(&ctx).apply(test_routes(clock));

    for uri in ["/test/delay/100", "/test/delay/200"] {
        let resp = app.clone().oneshot(get_req(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let timer = ctx.timer_value("Requests").unwrap();
    assert_eq!(timer.rate.count, 2);
    assert_eq!(timer.histogram.count, 2);
    assert_eq!(timer.histogram.min, 100.0);
    assert_eq!(timer.histogram.max, 200.0);
    assert_eq!(timer.histogram.mean, 150.0);
}

#[tokio::test]
async fn errors_meter_counts_panicking_requests() {
    let clock = Arc::new(ManualClock::new());
    let ctx = MetricsContext::with_clock("Axum", clock.clone());
    let app = instrumented(&ctx).apply(test_routes(clock));

    for _ in 0..2 {
        let outcome = AssertUnwindSafe(app.clone().oneshot(get_req("/test/boom")))
            .catch_unwind()
            .await;
        assert!(outcome.is_err(), "panic must propagate when no hook handles it");
    }
    app.clone().oneshot(get_req("/test/action")).await.unwrap();

    assert_eq!(ctx.meter_value("Errors").unwrap().count, 2);
    assert_eq!(active(&ctx), 0);
    // after phase ran exactly once per panicking request
    assert_eq!(ctx.timer_value("Requests").unwrap().rate.count, 3);
    assert_eq!(ctx.timer_value("GET /test/boom").unwrap().rate.count, 2);
}

#[tokio::test]
async fn on_error_hook_can_supply_response() {
    let clock = Arc::new(ManualClock::new());
    let ctx = MetricsContext::with_clock("Axum", clock.clone());
    let mut pipelines = instrumented(&ctx);
    pipelines.add_on_error_to_end("handled", |_, fault| {
        Some((StatusCode::INTERNAL_SERVER_ERROR, fault.message.clone()).into_response())
    });
    let app = pipelines.apply(test_routes(clock));

    let resp = app.oneshot(get_req("/test/boom")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ctx.meter_value("Errors").unwrap().count, 1);
    assert_eq!(active(&ctx), 0);
}

#[tokio::test]
async fn active_requests_track_in_flight() {
    let ctx = MetricsContext::new("Axum");
    let (entered_tx, mut entered_rx) = mpsc::unbounded_channel::<()>();
    let gate = Arc::new(Semaphore::new(0));

    let handler_gate = Arc::clone(&gate);
    let routes = Router::new().route(
        "/test/wait",
        get(move || {
            let gate = Arc::clone(&handler_gate);
            let entered = entered_tx.clone();
            async move {
                let _ = entered.send(());
                let _permit = gate.acquire().await.unwrap();
                "released"
            }
        }),
    );
    let app = instrumented(&ctx).apply(routes);

    assert_eq!(active(&ctx), 0);
    let first = tokio::spawn(app.clone().oneshot(get_req("/test/wait")));
    entered_rx.recv().await.unwrap();
    assert_eq!(active(&ctx), 1);

    let second = tokio::spawn(app.clone().oneshot(get_req("/test/wait")));
    entered_rx.recv().await.unwrap();
    assert_eq!(active(&ctx), 2);

    gate.add_permits(2);
    assert_eq!(first.await.unwrap().unwrap().status(), StatusCode::OK);
    assert_eq!(second.await.unwrap().unwrap().status(), StatusCode::OK);
    assert_eq!(active(&ctx), 0);
}

#[tokio::test]
async fn cancelled_request_still_runs_after_hooks() {
    let ctx = MetricsContext::new("Axum");
    let (entered_tx, mut entered_rx) = mpsc::unbounded_channel::<()>();

    let routes = Router::new().route(
        "/test/hang",
        get(move || {
            let entered = entered_tx.clone();
            async move {
                let _ = entered.send(());
                std::future::pending::<()>().await;
                "unreachable"
            }
        }),
    );
    let app = instrumented(&ctx).apply(routes);

    let hung = tokio::spawn(app.clone().oneshot(get_req("/test/hang")));
    entered_rx.recv().await.unwrap();
    assert_eq!(active(&ctx), 1);

    hung.abort();
    assert!(hung.await.unwrap_err().is_cancelled());

    assert_eq!(active(&ctx), 0);
    assert_eq!(ctx.timer_value("Requests").unwrap().rate.count, 1);
    assert_eq!(ctx.timer_value("GET /test/hang").unwrap().rate.count, 1);
    assert_eq!(ctx.meter_value("Errors").unwrap().count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn active_requests_never_lose_updates() {
    const N: i64 = 64;
    let ctx = MetricsContext::new("Axum");
    let peak = Arc::new(AtomicI64::new(0));
    let low = Arc::new(AtomicI64::new(i64::MAX));

    let (handler_ctx, handler_peak, handler_low) = (Arc::clone(&ctx), Arc::clone(&peak), Arc::clone(&low));
    let routes = Router::new().route(
        "/test/spin",
        get(move || {
            let seen = handler_ctx.counter_value(ACTIVE).map(|c| c.count).unwrap_or(-1);
            handler_peak.fetch_max(seen, Ordering::SeqCst);
            handler_low.fetch_min(seen, Ordering::SeqCst);
            async {
                tokio::task::yield_now().await;
                "ok"
            }
        }),
    );
    let app = instrumented(&ctx).apply(routes);

    let handles: Vec<_> = (0..N)
        .map(|_| tokio::spawn(app.clone().oneshot(get_req("/test/spin"))))
        .collect();
    for h in handles {
        assert_eq!(h.await.unwrap().unwrap().status(), StatusCode::OK);
    }

    assert_eq!(active(&ctx), 0);
    assert!(low.load(Ordering::SeqCst) >= 1);
    assert!(peak.load(Ordering::SeqCst) <= N);
}

#[tokio::test]
async fn request_size_samples_mutating_methods_only() {
    let clock = Arc::new(ManualClock::new());
    let ctx = MetricsContext::with_clock("Axum", clock.clone());
    let routes = test_routes(clock)
        .route("/test/put", axum::routing::put(|| async { "put" }).patch(|| async { "patch" }));
    let app = instrumented(&ctx).apply(routes);

    app.clone().oneshot(send_req("POST", "/test/post", "1234567")).await.unwrap();
    app.clone().oneshot(send_req("PUT", "/test/put", "abcdefg")).await.unwrap();
    app.clone().oneshot(send_req("PATCH", "/test/put", "ABCDEFG")).await.unwrap();
    app.clone().oneshot(send_req("GET", "/test/action", "ignored")).await.unwrap();
    // no declared length: sampled as zero
    app.clone()
        .oneshot(Request::builder().method("POST").uri("/test/post").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let sizes = ctx.histogram_value("Post, Put & Patch Request Size").unwrap();
    assert_eq!(sizes.count, 4);
    assert_eq!(sizes.min, 0.0);
    assert_eq!(sizes.max, 7.0);
}

#[tokio::test]
async fn per_route_timers_use_method_and_template() {
    let clock = Arc::new(ManualClock::new());
    let ctx = MetricsContext::with_clock("Axum", clock.clone());
    let app = instrumented(&ctx).apply(test_routes(clock));

    app.clone().oneshot(get_req("/test/action")).await.unwrap();
    app.clone().oneshot(get_req("/test/action")).await.unwrap();
    app.clone().oneshot(send_req("POST", "/test/post", "x")).await.unwrap();
    app.clone().oneshot(get_req("/test/delay/5")).await.unwrap();
    app.clone().oneshot(get_req("/test/delay/7")).await.unwrap();
    let missing = app.clone().oneshot(get_req("/nope")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    assert_eq!(ctx.timer_value("GET /test/action").unwrap().rate.count, 2);
    assert_eq!(ctx.timer_value("POST /test/post").unwrap().rate.count, 1);

    let delay = ctx.timer_value("GET /test/delay/:ms").unwrap();
    assert_eq!(delay.rate.count, 2);
    assert_eq!(delay.histogram.max, 7.0);

    assert!(ctx.timer_names().iter().all(|n| !n.contains("/nope")));
    assert!(ctx.timer_value("GET /test/delay/5").is_none());
}

#[tokio::test]
async fn short_circuit_before_counting_leaves_metrics_untouched() {
    let clock = Arc::new(ManualClock::new());
    let ctx = MetricsContext::with_clock("Axum", clock.clone());
    let mut pipelines = instrumented(&ctx);
    pipelines.add_before_to_start("auth", |ctx| {
        if ctx.headers().contains_key("authorization") {
            None
        } else {
            Some(StatusCode::UNAUTHORIZED.into_response())
        }
    });
    let app = pipelines.apply(test_routes(clock));

    let resp = app.clone().oneshot(get_req("/test/action")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(active(&ctx), 0);
    assert_eq!(ctx.timer_value("Requests").unwrap().rate.count, 0);

    let authed = Request::builder()
        .uri("/test/action")
        .header("authorization", "Bearer t")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.oneshot(authed).await.unwrap().status(), StatusCode::OK);
    assert_eq!(active(&ctx), 0);
    assert_eq!(ctx.timer_value("Requests").unwrap().rate.count, 1);
}

#[tokio::test]
async fn failing_hook_does_not_fail_request() {
    let clock = Arc::new(ManualClock::new());
    let ctx = MetricsContext::with_clock("Axum", clock.clone());
    let mut pipelines = instrumented(&ctx);
    pipelines.add_before_to_end("broken.before", |_| panic!("hook failure"));
    pipelines.add_after_to_start("broken.after", |_| panic!("hook failure"));
    let app = pipelines.apply(test_routes(clock));

    let resp = app.oneshot(get_req("/test/action")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(active(&ctx), 0);
    assert_eq!(ctx.timer_value("Requests").unwrap().rate.count, 1);
}

#[test]
fn instruments_are_created_once() {
    let ctx = MetricsContext::new("Axum");
    let mut pipelines = Pipelines::new();
    GlobalMetrics::new(Arc::clone(&ctx), &mut pipelines)
        .with_all_metrics()
        .with_all_metrics();

    let a = ctx.timer("Requests", reqmetrics_core::Unit::Requests);
    let b = ctx.timer("Requests", reqmetrics_core::Unit::Requests);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(pipelines.before.len(), 4);
    assert_eq!(ctx.snapshot().timers.len(), 1);
}
