//! Request lifecycle hooks for axum routers.
//!
//! `Pipelines` holds three ordered, named hook lists:
//! - `before`   : runs before dispatch; may return an early response
//! - `after`    : runs exactly once per request, after dispatch, whether the
//!   handler returned, panicked, a before hook short-circuited, or the
//!   request future was dropped before completing
//! - `on_error` : runs when the handler panicked; may supply a response,
//!   otherwise the panic is resumed unchanged
//!
//! The whole set is applied to a router as one middleware layer. Every hook
//! runs inside `catch_unwind`: a failing hook is logged and skipped, never
//! turned into a request failure.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::HttpBody,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::Response,
    Router,
};
use futures_util::FutureExt;

use crate::route_name::ResolvedRoute;

pub type BeforeHook = Arc<dyn Fn(&mut PipelineContext) -> Option<Response> + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&mut PipelineContext) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&mut PipelineContext, &HandlerPanic) -> Option<Response> + Send + Sync>;

/// Request-scoped key/value bag used to pass data between phases of the same
/// request. Never shared across requests.
#[derive(Default)]
pub struct RequestItems {
    map: HashMap<String, Box<dyn Any + Send>>,
}

impl RequestItems {
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.map.insert(key.into(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.map.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Remove the entry; `Some` only if it held a `T`.
    pub fn take<T: Any>(&mut self, key: &str) -> Option<T> {
        self.map.remove(key).and_then(|v| v.downcast::<T>().ok()).map(|b| *b)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// What after hooks can see of the produced response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseInfo {
    pub status: StatusCode,
    /// Declared `Content-Length`, else the exact body size when known.
    pub content_length: Option<u64>,
}

impl ResponseInfo {
    fn of(response: &Response) -> Self {
        let declared = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        Self {
            status: response.status(),
            content_length: declared.or_else(|| response.body().size_hint().exact()),
        }
    }
}

/// A handler panic as seen by on-error hooks.
#[derive(Debug, Clone)]
pub struct HandlerPanic {
    pub message: String,
}

impl HandlerPanic {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self { message }
    }
}

/// Per-request state threaded through every hook.
pub struct PipelineContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    items: RequestItems,
    resolved_route: Option<ResolvedRoute>,
    response: Option<ResponseInfo>,
}

impl PipelineContext {
    fn from_request(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            items: RequestItems::default(),
            resolved_route: None,
            response: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Declared request `Content-Length`, if present and valid.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn items(&self) -> &RequestItems {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut RequestItems {
        &mut self.items
    }

    /// The route dispatch matched. Always `None` in before hooks, and `None`
    /// in later phases when the request fell through to the fallback.
    pub fn resolved_route(&self) -> Option<&ResolvedRoute> {
        self.resolved_route.as_ref()
    }

    /// Response summary; `None` in before hooks, when a panic was not turned
    /// into a response, and when the request was cancelled.
    pub fn response(&self) -> Option<&ResponseInfo> {
        self.response.as_ref()
    }
}

/// Ordered list of named hooks. Adding a hook under an existing name replaces
/// the old one, so installing the same metric twice does not double count.
pub struct NamedPipeline<H> {
    items: Vec<(String, H)>,
}

impl<H> Default for NamedPipeline<H> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<H> NamedPipeline<H> {
    pub fn add_to_start(&mut self, name: impl Into<String>, hook: H) {
        let name = name.into();
        self.remove(&name);
        self.items.insert(0, (name, hook));
    }

    pub fn add_to_end(&mut self, name: impl Into<String>, hook: H) {
        let name = name.into();
        self.remove(&name);
        self.items.push((name, hook));
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|(n, _)| n != name);
        before != self.items.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &(String, H)> {
        self.items.iter()
    }
}

/// Run one hook, swallowing a panic.
fn guarded<T>(phase: &'static str, name: &str, f: impl FnOnce() -> T) -> Option<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(phase, hook = %name, "pipeline hook failed; skipped");
            None
        }
    }
}

#[derive(Default)]
pub struct Pipelines {
    pub before: NamedPipeline<BeforeHook>,
    pub after: NamedPipeline<AfterHook>,
    pub on_error: NamedPipeline<ErrorHook>,
}

impl Pipelines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_before_to_start<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut PipelineContext) -> Option<Response> + Send + Sync + 'static,
    {
        self.before.add_to_start(name, Arc::new(f));
    }

    pub fn add_before_to_end<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut PipelineContext) -> Option<Response> + Send + Sync + 'static,
    {
        self.before.add_to_end(name, Arc::new(f));
    }

    pub fn add_after_to_start<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut PipelineContext) + Send + Sync + 'static,
    {
        self.after.add_to_start(name, Arc::new(f));
    }

    pub fn add_after_to_end<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut PipelineContext) + Send + Sync + 'static,
    {
        self.after.add_to_end(name, Arc::new(f));
    }

    pub fn add_on_error_to_start<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut PipelineContext, &HandlerPanic) -> Option<Response> + Send + Sync + 'static,
    {
        self.on_error.add_to_start(name, Arc::new(f));
    }

    pub fn add_on_error_to_end<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut PipelineContext, &HandlerPanic) -> Option<Response> + Send + Sync + 'static,
    {
        self.on_error.add_to_end(name, Arc::new(f));
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty() && self.on_error.is_empty()
    }

    /// Wrap every route and the fallback of `router`.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(Arc::new(self), run_pipeline))
    }

    /// Wrap matched routes only; requests falling through to the fallback are
    /// not seen.
    pub fn apply_to_routes<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(Arc::new(self), run_pipeline))
    }

    fn run_before(&self, ctx: &mut PipelineContext) -> Option<Response> {
        for (name, hook) in self.before.iter() {
            if let Some(Some(early)) = guarded("before", name, || hook(ctx)) {
                tracing::debug!(hook = %name, path = %ctx.path(), "before hook short-circuited request");
                return Some(early);
            }
        }
        None
    }

    fn run_after(&self, ctx: &mut PipelineContext) {
        for (name, hook) in self.after.iter() {
            guarded("after", name, || hook(ctx));
        }
    }

    fn run_on_error(&self, ctx: &mut PipelineContext, fault: &HandlerPanic) -> Option<Response> {
        for (name, hook) in self.on_error.iter() {
            if let Some(Some(resp)) = guarded("on_error", name, || hook(ctx, fault)) {
                return Some(resp);
            }
        }
        None
    }
}

/// Owns the request context and runs the after phase exactly once: through
/// `finish` when a response (or panic) is known, otherwise on drop, which
/// happens when the request future is cancelled mid-dispatch.
struct AfterPhase {
    pipelines: Arc<Pipelines>,
    ctx: PipelineContext,
    done: bool,
}

impl AfterPhase {
    fn finish(&mut self, response: Option<ResponseInfo>) {
        if self.done {
            return;
        }
        self.done = true;
        self.ctx.response = response;
        self.pipelines.run_after(&mut self.ctx);
    }
}

impl Drop for AfterPhase {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(method = %self.ctx.method(), path = %self.ctx.path(), "request cancelled before completion");
            self.finish(None);
        }
    }
}

async fn run_pipeline(State(pipelines): State<Arc<Pipelines>>, req: Request, next: Next) -> Response {
    let mut phase = AfterPhase {
        pipelines: Arc::clone(&pipelines),
        ctx: PipelineContext::from_request(&req),
        done: false,
    };

    if let Some(early) = pipelines.run_before(&mut phase.ctx) {
        phase.finish(Some(ResponseInfo::of(&early)));
        return early;
    }

    // Before hooks are done; the route is visible to every later phase,
    // including the one run on cancellation.
    phase.ctx.resolved_route = ResolvedRoute::from_request(&req);

    let outcome = AssertUnwindSafe(next.run(req)).catch_unwind().await;

    match outcome {
        Ok(response) => {
            phase.finish(Some(ResponseInfo::of(&response)));
            response
        }
        Err(payload) => {
            let fault = HandlerPanic::from_payload(payload.as_ref());
            tracing::error!(
                method = %phase.ctx.method(),
                path = %phase.ctx.path(),
                panic = %fault.message,
                "request handler panicked"
            );
            let handled = pipelines.run_on_error(&mut phase.ctx, &fault);
            phase.finish(handled.as_ref().map(ResponseInfo::of));
            match handled {
                Some(response) => response,
                None => std::panic::resume_unwind(payload),
            }
        }
    }
}
