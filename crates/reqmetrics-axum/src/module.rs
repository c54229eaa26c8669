//! Metrics exposition module.
//!
//! Routes under the configured mount path (default `/metrics`):
//! - `GET {mount}`        : 303 redirect to `{mount}/`
//! - `GET {mount}/`       : embedded browsing UI, gzip when the client accepts it
//! - `GET {mount}/{rest}` : endpoint table lookup, 404 when nothing matches
//!
//! Every module response carries no-cache headers. Configuration is stored
//! once per process; `MetricsModule::router()` may be called any number of
//! times and always reads the same configuration. An empty mount path
//! disables the module: the router has no routes at all.

use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};

use reqmetrics_core::{EndpointResponse, MetricsEndpointReports};

pub const DEFAULT_MODULE_PATH: &str = "/metrics";

const BROWSER_APP: &str = include_str!("../assets/index.html");

static MODULE: OnceLock<Arc<ModuleConfig>> = OnceLock::new();
static BROWSER_APP_GZIP: OnceLock<Option<Bytes>> = OnceLock::new();

/// Hook to customize the module router, e.g. to put it behind authentication.
pub type ModuleCustomizer = Arc<dyn Fn(Router) -> Router + Send + Sync>;

pub struct ModuleConfig {
    path: String,
    reports: MetricsEndpointReports,
    customize: Option<ModuleCustomizer>,
}

impl ModuleConfig {
    /// `path` is normalized to a leading slash and no trailing slash; the
    /// root mount `/` is kept as-is. An empty path disables the module.
    pub fn new(path: &str, reports: MetricsEndpointReports, customize: Option<ModuleCustomizer>) -> Self {
        Self { path: normalize_path(path), reports, customize }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn reports(&self) -> &MetricsEndpointReports {
        &self.reports
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let inner = trimmed.trim_matches('/');
    if inner.is_empty() {
        "/".to_string()
    } else {
        format!("/{inner}")
    }
}

pub struct MetricsModule;

impl MetricsModule {
    /// Store the process-wide module configuration. Returns `false` (and
    /// keeps the first configuration) if the module was already configured.
    pub fn configure(
        path: &str,
        reports: MetricsEndpointReports,
        customize: Option<ModuleCustomizer>,
    ) -> bool {
        let config = Arc::new(ModuleConfig::new(path, reports, customize));
        let enabled = config.is_enabled();
        let mount = config.path.clone();
        match MODULE.set(config) {
            Ok(()) => {
                if enabled {
                    tracing::info!(path = %mount, "metrics module configured");
                } else {
                    tracing::info!("metrics module disabled (empty path)");
                }
                true
            }
            Err(_) => {
                tracing::warn!(path = %mount, "metrics module already configured; ignoring");
                false
            }
        }
    }

    pub fn config() -> Option<Arc<ModuleConfig>> {
        MODULE.get().cloned()
    }

    /// Router for the process-wide configuration; empty when unconfigured or
    /// disabled.
    pub fn router() -> Router {
        match Self::config() {
            Some(config) => Self::router_for(config),
            None => Router::new(),
        }
    }

    pub fn router_for(config: Arc<ModuleConfig>) -> Router {
        if !config.is_enabled() {
            return Router::new();
        }

        let base = config.path.trim_end_matches('/');
        let mut router: Router<Arc<ModuleConfig>> = Router::new();
        if !base.is_empty() {
            router = router.route(base, get(redirect_to_slash));
        }
        router = router
            .route(&format!("{base}/"), get(browse))
            .route(&format!("{base}/*rest"), get(endpoint));

        let customize = config.customize.clone();
        let router = router
            .route_layer(map_response(no_cache))
            .with_state(config);

        match customize {
            Some(f) => f(router),
            None => router,
        }
    }
}

async fn no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}

async fn redirect_to_slash(OriginalUri(uri): OriginalUri) -> Response {
    let target = match uri.query() {
        Some(q) => format!("{}/?{}", uri.path(), q),
        None => format!("{}/", uri.path()),
    };
    Redirect::to(&target).into_response()
}

/// `gzip` listed in `Accept-Encoding`, case-insensitively, and not `q=0`.
pub(crate) fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|entry| {
            let mut parts = entry.split(';').map(str::trim);
            let token = parts.next().unwrap_or("");
            if !token.eq_ignore_ascii_case("gzip") {
                return false;
            }
            !parts.any(|p| {
                p.strip_prefix("q=")
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            })
        })
}

fn gzip(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity((raw.len() / 2).max(256)), Compression::best());
    encoder.write_all(raw)?;
    encoder.finish()
}

fn browser_app_gzip() -> Option<Bytes> {
    BROWSER_APP_GZIP
        .get_or_init(|| match gzip(BROWSER_APP.as_bytes()) {
            Ok(compressed) => Some(Bytes::from(compressed)),
            Err(e) => {
                tracing::warn!(error = %e, "browser app gzip failed; serving uncompressed");
                None
            }
        })
        .clone()
}

async fn browse(headers: HeaderMap) -> Response {
    let html = HeaderValue::from_static("text/html");
    if accepts_gzip(&headers) {
        if let Some(body) = browser_app_gzip() {
            return (
                [(header::CONTENT_TYPE, html), (header::CONTENT_ENCODING, HeaderValue::from_static("gzip"))],
                body,
            )
                .into_response();
        }
    }
    ([(header::CONTENT_TYPE, html)], Bytes::from_static(BROWSER_APP.as_bytes())).into_response()
}

async fn endpoint(
    State(config): State<Arc<ModuleConfig>>,
    Path(rest): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let processed = std::panic::catch_unwind(AssertUnwindSafe(|| config.reports.process(&rest, uri.query())));

    match processed {
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Ok(Some(Ok(resp))) => into_http(resp),
        Ok(Some(Err(e))) => {
            tracing::warn!(endpoint = %rest, code = e.code().as_str(), error = %e, "metrics endpoint failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(_) => {
            tracing::warn!(endpoint = %rest, "metrics endpoint panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn into_http(resp: EndpointResponse) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = format!("{}; charset={}", resp.content_type, resp.charset.name());
    match HeaderValue::from_str(&content_type) {
        Ok(ct) => (status, [(header::CONTENT_TYPE, ct)], resp.encoded_body()).into_response(),
        Err(_) => {
            tracing::warn!(content_type = %content_type, "invalid endpoint content type");
            (status, resp.encoded_body()).into_response()
        }
    }
}
