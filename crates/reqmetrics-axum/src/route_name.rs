//! Per-route metric naming.
//!
//! Names are `"{METHOD} {PATH_TEMPLATE}"` using the route template as written
//! in the router (`/users/:id`, `/files/*path`), so requests differing only in
//! parameter values share one instrument.

use axum::{
    extract::{MatchedPath, Request},
    http::Method,
};

/// Route matched by dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub method: Method,
    pub path_template: String,
}

impl ResolvedRoute {
    pub fn new(method: Method, path_template: impl Into<String>) -> Self {
        Self { method, path_template: path_template.into() }
    }

    /// `None` when the router did not match a route (fallback / not found).
    pub fn from_request(req: &Request) -> Option<Self> {
        let matched = req.extensions().get::<MatchedPath>()?;
        Some(Self::new(req.method().clone(), matched.as_str()))
    }
}

pub fn route_metric_name(route: Option<&ResolvedRoute>) -> Option<String> {
    let route = route?;
    Some(format!("{} {}", route.method.as_str().to_ascii_uppercase(), route.path_template))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn method_and_template() {
        let r = ResolvedRoute::new(Method::GET, "/test/action");
        assert_eq!(route_metric_name(Some(&r)).as_deref(), Some("GET /test/action"));
    }

    #[test]
    fn templates_are_kept_verbatim() {
        let r = ResolvedRoute::new(Method::POST, "/users/:id/files/*path");
        assert_eq!(route_metric_name(Some(&r)).as_deref(), Some("POST /users/:id/files/*path"));
    }

    #[test]
    fn extension_methods_are_upper_cased() {
        let r = ResolvedRoute::new(Method::from_bytes(b"purge").unwrap(), "/cache");
        assert_eq!(route_metric_name(Some(&r)).as_deref(), Some("PURGE /cache"));
    }

    #[test]
    fn unresolved_has_no_name() {
        assert_eq!(route_metric_name(None), None);
    }

    #[test]
    fn request_without_match_is_unresolved() {
        let req = axum::http::Request::builder().uri("/nowhere").body(axum::body::Body::empty()).unwrap();
        assert_eq!(ResolvedRoute::from_request(&req), None);
    }
}
