//! Endpoint table served under the metrics module mount path.
//!
//! An endpoint is a relative path (`json`, `v1/health`, `files/*`) and a
//! handler producing an `EndpointResponse`. Matching is case-sensitive: exact
//! segment equality first, then registrations ending in a `*` wildcard that
//! match by prefix. The table is built once at startup and only read after.

use std::sync::Arc;

use crate::error::{ReqMetricsError, Result};
use crate::health::HealthChecks;
use crate::registry::MetricsContext;
use crate::reports;

/// Character encoding of an endpoint body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    /// ISO-8859-1; characters outside the range are written as `?`.
    Latin1,
}

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Latin1 => "iso-8859-1",
        }
    }

    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => s.as_bytes().to_vec(),
            Charset::Latin1 => s
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: String,
    pub charset: Charset,
    pub content: String,
}

impl EndpointResponse {
    pub fn new(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            charset: Charset::Utf8,
            content: content.into(),
        }
    }

    pub fn json(content: impl Into<String>) -> Self {
        Self::new(content, "application/json")
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, "text/plain")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Body bytes in the declared charset.
    pub fn encoded_body(&self) -> Vec<u8> {
        self.charset.encode(&self.content)
    }
}

/// What a handler sees of the incoming request.
#[derive(Debug, Clone, Copy)]
pub struct EndpointRequest<'a> {
    /// Sub-path below the mount point, without leading slash.
    pub path: &'a str,
    /// Part matched by a trailing `*`, if the endpoint has one.
    pub wildcard: Option<&'a str>,
    pub query: Option<&'a str>,
}

pub type EndpointHandler = Arc<dyn Fn(&EndpointRequest<'_>) -> Result<EndpointResponse> + Send + Sync>;

#[derive(Clone)]
pub struct MetricsEndpoint {
    path: String,
    segments: Vec<String>,
    wildcard: bool,
    handler: EndpointHandler,
}

impl MetricsEndpoint {
    pub fn new(path: &str, handler: EndpointHandler) -> Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ReqMetricsError::BadConfig("endpoint path must not be empty".into()));
        }
        let mut segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ReqMetricsError::BadConfig(format!("empty segment in endpoint path: {path}")));
        }
        let wildcard = segments.last().is_some_and(|s| s == "*");
        if wildcard {
            segments.pop();
        }
        if segments.iter().any(|s| s.contains('*')) {
            return Err(ReqMetricsError::BadConfig(format!(
                "wildcard allowed only as last segment: {path}"
            )));
        }
        Ok(Self { path: trimmed.to_string(), segments, wildcard, handler })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `Some(None)` on an exact match, `Some(Some(rest))` on a wildcard match.
    fn match_path<'a>(&self, rest: &'a str) -> Option<Option<&'a str>> {
        let mut remaining = Some(rest);
        for seg in &self.segments {
            let cur = remaining?;
            let (head, tail) = match cur.split_once('/') {
                Some((h, t)) => (h, Some(t)),
                None => (cur, None),
            };
            if head != seg {
                return None;
            }
            remaining = tail;
        }

        match (self.wildcard, remaining) {
            (true, Some(tail)) if !tail.is_empty() => Some(Some(tail)),
            (false, None) => Some(None),
            _ => None,
        }
    }
}

/// Endpoint table plus the report sources the built-in endpoints read.
#[derive(Clone)]
pub struct MetricsEndpointReports {
    endpoints: Vec<MetricsEndpoint>,
    context: Arc<MetricsContext>,
    health: HealthChecks,
}

impl MetricsEndpointReports {
    /// Table with the default endpoints: `json`, `text`, `prometheus`,
    /// `health`, `ping`.
    pub fn new(context: Arc<MetricsContext>, health: HealthChecks) -> Self {
        let mut reports = Self::empty(context, health);
        reports
            .with_json_report("json")
            .with_text_report("text")
            .with_prometheus_report("prometheus")
            .with_health_status("health")
            .with_ping("ping");
        reports
    }

    pub fn empty(context: Arc<MetricsContext>, health: HealthChecks) -> Self {
        Self { endpoints: Vec::new(), context, health }
    }

    /// Register (or replace) a custom endpoint. Invalid paths are logged and
    /// skipped.
    pub fn with_endpoint<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&EndpointRequest<'_>) -> Result<EndpointResponse> + Send + Sync + 'static,
    {
        match MetricsEndpoint::new(path, Arc::new(handler)) {
            Ok(endpoint) => {
                self.endpoints.retain(|e| e.path != endpoint.path);
                self.endpoints.push(endpoint);
            }
            Err(e) => tracing::warn!(path, error = %e, "metrics endpoint rejected"),
        }
        self
    }

    pub fn with_json_report(&mut self, path: &str) -> &mut Self {
        let ctx = Arc::clone(&self.context);
        self.with_endpoint(path, move |_| {
            Ok(EndpointResponse::json(reports::json_report(&ctx.snapshot())?))
        })
    }

    pub fn with_text_report(&mut self, path: &str) -> &mut Self {
        let ctx = Arc::clone(&self.context);
        self.with_endpoint(path, move |_| Ok(EndpointResponse::text(reports::text_report(&ctx.snapshot()))))
    }

    pub fn with_prometheus_report(&mut self, path: &str) -> &mut Self {
        let ctx = Arc::clone(&self.context);
        self.with_endpoint(path, move |_| {
            Ok(EndpointResponse::new(
                reports::prometheus_report(&ctx.snapshot()),
                "text/plain; version=0.0.4",
            ))
        })
    }

    pub fn with_health_status(&mut self, path: &str) -> &mut Self {
        let health = self.health.clone();
        self.with_endpoint(path, move |_| {
            let status = health.status();
            let code = if status.is_healthy { 200 } else { 500 };
            Ok(EndpointResponse::json(reports::health_json(&status)?).with_status(code))
        })
    }

    pub fn with_ping(&mut self, path: &str) -> &mut Self {
        self.with_endpoint(path, |_| Ok(EndpointResponse::text("pong")))
    }

    pub fn context(&self) -> Arc<MetricsContext> {
        Arc::clone(&self.context)
    }

    pub fn health(&self) -> &HealthChecks {
        &self.health
    }

    pub fn paths(&self) -> Vec<&str> {
        self.endpoints.iter().map(MetricsEndpoint::path).collect()
    }

    /// Exact matches win over wildcard matches; among wildcards the longest
    /// prefix wins.
    pub fn lookup<'a>(&self, rest: &'a str) -> Option<(&MetricsEndpoint, Option<&'a str>)> {
        let rest = normalize(rest);
        if rest.is_empty() {
            return None;
        }
        let mut best: Option<(&MetricsEndpoint, Option<&'a str>)> = None;
        for e in &self.endpoints {
            match e.match_path(rest) {
                Some(None) => return Some((e, None)),
                Some(Some(w)) => {
                    let better = best.map_or(true, |(b, _)| e.segments.len() > b.segments.len());
                    if better {
                        best = Some((e, Some(w)));
                    }
                }
                None => {}
            }
        }
        best
    }

    /// Run the matching handler. `None` when nothing matches.
    pub fn process(&self, rest: &str, query: Option<&str>) -> Option<Result<EndpointResponse>> {
        let (endpoint, wildcard) = self.lookup(rest)?;
        let req = EndpointRequest { path: normalize(rest), wildcard, query };
        Some((endpoint.handler)(&req))
    }
}

/// Leading slashes and one trailing slash are not part of the endpoint name.
fn normalize(rest: &str) -> &str {
    let rest = rest.trim_start_matches('/');
    rest.strip_suffix('/').unwrap_or(rest)
}
