//! reqmetrics core: metric registry, report generators, endpoint table, and
//! error types.
//!
//! This crate carries no HTTP or runtime dependencies. The axum integration
//! (`reqmetrics-axum`) consumes it through `MetricsContext` and
//! `MetricsEndpointReports` only.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Instruments sit on the request path of the host application, so every
//! fallible path surfaces as `ReqMetricsError`/`Result` instead.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod endpoints;
pub mod error;
pub mod health;
pub mod registry;
pub mod reports;
pub mod unit;

/// Shared result type.
pub use error::{ErrorCode, ReqMetricsError, Result};

pub use clock::{Clock, ManualClock, SystemClock};
pub use endpoints::{Charset, EndpointRequest, EndpointResponse, MetricsEndpointReports};
pub use health::{HealthChecks, HealthStatus};
pub use registry::{Counter, Histogram, Meter, MetricsContext, MetricsData, Timer};
pub use unit::{TimeUnit, Unit};
