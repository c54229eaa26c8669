//! Health checks reported by the `health` endpoint.

use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub is_healthy: bool,
    pub message: String,
}

/// Aggregate of every registered check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub results: Vec<HealthCheckResult>,
}

type CheckFn = Arc<dyn Fn() -> std::result::Result<String, String> + Send + Sync>;

/// Named health checks. A check returns `Ok(message)` when healthy and
/// `Err(message)` otherwise; a panicking check counts as unhealthy.
#[derive(Clone, Default)]
pub struct HealthChecks {
    checks: Arc<RwLock<Vec<(String, CheckFn)>>>,
}

impl HealthChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check; a check with the same name is replaced.
    pub fn register<F>(&self, name: impl Into<String>, check: F)
    where
        F: Fn() -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        let name = name.into();
        let Ok(mut checks) = self.checks.write() else {
            tracing::warn!(check = %name, "health check registry poisoned");
            return;
        };
        checks.retain(|(n, _)| n != &name);
        checks.push((name, Arc::new(check)));
    }

    pub fn status(&self) -> HealthStatus {
        let (checks, poisoned): (Vec<(String, CheckFn)>, bool) = match self.checks.read() {
            Ok(c) => (c.clone(), false),
            Err(poisoned) => {
                tracing::warn!("health check registry poisoned");
                (poisoned.into_inner().clone(), true)
            }
        };

        let mut results: Vec<HealthCheckResult> = checks
            .into_iter()
            .map(|(name, check)| {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| check()))
                    .unwrap_or_else(|_| Err("health check panicked".to_string()));
                match outcome {
                    Ok(message) => HealthCheckResult { name, is_healthy: true, message },
                    Err(message) => HealthCheckResult { name, is_healthy: false, message },
                }
            })
            .collect();

        // Registrations may have been lost mid-update.
        if poisoned {
            results.push(HealthCheckResult {
                name: "health checks".to_string(),
                is_healthy: false,
                message: "health check registry poisoned".to_string(),
            });
        }

        HealthStatus {
            is_healthy: results.iter().all(|r| r.is_healthy),
            results,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_is_healthy() {
        assert!(HealthChecks::new().status().is_healthy);
    }

    #[test]
    fn one_failure_makes_status_unhealthy() {
        let h = HealthChecks::new();
        h.register("db", || Ok("connected".into()));
        h.register("disk", || Err("full".into()));
        let s = h.status();
        assert!(!s.is_healthy);
        assert_eq!(s.results.len(), 2);

        h.register("disk", || Ok("fine".into()));
        assert!(h.status().is_healthy);
    }

    #[test]
    #[allow(clippy::panic)]
    fn panicking_check_is_unhealthy() {
        let h = HealthChecks::new();
        h.register("boom", || panic!("nope"));
        let s = h.status();
        assert!(!s.is_healthy);
        assert_eq!(s.results[0].message, "health check panicked");
    }

    #[test]
    #[allow(clippy::panic)]
    fn poisoned_registry_is_unhealthy() {
        let h = HealthChecks::new();
        h.register("db", || Ok("connected".to_string()));

        let writer = h.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = writer.checks.write().unwrap();
            panic!("registry writer failed");
        })
        .join();
        assert!(outcome.is_err());

        let s = h.status();
        assert!(!s.is_healthy);
        assert_eq!(s.results.len(), 2);
        assert!(s.results[0].is_healthy);
        assert_eq!(s.results[1].message, "health check registry poisoned");
    }
}
