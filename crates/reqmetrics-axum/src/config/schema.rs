use serde::Deserialize;
use reqmetrics_core::error::{ReqMetricsError, Result};

use crate::metrics_config::DEFAULT_CONTEXT;
use crate::module::DEFAULT_MODULE_PATH;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub version: u32,

    #[serde(default = "default_listen")]
    pub listen: String,

    /// Child context of the root registry the request metrics live in.
    #[serde(default = "default_context")]
    pub context: String,

    #[serde(default)]
    pub module: ModuleSection,

    #[serde(default)]
    pub global_metrics: GlobalMetricsSection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            listen: default_listen(),
            context: default_context(),
            module: ModuleSection::default(),
            global_metrics: GlobalMetricsSection::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ReqMetricsError::BadConfig(format!(
                "unsupported version {} (expected 1)",
                self.version
            )));
        }
        if self.context.trim().is_empty() {
            return Err(ReqMetricsError::BadConfig("context must not be empty".into()));
        }

        self.module.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSection {
    /// Mount path; empty disables the module.
    #[serde(default = "default_module_path")]
    pub path: String,
}

impl Default for ModuleSection {
    fn default() -> Self {
        Self { path: default_module_path() }
    }
}

impl ModuleSection {
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Ok(());
        }
        if !self.path.starts_with('/') {
            return Err(ReqMetricsError::BadConfig("module.path must start with '/'".into()));
        }
        if self.path.len() > 1 && self.path.ends_with('/') {
            return Err(ReqMetricsError::BadConfig("module.path must not end with '/'".into()));
        }
        if self.path.contains(['*', ':', '{', '}']) {
            return Err(ReqMetricsError::BadConfig(
                "module.path must not contain route parameters".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalMetricsSection {
    #[serde(default = "yes")]
    pub request_timer: bool,
    #[serde(default = "yes")]
    pub errors_meter: bool,
    #[serde(default = "yes")]
    pub active_requests: bool,
    #[serde(default = "yes")]
    pub request_size: bool,
    #[serde(default = "yes")]
    pub per_route_timer: bool,
}

impl Default for GlobalMetricsSection {
    fn default() -> Self {
        Self {
            request_timer: true,
            errors_meter: true,
            active_requests: true,
            request_size: true,
            per_route_timer: true,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_context() -> String {
    DEFAULT_CONTEXT.into()
}
fn default_module_path() -> String {
    DEFAULT_MODULE_PATH.into()
}
fn yes() -> bool {
    true
}
