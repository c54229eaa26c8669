//! Settings loader (strict parsing).

pub mod schema;

use std::fs;

use reqmetrics_core::error::{ReqMetricsError, Result};

pub use schema::{GlobalMetricsSection, ModuleSection, Settings};

pub fn load_from_file(path: &str) -> Result<Settings> {
    let s = fs::read_to_string(path)
        .map_err(|e| ReqMetricsError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<Settings> {
    let cfg: Settings = serde_yaml::from_str(s)
        .map_err(|e| ReqMetricsError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
