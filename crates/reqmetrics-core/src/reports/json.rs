use crate::error::Result;
use crate::health::HealthStatus;
use crate::registry::MetricsData;

pub fn json_report(data: &MetricsData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn health_json(status: &HealthStatus) -> Result<String> {
    Ok(serde_json::to_string_pretty(status)?)
}
