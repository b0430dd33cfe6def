//! Reading Sources
//!
//! Read-only clients for the systems that report climate readings:
//! - FHEM hub (humidity/temperature of the room sensors)
//! - Heating system live data (temperatures)
//! - Zigbee gateway (temperature, humidity, pressure)

mod gateway;
mod heating;
mod hub;

pub use gateway::{GatewaySource, GATEWAY_SOURCE};
pub use heating::{HeatingSource, HEATING_SOURCE};
pub use hub::{HubSource, HUB_SOURCE};

use crate::model::MetricKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Common trait for all reading sources
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique name for this source
    fn name(&self) -> &str;

    /// Fetch the current readings
    async fn fetch(&self) -> Result<Vec<RawReading>, SourceError>;
}

/// A reading as reported by a source, before id translation
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    /// Source-local sensor identifier
    pub sensor: String,
    pub metric: MetricKind,
    /// Value in physical units
    pub value: f64,
    /// When the source last saw this value; `None` means "now"
    pub observed_at: Option<DateTime<Utc>>,
}

impl RawReading {
    pub fn new(sensor: impl Into<String>, metric: MetricKind, value: f64) -> Self {
        Self {
            sensor: sensor.into(),
            metric,
            value,
            observed_at: None,
        }
    }

    /// Builder method: set the observation time
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }
}

/// Errors that can occur while reading a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid source configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_connect() {
            SourceError::Connection(err.to_string())
        } else if err.is_decode() {
            SourceError::ParseError(err.to_string())
        } else {
            SourceError::ApiError(err.to_string())
        }
    }
}

/// Build an HTTP client with a bounded request timeout
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SourceError::Config(e.to_string()))
}

/// Read a reading value that may arrive as a number or a numeric string
///
/// FHEM readings often carry a unit suffix ("21.3 °C"); only the leading
/// number counts.
pub(crate) fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.split_whitespace().next()?.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value(&json!(21.5)), Some(21.5));
        assert_eq!(numeric_value(&json!("55")), Some(55.0));
        assert_eq!(numeric_value(&json!("21.3 °C")), Some(21.3));
        assert_eq!(numeric_value(&json!("on")), None);
        assert_eq!(numeric_value(&json!(null)), None);
    }
}
