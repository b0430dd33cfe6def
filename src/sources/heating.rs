//! Heating System Source
//!
//! Reads the live-data endpoint of the heating controller. The controller
//! only reports current values, so readings carry no timestamp.

use super::*;
use crate::config::HeatingConfig;
use reqwest::Client;
use serde::Deserialize;

/// Source name used in logs and id tables
pub const HEATING_SOURCE: &str = "heating";

/// Heating system live-data source
pub struct HeatingSource {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct LiveValue {
    name: String,
    #[serde(rename = "rawValue", default)]
    raw_value: serde_json::Value,
}

impl HeatingSource {
    /// Create a new heating source
    pub fn new(config: &HeatingConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(config.request_timeout_secs)?,
            url: format!("http://{}:{}/api/v1/live-data/", config.host, config.port),
        })
    }
}

/// Round to two decimal places
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[async_trait]
impl SourceAdapter for HeatingSource {
    fn name(&self) -> &str {
        HEATING_SOURCE
    }

    async fn fetch(&self) -> Result<Vec<RawReading>, SourceError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "Heating returned {}",
                response.status()
            )));
        }

        let values: Vec<LiveValue> = response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        Ok(values
            .into_iter()
            .filter_map(|v| {
                // Status entries such as the operating mode carry text
                let raw = numeric_value(&v.raw_value)?;
                Some(RawReading::new(v.name, MetricKind::Temperature, round2(raw)))
            })
            .collect())
    }
}
