//! FHEM Hub Source
//!
//! Reads humidity and temperature of the room sensors through the FHEMWEB
//! JSON interface (`jsonlist2`). Reading times are local times of the hub.

use super::*;
use crate::config::HubConfig;
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

/// Source name used in logs and id tables
pub const HUB_SOURCE: &str = "hub";

const CSRF_HEADER: &str = "X-FHEM-csrfToken";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// FHEM hub source
pub struct HubSource {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    pattern: Regex,
    devspec: String,
    timezone: Tz,
}

#[derive(Debug, Deserialize)]
struct JsonList {
    #[serde(rename = "Results", default)]
    results: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct Device {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Readings", default)]
    readings: HashMap<String, DeviceReading>,
}

#[derive(Debug, Deserialize)]
struct DeviceReading {
    #[serde(rename = "Value")]
    value: serde_json::Value,
    #[serde(rename = "Time")]
    time: String,
}

impl HubSource {
    /// Create a new hub source; reading times are interpreted in the hub's
    /// timezone, falling back to `default_tz`
    pub fn new(config: &HubConfig, default_tz: Tz) -> Result<Self, SourceError> {
        let timezone = match &config.timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| SourceError::Config(format!("unknown timezone {}", name)))?,
            None => default_tz,
        };

        let pattern = Regex::new(&format!("^(?:{})$", config.name_pattern))
            .map_err(|e| SourceError::Config(e.to_string()))?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), password) if !user.is_empty() => {
                Some((user.clone(), password.clone().unwrap_or_default()))
            }
            _ => None,
        };

        Ok(Self {
            client: http_client(config.request_timeout_secs)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials,
            pattern,
            devspec: config.name_pattern.clone(),
            timezone,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    /// FHEMWEB rejects commands without the per-instance CSRF token
    async fn csrf_token(&self) -> Result<Option<String>, SourceError> {
        let response = self
            .get(&format!("{}/fhem", self.base_url))
            .query(&[("XHR", "1")])
            .send()
            .await?;

        if response.status() == 401 {
            return Err(SourceError::ApiError("Hub rejected credentials".into()));
        }

        Ok(response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    async fn jsonlist(&self) -> Result<JsonList, SourceError> {
        let token = self.csrf_token().await?;
        let command = format!("jsonlist2 {} humidity temperature", self.devspec);

        let mut query = vec![("cmd", command), ("XHR", "1".to_string())];
        if let Some(token) = token {
            query.push(("fwcsrf", token));
        }

        let response = self
            .get(&format!("{}/fhem", self.base_url))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "Hub returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))
    }

    fn parse_time(&self, time: &str) -> Result<DateTime<Utc>, SourceError> {
        let naive = NaiveDateTime::parse_from_str(time, TIME_FORMAT)
            .map_err(|e| SourceError::ParseError(format!("{}: {}", time, e)))?;

        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| SourceError::ParseError(format!("{} does not exist locally", time)))
    }
}

#[async_trait]
impl SourceAdapter for HubSource {
    fn name(&self) -> &str {
        HUB_SOURCE
    }

    async fn fetch(&self) -> Result<Vec<RawReading>, SourceError> {
        let list = self.jsonlist().await?;
        let mut readings = Vec::new();

        for device in list.results {
            if !self.pattern.is_match(&device.name) {
                continue;
            }

            for metric in [MetricKind::Humidity, MetricKind::Temperature] {
                let Some(reading) = device.readings.get(metric.as_str()) else {
                    continue;
                };

                let Some(value) = numeric_value(&reading.value) else {
                    tracing::warn!(
                        "Hub device {} has non-numeric {}: {}",
                        device.name,
                        metric,
                        reading.value
                    );
                    continue;
                };

                match self.parse_time(&reading.time) {
                    Ok(at) => readings
                        .push(RawReading::new(device.name.clone(), metric, value).observed_at(at)),
                    Err(e) => tracing::warn!("Hub device {} {}: {}", device.name, metric, e),
                }
            }
        }

        Ok(readings)
    }
}
