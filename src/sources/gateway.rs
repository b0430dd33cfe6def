//! Zigbee Gateway Source
//!
//! Reads sensors from a deCONZ (RaspBee) gateway, one REST request per
//! configured sensor number. The gateway reports temperature and humidity
//! in hundredths and `lastupdated` as naive UTC.

use super::*;
use crate::config::GatewayConfig;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

/// Source name used in logs and id tables
pub const GATEWAY_SOURCE: &str = "gateway";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// deCONZ gateway source
pub struct GatewaySource {
    client: Client,
    base_url: String,
    /// Gateway sensor numbers to poll, with the metric each one reports
    endpoints: Vec<(u32, MetricKind)>,
}

#[derive(Debug, Deserialize)]
struct SensorResponse {
    state: HashMap<String, serde_json::Value>,
}

impl GatewaySource {
    /// Create a new gateway source
    pub fn new(config: &GatewayConfig) -> Result<Self, SourceError> {
        let mut endpoints = Vec::new();
        for (sensor, metrics) in &config.sensors {
            for (metric, number) in metrics {
                let kind = MetricKind::parse(metric).ok_or_else(|| {
                    SourceError::Config(format!("unknown metric {} for sensor {}", metric, sensor))
                })?;
                endpoints.push((*number, kind));
            }
        }

        Ok(Self {
            client: http_client(config.request_timeout_secs)?,
            base_url: format!(
                "http://{}/api/{}",
                config.host.trim_end_matches('/'),
                urlencoding::encode(&config.api_key)
            ),
            endpoints,
        })
    }

    async fn fetch_sensor(&self, number: u32, metric: MetricKind) -> Result<RawReading, SourceError> {
        let response = self
            .client
            .get(&format!("{}/sensors/{}", self.base_url, number))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "Gateway returned {} for sensor {}",
                response.status(),
                number
            )));
        }

        let data: SensorResponse = response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        let raw = data
            .state
            .get(metric.as_str())
            .and_then(numeric_value)
            .ok_or_else(|| SourceError::ParseError(format!("sensor {} has no {}", number, metric)))?;

        let updated = data
            .state
            .get("lastupdated")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SourceError::ParseError(format!("sensor {} has no lastupdated", number)))?;

        Ok(RawReading::new(number.to_string(), metric, scale(metric, raw))
            .observed_at(parse_lastupdated(updated)?))
    }
}

/// Convert a raw gateway value into physical units
pub(crate) fn scale(metric: MetricKind, raw: f64) -> f64 {
    match metric {
        MetricKind::Pressure => raw,
        MetricKind::Temperature | MetricKind::Humidity => raw / 100.0,
    }
}

/// Parse a naive UTC `lastupdated`, ignoring fractional seconds
fn parse_lastupdated(value: &str) -> Result<DateTime<Utc>, SourceError> {
    let trimmed = value.get(..19).unwrap_or(value);
    NaiveDateTime::parse_from_str(trimmed, TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| SourceError::ParseError(format!("lastupdated {:?}: {}", value, e)))
}

#[async_trait]
impl SourceAdapter for GatewaySource {
    fn name(&self) -> &str {
        GATEWAY_SOURCE
    }

    async fn fetch(&self) -> Result<Vec<RawReading>, SourceError> {
        let mut readings = Vec::with_capacity(self.endpoints.len());

        for (number, metric) in &self.endpoints {
            match self.fetch_sensor(*number, *metric).await {
                Ok(reading) => readings.push(reading),
                Err(e) => tracing::warn!("Gateway sensor {} ({}) skipped: {}", number, metric, e),
            }
        }

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GatewayConfig {
        let mut metrics = BTreeMap::new();
        metrics.insert("temperature".to_string(), 5);
        metrics.insert("pressure".to_string(), 7);
        metrics.insert("humidity".to_string(), 6);

        let mut sensors = BTreeMap::new();
        sensors.insert("20".to_string(), metrics);

        GatewayConfig {
            host: server.address().to_string(),
            api_key: "KEY123".into(),
            request_timeout_secs: 2,
            sensors,
        }
    }

    async fn mock_sensor(server: &MockServer, number: u32, state: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/KEY123/sensors/{}", number)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Climate",
                "state": state
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_scale() {
        assert_eq!(scale(MetricKind::Pressure, 1013.0), 1013.0);
        assert_eq!(scale(MetricKind::Temperature, 2134.0), 21.34);
        assert_eq!(scale(MetricKind::Humidity, 5560.0), 55.6);
    }

    #[test]
    fn test_parse_lastupdated() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        assert_eq!(parse_lastupdated("2024-01-15T08:30:00").unwrap(), expected);
        assert_eq!(parse_lastupdated("2024-01-15T08:30:00.512").unwrap(), expected);
        assert!(parse_lastupdated("none").is_err());
    }

    #[tokio::test]
    async fn test_fetch_scales_all_but_pressure() {
        let server = MockServer::start().await;
        mock_sensor(&server, 5, json!({ "temperature": 2134, "lastupdated": "2024-01-15T08:30:00" })).await;
        mock_sensor(&server, 6, json!({ "humidity": 5560, "lastupdated": "2024-01-15T08:31:00" })).await;
        mock_sensor(&server, 7, json!({ "pressure": 1013, "lastupdated": "2024-01-15T08:32:00" })).await;

        let source = GatewaySource::new(&config_for(&server)).unwrap();
        let readings = source.fetch().await.unwrap();
        let by_metric: HashMap<MetricKind, &RawReading> =
            readings.iter().map(|r| (r.metric, r)).collect();

        assert_eq!(readings.len(), 3);
        assert_eq!(by_metric[&MetricKind::Temperature].value, 21.34);
        assert_eq!(by_metric[&MetricKind::Temperature].sensor, "5");
        assert_eq!(by_metric[&MetricKind::Humidity].value, 55.6);
        assert_eq!(by_metric[&MetricKind::Pressure].value, 1013.0);
        assert_eq!(
            by_metric[&MetricKind::Pressure].observed_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 8, 32, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_one_failing_sensor_does_not_drop_the_others() {
        let server = MockServer::start().await;
        mock_sensor(&server, 5, json!({ "temperature": 1950, "lastupdated": "2024-01-15T08:30:00" })).await;
        Mock::given(method("GET"))
            .and(path("/api/KEY123/sensors/6"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mock_sensor(&server, 7, json!({ "pressure": 998, "lastupdated": "none" })).await;

        let source = GatewaySource::new(&config_for(&server)).unwrap();
        let readings = source.fetch().await.unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, 19.5);
    }
}
