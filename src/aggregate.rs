//! Reading Aggregation
//!
//! Fetches every source concurrently and merges the results into one
//! [`SensorSnapshot`] keyed by canonical sensor id.
//!
//! Sources are merged in registration order; a later source overwrites an
//! earlier one per metric kind. A failing source contributes nothing for
//! this cycle.

use crate::model::{Reading, SensorSnapshot};
use crate::sources::{RawReading, SourceAdapter};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures_util::future::join_all;
use std::collections::HashMap;

/// A source together with its source-local id -> sensor id table
pub struct SourceBinding {
    pub adapter: Box<dyn SourceAdapter>,
    pub ids: HashMap<String, String>,
}

impl SourceBinding {
    pub fn new(adapter: Box<dyn SourceAdapter>, ids: HashMap<String, String>) -> Self {
        Self { adapter, ids }
    }
}

/// Merges the readings of all configured sources
pub struct ReadingAggregator {
    sources: Vec<SourceBinding>,
    timezone: Tz,
}

impl ReadingAggregator {
    /// Create an aggregator; `sources` are listed in ascending precedence
    pub fn new(sources: Vec<SourceBinding>, timezone: Tz) -> Self {
        Self { sources, timezone }
    }

    /// The canonical timezone readings are normalized into
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Fetch all sources and merge them into a snapshot
    ///
    /// `now` stamps readings whose source has no timestamp of its own.
    pub async fn aggregate(&self, now: DateTime<Utc>) -> SensorSnapshot {
        let results = join_all(self.sources.iter().map(|s| s.adapter.fetch())).await;

        let mut snapshot = SensorSnapshot::new();
        for (binding, result) in self.sources.iter().zip(results) {
            let name = binding.adapter.name();
            match result {
                Ok(readings) => {
                    tracing::debug!("Source {} returned {} readings", name, readings.len());
                    self.merge(&mut snapshot, binding, readings, now);
                }
                Err(e) => {
                    tracing::error!("Couldn't read from {}: {}", name, e);
                }
            }
        }

        snapshot
    }

    fn merge(
        &self,
        snapshot: &mut SensorSnapshot,
        binding: &SourceBinding,
        readings: Vec<RawReading>,
        now: DateTime<Utc>,
    ) {
        let source = binding.adapter.name();

        for raw in readings {
            let Some(sensor_id) = binding.ids.get(&raw.sensor) else {
                tracing::debug!("Source {} reports unmapped sensor {}", source, raw.sensor);
                continue;
            };

            let reading = Reading::normalized(
                raw.value,
                raw.observed_at.unwrap_or(now),
                self.timezone,
            );

            let previous = snapshot
                .entry(sensor_id.clone())
                .or_default()
                .insert(raw.metric, reading);

            if let Some(previous) = previous {
                if previous.value != raw.value {
                    tracing::warn!(
                        "Sensor {} {} reported by several sources ({} overrides {})",
                        sensor_id,
                        raw.metric,
                        raw.value,
                        previous.value
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricKind;
    use crate::sources::SourceError;
    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Source returning a fixed set of readings
    struct StaticSource {
        name: &'static str,
        readings: Vec<RawReading>,
    }

    #[async_trait]
    impl SourceAdapter for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<RawReading>, SourceError> {
            Ok(self.readings.clone())
        }
    }

    /// Source that is always unreachable
    struct DownSource;

    #[async_trait]
    impl SourceAdapter for DownSource {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch(&self) -> Result<Vec<RawReading>, SourceError> {
            Err(SourceError::Connection("refused".into()))
        }
    }

    fn ids(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_merges_and_translates_ids() {
        let hub = StaticSource {
            name: "hub",
            readings: vec![
                RawReading::new("Temp.Kitchen", MetricKind::Temperature, 21.3)
                    .observed_at(now() - chrono::Duration::minutes(5)),
                RawReading::new("Temp.Unknown", MetricKind::Temperature, 1.0),
            ],
        };
        let heating = StaticSource {
            name: "heating",
            readings: vec![RawReading::new("Outdoor", MetricKind::Temperature, 4.25)],
        };

        let aggregator = ReadingAggregator::new(
            vec![
                SourceBinding::new(Box::new(hub), ids(&[("Temp.Kitchen", "1")])),
                SourceBinding::new(Box::new(heating), ids(&[("Outdoor", "10")])),
            ],
            chrono_tz::Europe::Berlin,
        );

        let snapshot = aggregator.aggregate(now()).await;

        assert_eq!(snapshot.len(), 2);
        let kitchen = &snapshot["1"][&MetricKind::Temperature];
        assert_eq!(kitchen.value, 21.3);
        assert_eq!(kitchen.timestamp, now() - chrono::Duration::minutes(5));

        // Heating readings have no time of their own
        let outdoor = &snapshot["10"][&MetricKind::Temperature];
        assert_eq!(outdoor.timestamp, now());
    }

    #[tokio::test]
    async fn test_timestamps_are_canonical() {
        let source = StaticSource {
            name: "gateway",
            readings: vec![RawReading::new("5", MetricKind::Pressure, 1013.0).observed_at(now())],
        };
        let aggregator = ReadingAggregator::new(
            vec![SourceBinding::new(Box::new(source), ids(&[("5", "20")]))],
            chrono_tz::Europe::Berlin,
        );

        let snapshot = aggregator.aggregate(now()).await;
        let reading = &snapshot["20"][&MetricKind::Pressure];

        assert_eq!(reading.timestamp.timezone(), chrono_tz::Europe::Berlin);
        assert_eq!(reading.timestamp.format("%H:%M").to_string(), "13:00");
    }

    #[tokio::test]
    async fn test_failed_source_is_skipped() {
        let heating = StaticSource {
            name: "heating",
            readings: vec![RawReading::new("Outdoor", MetricKind::Temperature, 4.0)],
        };

        let aggregator = ReadingAggregator::new(
            vec![
                SourceBinding::new(Box::new(DownSource), ids(&[("x", "1")])),
                SourceBinding::new(Box::new(heating), ids(&[("Outdoor", "10")])),
            ],
            chrono_tz::UTC,
        );

        let snapshot = aggregator.aggregate(now()).await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("10"));
    }

    #[tokio::test]
    async fn test_later_source_wins_per_metric() {
        let first = StaticSource {
            name: "hub",
            readings: vec![
                RawReading::new("a", MetricKind::Temperature, 20.0),
                RawReading::new("a", MetricKind::Humidity, 50.0),
            ],
        };
        let second = StaticSource {
            name: "gateway",
            readings: vec![RawReading::new("b", MetricKind::Temperature, 22.0)],
        };

        let aggregator = ReadingAggregator::new(
            vec![
                SourceBinding::new(Box::new(first), ids(&[("a", "1")])),
                SourceBinding::new(Box::new(second), ids(&[("b", "1")])),
            ],
            chrono_tz::UTC,
        );

        let snapshot = aggregator.aggregate(now()).await;
        assert_eq!(snapshot["1"][&MetricKind::Temperature].value, 22.0);
        assert_eq!(snapshot["1"][&MetricKind::Humidity].value, 50.0);
    }
}
