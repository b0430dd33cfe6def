//! Core data types for the climate channel
//!
//! This module defines the types shared by every stage of a cycle:
//! - `MetricKind`: What a reading measures
//! - `Reading`: One value with its (canonical) timestamp
//! - `SensorSnapshot`: All current readings keyed by sensor id
//! - `GroupedView`: The snapshot projected through the display layout

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of measurement a reading carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Degrees Celsius
    Temperature,
    /// Relative humidity in percent
    Humidity,
    /// Air pressure in hPa, never scaled
    Pressure,
}

impl MetricKind {
    /// Get all metric kinds for iteration
    pub fn all() -> &'static [MetricKind] {
        &[
            MetricKind::Temperature,
            MetricKind::Humidity,
            MetricKind::Pressure,
        ]
    }

    /// Name used by the sources and the persisted files
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "temperature",
            MetricKind::Humidity => "humidity",
            MetricKind::Pressure => "pressure",
        }
    }

    /// Parse a source-supplied metric name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "temperature" => Some(MetricKind::Temperature),
            "humidity" => Some(MetricKind::Humidity),
            "pressure" => Some(MetricKind::Pressure),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single measured value
///
/// The timestamp is always expressed in the canonical timezone; use
/// [`Reading::normalized`] to build one from a source timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub timestamp: DateTime<Tz>,
}

impl Reading {
    /// Create a reading from a UTC instant, converting it into `tz`
    pub fn normalized(value: f64, observed_at: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            value,
            timestamp: observed_at.with_timezone(&tz),
        }
    }
}

/// Readings of one sensor, by metric kind
pub type SensorReadings = BTreeMap<MetricKind, Reading>;

/// All current readings, by canonical sensor id
pub type SensorSnapshot = BTreeMap<String, SensorReadings>;

/// One display group of the rendered message
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    /// Header shown above the group's sensors
    pub label: String,
    /// Sensor readings keyed by display name
    pub sensors: BTreeMap<String, SensorReadings>,
}

/// The snapshot projected through the sensor layout, keyed by group key
pub type GroupedView = BTreeMap<String, Group>;

/// A metric value that differs from its last observation
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub sensor_id: String,
    pub metric: MetricKind,
    pub value: f64,
    pub observed_at: DateTime<Tz>,
}
