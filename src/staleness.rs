//! Staleness classification
//!
//! Only the temperature reading is judged; humidity and pressure change too
//! slowly for their age to matter.

use crate::model::{MetricKind, Reading, SensorReadings};
use chrono::{DateTime, Duration};
use chrono_tz::Tz;

/// Age after which a reading is flagged
pub const WARNING_AGE_HOURS: i64 = 2;

/// Age after which a reading is considered dead
pub const CRITICAL_AGE_HOURS: i64 = 24;

/// How old a sensor's temperature reading is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Warning,
    Critical,
}

impl Staleness {
    /// Marker appended after the sensor name
    pub fn marker(&self) -> &'static str {
        match self {
            Staleness::Fresh => "",
            Staleness::Warning => " ⚠️",
            Staleness::Critical => " ‼️",
        }
    }
}

/// Classify a single reading; thresholds are exclusive
pub fn classify_reading(reading: &Reading, now: DateTime<Tz>) -> Staleness {
    let age = now.signed_duration_since(reading.timestamp);

    if age > Duration::hours(CRITICAL_AGE_HOURS) {
        Staleness::Critical
    } else if age > Duration::hours(WARNING_AGE_HOURS) {
        Staleness::Warning
    } else {
        Staleness::Fresh
    }
}

/// Classify a sensor by its temperature reading
pub fn classify(readings: &SensorReadings, now: DateTime<Tz>) -> Staleness {
    readings
        .get(&MetricKind::Temperature)
        .map(|reading| classify_reading(reading, now))
        .unwrap_or(Staleness::Fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
            .unwrap()
    }

    fn aged(age: Duration) -> Reading {
        Reading {
            value: 20.0,
            timestamp: now() - age,
        }
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let cases = [
            (Duration::minutes(30), Staleness::Fresh),
            (Duration::hours(2), Staleness::Fresh),
            (Duration::hours(2) + Duration::seconds(1), Staleness::Warning),
            (Duration::hours(24), Staleness::Warning),
            (Duration::hours(24) + Duration::seconds(1), Staleness::Critical),
            (Duration::days(3), Staleness::Critical),
        ];

        for (age, expected) in cases {
            assert_eq!(classify_reading(&aged(age), now()), expected, "age {}", age);
        }
    }

    #[test]
    fn test_only_temperature_counts() {
        let mut readings = SensorReadings::new();
        readings.insert(MetricKind::Humidity, aged(Duration::days(2)));
        assert_eq!(classify(&readings, now()), Staleness::Fresh);

        readings.insert(MetricKind::Temperature, aged(Duration::hours(3)));
        assert_eq!(classify(&readings, now()), Staleness::Warning);
    }

    #[test]
    fn test_markers() {
        assert_eq!(Staleness::Fresh.marker(), "");
        assert_eq!(Staleness::Warning.marker(), " ⚠️");
        assert_eq!(Staleness::Critical.marker(), " ‼️");
    }
}
