//! Message rendering
//!
//! Two views of the same [`GroupedView`]:
//! - compact: one line per sensor with rounded temperature and humidity
//! - detailed: one block per sensor with every metric and its update time
//!
//! Output uses Telegram's legacy Markdown (`*bold*`, `_italic_`, `` `code` ``).
//! Groups and sensors are emitted in ascending key order.

use crate::model::{GroupedView, MetricKind, SensorReadings};
use crate::staleness::classify;
use chrono::DateTime;
use chrono_tz::Tz;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Callback data of the "show detailed" button
pub const CALLBACK_MORE: &str = "more";

/// Callback data of the "show compact" button
pub const CALLBACK_LESS: &str = "less";

/// The single inline button under the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleButton {
    pub label: &'static str,
    pub callback_data: &'static str,
}

/// Button offering the other view
pub fn toggle_button(detailed: bool) -> ToggleButton {
    if detailed {
        ToggleButton {
            label: "🔁 Kompakt",
            callback_data: CALLBACK_LESS,
        }
    } else {
        ToggleButton {
            label: "🔁 Erweitert",
            callback_data: CALLBACK_MORE,
        }
    }
}

/// Round to one decimal and print with a decimal comma
fn decimal_comma(value: f64) -> String {
    format!("{:.1}", (value * 10.0).round_ties_even() / 10.0).replace('.', ",")
}

/// Full precision, but whole numbers keep one decimal ("21.0", not "21")
fn full_precision(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn compact_line(name: &str, readings: &SensorReadings, now: DateTime<Tz>) -> String {
    let mut spans = String::new();
    if let Some(t) = readings.get(&MetricKind::Temperature) {
        spans.push_str(&format!("`{}°C `", decimal_comma(t.value)));
    }
    if let Some(h) = readings.get(&MetricKind::Humidity) {
        spans.push_str(&format!("`{}% `", decimal_comma(h.value)));
    }
    if !spans.is_empty() {
        spans.push(' ');
    }

    format!("{}{}{}\n", spans, name, classify(readings, now).marker())
}

/// Render the compact view
pub fn render_compact(view: &GroupedView, now: DateTime<Tz>) -> String {
    let mut out = String::new();

    for group in view.values() {
        out.push_str(&format!("*{}*\n", group.label));
        for (name, readings) in &group.sensors {
            out.push_str(&compact_line(name, readings, now));
        }
        out.push('\n');
    }

    out.push_str(&format!("_Aktualisiert: {}_", now.format(TIME_FORMAT)));
    out
}

/// Render the detailed view
pub fn render_detailed(view: &GroupedView, now: DateTime<Tz>) -> String {
    let mut out = String::new();

    for group in view.values() {
        out.push_str(&format!("\n*{}*\n", group.label.to_uppercase()));
        for (name, readings) in &group.sensors {
            out.push_str(&format!("*{}*\n", name));
            if let Some(t) = readings.get(&MetricKind::Temperature) {
                out.push_str(&format!("Temperatur: `{} °C`\n", full_precision(t.value)));
            }
            if let Some(h) = readings.get(&MetricKind::Humidity) {
                out.push_str(&format!("Luftfeuchtigkeit: `{} %`\n", full_precision(h.value)));
            }
            if let Some(p) = readings.get(&MetricKind::Pressure) {
                out.push_str(&format!("Luftdruck: `{} hPa`\n", full_precision(p.value)));
            }
            if let Some(t) = readings.get(&MetricKind::Temperature) {
                out.push_str(&format!(
                    "Aktualisiert: _{}_{}\n",
                    t.timestamp.format(TIME_FORMAT),
                    classify(readings, now).marker()
                ));
            }
            out.push('\n');
        }
    }

    out.push_str(&format!("_Nachricht aktualisiert: {}_", now.format(TIME_FORMAT)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Group, Reading};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn now() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
            .unwrap()
    }

    fn reading(value: f64, age: Duration) -> Reading {
        Reading {
            value,
            timestamp: now() - age,
        }
    }

    fn view(groups: Vec<(&str, &str, Vec<(&str, SensorReadings)>)>) -> GroupedView {
        groups
            .into_iter()
            .map(|(key, label, sensors)| {
                (
                    key.to_string(),
                    Group {
                        label: label.to_string(),
                        sensors: sensors
                            .into_iter()
                            .map(|(name, r)| (name.to_string(), r))
                            .collect::<BTreeMap<_, _>>(),
                    },
                )
            })
            .collect()
    }

    fn climate(temperature: f64, humidity: f64) -> SensorReadings {
        let mut r = SensorReadings::new();
        r.insert(MetricKind::Temperature, reading(temperature, Duration::minutes(5)));
        r.insert(MetricKind::Humidity, reading(humidity, Duration::minutes(5)));
        r
    }

    #[test]
    fn test_decimal_comma() {
        assert_eq!(decimal_comma(21.34), "21,3");
        assert_eq!(decimal_comma(55.6), "55,6");
        assert_eq!(decimal_comma(10.0), "10,0");
        assert_eq!(decimal_comma(-2.06), "-2,1");
        assert_eq!(decimal_comma(21.25), "21,2");
        assert_eq!(decimal_comma(22.75), "22,8");
    }

    #[test]
    fn test_compact_uses_decimal_comma() {
        let view = view(vec![("a", "Inside", vec![("Kitchen", climate(21.34, 55.6))])]);
        let text = render_compact(&view, now());

        assert!(text.contains("`21,3°C `"));
        assert!(text.contains("`55,6% `"));
        assert!(text.contains("`21,3°C ``55,6% ` Kitchen\n"));
        assert!(text.starts_with("*Inside*\n"));
        assert!(text.ends_with("_Aktualisiert: 2024-03-10 12:00:00_"));
    }

    #[test]
    fn test_compact_marks_stale_temperature() {
        let mut stale = SensorReadings::new();
        stale.insert(MetricKind::Temperature, reading(10.0, Duration::hours(3)));
        let mut dead = SensorReadings::new();
        dead.insert(MetricKind::Temperature, reading(8.0, Duration::hours(30)));

        let view = view(vec![("A", "A", vec![("Kitchen", stale), ("Cellar", dead)])]);
        let text = render_compact(&view, now());

        assert!(text.contains("`10,0°C ` Kitchen ⚠️\n"));
        assert!(text.contains("`8,0°C ` Cellar ‼️\n"));
    }

    #[test]
    fn test_groups_and_names_are_sorted() {
        let view = view(vec![
            ("b", "Outside", vec![("Garden", climate(4.0, 80.0))]),
            (
                "a",
                "Inside",
                vec![("Kitchen", climate(21.0, 50.0)), ("Bath", climate(23.0, 60.0))],
            ),
        ]);
        let text = render_compact(&view, now());

        let inside = text.find("*Inside*").unwrap();
        let bath = text.find("Bath").unwrap();
        let kitchen = text.find("Kitchen").unwrap();
        let outside = text.find("*Outside*").unwrap();
        assert!(inside < bath && bath < kitchen && kitchen < outside);
    }

    #[test]
    fn test_detailed_lists_all_metrics() {
        let mut readings = climate(21.34, 55.6);
        readings.insert(MetricKind::Pressure, reading(1013.0, Duration::minutes(5)));
        let view = view(vec![("a", "Inside", vec![("Kitchen", readings)])]);

        let text = render_detailed(&view, now());

        assert!(text.starts_with("\n*INSIDE*\n*Kitchen*\n"));
        assert!(text.contains("Temperatur: `21.34 °C`\n"));
        assert!(text.contains("Luftfeuchtigkeit: `55.6 %`\n"));
        assert!(text.contains("Luftdruck: `1013.0 hPa`\n"));
        assert!(text.contains("Aktualisiert: _2024-03-10 11:55:00_\n"));
        assert!(text.ends_with("_Nachricht aktualisiert: 2024-03-10 12:00:00_"));
    }

    #[test]
    fn test_detailed_without_temperature_has_no_update_line() {
        let mut readings = SensorReadings::new();
        readings.insert(MetricKind::Pressure, reading(998.5, Duration::days(3)));
        let view = view(vec![("a", "Inside", vec![("Hall", readings)])]);

        let text = render_detailed(&view, now());
        assert!(text.contains("Luftdruck: `998.5 hPa`\n"));
        assert!(!text.contains("Aktualisiert: _"));
    }

    #[test]
    fn test_toggle_button() {
        assert_eq!(toggle_button(false).callback_data, CALLBACK_MORE);
        assert_eq!(toggle_button(true).callback_data, CALLBACK_LESS);
        assert_eq!(toggle_button(true).label, "🔁 Kompakt");
    }
}
