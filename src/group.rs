//! Sensor grouping
//!
//! Projects a snapshot through the configured display layout. A sensor that
//! is configured but missing from the snapshot is an error: it means either
//! every source for it failed or the layout is stale, and the message should
//! not silently lose a line.

use crate::config::SensorEntry;
use crate::model::{Group, GroupedView, SensorSnapshot};
use std::collections::BTreeMap;

/// Display layout: ordered sensors plus group labels
#[derive(Debug, Clone, Default)]
pub struct SensorLayout {
    pub sensors: Vec<SensorEntry>,
    pub groups: BTreeMap<String, String>,
}

impl SensorLayout {
    pub fn new(sensors: Vec<SensorEntry>, groups: BTreeMap<String, String>) -> Self {
        Self { sensors, groups }
    }

    fn label(&self, group: &str) -> String {
        self.groups
            .get(group)
            .cloned()
            .unwrap_or_else(|| group.to_string())
    }
}

/// Grouping errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GroupError {
    #[error("Sensor {id} ({name}) has no readings")]
    MissingSensor { id: String, name: String },
}

/// Build the grouped view of `snapshot`
pub fn group(snapshot: &SensorSnapshot, layout: &SensorLayout) -> Result<GroupedView, GroupError> {
    let mut view = GroupedView::new();

    for entry in &layout.sensors {
        let readings = snapshot
            .get(&entry.id)
            .ok_or_else(|| GroupError::MissingSensor {
                id: entry.id.clone(),
                name: entry.name.clone(),
            })?;

        view.entry(entry.group.clone())
            .or_insert_with(|| Group {
                label: layout.label(&entry.group),
                sensors: BTreeMap::new(),
            })
            .sensors
            .insert(entry.name.clone(), readings.clone());
    }

    Ok(view)
}
