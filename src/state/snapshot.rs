//! Last-snapshot store
//!
//! Keeps the last known value of every sensor metric as
//! `{"<sensor id>": {"<metric>": value}}`. Timestamps are not kept.

use super::{read_json_or_default, write_json_atomic, StateResult};
use crate::model::MetricKind;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Last known values by sensor id and metric
pub type LastSnapshot = BTreeMap<String, BTreeMap<MetricKind, f64>>;

/// File-backed [`LastSnapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last snapshot; empty on first run
    pub async fn load(&self) -> LastSnapshot {
        read_json_or_default(&self.path).await
    }

    /// Replace the stored snapshot
    pub async fn save(&self, snapshot: &LastSnapshot) -> StateResult<()> {
        write_json_atomic(&self.path, snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        assert!(store.load().await.is_empty());

        let mut snapshot = LastSnapshot::new();
        snapshot
            .entry("1".into())
            .or_default()
            .insert(MetricKind::Temperature, 21.3);
        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load().await, snapshot);
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"20": {"pressure": 1013, "humidity": 55.6}}"#).unwrap();

        let snapshot = SnapshotStore::new(&path).load().await;
        assert_eq!(snapshot["20"][&MetricKind::Pressure], 1013.0);
        assert_eq!(snapshot["20"][&MetricKind::Humidity], 55.6);
    }
}
