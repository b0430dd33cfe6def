//! Change Log
//!
//! Compares each new snapshot with the last persisted one and appends a
//! [`ChangeRecord`] for every metric whose value moved. The first observation
//! of a metric only seeds the persisted snapshot.
//!
//! Metrics known from earlier runs but missing in this cycle are carried into
//! the snapshot with their last value and a timestamp older than a day, so
//! they render as stale instead of vanishing.

use crate::model::{ChangeRecord, Reading, SensorSnapshot};
use crate::state::{SnapshotStore, StateError};
use async_trait::async_trait;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Age given to carried-over readings; just past the critical threshold
const CARRIED_AGE_MINUTES: i64 = 24 * 60 + 1;

/// Append-only destination for change records
#[async_trait]
pub trait ChangeStore: Send + Sync {
    async fn insert(&self, record: &ChangeRecord) -> Result<(), StoreError>;
}

/// Change store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Change log errors
#[derive(Debug, thiserror::Error)]
pub enum ChangeLogError {
    #[error("Failed to persist snapshot: {0}")]
    State(#[from] StateError),
}

/// SQLite-backed change store
pub struct SqliteChangeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChangeStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }

        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory database, for tests and dry runs
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS change_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor_id   TEXT NOT NULL,
                metric      TEXT NOT NULL,
                value       REAL NOT NULL,
                observed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_change_log_sensor
                ON change_log (sensor_id, observed_at);",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM change_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl ChangeStore for SqliteChangeStore {
    async fn insert(&self, record: &ChangeRecord) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let record = record.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            conn.execute(
                "INSERT INTO change_log (sensor_id, metric, value, observed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.sensor_id,
                    record.metric.as_str(),
                    record.value,
                    record.observed_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

/// Diffs snapshots against the persisted one and records changes
pub struct ChangeLog {
    snapshots: SnapshotStore,
    store: Arc<dyn ChangeStore>,
}

impl ChangeLog {
    pub fn new(snapshots: SnapshotStore, store: Arc<dyn ChangeStore>) -> Self {
        Self { snapshots, store }
    }

    /// Diff `snapshot` against the last one, persist, and log changes
    ///
    /// `snapshot` is completed in place with carried-over readings.
    pub async fn diff_and_persist(
        &self,
        snapshot: &mut SensorSnapshot,
        now: DateTime<Tz>,
    ) -> Result<Vec<ChangeRecord>, ChangeLogError> {
        let mut last = self.snapshots.load().await;
        let mut changes = Vec::new();

        for (sensor_id, readings) in snapshot.iter() {
            let known = last.entry(sensor_id.clone()).or_default();

            for (metric, reading) in readings {
                match known.insert(*metric, reading.value) {
                    Some(previous) if previous != reading.value => {
                        tracing::debug!(
                            "{} {} - was {} - is {}",
                            sensor_id,
                            metric,
                            previous,
                            reading.value
                        );
                        changes.push(ChangeRecord {
                            sensor_id: sensor_id.clone(),
                            metric: *metric,
                            value: reading.value,
                            observed_at: now,
                        });
                    }
                    Some(_) => {}
                    None => tracing::debug!("{} {} first seen: {}", sensor_id, metric, reading.value),
                }
            }
        }

        let carried_at = now - Duration::minutes(CARRIED_AGE_MINUTES);
        for (sensor_id, metrics) in &last {
            for (metric, value) in metrics {
                snapshot
                    .entry(sensor_id.clone())
                    .or_default()
                    .entry(*metric)
                    .or_insert_with(|| {
                        tracing::debug!("{} {} missing, carrying {}", sensor_id, metric, value);
                        Reading {
                            value: *value,
                            timestamp: carried_at,
                        }
                    });
            }
        }

        self.snapshots.save(&last).await?;

        for record in &changes {
            if let Err(e) = self.store.insert(record).await {
                tracing::error!(
                    "Failed to log change of {} {}: {}",
                    record.sensor_id,
                    record.metric,
                    e
                );
            }
        }

        if !changes.is_empty() {
            tracing::info!("Logged {} changed values", changes.len());
        }

        Ok(changes)
    }
}
