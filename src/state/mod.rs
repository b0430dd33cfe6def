//! Persisted State
//!
//! The only state shared between runs lives in two small JSON files:
//!
//! - **snapshot**: last known value per sensor and metric (`data.json`)
//! - **view**: when the detailed view was last requested (`view.json`)
//!
//! A missing or unreadable file is an empty state, never an error. Writes go
//! to a sibling temp file that is renamed over the target, so readers in
//! another process see either the old or the new content.

pub mod error;
pub mod snapshot;
pub mod view;

pub use error::{StateError, StateResult};
pub use snapshot::{LastSnapshot, SnapshotStore};
pub use view::{ViewState, ViewStateCache, DETAILED_HOLD_MINUTES};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Read a JSON file, falling back to `T::default()`
pub(crate) async fn read_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No state file at {:?}, starting empty", path);
            return T::default();
        }
        Err(e) => {
            tracing::warn!("Failed to read state file {:?}: {}", path, e);
            return T::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Ignoring malformed state file {:?}: {}", path, e);
            T::default()
        }
    }
}

/// Write `value` as pretty JSON, replacing `path` atomically
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StateResult<()> {
    let io_err = |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, json).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
