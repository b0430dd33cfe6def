//! View-state debounce
//!
//! A user who asks for the detailed view keeps seeing it for a few minutes,
//! even when a scheduled push would normally show the compact view. The
//! request time is stored as `["<ISO-8601>"]`; `[]` means no request.

use super::{read_json_or_default, write_json_atomic, StateResult};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How long an explicit detailed request overrides scheduled pushes
pub const DETAILED_HOLD_MINUTES: i64 = 3;

/// Persisted view override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ViewState {
    /// When the detailed view was last requested
    pub toggled_at: Option<DateTime<Utc>>,
}

impl TryFrom<Vec<String>> for ViewState {
    type Error = String;

    fn try_from(items: Vec<String>) -> Result<Self, Self::Error> {
        match items.first() {
            None => Ok(ViewState::default()),
            Some(raw) => parse_timestamp(raw)
                .map(|at| ViewState { toggled_at: Some(at) })
                .ok_or_else(|| format!("invalid view timestamp {:?}", raw)),
        }
    }
}

impl From<ViewState> for Vec<String> {
    fn from(state: ViewState) -> Self {
        state
            .toggled_at
            .map(|at| vec![at.to_rfc3339()])
            .unwrap_or_default()
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = raw.get(..19).unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

/// Decides which view to render and remembers explicit toggles
#[derive(Debug, Clone)]
pub struct ViewStateCache {
    path: PathBuf,
}

impl ViewStateCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Current persisted state
    pub async fn load(&self) -> ViewState {
        read_json_or_default(&self.path).await
    }

    /// Whether to render the detailed view
    ///
    /// `force_override` bypasses the stored request entirely.
    pub async fn decide_view(
        &self,
        requested_full: bool,
        force_override: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if force_override {
            return requested_full;
        }

        match self.load().await.toggled_at {
            Some(at) if now.signed_duration_since(at) < Duration::minutes(DETAILED_HOLD_MINUTES) => {
                if !requested_full {
                    tracing::debug!("Detailed view requested at {}, keeping it", at);
                }
                true
            }
            _ => requested_full,
        }
    }

    /// Remember a user toggle: detailed stores `now`, compact clears
    pub async fn record_toggle(&self, now_detailed: bool, now: DateTime<Utc>) -> StateResult<()> {
        let state = ViewState {
            toggled_at: now_detailed.then_some(now),
        };
        write_json_atomic(&self.path, &state).await
    }
}
