//! Channel cycle
//!
//! One cycle reads every source, logs changed values, renders the message in
//! the view the debounce state asks for and edits the chat message.
//!
//! ```text
//! trigger → aggregate → change log → group → render → edit message
//!                                             ↑
//!                                   view state decides verbosity
//! ```
//!
//! Cycles are serialized: the last-snapshot and view-state files are
//! read-modify-write without conflict resolution.

use crate::aggregate::{ReadingAggregator, SourceBinding};
use crate::changelog::{ChangeLog, ChangeStore, SqliteChangeStore, StoreError};
use crate::config::{Config, ConfigError};
use crate::group::{group, GroupError, SensorLayout};
use crate::render::{render_compact, render_detailed, toggle_button, CALLBACK_LESS, CALLBACK_MORE};
use crate::sources::{
    GatewaySource, HeatingSource, HubSource, SourceError, GATEWAY_SOURCE, HEATING_SOURCE,
    HUB_SOURCE,
};
use crate::state::{SnapshotStore, StateError, ViewStateCache};
use crate::telegram::{CallbackQuery, ChatTransport, TelegramError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Errors of a channel cycle or of its setup
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Layout lookup failed: {0}")]
    Group(#[from] GroupError),

    #[error("Sending message failed: {0}")]
    Transport(#[from] TelegramError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source setup failed: {0}")]
    Source(#[from] SourceError),

    #[error("Change store error: {0}")]
    Store(#[from] StoreError),
}

/// The climate message and everything needed to refresh it
pub struct Channel {
    aggregator: ReadingAggregator,
    layout: SensorLayout,
    changelog: ChangeLog,
    view_state: ViewStateCache,
    transport: Arc<dyn ChatTransport>,
    cycle: Mutex<()>,
}

impl Channel {
    pub fn new(
        aggregator: ReadingAggregator,
        layout: SensorLayout,
        changelog: ChangeLog,
        view_state: ViewStateCache,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            aggregator,
            layout,
            changelog,
            view_state,
            transport,
            cycle: Mutex::new(()),
        }
    }

    /// Wire up sources, state and change store from configuration
    pub fn from_config(
        config: &Config,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self, ChannelError> {
        let timezone = config.canonical_timezone()?;
        let mut sources = Vec::new();

        // Ascending precedence: later sources win on conflicts
        if let Some(hub) = &config.hub {
            sources.push(SourceBinding::new(
                Box::new(HubSource::new(hub, timezone)?),
                hub.names.clone().into_iter().collect(),
            ));
        }
        if let Some(heating) = &config.heating {
            sources.push(SourceBinding::new(
                Box::new(HeatingSource::new(heating)?),
                heating.names.clone().into_iter().collect(),
            ));
        }
        if let Some(gateway) = &config.gateway {
            let ids: HashMap<String, String> = gateway
                .sensors
                .iter()
                .flat_map(|(sensor, metrics)| {
                    metrics
                        .values()
                        .map(move |number| (number.to_string(), sensor.clone()))
                })
                .collect();
            sources.push(SourceBinding::new(Box::new(GatewaySource::new(gateway)?), ids));
        }

        let enabled: Vec<&str> = [
            (config.hub.is_some(), HUB_SOURCE),
            (config.heating.is_some(), HEATING_SOURCE),
            (config.gateway.is_some(), GATEWAY_SOURCE),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        if enabled.is_empty() {
            tracing::warn!("No sources configured");
        } else {
            tracing::info!("Sources: {}", enabled.join(", "));
        }

        let store: Arc<dyn ChangeStore> =
            Arc::new(SqliteChangeStore::open(config.changelog_path())?);

        Ok(Self::new(
            ReadingAggregator::new(sources, timezone),
            SensorLayout::new(config.sensors.clone(), config.groups.clone()),
            ChangeLog::new(SnapshotStore::new(config.state.snapshot_path()), store),
            ViewStateCache::new(config.state.view_path()),
            transport,
        ))
    }

    /// Scheduled push: compact unless a detailed view was just requested
    pub async fn push(&self) -> Result<bool, ChannelError> {
        let _cycle = self.cycle.lock().await;
        self.publish(false, false, Utc::now()).await
    }

    /// Handle a press of the toggle button
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Result<(), ChannelError> {
        if let Err(e) = self.transport.answer_callback(&query.id).await {
            tracing::warn!("Failed to answer callback {}: {}", query.id, e);
        }

        let data = query.data.as_deref().unwrap_or_default();
        tracing::info!("{} - {} - {}", data, query.from.first_name, query.from.id);

        let _cycle = self.cycle.lock().await;
        let now = Utc::now();
        match data {
            CALLBACK_MORE => {
                self.publish(true, false, now).await?;
                self.view_state.record_toggle(true, now).await?;
            }
            CALLBACK_LESS => {
                self.publish(false, true, now).await?;
                self.view_state.record_toggle(false, now).await?;
            }
            other => tracing::warn!("Ignoring unknown callback data {:?}", other),
        }

        Ok(())
    }

    /// Run one cycle at `now`; returns whether the detailed view was sent
    ///
    /// Callers hold the cycle lock.
    async fn publish(
        &self,
        requested_full: bool,
        force_override: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, ChannelError> {
        let local_now = now.with_timezone(&self.aggregator.timezone());

        let mut snapshot = self.aggregator.aggregate(now).await;
        if let Err(e) = self.changelog.diff_and_persist(&mut snapshot, local_now).await {
            tracing::error!("Change log update failed: {}", e);
        }

        let view = group(&snapshot, &self.layout)?;
        let detailed = self
            .view_state
            .decide_view(requested_full, force_override, now)
            .await;

        let text = if detailed {
            render_detailed(&view, local_now)
        } else {
            render_compact(&view, local_now)
        };

        self.transport
            .edit_message(&text, &toggle_button(detailed))
            .await?;

        tracing::info!(
            "Message updated ({} view, {} sensors)",
            if detailed { "detailed" } else { "compact" },
            snapshot.len()
        );
        Ok(detailed)
    }

    /// Run one cycle at a given instant, taking the cycle lock
    pub async fn publish_at(
        &self,
        requested_full: bool,
        force_override: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, ChannelError> {
        let _cycle = self.cycle.lock().await;
        self.publish(requested_full, force_override, now).await
    }
}
