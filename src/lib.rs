//! # Climate Channel
//!
//! Keeps a single chat message up to date with the temperature, humidity and
//! pressure readings of a home, gathered from a FHEM hub, the heating system
//! and a Zigbee gateway.
//!
//! ## Modules
//!
//! - [`sources`]: Read-only clients for the three reading sources
//! - [`aggregate`]: Concurrent fetch and merge into one snapshot
//! - [`group`]: Projection through the display layout
//! - [`staleness`]: Age markers for old readings
//! - [`render`]: Compact and detailed message text
//! - [`state`]: Persisted last snapshot and view debounce
//! - [`changelog`]: Change detection and the append-only change log
//! - [`channel`]: The push / toggle cycle
//! - [`telegram`]: Chat transport and button listener
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use climate_channel::{Channel, Config, TelegramClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default(None)?;
//!     config.validate()?;
//!
//!     let client = Arc::new(TelegramClient::new(&config.telegram)?);
//!     let channel = Channel::from_config(&config, client)?;
//!
//!     // Refresh the message once
//!     channel.push().await?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod changelog;
pub mod channel;
pub mod config;
pub mod group;
pub mod model;
pub mod render;
pub mod sources;
pub mod staleness;
pub mod state;
pub mod telegram;

// Re-export top-level types for convenience
pub use model::{ChangeRecord, Group, GroupedView, MetricKind, Reading, SensorReadings, SensorSnapshot};

pub use aggregate::{ReadingAggregator, SourceBinding};

pub use changelog::{ChangeLog, ChangeLogError, ChangeStore, SqliteChangeStore, StoreError};

pub use channel::{Channel, ChannelError};

pub use config::{generate_default_config, Config, ConfigError, LoggingConfig, SensorEntry};

pub use group::{group, GroupError, SensorLayout};

pub use render::{render_compact, render_detailed, toggle_button, ToggleButton};

pub use sources::{
    GatewaySource, HeatingSource, HubSource, RawReading, SourceAdapter, SourceError,
};

pub use staleness::{classify, Staleness};

pub use state::{LastSnapshot, SnapshotStore, StateError, ViewState, ViewStateCache};

pub use telegram::{CallbackQuery, ChatTransport, Listener, TelegramClient, TelegramError};
