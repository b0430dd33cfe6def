//! Chat transport
//!
//! The message is a single Telegram message that is edited in place. Users
//! switch views with the inline button below it; presses arrive as callback
//! queries through long polling.

mod client;
mod listener;

pub use client::TelegramClient;
pub use listener::Listener;

use crate::render::ToggleButton;
use async_trait::async_trait;
use serde::Deserialize;

/// Outbound side of the chat
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Replace the text and keyboard of the channel message
    async fn edit_message(&self, text: &str, button: &ToggleButton) -> Result<(), TelegramError>;

    /// Acknowledge a button press so the client stops its spinner
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TelegramError>;
}

/// User who pressed a button
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
}

/// A button press
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
}

/// One entry of a getUpdates response
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// Errors talking to the Bot API
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("Invalid client configuration: {0}")]
    Config(String),
}
