//! Telegram Bot API client

use super::*;
use crate::config::TelegramConfig;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Extra time on top of the long-poll window before a request times out
const POLL_GRACE_SECS: u64 = 10;

/// Timeout for ordinary requests
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Bot API client bound to one chat message
pub struct TelegramClient {
    client: Client,
    base_url: String,
    chat_id: i64,
    message_id: i64,
    poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .user_agent(concat!("climate-channel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TelegramError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
            chat_id: config.chat_id,
            message_id: config.message_id,
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            other => Err(TelegramError::Api {
                code: other.error_code.unwrap_or(status.as_u16()),
                description: other.description.unwrap_or_else(|| "no result".into()),
            }),
        }
    }

    /// Long-poll for button presses after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["callback_query"],
        });

        self.call(
            "getUpdates",
            &body,
            Duration::from_secs(self.poll_timeout_secs + POLL_GRACE_SECS),
        )
        .await
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn edit_message(&self, text: &str, button: &ToggleButton) -> Result<(), TelegramError> {
        let body = json!({
            "chat_id": self.chat_id,
            "message_id": self.message_id,
            "text": text,
            "parse_mode": "Markdown",
            "reply_markup": {
                "inline_keyboard": [[
                    { "text": button.label, "callback_data": button.callback_data }
                ]]
            },
        });

        match self
            .call::<Value>(
                "editMessageText",
                &body,
                Duration::from_secs(REQUEST_TIMEOUT_SECS),
            )
            .await
        {
            Ok(_) => Ok(()),
            // Same text and keyboard as before; nothing to do
            Err(TelegramError::Api { description, .. })
                if description.contains("message is not modified") =>
            {
                tracing::debug!("Message unchanged");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TelegramError> {
        self.call::<Value>(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id }),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::toggle_button;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            token: "123:abc".into(),
            chat_id: -1001,
            message_id: 42,
            api_url: server.uri(),
            poll_timeout_secs: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_edit_message_sends_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .and(body_partial_json(json!({
                "chat_id": -1001,
                "message_id": 42,
                "text": "*Inside*",
                "parse_mode": "Markdown",
                "reply_markup": {
                    "inline_keyboard": [[{ "text": "🔁 Erweitert", "callback_data": "more" }]]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 42 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .edit_message("*Inside*", &toggle_button(false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_not_modified_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified"
            })))
            .mount(&server)
            .await;

        assert!(client(&server)
            .edit_message("same", &toggle_button(true))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was kicked"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .edit_message("text", &toggle_button(false))
            .await
            .unwrap_err();
        assert!(matches!(err, TelegramError::Api { code: 403, .. }));
    }

    #[tokio::test]
    async fn test_get_updates_parses_callbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(json!({ "offset": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 7,
                    "callback_query": {
                        "id": "cb1",
                        "from": { "id": 99, "is_bot": false, "first_name": "Alex" },
                        "chat_instance": "x",
                        "data": "more"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let updates = client(&server).get_updates(7).await.unwrap();
        assert_eq!(updates.len(), 1);
        let callback = updates[0].callback_query.as_ref().unwrap();
        assert_eq!(callback.data.as_deref(), Some("more"));
        assert_eq!(callback.from.first_name, "Alex");
    }
}
