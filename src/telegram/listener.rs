//! Button listener
//!
//! Long-polls the Bot API for callback queries and hands them to the
//! channel. Optionally pushes on a timer in the same process.

use super::TelegramClient;
use crate::channel::Channel;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Pause after a failed poll before trying again
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Long-poll loop for toggle button presses
pub struct Listener {
    client: Arc<TelegramClient>,
    channel: Arc<Channel>,
    push_interval: Option<Duration>,
}

impl Listener {
    pub fn new(client: Arc<TelegramClient>, channel: Arc<Channel>) -> Self {
        Self {
            client,
            channel,
            push_interval: None,
        }
    }

    /// Builder method: also push every `interval`
    pub fn push_every(mut self, interval: Duration) -> Self {
        self.push_interval = Some(interval);
        self
    }

    /// Run until Ctrl-C
    pub async fn run(self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        let schedule = self
            .push_interval
            .map(|every| start_schedule(self.channel.clone(), every));

        tokio::pin!(shutdown);
        let mut offset = 0;

        tracing::info!("Listening for button presses");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down listener");
                    break;
                }
                result = self.client.get_updates(offset) => match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            let Some(query) = update.callback_query else {
                                continue;
                            };
                            if let Err(e) = self.channel.handle_callback(&query).await {
                                tracing::error!("Toggle failed: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Polling for updates failed: {}", e);
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        if let Some(handle) = schedule {
            handle.abort();
        }
    }
}

/// Push the message every `every`, starting one interval from now
fn start_schedule(channel: Arc<Channel>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            tracing::info!("Running scheduled push");
            if let Err(e) = channel.push().await {
                tracing::error!("Scheduled push failed: {}", e);
            }
        }
    })
}
