//! Reconnecting change stream socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use snap_config::CaasConfig;
use snap_protocols::ChangeStreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketSettings {
    pub reconnection_delay: Duration,
    pub max_retries: u32,
    pub keep_alive_interval: Duration,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            reconnection_delay: Duration::from_millis(1000),
            max_retries: 10,
            keep_alive_interval: Duration::from_millis(20000),
        }
    }
}

impl From<&CaasConfig> for SocketSettings {
    fn from(config: &CaasConfig) -> Self {
        Self {
            reconnection_delay: config.reconnection_delay(),
            max_retries: config.max_retries,
            keep_alive_interval: config.keep_alive_interval(),
        }
    }
}

/// WebSocket that forwards text frames and reconnects when it drops.
///
/// Each open connection sends an empty text frame every
/// `keep_alive_interval`. After `max_retries` consecutive failed
/// reconnects the socket gives up for good. A successful open resets the
/// count.
pub struct ChangeSocket {
    url: String,
    settings: SocketSettings,
    messages: mpsc::UnboundedSender<String>,
}

impl ChangeSocket {
    pub fn new(url: impl Into<String>, settings: SocketSettings, messages: mpsc::UnboundedSender<String>) -> Self {
        Self {
            url: url.into(),
            settings,
            messages,
        }
    }

    /// URL without its query, which carries the secure token.
    fn display_url(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }

    /// Run until retries are exhausted or the receiving side is dropped.
    pub async fn run(self) -> Result<(), ChangeStreamError> {
        let mut retries = 0;
        loop {
            if let Err(e) = self.session(&mut retries).await {
                warn!(url = %self.display_url(), error = %e, "Change stream connection failed");
            }

            if self.messages.is_closed() {
                debug!("Change stream receiver dropped, stopping");
                return Ok(());
            }
            if retries >= self.settings.max_retries {
                let err = ChangeStreamError::RetriesExhausted {
                    attempts: self.settings.max_retries,
                };
                error!(url = %self.display_url(), "{}", err);
                return Err(err);
            }

            retries += 1;
            debug!(attempt = retries, "Reconnecting change stream");
            tokio::time::sleep(self.settings.reconnection_delay).await;
        }
    }

    /// One connection, from open to close.
    async fn session(&self, retries: &mut u32) -> Result<(), ChangeStreamError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ChangeStreamError::Socket(e.to_string()))?;
        *retries = 0;
        debug!(url = %self.display_url(), "Change stream connected");

        let (mut sink, mut source) = ws_stream.split();
        let mut heartbeat = tokio::time::interval(self.settings.keep_alive_interval);

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    sink.send(Message::Text(String::new().into()))
                        .await
                        .map_err(|e| ChangeStreamError::Socket(e.to_string()))?;
                    trace!("Change stream heartbeat");
                }
                msg = source.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text = text.as_str();
                        trace!("Change stream recv: {}", text);
                        if !text.is_empty() && self.messages.send(text.to_string()).is_err() {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Change stream closed");
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(ChangeStreamError::Socket(e.to_string())),
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
