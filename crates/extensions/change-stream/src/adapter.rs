//! [`DocumentWaiter`] backed by the CaaS change stream.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use snap_config::CaasConfig;
use snap_protocols::{ChangeStreamError, DocumentWaiter, LocaleLookup};

use crate::endpoints::CaasEndpoints;
use crate::locales::document_id_for;
use crate::probe::{DocumentProbe, HttpProbe};
use crate::registry::{ChangeEvent, PendingWaits, UPDATE_CHANGE_TYPES};
use crate::socket::{ChangeSocket, SocketSettings};
use crate::token::fetch_secure_token;

struct AdapterInner {
    waits: PendingWaits,
    locales: Arc<dyn LocaleLookup>,
    probe: Arc<dyn DocumentProbe>,
    update_timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AdapterInner {
    fn handle_message(&self, text: &str) -> bool {
        match serde_json::from_str::<ChangeEvent>(text) {
            Ok(event) => self.waits.resolve(&event),
            Err(e) => {
                warn!("Failed to parse change event: {}", e);
                false
            }
        }
    }
}

impl Drop for AdapterInner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Waits for CaaS documents by listening to the collection's change stream.
///
/// Cloning yields another handle to the same adapter. The socket closes
/// once the last handle is dropped.
#[derive(Clone)]
pub struct ChangeStreamAdapter {
    inner: Arc<AdapterInner>,
}

impl ChangeStreamAdapter {
    /// Adapter without a socket. Feed it with [`attach_stream`](Self::attach_stream).
    pub fn new(update_timeout: Duration, locales: Arc<dyn LocaleLookup>, probe: Arc<dyn DocumentProbe>) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                waits: PendingWaits::new(),
                locales,
                probe,
                update_timeout,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connect to the change stream of `config.preview_collection_url`.
    ///
    /// Only the URL is checked here. Token and socket failures happen in the
    /// background and are logged; waits then run into their timeout.
    pub fn connect(config: &CaasConfig, locales: Arc<dyn LocaleLookup>) -> Result<Self, ChangeStreamError> {
        let endpoints = CaasEndpoints::parse(&config.preview_collection_url)?;
        let client = reqwest::Client::new();
        let probe = Arc::new(HttpProbe::new(client.clone(), endpoints.clone(), config.api_key.clone()));
        let adapter = Self::new(config.update_timeout(), locales, probe);

        let (tx, rx) = mpsc::unbounded_channel();
        adapter.attach_stream(rx);

        let settings = SocketSettings::from(config);
        let api_key = config.api_key.clone();
        let socket_task = tokio::spawn(async move {
            let token = match fetch_secure_token(&client, &endpoints, &api_key).await {
                Ok(token) => token,
                Err(e) => {
                    error!(error = %e, "Change stream unavailable");
                    return;
                }
            };
            info!(tenant = %endpoints.tenant(), "Subscribing to CaaS change stream");
            if ChangeSocket::new(endpoints.socket_url(&token), settings, tx).run().await.is_err() {
                debug!("Change stream socket stopped");
            }
        });
        adapter.inner.tasks.lock().push(socket_task);

        Ok(adapter)
    }

    /// Resolve pending waits from the raw change events on `messages`.
    pub fn attach_stream(&self, mut messages: mpsc::UnboundedReceiver<String>) {
        let weak: Weak<AdapterInner> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(text) = messages.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.handle_message(&text);
            }
        });
        self.inner.tasks.lock().push(task);
    }

    /// Feed one raw change event. Returns whether it resolved a wait.
    pub fn handle_message(&self, text: &str) -> bool {
        self.inner.handle_message(text)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.waits.len()
    }

    async fn register(
        &self,
        preview_id: &str,
        language: &str,
        operation: &'static str,
    ) -> Result<(String, u64, oneshot::Receiver<()>), ChangeStreamError> {
        if preview_id.is_empty() {
            return Err(ChangeStreamError::MissingPreviewId { operation });
        }
        let document_id = document_id_for(self.inner.locales.as_ref(), preview_id, language).await?;
        let (id, rx) = self.inner.waits.register(document_id.clone(), UPDATE_CHANGE_TYPES);
        debug!(%document_id, operation, "Waiting for CaaS document");
        Ok((document_id, id, rx))
    }

    async fn settle(&self, id: u64, rx: oneshot::Receiver<()>) -> Result<(), ChangeStreamError> {
        match tokio::time::timeout(self.inner.update_timeout, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ChangeStreamError::Closed),
            Err(_) => {
                self.inner.waits.cancel(id);
                Err(ChangeStreamError::Timeout {
                    timeout_ms: self.inner.update_timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl DocumentWaiter for ChangeStreamAdapter {
    async fn wait_for_document_update(&self, preview_id: &str, language: &str) -> Result<(), ChangeStreamError> {
        let (_, id, rx) = self.register(preview_id, language, "update").await?;
        self.settle(id, rx).await
    }

    async fn wait_for_document_insert(&self, preview_id: &str, language: &str) -> Result<(), ChangeStreamError> {
        let (document_id, id, rx) = self.register(preview_id, language, "insert").await?;

        let wait = self.settle(id, rx);
        tokio::pin!(wait);
        tokio::select! {
            result = &mut wait => return result,
            found = self.inner.probe.exists(&document_id) => match found {
                Ok(true) => {
                    self.inner.waits.cancel(id);
                    debug!(%document_id, "CaaS document already present");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => warn!(%document_id, error = %e, "Document probe failed"),
            },
        }
        wait.await
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
