//! Outbound completion records.
//!
//! The backend is an external collaborator. The engine only needs to hand
//! it a record and move on: submissions are fire-and-forget, bounded by a
//! timeout, and their outcome is only ever logged.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::event::CompletionRecord;
use crate::error::BackendError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Receiver of durable completion records.
pub trait CompletionSink: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Whether the user has credentials for this service.
    fn is_authenticated(&self) -> bool;

    /// Hand off one record. Must return without waiting on the network.
    fn submit(&self, record: CompletionRecord);
}

/// Sink for signed-out use: never authenticated, drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSink;

impl CompletionSink for OfflineSink {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn submit(&self, _record: CompletionRecord) {}
}

/// JSON-over-HTTP backend: `POST {base_url}/pomodoros` with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: Url,
    api_token: Option<String>,
    timeout: Duration,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)?.join("pomodoros")?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_token: api_token.filter(|t| !t.is_empty()),
            timeout,
            pending: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one record and wait for the answer.
    pub async fn send(&self, record: &CompletionRecord) -> Result<(), BackendError> {
        let token = self
            .api_token
            .as_deref()
            .ok_or(BackendError::NotAuthenticated)?;

        let request = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token)
            .json(record)
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| BackendError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Wait for every spawned submission to finish. Each one is already
    /// bounded by the timeout, so this returns within roughly that long.
    pub async fn drain(&self) {
        let handles: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl CompletionSink for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn is_authenticated(&self) -> bool {
        self.api_token.is_some()
    }

    fn submit(&self, record: CompletionRecord) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available; completion record not submitted");
            return;
        };
        let backend = self.clone();
        let handle = runtime.spawn(async move {
            match backend.send(&record).await {
                Ok(()) => info!(task_id = record.task_id.as_deref().unwrap_or("-"), "completion record stored"),
                Err(e) => warn!(error = %e, "completion record submission failed"),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        debug!(in_flight = pending.len(), "completion record queued");
    }
}
