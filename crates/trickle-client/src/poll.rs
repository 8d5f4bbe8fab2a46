use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use trickle_wire::{PollMessage, PollResponse};

use crate::config::{build_http_client, resolve_url, TransportConfig};
use crate::error::{Result, TransportError};

/// Monotonic redelivery cursor for the polling fallback.
///
/// Advances forward only and never resets mid-session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollCursor {
    last_seen: Option<u64>,
    complete: bool,
}

impl PollCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self) -> Option<u64> {
        self.last_seen
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True iff `id` has not been delivered yet.
    pub fn is_new(&self, id: u64) -> bool {
        self.last_seen.map_or(true, |seen| id > seen)
    }

    /// Advance to `id`; never moves backwards.
    pub fn advance(&mut self, id: u64) {
        if self.is_new(id) {
            self.last_seen = Some(id);
        }
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }
}

/// Point-request seam for the poll loop. Lets tests script responses without
/// a live server.
#[async_trait]
pub trait PollTransport: Send + Sync {
    async fn poll(
        &self,
        endpoint: &str,
        payload: &Value,
        after_id: Option<u64>,
    ) -> Result<PollResponse>;
}

/// `PollTransport` over HTTP, sharing the coordinator's header construction.
pub struct HttpPollTransport {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpPollTransport {
    pub fn new(config: TransportConfig) -> anyhow::Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }
}

#[async_trait]
impl PollTransport for HttpPollTransport {
    async fn poll(
        &self,
        endpoint: &str,
        payload: &Value,
        after_id: Option<u64>,
    ) -> Result<PollResponse> {
        let url = resolve_url(self.base_url.as_deref(), endpoint);

        // The cursor rides along in the request body so the server can
        // suppress messages the client has already seen
        let mut body = payload.clone();
        if let (Some(after), Some(map)) = (after_id, body.as_object_mut()) {
            map.insert("after_id".to_string(), Value::from(after));
        }

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(response.json::<PollResponse>().await?)
    }
}

/// Handle to a running poll loop.
pub struct PollHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the loop. Idempotent; halts further scheduling immediately. An
    /// in-flight request still resolves but its results are discarded. A
    /// stopped loop cannot be restarted.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Wait for the loop task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Sequential polling substitute for environments without streaming support.
pub struct PollLoop;

impl PollLoop {
    /// Start polling `endpoint` and deliver each unseen message in order.
    ///
    /// At most one request is outstanding at a time; the next request is
    /// scheduled `interval` after the current one fully resolves. The loop
    /// stops permanently when a response carries the completion flag.
    pub fn start<T, F>(
        transport: T,
        endpoint: impl Into<String>,
        payload: Value,
        on_message: F,
        interval: Duration,
    ) -> PollHandle
    where
        T: PollTransport + 'static,
        F: FnMut(PollMessage) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let endpoint = endpoint.into();

        let task = tokio::spawn(async move {
            run_poll_loop(transport, endpoint, payload, on_message, interval, flag).await;
        });

        PollHandle { stop, task }
    }
}

async fn run_poll_loop<T, F>(
    transport: T,
    endpoint: String,
    payload: Value,
    mut on_message: F,
    interval: Duration,
    stop: Arc<AtomicBool>,
) where
    T: PollTransport,
    F: FnMut(PollMessage),
{
    let mut cursor = PollCursor::new();

    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }

        let response = match transport.poll(&endpoint, &payload, cursor.last_seen()).await {
            Ok(response) => response,
            Err(e) => {
                // A failed poll ends the loop with no caller notification
                // and no retry
                tracing::warn!(error = %e, %endpoint, "Poll request failed; stopping loop");
                return;
            }
        };

        // Results of a request that was in flight when the loop was stopped
        // are discarded
        if stop.load(Ordering::SeqCst) {
            return;
        }

        if !response.success {
            tracing::warn!(%endpoint, "Poll response unsuccessful; stopping loop");
            return;
        }

        for message in response.messages {
            if !cursor.is_new(message.id) {
                continue;
            }
            let id = message.id;
            on_message(message);
            cursor.advance(id);
        }

        if response.complete {
            cursor.mark_complete();
            tracing::debug!(%endpoint, last_seen = ?cursor.last_seen(), "Poll loop complete");
            return;
        }

        tokio::time::sleep(interval).await;
    }
}
