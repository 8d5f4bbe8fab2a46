use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use trickle_wire::DecodedEvent;

use crate::config::{build_http_client, resolve_url, TransportConfig};
use crate::error::TransportError;
use crate::session::{SessionState, StreamSession};
use crate::sink::StreamSink;

/// Cooperative cancellation flag shared between a session task and its handle.
#[derive(Clone, Default)]
pub(crate) struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub(crate) fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a running streaming session.
pub struct StreamHandle {
    cancel: CancelFlag,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Cancel the session. Idempotent and callable at any point, including
    /// before the first byte arrives. Once the session task observes the
    /// flag it dispatches no further sink method; an in-flight read may
    /// still resolve but its results are discarded.
    pub fn cancel(&self) {
        self.cancel.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }

    /// Wait for the session task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Opens one long-lived streaming request per session and delivers decoded
/// payloads to a [`StreamSink`] in arrival order.
pub struct StreamCoordinator {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl StreamCoordinator {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    /// Open a streaming session and return its cancellation handle.
    ///
    /// The session runs as its own task; this returns immediately. The sink
    /// receives every decoded chunk in order, then exactly one terminal
    /// outcome -- unless the handle is cancelled first, in which case no
    /// further delivery occurs at all.
    pub fn open<S>(&self, endpoint: &str, payload: Value, sink: S) -> StreamHandle
    where
        S: StreamSink + 'static,
    {
        let url = resolve_url(self.base_url.as_deref(), endpoint);
        let http = self.http.clone();
        let cancel = CancelFlag::default();
        let flag = cancel.clone();

        let task = tokio::spawn(async move {
            run_session(http, url, payload, sink, flag).await;
        });

        StreamHandle { cancel, task }
    }
}

async fn run_session<S: StreamSink>(
    http: reqwest::Client,
    url: String,
    payload: Value,
    mut sink: S,
    cancel: CancelFlag,
) {
    let mut session = StreamSession::new();

    if cancel.is_set() {
        session.transition(SessionState::Aborted);
        return;
    }
    session.transition(SessionState::Open);
    tracing::debug!(session = %session.id(), %url, "Opening stream");

    let response = match http.post(&url).json(&payload).send().await {
        Ok(response) => response,
        Err(e) => {
            if cancel.is_set() {
                session.transition(SessionState::Aborted);
            } else {
                // The request never produced a response; distinct from a
                // failure of the open byte stream
                sink.on_error(TransportError::Handshake(e.to_string()));
                session.transition(SessionState::Errored);
            }
            return;
        }
    };

    if cancel.is_set() {
        session.transition(SessionState::Aborted);
        return;
    }

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if cancel.is_set() {
            session.transition(SessionState::Aborted);
        } else {
            sink.on_error(TransportError::Status {
                status: status.as_u16(),
                body,
            });
            session.transition(SessionState::Errored);
        }
        return;
    }

    let bytes = response
        .bytes_stream()
        .map(|result| result.map_err(TransportError::from));
    drive_session(&mut session, bytes, &mut sink, &cancel).await;
}

/// Drive one session over an already-open byte source.
///
/// The cancellation flag is checked before each read and before each
/// delivery; the session ends with exactly one terminal transition.
pub(crate) async fn drive_session<B, S, K>(
    session: &mut StreamSession,
    bytes: S,
    sink: &mut K,
    cancel: &CancelFlag,
) where
    B: AsRef<[u8]>,
    S: Stream<Item = std::result::Result<B, TransportError>>,
    K: StreamSink,
{
    let mut bytes = Box::pin(bytes);

    loop {
        if cancel.is_set() {
            session.transition(SessionState::Aborted);
            return;
        }

        match bytes.next().await {
            Some(Ok(increment)) => {
                for event in session.decoder.feed(increment.as_ref()) {
                    if cancel.is_set() {
                        session.transition(SessionState::Aborted);
                        return;
                    }
                    match event {
                        DecodedEvent::Chunk(chunk) => sink.on_chunk(chunk),
                        DecodedEvent::Done => {
                            sink.on_complete();
                            session.transition(SessionState::Completed);
                            return;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                if cancel.is_set() {
                    session.transition(SessionState::Aborted);
                } else {
                    sink.on_error(e);
                    session.transition(SessionState::Errored);
                }
                return;
            }
            None => {
                // Natural end of the byte stream without a sentinel still
                // counts as completion
                if cancel.is_set() {
                    session.transition(SessionState::Aborted);
                } else {
                    sink.on_complete();
                    session.transition(SessionState::Completed);
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::Mutex;
    use trickle_wire::StreamChunk;

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<String>>>,
        cancel_after_chunks: Option<(usize, CancelFlag)>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self::default()
        }

        fn cancelling_after(chunks: usize, flag: CancelFlag) -> Self {
            Self {
                events: Arc::default(),
                cancel_after_chunks: Some((chunks, flag)),
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl StreamSink for RecordingSink {
        fn on_chunk(&mut self, chunk: StreamChunk) {
            let mut events = self.events.lock().unwrap();
            events.push(format!("chunk:{}", chunk.text));
            let seen = events.iter().filter(|e| e.starts_with("chunk:")).count();
            drop(events);

            if let Some((after, flag)) = &self.cancel_after_chunks {
                if seen >= *after {
                    flag.set();
                }
            }
        }

        fn on_complete(&mut self) {
            self.events.lock().unwrap().push("complete".to_string());
        }

        fn on_error(&mut self, err: TransportError) {
            self.events.lock().unwrap().push(format!("error:{}", err));
        }
    }

    fn ok(bytes: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        Ok(bytes.to_vec())
    }

    #[tokio::test]
    async fn test_sentinel_completes_session() {
        let mut session = StreamSession::new();
        let mut sink = RecordingSink::new();
        let cancel = CancelFlag::default();

        let bytes = stream::iter(vec![
            ok(b"data: {\"text\":\"a\"}\n\n"),
            ok(b"data: {\"text\":\"b\"}\n\ndata: [DONE]\n\n"),
        ]);
        drive_session(&mut session, bytes, &mut sink, &cancel).await;

        assert_eq!(sink.events(), vec!["chunk:a", "chunk:b", "complete"]);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_natural_end_completes_session() {
        let mut session = StreamSession::new();
        let mut sink = RecordingSink::new();
        let cancel = CancelFlag::default();

        let bytes = stream::iter(vec![ok(b"data: {\"text\":\"a\"}\n\n")]);
        drive_session(&mut session, bytes, &mut sink, &cancel).await;

        assert_eq!(sink.events(), vec!["chunk:a", "complete"]);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_transport_failure_errors_once() {
        let mut session = StreamSession::new();
        let mut sink = RecordingSink::new();
        let cancel = CancelFlag::default();

        let bytes = stream::iter(vec![
            ok(b"data: {\"text\":\"a\"}\n\n"),
            Err(TransportError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        ]);
        drive_session(&mut session, bytes, &mut sink, &cancel).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], "chunk:a");
        assert!(events[1].starts_with("error:"));
        assert_eq!(session.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn test_cancel_before_first_read() {
        let mut session = StreamSession::new();
        let mut sink = RecordingSink::new();
        let cancel = CancelFlag::default();
        cancel.set();

        let bytes = stream::iter(vec![ok(b"data: {\"text\":\"a\"}\n\ndata: [DONE]\n\n")]);
        drive_session(&mut session, bytes, &mut sink, &cancel).await;

        assert!(sink.events().is_empty());
        assert_eq!(session.state(), SessionState::Aborted);
    }

    #[tokio::test]
    async fn test_cancel_between_chunks_suppresses_rest() {
        let mut session = StreamSession::new();
        let cancel = CancelFlag::default();
        let mut sink = RecordingSink::cancelling_after(1, cancel.clone());

        // Both chunks and the sentinel arrive in one increment; the first
        // delivery cancels the session before the second is dispatched
        let bytes = stream::iter(vec![ok(
            b"data: {\"text\":\"a\"}\n\ndata: {\"text\":\"b\"}\n\ndata: [DONE]\n\n",
        )]);
        drive_session(&mut session, bytes, &mut sink, &cancel).await;

        assert_eq!(sink.events(), vec!["chunk:a"]);
        assert_eq!(session.state(), SessionState::Aborted);
    }

    #[tokio::test]
    async fn test_malformed_frame_not_surfaced() {
        let mut session = StreamSession::new();
        let mut sink = RecordingSink::new();
        let cancel = CancelFlag::default();

        let bytes = stream::iter(vec![
            ok(b"data: not-json\n\n"),
            ok(b"data: {\"text\":\"ok\"}\n\ndata: [DONE]\n\n"),
        ]);
        drive_session(&mut session, bytes, &mut sink, &cancel).await;

        assert_eq!(sink.events(), vec!["chunk:ok", "complete"]);
        assert_eq!(session.state(), SessionState::Completed);
    }
}
