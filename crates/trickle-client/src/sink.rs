use tokio::sync::mpsc;
use trickle_wire::StreamChunk;

use crate::error::TransportError;

/// Three-outcome delivery contract for one session.
///
/// `on_chunk` fires once per decoded payload, strictly in decode order.
/// Exactly one of `on_complete` / `on_error` fires per session unless the
/// session is cancelled, in which case neither does. No method is invoked
/// after the terminal outcome.
pub trait StreamSink: Send {
    fn on_chunk(&mut self, chunk: StreamChunk);
    fn on_complete(&mut self);
    fn on_error(&mut self, err: TransportError);
}

/// Ordered event view of a session, for channel-based consumers.
#[derive(Debug)]
pub enum SessionEvent {
    Chunk(StreamChunk),
    Completed,
    Errored(TransportError),
}

/// `StreamSink` that forwards every outcome into an unbounded channel,
/// preserving delivery order.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamSink for ChannelSink {
    fn on_chunk(&mut self, chunk: StreamChunk) {
        let _ = self.tx.send(SessionEvent::Chunk(chunk));
    }

    fn on_complete(&mut self) {
        let _ = self.tx.send(SessionEvent::Completed);
    }

    fn on_error(&mut self, err: TransportError) {
        let _ = self.tx.send(SessionEvent::Errored(err));
    }
}
