use crate::buffer::LineBuffer;
use crate::types::StreamChunk;

/// Literal payload marking explicit logical completion, independent of the
/// transport's own end-of-data signal.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

/// One structured payload decoded from the byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    Chunk(StreamChunk),
    Done,
}

/// Incremental decoder for the `data: <json>` + blank-line framing.
///
/// Stateful across `feed` calls for one session: the trailing partial line of
/// each increment is retained and prefixed to the next increment. Once the
/// `[DONE]` sentinel is decoded the decoder latches closed and all further
/// input is ignored, whether or not the underlying stream has more bytes.
pub struct FrameDecoder {
    buffer: LineBuffer,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: LineBuffer::new(),
            done: false,
        }
    }

    /// Whether the completion sentinel has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one byte increment and return the events it completed.
    ///
    /// Blank lines and lines without the data prefix are discarded. A payload
    /// that fails to parse is dropped with a diagnostic; decoding continues.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DecodedEvent> {
        let mut events = Vec::new();

        if self.done {
            return events;
        }

        self.buffer.extend(bytes);

        while let Some(line_result) = self.buffer.next_line() {
            let line = match line_result {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable line");
                    continue;
                }
            };

            if line.is_empty() {
                continue;
            }

            let payload = match line.strip_prefix(DATA_PREFIX) {
                Some(payload) => payload,
                None => continue,
            };

            if payload == DONE_SENTINEL {
                self.done = true;
                events.push(DecodedEvent::Done);
                break;
            }

            match serde_json::from_str::<StreamChunk>(payload) {
                Ok(chunk) => events.push(DecodedEvent::Chunk(chunk)),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed data frame");
                }
            }
        }

        events
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
