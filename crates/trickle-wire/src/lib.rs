pub mod buffer;
pub mod decoder;
pub mod types;

pub use buffer::LineBuffer;
pub use decoder::{DecodedEvent, FrameDecoder, DONE_SENTINEL};
pub use types::{PollMessage, PollResponse, StreamChunk};
