pub mod config;
pub mod coordinator;
pub mod error;
pub mod poll;
pub mod session;
pub mod sink;

pub use config::TransportConfig;
pub use coordinator::{StreamCoordinator, StreamHandle};
pub use error::{Result, TransportError};
pub use poll::{HttpPollTransport, PollCursor, PollHandle, PollLoop, PollTransport};
pub use session::{SessionState, StreamSession};
pub use sink::{ChannelSink, SessionEvent, StreamSink};

pub use trickle_wire::{DecodedEvent, FrameDecoder, PollMessage, PollResponse, StreamChunk};
