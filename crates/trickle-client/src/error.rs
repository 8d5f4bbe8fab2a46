use thiserror::Error;

/// Transport-level failure of a streaming or polling session.
///
/// This is the only error type that ever reaches a caller, and it is
/// delivered at most once per session. Malformed frames are absorbed by the
/// decoder; cancellation produces no error at all.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request could not be sent: {0}")]
    Handshake(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
