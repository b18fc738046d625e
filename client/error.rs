// Client error taxonomy
use exl_core::ValidationError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport could not be established, or failed mid-session.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    /// A request was issued with no open session.
    #[error("not connected to the EXL server")]
    NotConnected,
    /// The server closed the stream.
    #[error("connection closed by the EXL server")]
    Closed,
    /// Bytes that are not JSON arrived on the stream.
    #[error("malformed message from the EXL server: {0}")]
    Protocol(#[source] serde_json::Error),
    #[error("message exceeds {limit} bytes without completing")]
    MessageTooLarge { limit: usize },
    #[error("failed to encode request: {0}")]
    Serialize(#[source] serde_json::Error),
    /// A frame parsed as JSON but did not have the expected shape.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to write notification log: {0}")]
    Log(#[source] io::Error),
}

impl ClientError {
    /// Errors after which the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Connection(_) | ClientError::NotConnected | ClientError::Closed
        )
    }
}
