use game_core::protocol::WireError;

use thiserror::Error;

/// Domain errors. Handlers convert these to console or error-message
/// packets; the connection loop and the tick scheduler trap the rest.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("truncated frame: {0}")]
    Truncated(#[from] WireError),

    #[error("unknown packet id {0}")]
    UnknownPacket(u8),

    #[error("packet requires authentication")]
    Unauthenticated,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient resource: {0}")]
    InsufficientResource(String),

    #[error("out of range")]
    OutOfRange,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("server is shutting down")]
    ShuttingDown,
}

impl From<redis::RedisError> for GameError {
    fn from(err: redis::RedisError) -> Self {
        GameError::Storage(err.to_string())
    }
}
