use crate::protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("an authentication token is required")]
    MissingToken,
    #[error("not connected")]
    NotConnected,
    #[error("not in any room")]
    NotInRoom,
    #[error("connection timed out")]
    Timeout,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("connection rejected: {0}")]
    ConnectRejected(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("client shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, RealtimeError>;
