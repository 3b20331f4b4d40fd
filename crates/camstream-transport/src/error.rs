//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Invalid RTMP URL or stream key.
    #[error("Invalid RTMP URL: {0}")]
    InvalidUrl(String),

    /// TCP connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No answer from the server in time.
    #[error("Connection timed out: {0}")]
    Timeout(String),

    /// Server refused the connect or publish request.
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Connection lost after the session was established.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A session is already open on this publisher.
    #[error("Publish session already open")]
    AlreadyOpen,

    /// Feature not available in this build.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RTMP protocol error.
    #[error("RTMP protocol error: {0}")]
    Protocol(String),
}
