//! Connection state management.

use serde::{Deserialize, Serialize};

/// Connection state for the RTMP publisher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Handshake or connect/publish request in progress.
    Connecting,

    /// Connected and publishing.
    Connected,

    /// Connection failed or was lost.
    Failed { reason: String },
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if connecting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Check if failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Get status message for logs and UI.
    pub fn message(&self) -> String {
        match self {
            Self::Disconnected => "Disconnected".to_string(),
            Self::Connecting => "Connecting...".to_string(),
            Self::Connected => "Connected".to_string(),
            Self::Failed { reason } => format!("Failed: {}", reason),
        }
    }
}
