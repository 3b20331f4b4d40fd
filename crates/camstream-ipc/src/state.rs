//! Stream lifecycle state.

use serde::{Deserialize, Serialize};

/// The current state of the publish pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// Nothing published yet.
    #[default]
    Idle,

    /// Publish session is being established.
    Preparing,

    /// Publish session is live.
    Streaming,

    /// Publish session was stopped by the caller.
    Stopped,

    /// The last publish attempt or session failed.
    Error,
}

impl StreamState {
    /// Returns true if the state is Idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a session is being established.
    pub fn is_preparing(&self) -> bool {
        matches!(self, Self::Preparing)
    }

    /// Returns true if the stream is live.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Returns true if the stream was stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if the state is Error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns true while a publish session is pending or live.
    pub fn is_publishing(&self) -> bool {
        matches!(self, Self::Preparing | Self::Streaming)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Preparing => "Preparing",
            Self::Streaming => "Streaming",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
        }
    }

    /// Status line for the control surface.
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Idle => "Ready to stream",
            Self::Preparing => "Connecting...",
            Self::Streaming => "Streaming live",
            Self::Stopped => "Stream stopped",
            Self::Error => "Connection error",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
