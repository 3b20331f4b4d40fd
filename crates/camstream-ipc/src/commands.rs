//! Commands sent from the control surface to the engine.

use serde::{Deserialize, Serialize};

use crate::events::SurfaceEvent;
use crate::presets::QualitySelection;
use crate::types::{StreamConfig, SurfaceHandle};

/// Commands that the control surface can send to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamCommand {
    /// Attach a rendering surface.
    Bind(SurfaceHandle),

    /// Forward a surface lifecycle callback.
    Surface(SurfaceEvent),

    /// Replace the active configuration.
    Configure(StreamConfig),

    /// Pick a preset or custom configuration.
    SelectQuality(QualitySelection),

    /// Start local capture without publishing.
    StartPreview,

    /// Stop local capture.
    StopPreview,

    /// Start publishing to the given address and key.
    StartStreaming { rtmp_url: String, stream_key: String },

    /// Stop publishing.
    StopStreaming,

    /// Stop when live, start otherwise.
    ToggleStreaming { rtmp_url: String, stream_key: String },

    /// Acknowledge the current error message.
    ClearError,

    /// Release everything and stop the engine.
    Shutdown,
}
