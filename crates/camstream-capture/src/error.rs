//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Start requested before a surface was attached.
    #[error("No capture surface attached")]
    NotAttached,

    /// Camera or microphone could not be opened.
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Device lost during capture.
    #[error("Capture device lost: {0}")]
    DeviceLost(String),

    /// Permission denied for capture.
    #[error("Permission denied for capture")]
    PermissionDenied,

    /// Requested format cannot be produced by the device.
    #[error("Capture format not supported: {0}")]
    FormatNotSupported(String),
}
