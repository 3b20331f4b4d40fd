//! Camera and microphone capture adapters.
//!
//! This crate defines the interface the stream engine uses to acquire
//! frames and samples bound to a rendering surface, plus a synthetic
//! source that produces a blank test pattern without hardware.

mod error;
mod frame;
mod synthetic;

pub use error::CaptureError;
pub use frame::{AudioChunk, CaptureTimestamp, CapturedFrame};
pub use synthetic::SyntheticCapture;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use camstream_ipc::{StreamConfig, SurfaceHandle};

/// Channel capacity for captured frames.
pub const FRAME_CHANNEL_CAPACITY: usize = 3;

/// Channel capacity for audio chunks.
pub const AUDIO_CHANNEL_CAPACITY: usize = 8;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Receives faults raised by a capture adapter's own threads.
pub trait CaptureFaults: Send + Sync {
    /// The camera or microphone was lost or access was revoked.
    fn device_lost(&self, reason: String);
}

/// Shared handle to a fault receiver.
pub type CaptureFaultSink = Arc<dyn CaptureFaults>;

/// Consumer side of an adapter's capture output.
#[derive(Clone)]
pub struct MediaSource {
    /// Captured video frames.
    pub frames: Receiver<CapturedFrame>,

    /// Captured audio chunks.
    pub audio: Receiver<AudioChunk>,

    dropped_frames: Arc<AtomicU64>,
}

impl MediaSource {
    pub fn new(
        frames: Receiver<CapturedFrame>,
        audio: Receiver<AudioChunk>,
        dropped_frames: Arc<AtomicU64>,
    ) -> Self {
        Self {
            frames,
            audio,
            dropped_frames,
        }
    }

    /// Frames the adapter discarded because the consumer fell behind.
    /// Cumulative over the adapter's lifetime.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

/// Trait for camera + microphone capture backends.
pub trait CaptureAdapter: Send {
    /// Bind the adapter to a rendering surface.
    fn attach(&mut self, surface: SurfaceHandle, faults: CaptureFaultSink) -> CaptureResult<()>;

    /// Unbind from the current surface, stopping capture if needed.
    fn detach(&mut self);

    /// Store the configuration used by the next `start`.
    fn apply_configuration(&mut self, config: &StreamConfig);

    /// Start capturing.
    fn start(&mut self) -> CaptureResult<()>;

    /// Stop capturing.
    fn stop(&mut self) -> CaptureResult<()>;

    /// Check if capture is active.
    fn is_active(&self) -> bool;

    /// Output channels, for adapters that hand media to the engine.
    fn media(&self) -> Option<MediaSource> {
        None
    }
}
