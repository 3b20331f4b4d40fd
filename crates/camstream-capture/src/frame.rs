//! Captured frame and audio chunk types.

use bytes::Bytes;
use std::time::Instant;

/// Timestamp for a captured frame or audio chunk.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the data was captured.
    pub capture_time: Instant,

    /// Presentation timestamp in 100ns units (for AV sync).
    pub pts_100ns: u64,
}

impl CaptureTimestamp {
    /// Create a timestamp relative to the start of capture.
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let elapsed = capture_time.duration_since(start_time);
        let pts_100ns = elapsed.as_nanos() as u64 / 100;

        Self {
            capture_time,
            pts_100ns,
        }
    }

    /// Get the presentation timestamp in milliseconds.
    pub fn pts_ms(&self) -> u64 {
        self.pts_100ns / 10_000
    }
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// NV12 pixel data.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl CapturedFrame {
    pub fn new(
        data: Bytes,
        width: u32,
        height: u32,
        timestamp: CaptureTimestamp,
        sequence: u64,
    ) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
            sequence,
        }
    }

    /// Calculate expected NV12 buffer size for given dimensions.
    pub fn nv12_buffer_size(width: u32, height: u32) -> usize {
        // NV12: Y plane (width * height) + interleaved UV plane (width * height / 2)
        let y_size = width as usize * height as usize;
        y_size + y_size / 2
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::nv12_buffer_size(self.width, self.height)
    }
}

/// A chunk of microphone samples.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved signed 16-bit little-endian PCM.
    pub data: Bytes,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of interleaved channels.
    pub channels: u16,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl AudioChunk {
    /// Number of samples per channel in this chunk.
    pub fn sample_count(&self) -> usize {
        self.data.len() / (std::mem::size_of::<i16>() * self.channels.max(1) as usize)
    }
}
