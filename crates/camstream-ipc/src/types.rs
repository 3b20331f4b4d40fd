//! Common types shared between the control surface and the engine.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder stream key used until the caller supplies one.
pub const DEFAULT_STREAM_KEY: &str = "stream";

/// Video encoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Target bitrate in bits per second.
    pub bitrate_bps: u32,

    /// Target frames per second.
    pub fps: u32,
}

impl VideoSettings {
    pub const fn new(width: u32, height: u32, bitrate_bps: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            bitrate_bps,
            fps,
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self::new(1280, 720, 2_500_000, 30)
    }
}

/// Audio encoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Target bitrate in bits per second.
    pub bitrate_bps: u32,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Two channels when set, mono otherwise.
    pub stereo: bool,
}

impl AudioSettings {
    pub const fn new(bitrate_bps: u32, sample_rate: u32, stereo: bool) -> Self {
        Self {
            bitrate_bps,
            sample_rate,
            stereo,
        }
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u16 {
        if self.stereo {
            2
        } else {
            1
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self::new(128_000, 44_100, true)
    }
}

/// Configuration for a capture + publish pipeline.
///
/// Values are never edited in place: the `with_*` methods return a new
/// configuration that differs only in the selected fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// RTMP server address (e.g., "rtmp://192.168.1.100:1935/live"). Empty means unset.
    pub rtmp_url: String,

    /// Stream key appended to the address.
    pub stream_key: String,

    /// Video parameters.
    pub video: VideoSettings,

    /// Audio parameters.
    pub audio: AudioSettings,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            rtmp_url: String::new(),
            stream_key: DEFAULT_STREAM_KEY.to_string(),
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl StreamConfig {
    /// Create a configuration with the default destination and the given media settings.
    pub fn new(video: VideoSettings, audio: AudioSettings) -> Self {
        Self {
            video,
            audio,
            ..Self::default()
        }
    }

    /// Full publish target: address, a slash, then the stream key.
    pub fn full_target(&self) -> String {
        format!("{}/{}", self.rtmp_url, self.stream_key)
    }

    /// Copy with a different destination.
    pub fn with_destination(&self, rtmp_url: impl Into<String>, stream_key: impl Into<String>) -> Self {
        Self {
            rtmp_url: rtmp_url.into(),
            stream_key: stream_key.into(),
            ..self.clone()
        }
    }

    /// Copy with different video settings.
    pub fn with_video(&self, video: VideoSettings) -> Self {
        Self {
            video,
            ..self.clone()
        }
    }

    /// Copy with different audio settings.
    pub fn with_audio(&self, audio: AudioSettings) -> Self {
        Self {
            audio,
            ..self.clone()
        }
    }

    /// Check the numeric fields are positive.
    ///
    /// The destination is not checked here; the publisher validates it when
    /// a session is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("video.width", self.video.width),
            ("video.height", self.video.height),
            ("video.bitrate_bps", self.video.bitrate_bps),
            ("video.fps", self.video.fps),
            ("audio.bitrate_bps", self.audio.bitrate_bps),
            ("audio.sample_rate", self.audio.sample_rate),
        ];

        match checks.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::NotPositive { field }),
            None => Ok(()),
        }
    }
}

/// Snapshot of publish-session telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Video frames per second over the last reporting window.
    pub fps: f64,

    /// Average bitrate since the session started, in bits per second.
    pub bitrate_bps: u64,

    /// Frames dropped since the session started.
    pub dropped_frames: u64,

    /// Time since the session was established, in milliseconds.
    pub duration_ms: u64,

    /// Whether the publish session is connected.
    pub is_connected: bool,
}

/// Opaque handle for a rendering/capture surface owned by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle {
    /// Identifier assigned by the UI layer.
    pub id: u64,

    /// Surface width in pixels.
    pub width: u32,

    /// Surface height in pixels.
    pub height: u32,
}

impl SurfaceHandle {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }
}
