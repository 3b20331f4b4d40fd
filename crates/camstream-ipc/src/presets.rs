//! Predefined quality presets.

use serde::{Deserialize, Serialize};

use crate::types::{AudioSettings, StreamConfig, VideoSettings};

/// A named set of media settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    /// Preset name as shown to the user.
    pub name: &'static str,

    /// Video parameters.
    pub video: VideoSettings,

    /// Audio parameters.
    pub audio: AudioSettings,
}

/// 480p @ 15fps, 500 kbps video, 64 kbps mono audio. For slow uplinks.
pub const LOW_QUALITY: QualityPreset = QualityPreset {
    name: "low",
    video: VideoSettings::new(854, 480, 500_000, 15),
    audio: AudioSettings::new(64_000, 22_050, false),
};

/// 720p @ 24fps, 1.5 Mbps video, 96 kbps stereo audio.
pub const MEDIUM_QUALITY: QualityPreset = QualityPreset {
    name: "medium",
    video: VideoSettings::new(1280, 720, 1_500_000, 24),
    audio: AudioSettings::new(96_000, 44_100, true),
};

impl QualityPreset {
    /// Configuration with the default destination and this preset's media settings.
    pub fn config(&self) -> StreamConfig {
        StreamConfig::new(self.video, self.audio)
    }
}

impl From<QualityPreset> for StreamConfig {
    fn from(preset: QualityPreset) -> Self {
        preset.config()
    }
}

/// Configuration choice made on the control surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitySelection {
    Low,
    #[default]
    Medium,
    Custom(StreamConfig),
}

impl QualitySelection {
    /// Parse a preset name. Unknown names select the medium preset.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" | "480p" => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Resolve the selection against the current configuration.
    ///
    /// Presets only replace media settings; the destination of `current` is
    /// kept. A custom configuration replaces everything.
    pub fn resolve(&self, current: &StreamConfig) -> StreamConfig {
        match self {
            Self::Low => current.with_video(LOW_QUALITY.video).with_audio(LOW_QUALITY.audio),
            Self::Medium => current
                .with_video(MEDIUM_QUALITY.video)
                .with_audio(MEDIUM_QUALITY.audio),
            Self::Custom(config) => config.clone(),
        }
    }
}
