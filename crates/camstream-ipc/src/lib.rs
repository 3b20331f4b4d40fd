//! Typed configuration, state and command messages for camstream.
//!
//! This crate defines the values exchanged between the control surface and
//! the stream engine: configuration and presets, lifecycle state, statistics
//! snapshots, surface callbacks and commands.

mod commands;
mod error;
mod events;
mod presets;
mod state;
mod types;

pub use commands::StreamCommand;
pub use error::ConfigError;
pub use events::SurfaceEvent;
pub use presets::{QualityPreset, QualitySelection, LOW_QUALITY, MEDIUM_QUALITY};
pub use state::StreamState;
pub use types::{
    AudioSettings, StreamConfig, StreamStats, SurfaceHandle, VideoSettings, DEFAULT_STREAM_KEY,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (control surface → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<StreamCommand>, Receiver<StreamCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}
