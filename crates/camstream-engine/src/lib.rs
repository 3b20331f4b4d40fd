//! Stream lifecycle manager for camstream.
//!
//! This crate coordinates a capture adapter and a publisher adapter behind a
//! small lifecycle state machine, exposing state, error and statistics as
//! replay-latest observable signals.

mod dispatch;
mod manager;
mod pump;
mod session;
mod signal;

#[cfg(test)]
mod fakes;

pub use dispatch::Dispatcher;
pub use manager::StreamManager;
pub use signal::{Signal, Subscription};

use std::time::Duration;

use camstream_ipc::StreamCommand;
use crossbeam_channel::Sender;

/// Longest `release` waits for the publisher to close.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(3);

/// Statistics refresh interval while streaming.
pub const STATS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Create a dispatcher for `manager` and the sender that feeds it.
pub fn create_dispatcher(manager: StreamManager) -> (Sender<StreamCommand>, Dispatcher) {
    let (command_tx, command_rx) = camstream_ipc::command_channel();
    (command_tx, Dispatcher::new(manager, command_rx))
}
