//! Command dispatch loop.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info, instrument};

use camstream_ipc::StreamCommand;

use crate::manager::StreamManager;
use crate::STATS_POLL_INTERVAL;

/// Applies [`StreamCommand`]s to a [`StreamManager`] on one thread.
pub struct Dispatcher {
    manager: StreamManager,
    commands: Receiver<StreamCommand>,
    stats_interval: Duration,
}

impl Dispatcher {
    pub fn new(manager: StreamManager, commands: Receiver<StreamCommand>) -> Self {
        Self {
            manager,
            commands,
            stats_interval: STATS_POLL_INTERVAL,
        }
    }

    /// How often statistics are refreshed while streaming.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Run until `Shutdown` or until every sender is gone (blocking). The
    /// manager is released before returning.
    ///
    /// Statistics are refreshed and failed sessions reaped once per stats
    /// interval, however busy the command channel is.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub fn run(mut self) {
        info!("Dispatcher starting");
        let mut last_refresh = Instant::now();

        loop {
            let wait = self.stats_interval.saturating_sub(last_refresh.elapsed());
            match self.commands.recv_timeout(wait) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    break;
                }
            }

            if last_refresh.elapsed() >= self.stats_interval {
                self.manager.reap_session();
                self.manager.refresh_stats();
                last_refresh = Instant::now();
            }
        }

        self.manager.release();
        info!("Dispatcher stopped");
    }

    /// Handle a command. Returns false if the loop should stop.
    fn handle_command(&mut self, command: StreamCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            StreamCommand::Bind(surface) => self.manager.bind(surface),
            StreamCommand::Surface(event) => self.manager.on_surface_event(event),
            StreamCommand::Configure(config) => self.manager.configure(config),
            StreamCommand::SelectQuality(selection) => self.manager.select_quality(selection),
            StreamCommand::StartPreview => self.manager.start_preview(),
            StreamCommand::StopPreview => self.manager.stop_preview(),
            StreamCommand::StartStreaming {
                rtmp_url,
                stream_key,
            } => {
                self.manager.start_streaming(&rtmp_url, &stream_key);
            }
            StreamCommand::StopStreaming => self.manager.stop_streaming(),
            StreamCommand::ToggleStreaming {
                rtmp_url,
                stream_key,
            } => {
                self.manager.toggle_streaming(&rtmp_url, &stream_key);
            }
            StreamCommand::ClearError => self.manager.clear_error(),
            StreamCommand::Shutdown => return false,
        }

        true
    }
}
