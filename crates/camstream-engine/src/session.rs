//! Shared lifecycle state and the sinks adapters report into.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use camstream_capture::CaptureFaults;
use camstream_ipc::{StreamState, StreamStats};
use camstream_transport::SessionEvents;

use crate::signal::Signal;

/// Lifecycle bookkeeping guarded by one lock.
pub(crate) struct Core {
    pub state: StreamState,
    /// Bumped whenever a publish attempt is started, stopped or abandoned.
    pub generation: u64,
    /// Bumped whenever the capture adapter is rebound or released.
    pub capture_epoch: u64,
    pub preview_active: bool,
}

/// State shared between the manager and adapter callbacks.
pub(crate) struct Shared {
    pub core: Mutex<Core>,
    pub state: Signal<StreamState>,
    pub error: Signal<Option<String>>,
    pub stats: Signal<Option<StreamStats>>,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            core: Mutex::new(Core {
                state: StreamState::Idle,
                generation: 0,
                capture_epoch: 0,
                preview_active: false,
            }),
            state: Signal::new(StreamState::Idle),
            error: Signal::new(None),
            stats: Signal::new(None),
        }
    }

    /// Move to `next` and publish it. Called with the core lock held so
    /// publications stay in transition order.
    pub fn transition(&self, core: &mut Core, next: StreamState) {
        let previous = core.state;
        core.state = next;

        debug!(
            previous = %previous.name(),
            current = %next.name(),
            "State transition"
        );

        if !next.is_streaming() {
            self.stats.set_if_changed(None);
        }
        self.state.set(next);
    }

    /// Record `reason` and move to `Error`.
    pub fn fail(&self, core: &mut Core, reason: String) {
        warn!(state = %core.state.name(), "Stream failed: {}", reason);
        self.error.set(Some(reason));
        self.transition(core, StreamState::Error);
    }

    /// Record `reason` without touching the lifecycle state.
    pub fn report_error(&self, reason: String) {
        warn!("{}", reason);
        self.error.set(Some(reason));
    }
}

/// Session events bound to one publish attempt.
pub(crate) struct SessionReporter {
    shared: Arc<Shared>,
    generation: u64,
}

impl SessionReporter {
    pub fn new(shared: Arc<Shared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    fn lose_session(&self, reason: String) {
        let mut core = self.shared.core.lock();
        if core.generation != self.generation {
            debug!(generation = self.generation, "Ignoring stale session failure");
            return;
        }
        if !core.state.is_publishing() {
            return;
        }

        core.generation += 1;
        self.shared.fail(&mut core, reason);
    }
}

impl SessionEvents for SessionReporter {
    fn connected(&self) {
        let mut core = self.shared.core.lock();
        if core.generation != self.generation || !core.state.is_preparing() {
            debug!(generation = self.generation, "Ignoring stale connect");
            return;
        }

        self.shared.error.set_if_changed(None);
        self.shared.transition(&mut core, StreamState::Streaming);
        info!("Stream is live");
    }

    fn failed(&self, reason: String) {
        self.lose_session(reason);
    }

    fn dropped(&self, reason: String) {
        self.lose_session(reason);
    }
}

/// Capture faults bound to one attachment of the capture adapter.
pub(crate) struct CaptureFaultReporter {
    shared: Arc<Shared>,
    epoch: u64,
}

impl CaptureFaultReporter {
    pub fn new(shared: Arc<Shared>, epoch: u64) -> Self {
        Self { shared, epoch }
    }
}

impl CaptureFaults for CaptureFaultReporter {
    fn device_lost(&self, reason: String) {
        let mut core = self.shared.core.lock();
        if core.capture_epoch != self.epoch {
            debug!(epoch = self.epoch, "Ignoring fault from released capture");
            return;
        }

        core.preview_active = false;

        if core.state.is_publishing() {
            core.generation += 1;
            self.shared.fail(&mut core, reason);
        } else {
            self.shared.report_error(reason);
        }
    }
}
