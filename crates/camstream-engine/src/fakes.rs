//! Deterministic adapters for exercising the manager without hardware or
//! network.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use camstream_capture::{CaptureAdapter, CaptureError, CaptureFaultSink, CaptureResult};
use camstream_ipc::{StreamConfig, StreamStats, SurfaceHandle};
use camstream_transport::{
    PacketSink, PublishTarget, PublisherAdapter, RtmpPacket, SessionEventSink, StatsCollector,
    TransportError, TransportResult, PACKET_CHANNEL_CAPACITY,
};

#[derive(Default)]
struct CaptureLog {
    calls: Vec<&'static str>,
    configs: Vec<StreamConfig>,
    faults: Option<CaptureFaultSink>,
    fail_start: Option<String>,
    active: bool,
}

/// Test-side view of a [`FakeCapture`].
#[derive(Clone, Default)]
pub struct CaptureProbe {
    log: Arc<Mutex<CaptureLog>>,
}

impl CaptureProbe {
    /// Adapter calls in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.log.lock().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.log.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn last_config(&self) -> Option<StreamConfig> {
        self.log.lock().configs.last().cloned()
    }

    pub fn is_active(&self) -> bool {
        self.log.lock().active
    }

    /// Make subsequent `start` calls fail.
    pub fn fail_start(&self, reason: &str) {
        self.log.lock().fail_start = Some(reason.to_string());
    }

    /// Report a lost device through the sink given at the last `attach`.
    pub fn lose_device(&self, reason: &str) {
        let faults = self.log.lock().faults.clone();
        if let Some(faults) = faults {
            faults.device_lost(reason.to_string());
        }
    }

    /// Sink given at the last `attach`.
    pub fn fault_sink(&self) -> Option<CaptureFaultSink> {
        self.log.lock().faults.clone()
    }
}

pub struct FakeCapture {
    probe: CaptureProbe,
}

impl FakeCapture {
    pub fn new() -> (Self, CaptureProbe) {
        let probe = CaptureProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl CaptureAdapter for FakeCapture {
    fn attach(&mut self, _surface: SurfaceHandle, faults: CaptureFaultSink) -> CaptureResult<()> {
        let mut log = self.probe.log.lock();
        log.calls.push("attach");
        log.faults = Some(faults);
        Ok(())
    }

    fn detach(&mut self) {
        let mut log = self.probe.log.lock();
        log.calls.push("detach");
        log.active = false;
    }

    fn apply_configuration(&mut self, config: &StreamConfig) {
        let mut log = self.probe.log.lock();
        log.calls.push("configure");
        log.configs.push(config.clone());
    }

    fn start(&mut self) -> CaptureResult<()> {
        let mut log = self.probe.log.lock();
        log.calls.push("start");
        if let Some(reason) = log.fail_start.clone() {
            return Err(CaptureError::DeviceUnavailable(reason));
        }
        log.active = true;
        Ok(())
    }

    fn stop(&mut self) -> CaptureResult<()> {
        let mut log = self.probe.log.lock();
        log.calls.push("stop");
        log.active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.probe.log.lock().active
    }
}

/// How a [`FakePublisher`] answers `open`.
#[derive(Debug, Clone, Default)]
pub enum Outcome {
    /// Report `connected` before `open` returns.
    #[default]
    Connect,
    /// Report `failed(reason)` before `open` returns.
    Fail(String),
    /// Report nothing until the test says so.
    Pending,
    /// Return an error from `open` itself.
    Reject(String),
}

#[derive(Default)]
struct PublisherLog {
    outcome: Outcome,
    opens: usize,
    closes: usize,
    targets: Vec<String>,
    configs: Vec<StreamConfig>,
    events: Option<SessionEventSink>,
    stats: Option<StreamStats>,
    collector: Arc<StatsCollector>,
    sink: Option<PacketSink>,
    packets: Option<Receiver<RtmpPacket>>,
    close_delay: Option<Duration>,
}

/// Test-side view of a [`FakePublisher`].
#[derive(Clone, Default)]
pub struct PublisherProbe {
    log: Arc<Mutex<PublisherLog>>,
}

impl PublisherProbe {
    pub fn set_outcome(&self, outcome: Outcome) {
        self.log.lock().outcome = outcome;
    }

    pub fn opens(&self) -> usize {
        self.log.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.log.lock().closes
    }

    pub fn last_target(&self) -> Option<String> {
        self.log.lock().targets.last().cloned()
    }

    pub fn last_config(&self) -> Option<StreamConfig> {
        self.log.lock().configs.last().cloned()
    }

    /// Report `stats` instead of counting delivered packets.
    pub fn set_stats(&self, stats: StreamStats) {
        self.log.lock().stats = Some(stats);
    }

    /// Take queued packets as if written to the server. Returns how many.
    pub fn deliver(&self) -> usize {
        let log = self.log.lock();
        let Some(packets) = log.packets.as_ref() else {
            return 0;
        };

        let mut delivered = 0;
        while let Ok(packet) = packets.try_recv() {
            log.collector.record_packet(packet.data.len(), packet.is_video);
            delivered += 1;
        }
        delivered
    }

    /// Make `close` block for `delay`.
    pub fn set_close_delay(&self, delay: Duration) {
        self.log.lock().close_delay = Some(delay);
    }

    fn events(&self) -> Option<SessionEventSink> {
        self.log.lock().events.clone()
    }

    /// Complete the last attempt successfully.
    pub fn connect(&self) {
        if let Some(events) = self.events() {
            events.connected();
        }
    }

    /// Fail the last attempt.
    pub fn fail(&self, reason: &str) {
        if let Some(events) = self.events() {
            events.failed(reason.to_string());
        }
    }

    /// Drop the last established session.
    pub fn drop_session(&self, reason: &str) {
        if let Some(events) = self.events() {
            events.dropped(reason.to_string());
        }
    }
}

pub struct FakePublisher {
    probe: PublisherProbe,
}

impl FakePublisher {
    pub fn new() -> (Self, PublisherProbe) {
        let probe = PublisherProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl PublisherAdapter for FakePublisher {
    fn open(
        &mut self,
        target: &PublishTarget,
        config: &StreamConfig,
        events: SessionEventSink,
    ) -> TransportResult<()> {
        let outcome = {
            let mut log = self.probe.log.lock();
            log.opens += 1;
            log.targets.push(target.full_url());
            log.configs.push(config.clone());
            log.events = Some(Arc::clone(&events));

            if !matches!(log.outcome, Outcome::Reject(_)) {
                let (tx, rx) = crossbeam_channel::bounded(PACKET_CHANNEL_CAPACITY);
                log.collector.start();
                log.sink = Some(PacketSink::new(tx, Arc::clone(&log.collector)));
                log.packets = Some(rx);
            }
            log.outcome.clone()
        };

        match outcome {
            Outcome::Connect => events.connected(),
            Outcome::Fail(reason) => events.failed(reason),
            Outcome::Pending => {}
            Outcome::Reject(reason) => return Err(TransportError::ConnectionFailed(reason)),
        }
        Ok(())
    }

    fn close(&mut self) {
        let delay = {
            let mut log = self.probe.log.lock();
            log.closes += 1;
            log.sink = None;
            log.packets = None;
            log.collector.stop();
            log.close_delay
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
    }

    fn current_stats(&self) -> StreamStats {
        let log = self.probe.log.lock();
        log.stats.clone().unwrap_or_else(|| log.collector.snapshot())
    }

    fn packet_sink(&self) -> Option<PacketSink> {
        self.probe.log.lock().sink.clone()
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
