//! Stream lifecycle manager.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use camstream_capture::CaptureAdapter;
use camstream_ipc::{
    QualitySelection, StreamConfig, StreamState, StreamStats, SurfaceEvent, SurfaceHandle,
};
use camstream_transport::{PublishTarget, PublisherAdapter};

use crate::pump::{MediaPump, PassthroughEncoder};
use crate::session::{CaptureFaultReporter, SessionReporter, Shared};
use crate::signal::Signal;
use crate::RELEASE_TIMEOUT;

struct Adapters {
    capture: Box<dyn CaptureAdapter>,
    publisher: Box<dyn PublisherAdapter>,
}

/// Coordinates camera preview and stream publishing for one pipeline.
///
/// Lifecycle operations never return errors. Failures are reported through
/// the error signal, together with a transition to [`StreamState::Error`]
/// when they affect publishing. `start_streaming` returns once the attempt is
/// under way; its outcome arrives through the state signal.
///
/// Operations are expected to be called from one thread (see
/// [`Dispatcher`](crate::Dispatcher)); adapters report back from their own
/// threads.
pub struct StreamManager {
    shared: Arc<Shared>,
    config: StreamConfig,
    surface: Option<SurfaceHandle>,
    adapters: Option<Adapters>,
    session_open: bool,
    pump: Option<MediaPump>,
    release_timeout: Duration,
}

impl StreamManager {
    /// Create a manager in `Idle` with the default configuration.
    pub fn new(capture: Box<dyn CaptureAdapter>, publisher: Box<dyn PublisherAdapter>) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            config: StreamConfig::default(),
            surface: None,
            adapters: Some(Adapters { capture, publisher }),
            session_open: false,
            pump: None,
            release_timeout: RELEASE_TIMEOUT,
        }
    }

    /// Use `config` instead of the default.
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound how long [`release`](Self::release) waits for the publisher.
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    /// Attach a surface, replacing any previous one. Does not start capture.
    #[instrument(name = "bind_surface", skip(self))]
    pub fn bind(&mut self, surface: SurfaceHandle) {
        if self.adapters.is_none() {
            warn!("Manager released; bind ignored");
            return;
        }

        self.release_surface();

        let faults = {
            let mut core = self.shared.core.lock();
            core.capture_epoch += 1;
            Arc::new(CaptureFaultReporter::new(
                Arc::clone(&self.shared),
                core.capture_epoch,
            ))
        };

        let Some(adapters) = self.adapters.as_mut() else {
            return;
        };
        adapters.capture.apply_configuration(&self.config);

        match adapters.capture.attach(surface, faults) {
            Ok(()) => {
                debug!(width = surface.width, height = surface.height, "Surface bound");
                self.surface = Some(surface);
            }
            Err(e) => self
                .shared
                .report_error(format!("Failed to attach camera: {}", e)),
        }
    }

    /// Replace the active configuration.
    ///
    /// While a publish attempt or session is in progress the capture adapter
    /// is left alone; the configuration is used by the next start.
    pub fn configure(&mut self, config: StreamConfig) {
        self.config = config;

        if self.state().is_publishing() {
            debug!("Publishing; configuration applies on next start");
            return;
        }

        if let Some(adapters) = self.adapters.as_mut() {
            adapters.capture.apply_configuration(&self.config);
        }
    }

    /// Apply a preset or custom configuration, keeping the destination.
    pub fn select_quality(&mut self, selection: QualitySelection) {
        let config = selection.resolve(&self.config);
        info!(
            width = config.video.width,
            height = config.video.height,
            fps = config.video.fps,
            "Quality selected"
        );
        self.configure(config);
    }

    /// Start capturing from the bound surface. No-op without a surface.
    #[instrument(name = "start_preview", skip(self))]
    pub fn start_preview(&mut self) {
        if let Err(reason) = self.ensure_preview() {
            self.shared.report_error(reason);
        }
    }

    /// Stop capturing. No-op if preview is not running.
    #[instrument(name = "stop_preview", skip(self))]
    pub fn stop_preview(&mut self) {
        let Some(adapters) = self.adapters.as_mut() else {
            return;
        };

        let was_active = std::mem::replace(&mut self.shared.core.lock().preview_active, false);
        if !was_active {
            debug!("Preview not running; stop ignored");
            return;
        }

        match adapters.capture.stop() {
            Ok(()) => info!("Preview stopped"),
            Err(e) => warn!("Failed to stop capture: {}", e),
        }
    }

    /// Begin publishing to `address` with `stream_key`.
    ///
    /// Returns the state after the call: `Preparing` while the connection is
    /// being opened, `Streaming` if the publisher connected synchronously, or
    /// `Error` if the request was rejected up front. Already publishing is a
    /// no-op.
    #[instrument(name = "start_streaming", skip(self, stream_key))]
    pub fn start_streaming(&mut self, address: &str, stream_key: &str) -> StreamState {
        let current = self.state();
        if current.is_publishing() {
            debug!(state = %current.name(), "Already publishing; start ignored");
            return current;
        }
        if self.adapters.is_none() {
            warn!("Manager released; start ignored");
            return current;
        }

        let config = self.config.with_destination(address.trim(), stream_key.trim());
        let target = match self.publish_target(&config) {
            Ok(target) => target,
            Err(reason) => return self.fail_now(reason),
        };
        self.config = config;

        if let Err(reason) = self.ensure_preview() {
            return self.fail_now(reason);
        }

        self.close_session();

        let generation = {
            let mut core = self.shared.core.lock();
            core.generation += 1;
            self.shared.transition(&mut core, StreamState::Preparing);
            core.generation
        };

        let Some(adapters) = self.adapters.as_mut() else {
            return self.state();
        };
        info!(
            publisher = adapters.publisher.name(),
            url = %target.redacted(),
            "Opening publish session"
        );

        let events = Arc::new(SessionReporter::new(Arc::clone(&self.shared), generation));
        match adapters.publisher.open(&target, &self.config, events) {
            Ok(()) => {
                self.session_open = true;
                self.start_pump();
            }
            Err(e) => {
                let mut core = self.shared.core.lock();
                if core.generation == generation {
                    core.generation += 1;
                    self.shared.fail(&mut core, e.to_string());
                }
            }
        }

        self.state()
    }

    /// Stop publishing, leaving preview running. Cancels an attempt that is
    /// still connecting.
    #[instrument(name = "stop_streaming", skip(self))]
    pub fn stop_streaming(&mut self) {
        {
            let mut core = self.shared.core.lock();
            if !core.state.is_publishing() {
                debug!(state = %core.state.name(), "Not publishing; stop ignored");
                return;
            }
            core.generation += 1;
            self.shared.transition(&mut core, StreamState::Stopped);
        }

        self.close_session();
        info!("Streaming stopped");
    }

    /// Stop when streaming, start otherwise.
    pub fn toggle_streaming(&mut self, address: &str, stream_key: &str) -> StreamState {
        if self.is_streaming() {
            self.stop_streaming();
            self.state()
        } else {
            self.start_streaming(address, stream_key)
        }
    }

    /// Forward a surface lifecycle callback.
    pub fn on_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Created(surface) => {
                self.bind(surface);
                self.start_preview();
            }
            SurfaceEvent::Changed(surface) if self.surface == Some(surface) => {
                debug!(surface = surface.id, "Surface unchanged");
            }
            SurfaceEvent::Changed(surface) => {
                self.bind(surface);
                self.start_preview();
            }
            SurfaceEvent::Destroyed => self.stop_preview(),
        }
    }

    /// Acknowledge the current error.
    pub fn clear_error(&self) {
        self.shared.error.set_if_changed(None);
    }

    /// Close a publisher session left behind by a failure.
    pub fn reap_session(&mut self) {
        if self.session_open && !self.state().is_publishing() {
            debug!("Closing finished publish session");
            self.close_session();
        }
    }

    /// Statistics for the live session.
    pub fn stats(&self) -> Option<StreamStats> {
        if !self.is_streaming() {
            return None;
        }
        self.adapters
            .as_ref()
            .map(|adapters| adapters.publisher.current_stats())
    }

    /// Publish a fresh statistics snapshot while streaming.
    pub fn refresh_stats(&self) {
        let Some(stats) = self.stats() else {
            return;
        };

        let core = self.shared.core.lock();
        if core.state.is_streaming() {
            self.shared.stats.set(Some(stats));
        }
    }

    /// Tear everything down. Later calls do nothing.
    ///
    /// Waits at most the release timeout for the publisher to close; past
    /// that it is abandoned and the manager still ends up `Stopped`.
    #[instrument(name = "release_manager", skip(self))]
    pub fn release(&mut self) {
        let Some(adapters) = self.adapters.take() else {
            debug!("Already released");
            return;
        };
        info!("Releasing stream manager");

        let preview_active = {
            let mut core = self.shared.core.lock();
            core.generation += 1;
            core.capture_epoch += 1;
            if core.state.is_publishing() {
                self.shared.transition(&mut core, StreamState::Stopped);
            }
            std::mem::replace(&mut core.preview_active, false)
        };

        let Adapters {
            mut capture,
            publisher,
        } = adapters;

        self.stop_pump();
        self.session_open = false;
        close_with_timeout(publisher, self.release_timeout);

        if preview_active {
            if let Err(e) = capture.stop() {
                warn!("Failed to stop capture: {}", e);
            }
        }
        if self.surface.take().is_some() {
            capture.detach();
        }

        info!("Stream manager released");
    }

    pub fn state(&self) -> StreamState {
        self.shared.core.lock().state
    }

    pub fn is_streaming(&self) -> bool {
        self.state().is_streaming()
    }

    pub fn error(&self) -> Option<String> {
        self.shared.error.get()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    pub fn is_preview_active(&self) -> bool {
        self.shared.core.lock().preview_active
    }

    pub fn is_released(&self) -> bool {
        self.adapters.is_none()
    }

    /// Lifecycle state channel.
    pub fn state_signal(&self) -> Signal<StreamState> {
        self.shared.state.clone()
    }

    /// Latest error channel; `None` when there is nothing to report.
    pub fn error_signal(&self) -> Signal<Option<String>> {
        self.shared.error.clone()
    }

    /// Statistics channel; `None` unless streaming.
    pub fn stats_signal(&self) -> Signal<Option<StreamStats>> {
        self.shared.stats.clone()
    }

    fn publish_target(&self, config: &StreamConfig) -> Result<PublishTarget, String> {
        config.validate().map_err(|e| e.to_string())?;
        let target = PublishTarget::new(&config.rtmp_url, &config.stream_key)
            .map_err(|e| e.to_string())?;

        if self.surface.is_none() {
            return Err("No camera surface bound".to_string());
        }
        Ok(target)
    }

    /// Start capture if a surface is bound and preview is not running.
    fn ensure_preview(&mut self) -> Result<(), String> {
        let Some(adapters) = self.adapters.as_mut() else {
            return Ok(());
        };
        let Some(surface) = self.surface else {
            debug!("No surface bound; preview not started");
            return Ok(());
        };
        if self.shared.core.lock().preview_active {
            debug!("Preview already running");
            return Ok(());
        }

        adapters.capture.apply_configuration(&self.config);
        adapters
            .capture
            .start()
            .map_err(|e| format!("Failed to start camera: {}", e))?;

        self.shared.core.lock().preview_active = true;
        info!(surface = surface.id, "Preview started");
        Ok(())
    }

    /// Stop and detach capture from the current surface, if any.
    fn release_surface(&mut self) {
        let Some(previous) = self.surface.take() else {
            return;
        };
        let Some(adapters) = self.adapters.as_mut() else {
            return;
        };

        let was_active = {
            let mut core = self.shared.core.lock();
            core.capture_epoch += 1;
            std::mem::replace(&mut core.preview_active, false)
        };

        if was_active {
            if let Err(e) = adapters.capture.stop() {
                warn!("Failed to stop capture: {}", e);
            }
        }
        adapters.capture.detach();
        debug!(surface = previous.id, "Surface released");
    }

    /// Feed captured media into the session just opened.
    fn start_pump(&mut self) {
        if !self.state().is_publishing() {
            return;
        }
        let Some(adapters) = self.adapters.as_ref() else {
            return;
        };
        let (Some(media), Some(sink)) = (adapters.capture.media(), adapters.publisher.packet_sink())
        else {
            debug!("Adapters exchange no media; pump not started");
            return;
        };

        let encoder = PassthroughEncoder::new(self.config.video.fps);
        match MediaPump::start(media, sink, encoder) {
            Ok(pump) => self.pump = Some(pump),
            Err(e) => warn!("Failed to spawn media pump: {}", e),
        }
    }

    fn stop_pump(&mut self) {
        if let Some(mut pump) = self.pump.take() {
            pump.stop();
        }
    }

    fn close_session(&mut self) {
        self.stop_pump();
        if !std::mem::take(&mut self.session_open) {
            return;
        }
        if let Some(adapters) = self.adapters.as_mut() {
            adapters.publisher.close();
        }
    }

    /// Reject a start request without entering `Preparing`.
    fn fail_now(&self, reason: String) -> StreamState {
        let mut core = self.shared.core.lock();
        self.shared.fail(&mut core, reason);
        core.state
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.release();
    }
}

/// Close the publisher on a helper thread, waiting at most `timeout`.
fn close_with_timeout(mut publisher: Box<dyn PublisherAdapter>, timeout: Duration) {
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);

    let spawned = thread::Builder::new()
        .name("publisher-release".to_string())
        .spawn(move || {
            publisher.close();
            drop(publisher);
            let _ = done_tx.send(());
        });

    if let Err(e) = spawned {
        warn!("Failed to spawn publisher release thread: {}", e);
        return;
    }

    if done_rx.recv_timeout(timeout).is_err() {
        warn!(?timeout, "Publisher did not close in time; abandoning it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{CaptureProbe, FakeCapture, FakePublisher, Outcome, PublisherProbe};
    use camstream_capture::{SyntheticCapture, FRAME_CHANNEL_CAPACITY};
    use camstream_ipc::{VideoSettings, LOW_QUALITY, MEDIUM_QUALITY};
    use std::time::Instant;

    const URL: &str = "rtmp://host:1935/live";
    const KEY: &str = "abc";

    fn manager() -> (StreamManager, CaptureProbe, PublisherProbe) {
        let (capture, capture_probe) = FakeCapture::new();
        let (publisher, publisher_probe) = FakePublisher::new();
        let manager = StreamManager::new(Box::new(capture), Box::new(publisher));
        (manager, capture_probe, publisher_probe)
    }

    fn small_config() -> StreamConfig {
        StreamConfig::default().with_video(VideoSettings::new(16, 8, 100_000, 50))
    }

    fn surface(id: u64) -> SurfaceHandle {
        SurfaceHandle::new(id, 1280, 720)
    }

    fn previewing() -> (StreamManager, CaptureProbe, PublisherProbe) {
        let (mut manager, capture, publisher) = manager();
        manager.bind(surface(1));
        manager.start_preview();
        (manager, capture, publisher)
    }

    fn streaming() -> (StreamManager, CaptureProbe, PublisherProbe) {
        let (mut manager, capture, publisher) = previewing();
        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Streaming);
        (manager, capture, publisher)
    }

    #[test]
    fn test_successful_stream() {
        let (mut manager, capture, publisher) = manager();
        let states = manager.state_signal().subscribe();
        let errors = manager.error_signal().subscribe();

        manager.bind(surface(1));
        manager.start_preview();
        manager.configure(LOW_QUALITY.config());
        let state = manager.start_streaming(URL, KEY);

        assert_eq!(state, StreamState::Streaming);
        assert_eq!(
            states.drain(),
            vec![StreamState::Idle, StreamState::Preparing, StreamState::Streaming]
        );
        assert_eq!(errors.drain(), vec![None]);
        assert!(manager.is_streaming());
        assert_eq!(publisher.last_target().as_deref(), Some("rtmp://host:1935/live/abc"));
        assert_eq!(publisher.last_config().unwrap().video, LOW_QUALITY.video);
        assert!(capture.is_active());
    }

    #[test]
    fn test_connection_failure() {
        let (mut manager, capture, publisher) = previewing();
        let states = manager.state_signal().subscribe();
        let errors = manager.error_signal().subscribe();
        publisher.set_outcome(Outcome::Fail("timeout".to_string()));

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Error);
        assert_eq!(
            states.drain(),
            vec![StreamState::Idle, StreamState::Preparing, StreamState::Error]
        );
        assert_eq!(errors.drain(), vec![None, Some("timeout".to_string())]);

        // Preview survives a publish failure.
        assert_eq!(capture.count("stop"), 0);
        assert!(manager.is_preview_active());
    }

    #[test]
    fn test_asynchronous_connect() {
        let (mut manager, _capture, publisher) = previewing();
        publisher.set_outcome(Outcome::Pending);

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Preparing);
        assert!(!manager.is_streaming());

        publisher.connect();
        assert!(manager.is_streaming());
    }

    #[test]
    fn test_mid_session_drop() {
        let (manager, capture, publisher) = streaming();
        let states = manager.state_signal().subscribe();

        publisher.drop_session("connection reset");

        assert_eq!(states.drain(), vec![StreamState::Streaming, StreamState::Error]);
        assert_eq!(manager.error().as_deref(), Some("connection reset"));
        assert_eq!(capture.count("stop"), 0);
        assert!(!manager.is_streaming());
    }

    #[test]
    fn test_start_while_streaming_is_noop() {
        let (mut manager, _capture, publisher) = streaming();
        let states = manager.state_signal().subscribe();
        assert_eq!(states.drain(), vec![StreamState::Streaming]);

        assert_eq!(manager.start_streaming("rtmp://other/live", "xyz"), StreamState::Streaming);

        assert!(states.drain().is_empty());
        assert_eq!(publisher.opens(), 1);
        assert_eq!(publisher.closes(), 0);
        assert_eq!(manager.config().rtmp_url, URL);
    }

    #[test]
    fn test_start_while_preparing_is_noop() {
        let (mut manager, _capture, publisher) = previewing();
        publisher.set_outcome(Outcome::Pending);
        manager.start_streaming(URL, KEY);

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Preparing);
        assert_eq!(publisher.opens(), 1);
    }

    #[test]
    fn test_empty_address_fails_without_preparing() {
        let (mut manager, _capture, publisher) = previewing();
        let states = manager.state_signal().subscribe();

        assert_eq!(manager.start_streaming("", KEY), StreamState::Error);

        assert_eq!(states.drain(), vec![StreamState::Idle, StreamState::Error]);
        assert_eq!(publisher.opens(), 0);
        let error = manager.error().unwrap();
        assert!(error.contains("address is empty"), "{}", error);
    }

    #[test]
    fn test_invalid_configuration_fails_without_preparing() {
        let (mut manager, _capture, publisher) = previewing();
        let mut config = MEDIUM_QUALITY.config();
        config.video.fps = 0;
        manager.configure(config);

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Error);
        assert_eq!(publisher.opens(), 0);
        assert!(manager.error().unwrap().contains("fps"));
    }

    #[test]
    fn test_start_without_surface_fails() {
        let (mut manager, _capture, publisher) = manager();

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Error);
        assert_eq!(publisher.opens(), 0);
        assert!(manager.error().is_some());
    }

    #[test]
    fn test_start_begins_preview() {
        let (mut manager, capture, _publisher) = manager();
        manager.bind(surface(1));
        assert!(!manager.is_preview_active());

        manager.start_streaming(URL, KEY);

        assert!(manager.is_preview_active());
        assert_eq!(capture.count("start"), 1);
    }

    #[test]
    fn test_camera_failure_on_start() {
        let (mut manager, capture, publisher) = manager();
        manager.bind(surface(1));
        capture.fail_start("camera busy");
        let states = manager.state_signal().subscribe();

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Error);
        assert_eq!(states.drain(), vec![StreamState::Idle, StreamState::Error]);
        assert_eq!(publisher.opens(), 0);
        assert!(manager.error().unwrap().contains("camera busy"));
    }

    #[test]
    fn test_open_rejected_synchronously() {
        let (mut manager, _capture, publisher) = previewing();
        publisher.set_outcome(Outcome::Reject("refused".to_string()));

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Error);
        assert_eq!(manager.error().as_deref(), Some("Connection failed: refused"));
    }

    #[test]
    fn test_stop_while_preparing_cancels() {
        let (mut manager, _capture, publisher) = previewing();
        publisher.set_outcome(Outcome::Pending);
        let states = manager.state_signal().subscribe();

        manager.start_streaming(URL, KEY);
        manager.stop_streaming();
        publisher.connect();
        publisher.fail("late");

        assert_eq!(manager.state(), StreamState::Stopped);
        assert_eq!(
            states.drain(),
            vec![StreamState::Idle, StreamState::Preparing, StreamState::Stopped]
        );
        assert_eq!(publisher.closes(), 1);
        assert_eq!(manager.error(), None);
    }

    #[test]
    fn test_stop_keeps_preview() {
        let (mut manager, capture, publisher) = streaming();

        manager.stop_streaming();

        assert_eq!(manager.state(), StreamState::Stopped);
        assert_eq!(publisher.closes(), 1);
        assert!(manager.is_preview_active());
        assert_eq!(capture.count("stop"), 0);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (mut manager, _capture, publisher) = previewing();
        let states = manager.state_signal().subscribe();

        manager.stop_streaming();

        assert_eq!(states.drain(), vec![StreamState::Idle]);
        assert_eq!(publisher.closes(), 0);
    }

    #[test]
    fn test_restart_after_error() {
        let (mut manager, _capture, publisher) = previewing();
        publisher.set_outcome(Outcome::Fail("timeout".to_string()));
        manager.start_streaming(URL, KEY);

        publisher.set_outcome(Outcome::Connect);
        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Streaming);

        assert_eq!(manager.error(), None);
        assert_eq!(publisher.opens(), 2);
        // The failed session is closed before the new one opens.
        assert_eq!(publisher.closes(), 1);
    }

    #[test]
    fn test_restart_after_stop() {
        let (mut manager, _capture, publisher) = streaming();
        manager.stop_streaming();

        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Streaming);
        assert_eq!(publisher.opens(), 2);
        assert_eq!(publisher.closes(), 1);
    }

    #[test]
    fn test_reap_closes_failed_session() {
        let (mut manager, _capture, publisher) = streaming();
        publisher.drop_session("connection reset");

        manager.reap_session();
        manager.reap_session();

        assert_eq!(publisher.closes(), 1);
    }

    #[test]
    fn test_release_twice() {
        let (mut manager, capture, publisher) = streaming();
        let states = manager.state_signal().subscribe();

        manager.release();
        assert_eq!(manager.state(), StreamState::Stopped);
        assert_eq!(publisher.closes(), 1);
        assert_eq!(capture.count("stop"), 1);
        assert_eq!(capture.count("detach"), 1);
        assert!(manager.surface().is_none());
        assert!(manager.is_released());

        let calls = capture.calls();
        manager.release();

        assert_eq!(states.drain(), vec![StreamState::Streaming, StreamState::Stopped]);
        assert_eq!(capture.calls(), calls);
        assert_eq!(publisher.closes(), 1);
    }

    #[test]
    fn test_release_is_bounded() {
        let (capture, _capture_probe) = FakeCapture::new();
        let (publisher, publisher_probe) = FakePublisher::new();
        let mut manager = StreamManager::new(Box::new(capture), Box::new(publisher))
            .with_release_timeout(Duration::from_millis(50));
        manager.bind(surface(1));
        publisher_probe.set_outcome(Outcome::Pending);
        manager.start_streaming(URL, KEY);
        publisher_probe.set_close_delay(Duration::from_millis(500));

        let started = Instant::now();
        manager.release();

        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(manager.state(), StreamState::Stopped);
    }

    #[test]
    fn test_operations_after_release_are_ignored() {
        let (mut manager, capture, publisher) = previewing();
        manager.release();
        let calls = capture.calls();

        manager.bind(surface(2));
        manager.start_preview();
        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Idle);

        assert_eq!(capture.calls(), calls);
        assert_eq!(publisher.opens(), 0);
    }

    #[test]
    fn test_bind_replaces_previous_surface_first() {
        let (mut manager, capture, _publisher) = previewing();

        manager.bind(surface(2));

        assert_eq!(
            capture.calls(),
            vec![
                "configure", "attach", "configure", "start", "stop", "detach", "configure",
                "attach",
            ]
        );
        assert_eq!(manager.surface(), Some(surface(2)));
        assert!(!manager.is_preview_active());
    }

    #[test]
    fn test_preview_without_surface_is_noop() {
        let (mut manager, capture, _publisher) = manager();

        manager.start_preview();
        manager.stop_preview();

        assert!(capture.calls().is_empty());
        assert!(!manager.is_preview_active());
        assert_eq!(manager.error(), None);
    }

    #[test]
    fn test_preview_is_idempotent() {
        let (mut manager, capture, _publisher) = previewing();

        manager.start_preview();
        assert_eq!(capture.count("start"), 1);

        manager.stop_preview();
        manager.stop_preview();
        assert_eq!(capture.count("stop"), 1);
        assert_eq!(manager.state(), StreamState::Idle);
    }

    #[test]
    fn test_preview_failure_sets_error_only() {
        let (mut manager, capture, _publisher) = manager();
        manager.bind(surface(1));
        capture.fail_start("permission denied");

        manager.start_preview();

        assert_eq!(manager.state(), StreamState::Idle);
        assert!(manager.error().unwrap().contains("permission denied"));
        assert!(!manager.is_preview_active());
    }

    #[test]
    fn test_clear_error_keeps_state() {
        let (mut manager, _capture, publisher) = previewing();
        publisher.set_outcome(Outcome::Fail("timeout".to_string()));
        manager.start_streaming(URL, KEY);
        let states = manager.state_signal().subscribe();

        manager.clear_error();

        assert_eq!(manager.error(), None);
        assert_eq!(states.drain(), vec![StreamState::Error]);
    }

    #[test]
    fn test_new_failure_overwrites_error() {
        let (mut manager, _capture, publisher) = previewing();
        publisher.set_outcome(Outcome::Fail("first".to_string()));
        manager.start_streaming(URL, KEY);
        publisher.set_outcome(Outcome::Fail("second".to_string()));
        manager.start_streaming(URL, KEY);

        assert_eq!(manager.error().as_deref(), Some("second"));
    }

    #[test]
    fn test_configure_while_streaming_is_deferred() {
        let (mut manager, capture, publisher) = streaming();
        let applied = capture.count("configure");

        manager.configure(LOW_QUALITY.config().with_destination(URL, KEY));

        assert!(manager.is_streaming());
        assert_eq!(capture.count("configure"), applied);
        assert_eq!(manager.config().video, LOW_QUALITY.video);

        manager.stop_streaming();
        manager.start_streaming(URL, KEY);
        assert_eq!(publisher.last_config().unwrap().video, LOW_QUALITY.video);
    }

    #[test]
    fn test_configure_when_idle_reaches_capture() {
        let (mut manager, capture, _publisher) = previewing();

        manager.configure(LOW_QUALITY.config());

        assert_eq!(capture.last_config().unwrap().video, LOW_QUALITY.video);
    }

    #[test]
    fn test_select_quality_keeps_destination() {
        let (mut manager, _capture, _publisher) = streaming();

        manager.select_quality(QualitySelection::Low);

        assert_eq!(manager.config().rtmp_url, URL);
        assert_eq!(manager.config().stream_key, KEY);
        assert_eq!(manager.config().video, LOW_QUALITY.video);
        assert_eq!(manager.config().audio, LOW_QUALITY.audio);
    }

    #[test]
    fn test_toggle_streaming() {
        let (mut manager, _capture, _publisher) = previewing();

        assert_eq!(manager.toggle_streaming(URL, KEY), StreamState::Streaming);
        assert_eq!(manager.toggle_streaming(URL, KEY), StreamState::Stopped);
        assert_eq!(manager.toggle_streaming(URL, KEY), StreamState::Streaming);
    }

    #[test]
    fn test_surface_events() {
        let (mut manager, capture, _publisher) = manager();

        manager.on_surface_event(SurfaceEvent::Created(surface(1)));
        assert!(manager.is_preview_active());
        let calls = capture.calls();

        manager.on_surface_event(SurfaceEvent::Changed(surface(1)));
        assert_eq!(capture.calls(), calls);

        manager.on_surface_event(SurfaceEvent::Changed(SurfaceHandle::new(1, 720, 1280)));
        assert_eq!(capture.count("attach"), 2);
        assert!(manager.is_preview_active());

        manager.on_surface_event(SurfaceEvent::Destroyed);
        assert!(!manager.is_preview_active());
        assert_eq!(manager.state(), StreamState::Idle);
    }

    #[test]
    fn test_capture_fault_during_preview() {
        let (manager, capture, _publisher) = previewing();
        let states = manager.state_signal().subscribe();

        capture.lose_device("camera unplugged");

        assert_eq!(states.drain(), vec![StreamState::Idle]);
        assert_eq!(manager.error().as_deref(), Some("camera unplugged"));
        assert!(!manager.is_preview_active());
    }

    #[test]
    fn test_capture_fault_while_streaming() {
        let (manager, capture, publisher) = streaming();

        capture.lose_device("camera unplugged");
        publisher.drop_session("late");

        assert_eq!(manager.state(), StreamState::Error);
        assert_eq!(manager.error().as_deref(), Some("camera unplugged"));
    }

    #[test]
    fn test_fault_from_previous_surface_ignored() {
        let (mut manager, capture, _publisher) = previewing();
        let old_faults = capture.fault_sink().unwrap();

        manager.bind(surface(2));
        manager.start_preview();
        old_faults.device_lost("stale".to_string());

        assert_eq!(manager.error(), None);
        assert!(manager.is_preview_active());
    }

    #[test]
    fn test_stats_follow_streaming() {
        let (mut manager, _capture, publisher) = streaming();
        let stats = StreamStats {
            fps: 24.0,
            bitrate_bps: 1_500_000,
            dropped_frames: 2,
            duration_ms: 1_000,
            is_connected: true,
        };
        publisher.set_stats(stats.clone());
        let updates = manager.stats_signal().subscribe();

        assert_eq!(manager.stats(), Some(stats.clone()));
        manager.refresh_stats();
        manager.stop_streaming();
        manager.refresh_stats();

        assert_eq!(updates.drain(), vec![None, Some(stats), None]);
        assert_eq!(manager.stats(), None);
    }

    #[test]
    fn test_captured_media_reaches_session() {
        let mut capture = SyntheticCapture::new();
        capture.apply_configuration(&small_config());
        let media = capture.media().unwrap();
        let (publisher, publisher_probe) = FakePublisher::new();
        let mut manager = StreamManager::new(Box::new(capture), Box::new(publisher))
            .with_config(small_config());

        manager.bind(SurfaceHandle::new(1, 16, 8));
        assert_eq!(manager.start_streaming(URL, KEY), StreamState::Streaming);

        thread::sleep(Duration::from_millis(300));
        assert!(publisher_probe.deliver() > 0);
        let stats = manager.stats().unwrap();
        assert!(stats.fps > 0.0, "{:?}", stats);
        assert!(stats.bitrate_bps > 0);
        assert!(media.frames.len() < FRAME_CHANNEL_CAPACITY);

        manager.stop_streaming();
        assert!(manager.pump.is_none());
        assert_eq!(publisher_probe.deliver(), 0);
    }

    #[test]
    fn test_no_pump_without_media() {
        let (mut manager, _capture, publisher) = streaming();
        assert!(manager.pump.is_none());
        manager.stop_streaming();
        assert_eq!(publisher.deliver(), 0);
    }

    #[test]
    fn test_late_subscriber_gets_current_state() {
        let (manager, _capture, _publisher) = streaming();

        let states = manager.state_signal().subscribe();
        let errors = manager.error_signal().subscribe();

        assert_eq!(states.drain(), vec![StreamState::Streaming]);
        assert_eq!(errors.drain(), vec![None]);
    }
}
