//! Synthetic capture source producing a blank test pattern.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, info, instrument, warn};

use camstream_ipc::{AudioSettings, StreamConfig, SurfaceHandle, VideoSettings};

use crate::error::CaptureError;
use crate::frame::{AudioChunk, CaptureTimestamp, CapturedFrame};
use crate::{
    CaptureAdapter, CaptureFaultSink, CaptureResult, MediaSource, AUDIO_CHANNEL_CAPACITY,
    FRAME_CHANNEL_CAPACITY,
};

/// Capture adapter that needs no camera or microphone.
///
/// While started, a worker thread emits black NV12 frames and silent PCM at
/// the configured frame rate. Consumers read them through
/// [`media`](CaptureAdapter::media); when a channel is full the data is
/// dropped and counted.
pub struct SyntheticCapture {
    surface: Option<SurfaceHandle>,
    video: VideoSettings,
    audio: AudioSettings,
    should_stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    frame_tx: Sender<CapturedFrame>,
    frame_rx: Receiver<CapturedFrame>,
    audio_tx: Sender<AudioChunk>,
    audio_rx: Receiver<AudioChunk>,
    dropped_frames: Arc<AtomicU64>,
}

impl SyntheticCapture {
    pub fn new() -> Self {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_CHANNEL_CAPACITY);
        let (audio_tx, audio_rx) = crossbeam_channel::bounded(AUDIO_CHANNEL_CAPACITY);
        let config = StreamConfig::default();

        Self {
            surface: None,
            video: config.video,
            audio: config.audio,
            should_stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            frame_tx,
            frame_rx,
            audio_tx,
            audio_rx,
            dropped_frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Currently attached surface.
    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureAdapter for SyntheticCapture {
    fn attach(&mut self, surface: SurfaceHandle, _faults: CaptureFaultSink) -> CaptureResult<()> {
        if self.surface.is_some() {
            self.detach();
        }

        debug!(surface = surface.id, width = surface.width, height = surface.height, "Surface attached");
        self.surface = Some(surface);
        Ok(())
    }

    fn detach(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop capture on detach: {}", e);
        }
        if let Some(surface) = self.surface.take() {
            debug!(surface = surface.id, "Surface detached");
        }
    }

    fn apply_configuration(&mut self, config: &StreamConfig) {
        self.video = config.video;
        self.audio = config.audio;

        if self.is_active() {
            debug!("Capture running; new configuration applies on next start");
        }
    }

    #[instrument(name = "synthetic_capture_start", skip(self))]
    fn start(&mut self) -> CaptureResult<()> {
        let surface = self.surface.ok_or(CaptureError::NotAttached)?;

        if self.is_active() {
            debug!("Capture already running");
            return Ok(());
        }

        if self.video.fps == 0 || self.video.width == 0 || self.video.height == 0 {
            return Err(CaptureError::FormatNotSupported(format!(
                "{}x{} @ {}fps",
                self.video.width, self.video.height, self.video.fps
            )));
        }

        info!(
            surface = surface.id,
            width = self.video.width,
            height = self.video.height,
            fps = self.video.fps,
            "Starting synthetic capture"
        );

        self.should_stop.store(false, Ordering::SeqCst);

        let generator = Generator {
            video: self.video,
            audio: self.audio,
            frame_tx: self.frame_tx.clone(),
            audio_tx: self.audio_tx.clone(),
            should_stop: Arc::clone(&self.should_stop),
            dropped_frames: Arc::clone(&self.dropped_frames),
        };

        let handle = thread::Builder::new()
            .name("synthetic-capture".to_string())
            .spawn(move || generator.run())
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        self.worker = Some(handle);
        Ok(())
    }

    #[instrument(name = "synthetic_capture_stop", skip(self))]
    fn stop(&mut self) -> CaptureResult<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        info!("Stopping synthetic capture");
        self.should_stop.store(true, Ordering::SeqCst);

        if handle.join().is_err() {
            return Err(CaptureError::DeviceLost("capture thread panicked".to_string()));
        }

        // Discard anything still queued from this run.
        while self.frame_rx.try_recv().is_ok() {}
        while self.audio_rx.try_recv().is_ok() {}

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    fn media(&self) -> Option<MediaSource> {
        Some(MediaSource::new(
            self.frame_rx.clone(),
            self.audio_rx.clone(),
            Arc::clone(&self.dropped_frames),
        ))
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

struct Generator {
    video: VideoSettings,
    audio: AudioSettings,
    frame_tx: Sender<CapturedFrame>,
    audio_tx: Sender<AudioChunk>,
    should_stop: Arc<AtomicBool>,
    dropped_frames: Arc<AtomicU64>,
}

impl Generator {
    fn run(self) {
        let frame_interval = Duration::from_nanos(1_000_000_000 / u64::from(self.video.fps));
        let frame_data = blank_nv12(self.video.width, self.video.height);

        let channels = self.audio.channels();
        let samples_per_frame = (self.audio.sample_rate / self.video.fps).max(1) as usize;
        let silence = Bytes::from(vec![0u8; samples_per_frame * channels as usize * 2]);

        let start_time = Instant::now();
        let mut sequence: u64 = 0;

        while !self.should_stop.load(Ordering::SeqCst) {
            let tick = Instant::now();
            let timestamp = CaptureTimestamp::now(start_time);

            let frame = CapturedFrame::new(
                frame_data.clone(),
                self.video.width,
                self.video.height,
                timestamp,
                sequence,
            );
            if let Err(TrySendError::Full(_)) = self.frame_tx.try_send(frame) {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }

            let chunk = AudioChunk {
                data: silence.clone(),
                sample_rate: self.audio.sample_rate,
                channels,
                timestamp,
                sequence,
            };
            let _ = self.audio_tx.try_send(chunk);

            sequence += 1;

            let elapsed = tick.elapsed();
            if elapsed < frame_interval {
                thread::sleep(frame_interval - elapsed);
            }
        }

        debug!(frames = sequence, "Synthetic capture loop stopped");
    }
}

/// Black frame: luma 16, chroma 128.
fn blank_nv12(width: u32, height: u32) -> Bytes {
    let y_size = width as usize * height as usize;
    let mut data = vec![16u8; CapturedFrame::nv12_buffer_size(width, height)];
    data[y_size..].fill(128);
    Bytes::from(data)
}
