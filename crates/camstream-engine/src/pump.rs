//! Media pump between the capture adapter and the publish session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::select;
use tracing::{debug, info, warn};

use camstream_capture::{AudioChunk, CaptureTimestamp, CapturedFrame, MediaSource};
use camstream_transport::{PacketSink, RtmpPacket};

/// Longest the pump waits for media before checking for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Stand-in for a codec: forwards frames and samples unchanged, marking one
/// keyframe per `keyframe_interval` frames.
pub(crate) struct PassthroughEncoder {
    keyframe_interval: u64,
    frames: u64,
}

impl PassthroughEncoder {
    pub fn new(keyframe_interval: u32) -> Self {
        Self {
            keyframe_interval: u64::from(keyframe_interval.max(1)),
            frames: 0,
        }
    }

    fn encode_video(&mut self, frame: &CapturedFrame, timestamp_ms: u32) -> RtmpPacket {
        let is_keyframe = self.frames % self.keyframe_interval == 0;
        self.frames += 1;

        RtmpPacket {
            data: frame.data.clone(),
            timestamp_ms,
            is_video: true,
            is_keyframe,
        }
    }

    fn encode_audio(&mut self, chunk: &AudioChunk, timestamp_ms: u32) -> RtmpPacket {
        RtmpPacket {
            data: chunk.data.clone(),
            timestamp_ms,
            is_video: false,
            is_keyframe: false,
        }
    }
}

/// Thread moving captured media into a publish session.
///
/// Runs until [`stop`](Self::stop) or until the session stops accepting
/// packets.
pub(crate) struct MediaPump {
    should_stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MediaPump {
    pub fn start(
        media: MediaSource,
        sink: PacketSink,
        encoder: PassthroughEncoder,
    ) -> std::io::Result<Self> {
        let should_stop = Arc::new(AtomicBool::new(false));

        let pump = Pump {
            dropped_seen: media.dropped_frames(),
            media,
            sink,
            encoder,
            should_stop: Arc::clone(&should_stop),
            base_pts_ms: None,
        };

        let handle = thread::Builder::new()
            .name("camstream-pump".to_string())
            .spawn(move || pump.run())?;

        Ok(Self {
            should_stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.should_stop.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            warn!("Media pump thread panicked");
        }
    }
}

impl Drop for MediaPump {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Pump {
    media: MediaSource,
    sink: PacketSink,
    encoder: PassthroughEncoder,
    should_stop: Arc<AtomicBool>,
    dropped_seen: u64,
    base_pts_ms: Option<u64>,
}

impl Pump {
    fn run(mut self) {
        debug!("Media pump starting");
        let started = Instant::now();
        let mut video_packets: u64 = 0;
        let mut audio_packets: u64 = 0;

        while !self.should_stop.load(Ordering::SeqCst) {
            let packet = select! {
                recv(self.media.frames) -> frame => match frame {
                    Ok(frame) => {
                        video_packets += 1;
                        let timestamp_ms = session_ms(&mut self.base_pts_ms, frame.timestamp);
                        Some(self.encoder.encode_video(&frame, timestamp_ms))
                    }
                    Err(_) => {
                        warn!("Frame channel disconnected");
                        break;
                    }
                },
                recv(self.media.audio) -> chunk => match chunk {
                    Ok(chunk) => {
                        audio_packets += 1;
                        let timestamp_ms = session_ms(&mut self.base_pts_ms, chunk.timestamp);
                        Some(self.encoder.encode_audio(&chunk, timestamp_ms))
                    }
                    Err(_) => {
                        warn!("Audio channel disconnected");
                        break;
                    }
                },
                default(POLL_INTERVAL) => None,
            };

            let dropped = self.media.dropped_frames();
            self.sink
                .record_drops(dropped.saturating_sub(self.dropped_seen));
            self.dropped_seen = dropped;

            if let Some(packet) = packet {
                if !self.sink.send(packet) {
                    debug!("Publish session closed");
                    break;
                }
            }
        }

        info!(
            video = video_packets,
            audio = audio_packets,
            uptime_secs = started.elapsed().as_secs_f32(),
            "Media pump stopped"
        );
    }
}

/// Milliseconds since the first captured timestamp of the session.
fn session_ms(base_pts_ms: &mut Option<u64>, timestamp: CaptureTimestamp) -> u32 {
    let pts_ms = timestamp.pts_ms();
    let base = *base_pts_ms.get_or_insert(pts_ms);
    pts_ms.saturating_sub(base) as u32
}
