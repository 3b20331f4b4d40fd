//! Session statistics collection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use camstream_ipc::StreamStats;

/// Collects counters for a publish session.
///
/// Counters are updated from the network task; snapshots are taken from the
/// controlling thread. The frame rate is measured over the window since the
/// previous snapshot.
pub struct StatsCollector {
    start_time: RwLock<Option<Instant>>,
    video_packets: AtomicU64,
    bytes_sent: AtomicU64,
    dropped: AtomicU64,
    connected: AtomicBool,
    window: RwLock<(Instant, u64)>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            start_time: RwLock::new(None),
            video_packets: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            window: RwLock::new((Instant::now(), 0)),
        }
    }

    /// Reset counters and start the session clock.
    pub fn start(&self) {
        let now = Instant::now();
        self.video_packets.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        *self.start_time.write() = Some(now);
        *self.window.write() = (now, 0);
    }

    /// Stop the session clock.
    pub fn stop(&self) {
        *self.start_time.write() = None;
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Record a packet written to the server.
    pub fn record_packet(&self, bytes: usize, is_video: bool) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        if is_video {
            self.video_packets.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a packet discarded before it reached the server.
    pub fn record_drop(&self) {
        self.record_drops(1);
    }

    pub fn record_drops(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Take a snapshot and begin a new frame rate window.
    pub fn snapshot(&self) -> StreamStats {
        let now = Instant::now();
        let video_packets = self.video_packets.load(Ordering::Relaxed);

        let fps = {
            let mut window = self.window.write();
            let (since, packets_then) = *window;
            let elapsed = now.duration_since(since).as_secs_f64();
            *window = (now, video_packets);

            if elapsed > 0.0 {
                video_packets.saturating_sub(packets_then) as f64 / elapsed
            } else {
                0.0
            }
        };

        let duration = self.start_time.read().map(|start| now.duration_since(start));
        let (duration_ms, bitrate_bps) = match duration {
            Some(duration) => {
                let secs = duration.as_secs_f64();
                let bits = self.bytes_sent.load(Ordering::Relaxed) as f64 * 8.0;
                let bitrate = if secs > 0.0 { (bits / secs) as u64 } else { 0 };
                (duration.as_millis() as u64, bitrate)
            }
            None => (0, 0),
        };

        StreamStats {
            fps,
            bitrate_bps,
            dropped_frames: self.dropped.load(Ordering::Relaxed),
            duration_ms,
            is_connected: self.connected.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
