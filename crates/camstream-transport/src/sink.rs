//! Producer side of a publish session's packet queue.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};

use crate::rtmp::RtmpPacket;
use crate::stats::StatsCollector;

/// Queues encoded packets for an open session.
///
/// Packets that do not fit in the queue are discarded and counted as
/// dropped in the session statistics.
#[derive(Clone)]
pub struct PacketSink {
    sender: Sender<RtmpPacket>,
    stats: Arc<StatsCollector>,
}

impl PacketSink {
    pub fn new(sender: Sender<RtmpPacket>, stats: Arc<StatsCollector>) -> Self {
        Self { sender, stats }
    }

    /// Queue a packet. Returns false once the session has gone away.
    pub fn send(&self, packet: RtmpPacket) -> bool {
        match self.sender.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.stats.record_drop();
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Count frames lost before they reached the sink.
    pub fn record_drops(&self, count: u64) {
        if count > 0 {
            self.stats.record_drops(count);
        }
    }
}
