//! RTMP publishing for camstream.
//!
//! This crate defines the publisher interface the stream engine drives and
//! an RTMP implementation of it. Session outcomes are delivered
//! asynchronously through [`SessionEvents`].

mod connection;
mod error;
mod rtmp;
mod sink;
mod stats;
mod target;

pub use connection::ConnectionState;
pub use error::TransportError;
pub use rtmp::{RtmpPacket, RtmpPublisher};
pub use sink::PacketSink;
pub use stats::StatsCollector;
pub use target::PublishTarget;

use std::sync::Arc;
use std::time::Duration;

use camstream_ipc::{StreamConfig, StreamStats};

/// Channel capacity for outgoing packets.
pub const PACKET_CHANNEL_CAPACITY: usize = 30;

/// Port used when the address does not name one.
pub const DEFAULT_RTMP_PORT: u16 = 1935;

/// Time allowed for TCP connect, handshake and publish acceptance.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Receives the outcome of a publish session.
///
/// Implementations are called from the publisher's network threads, at most
/// once for `connected` and at most once for either `failed` or `dropped`.
pub trait SessionEvents: Send + Sync {
    /// The server accepted the publish request.
    fn connected(&self);

    /// The session could not be established.
    fn failed(&self, reason: String);

    /// An established session was lost.
    fn dropped(&self, reason: String);
}

/// Shared handle to a session event receiver.
pub type SessionEventSink = Arc<dyn SessionEvents>;

/// Trait for stream publishing backends.
pub trait PublisherAdapter: Send {
    /// Begin opening a session. Returns once the attempt is under way;
    /// the outcome arrives through `events`.
    fn open(
        &mut self,
        target: &PublishTarget,
        config: &StreamConfig,
        events: SessionEventSink,
    ) -> TransportResult<()>;

    /// Tear down the current session, if any. Network teardown finishes in
    /// the background; no outcome is reported for a closed session.
    fn close(&mut self);

    /// Queue for encoded media, while a session is open.
    fn packet_sink(&self) -> Option<PacketSink>;

    /// Statistics for the current session.
    fn current_stats(&self) -> StreamStats;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
