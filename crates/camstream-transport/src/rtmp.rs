//! RTMP publisher implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::RwLock;
use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
use rml_rtmp::sessions::{
    ClientSession, ClientSessionConfig, ClientSessionEvent, ClientSessionResult,
    PublishRequestType,
};
use rml_rtmp::time::RtmpTimestamp;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, trace, warn};

use camstream_ipc::{StreamConfig, StreamStats};

use crate::connection::ConnectionState;
use crate::error::TransportError;
use crate::sink::PacketSink;
use crate::stats::StatsCollector;
use crate::target::PublishTarget;
use crate::{
    PublisherAdapter, SessionEventSink, TransportResult, CONNECT_TIMEOUT, PACKET_CHANNEL_CAPACITY,
};

/// How often the session task checks for outgoing packets and stop requests.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

const READ_BUFFER_SIZE: usize = 4096;

/// A packet to send over RTMP.
#[derive(Debug, Clone)]
pub struct RtmpPacket {
    /// Packet data.
    pub data: Bytes,

    /// Presentation timestamp in milliseconds.
    pub timestamp_ms: u32,

    /// Whether this is a video packet.
    pub is_video: bool,

    /// Whether this is a keyframe (for video).
    pub is_keyframe: bool,
}

/// Publishes a live stream to an RTMP server.
///
/// Each [`open`](PublisherAdapter::open) starts a dedicated tokio runtime that
/// connects, handshakes and requests publishing, then forwards packets queued
/// through [`packet_sink`](PublisherAdapter::packet_sink) until closed or the
/// connection is lost.
pub struct RtmpPublisher {
    state: Arc<RwLock<ConnectionState>>,
    stats: Arc<StatsCollector>,
    runtime: Option<Runtime>,
    should_stop: Arc<AtomicBool>,
    packet_sink: Option<PacketSink>,
}

impl RtmpPublisher {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            stats: Arc::new(StatsCollector::new()),
            runtime: None,
            should_stop: Arc::new(AtomicBool::new(false)),
            packet_sink: None,
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state.read().is_connected()
    }
}

impl Default for RtmpPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl PublisherAdapter for RtmpPublisher {
    #[instrument(name = "rtmp_open", skip_all, fields(url = %target.redacted()))]
    fn open(
        &mut self,
        target: &PublishTarget,
        config: &StreamConfig,
        events: SessionEventSink,
    ) -> TransportResult<()> {
        if self.runtime.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        if target.is_tls() {
            return Err(TransportError::Unsupported("rtmps".to_string()));
        }

        info!(
            width = config.video.width,
            height = config.video.height,
            video_bitrate = config.video.bitrate_bps,
            audio_bitrate = config.audio.bitrate_bps,
            "Opening RTMP session"
        );

        let runtime = Runtime::new().map_err(TransportError::Io)?;

        let (sender, receiver): (Sender<RtmpPacket>, Receiver<RtmpPacket>) =
            crossbeam_channel::bounded(PACKET_CHANNEL_CAPACITY);

        self.should_stop.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connecting;

        let session = Session {
            target: target.clone(),
            receiver,
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            should_stop: Arc::clone(&self.should_stop),
            events,
        };
        runtime.spawn(session.run());

        self.runtime = Some(runtime);
        self.packet_sink = Some(PacketSink::new(sender, Arc::clone(&self.stats)));
        Ok(())
    }

    #[instrument(name = "rtmp_close", skip(self))]
    fn close(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
        self.packet_sink = None;

        let Some(runtime) = self.runtime.take() else {
            return;
        };

        // Pending DNS lookups run on the blocking pool and may not finish soon.
        info!("Closing RTMP session");
        runtime.shutdown_background();

        *self.state.write() = ConnectionState::Disconnected;
        self.stats.stop();
        info!("RTMP session closed");
    }

    fn current_stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    fn packet_sink(&self) -> Option<PacketSink> {
        self.packet_sink.clone()
    }

    fn name(&self) -> &'static str {
        "rtmp"
    }
}

impl Drop for RtmpPublisher {
    fn drop(&mut self) {
        self.close();
    }
}

/// State moved into the network task for one session.
struct Session {
    target: PublishTarget,
    receiver: Receiver<RtmpPacket>,
    state: Arc<RwLock<ConnectionState>>,
    stats: Arc<StatsCollector>,
    should_stop: Arc<AtomicBool>,
    events: SessionEventSink,
}

impl Session {
    async fn run(self) {
        let attempt = tokio::time::timeout(CONNECT_TIMEOUT, connect_rtmp(&self.target)).await;
        let result = attempt.unwrap_or_else(|_| {
            Err(TransportError::Timeout(format!(
                "no answer from {} within {}s",
                self.target.socket_addr(),
                CONNECT_TIMEOUT.as_secs()
            )))
        });

        if self.stopping() {
            debug!("Session closed while connecting");
            return;
        }

        let mut connection = match result {
            Ok(connection) => connection,
            Err(e) => {
                warn!("RTMP connect failed: {}", e);
                *self.state.write() = ConnectionState::Failed {
                    reason: e.to_string(),
                };
                self.events.failed(e.to_string());
                return;
            }
        };

        *self.state.write() = ConnectionState::Connected;
        self.stats.start();
        self.stats.set_connected(true);
        self.events.connected();

        let outcome = self.pump(&mut connection).await;
        self.stats.set_connected(false);

        match outcome {
            Ok(()) => debug!("RTMP session ended"),
            Err(_) if self.stopping() => debug!("RTMP session ended during close"),
            Err(e) => {
                warn!("RTMP connection lost: {}", e);
                *self.state.write() = ConnectionState::Failed {
                    reason: e.to_string(),
                };
                self.events.dropped(e.to_string());
            }
        }
    }

    fn stopping(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    /// Service the connection until closed or broken.
    async fn pump(&self, connection: &mut RtmpConnection) -> TransportResult<()> {
        let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            if self.stopping() {
                return Ok(());
            }

            tokio::select! {
                result = connection.stream.read(&mut read_buf) => {
                    let n = result?;
                    if n == 0 {
                        return Err(TransportError::ConnectionLost(
                            "server closed the connection".to_string(),
                        ));
                    }

                    let results = connection
                        .session
                        .handle_input(&read_buf[..n])
                        .map_err(|e| TransportError::Protocol(format!("{:?}", e)))?;
                    for event in write_results(&mut connection.stream, results).await? {
                        trace!("Received event: {:?}", event);
                    }
                }
                _ = tokio::time::sleep(PUMP_INTERVAL) => {}
            }

            loop {
                match self.receiver.try_recv() {
                    Ok(packet) => {
                        if let Err(e) = send_packet(connection, &packet).await {
                            self.stats.record_drop();
                            return Err(e);
                        }
                        self.stats.record_packet(packet.data.len(), packet.is_video);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Packet channel disconnected");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// RTMP connection with session state.
struct RtmpConnection {
    stream: TcpStream,
    session: ClientSession,
}

async fn connect_rtmp(target: &PublishTarget) -> TransportResult<RtmpConnection> {
    info!(
        host = %target.host(),
        port = target.port(),
        app = %target.app_name(),
        "Connecting to RTMP server"
    );

    let mut stream = TcpStream::connect(target.socket_addr())
        .await
        .map_err(|e| TransportError::ConnectionFailed(format!("TCP connect failed: {}", e)))?;

    debug!("TCP connection established, starting handshake");
    let leftover_bytes = handshake(&mut stream).await?;

    debug!("Handshake complete, creating RTMP session");
    let (mut session, initial_results) = ClientSession::new(ClientSessionConfig::new())
        .map_err(|e| TransportError::Protocol(format!("Session creation failed: {:?}", e)))?;
    write_results(&mut stream, initial_results).await?;

    if !leftover_bytes.is_empty() {
        let results = session
            .handle_input(&leftover_bytes)
            .map_err(|e| TransportError::Protocol(format!("{:?}", e)))?;
        write_results(&mut stream, results).await?;
    }

    let mut connection = RtmpConnection { stream, session };

    debug!(app = %target.app_name(), "Requesting RTMP connection");
    let request = connection
        .session
        .request_connection(target.app_name().to_string())
        .map_err(|e| TransportError::Protocol(format!("Connection request failed: {:?}", e)))?;
    write_results(&mut connection.stream, vec![request]).await?;

    await_event(&mut connection, "connection acceptance", |event| match event {
        ClientSessionEvent::ConnectionRequestAccepted => Some(Ok(())),
        ClientSessionEvent::ConnectionRequestRejected { description } => Some(Err(
            TransportError::HandshakeRejected(format!("connection rejected: {}", description)),
        )),
        _ => None,
    })
    .await?;

    debug!("Requesting publish");
    let request = connection
        .session
        .request_publishing(target.stream_key().to_string(), PublishRequestType::Live)
        .map_err(|e| TransportError::Protocol(format!("Publish request failed: {:?}", e)))?;
    write_results(&mut connection.stream, vec![request]).await?;

    await_event(&mut connection, "publish acceptance", |event| match event {
        ClientSessionEvent::PublishRequestAccepted => Some(Ok(())),
        _ => None,
    })
    .await?;

    info!("RTMP connection established and publishing started");
    Ok(connection)
}

/// Run the client side of the RTMP handshake. Returns bytes received past
/// the end of the handshake.
async fn handshake(stream: &mut TcpStream) -> TransportResult<Vec<u8>> {
    let mut handshake = Handshake::new(PeerType::Client);

    let p0_p1 = handshake.generate_outbound_p0_and_p1().map_err(|e| {
        TransportError::ConnectionFailed(format!("Handshake generation failed: {:?}", e))
    })?;
    stream.write_all(&p0_p1).await?;

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(TransportError::ConnectionFailed(
                "Connection closed during handshake".to_string(),
            ));
        }

        match handshake.process_bytes(&buf[..n]) {
            Ok(HandshakeProcessResult::InProgress { response_bytes }) => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
            }
            Ok(HandshakeProcessResult::Completed {
                response_bytes,
                remaining_bytes,
            }) => {
                if !response_bytes.is_empty() {
                    stream.write_all(&response_bytes).await?;
                }
                return Ok(remaining_bytes);
            }
            Err(e) => {
                return Err(TransportError::HandshakeRejected(format!("{:?}", e)));
            }
        }
    }
}

/// Read from the server until `check` resolves one of the raised events.
async fn await_event<F>(
    connection: &mut RtmpConnection,
    waiting_for: &str,
    mut check: F,
) -> TransportResult<()>
where
    F: FnMut(ClientSessionEvent) -> Option<TransportResult<()>>,
{
    let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = connection.stream.read(&mut read_buf).await?;
        if n == 0 {
            return Err(TransportError::ConnectionFailed(format!(
                "connection closed while waiting for {}",
                waiting_for
            )));
        }

        let results = connection
            .session
            .handle_input(&read_buf[..n])
            .map_err(|e| TransportError::Protocol(format!("{:?}", e)))?;

        for event in write_results(&mut connection.stream, results).await? {
            trace!("Received event: {:?}", event);
            if let Some(outcome) = check(event) {
                return outcome;
            }
        }
    }
}

/// Write outbound packets and collect raised events.
async fn write_results(
    stream: &mut TcpStream,
    results: Vec<ClientSessionResult>,
) -> TransportResult<Vec<ClientSessionEvent>> {
    let mut events = Vec::new();
    for result in results {
        match result {
            ClientSessionResult::OutboundResponse(packet) => {
                stream.write_all(&packet.bytes).await?;
            }
            ClientSessionResult::RaisedEvent(event) => events.push(event),
            _ => {}
        }
    }
    Ok(events)
}

async fn send_packet(connection: &mut RtmpConnection, packet: &RtmpPacket) -> TransportResult<()> {
    let timestamp = RtmpTimestamp::new(packet.timestamp_ms);

    let result = if packet.is_video {
        connection.session.publish_video_data(
            packet.data.clone(),
            timestamp,
            !packet.is_keyframe, // can_be_dropped: true for non-keyframes
        )
    } else {
        connection.session.publish_audio_data(packet.data.clone(), timestamp, false)
    };

    let session_result =
        result.map_err(|e| TransportError::Protocol(format!("Failed to publish data: {:?}", e)))?;

    if let ClientSessionResult::OutboundResponse(rtmp_packet) = session_result {
        connection.stream.write_all(&rtmp_packet.bytes).await?;
    }

    Ok(())
}
