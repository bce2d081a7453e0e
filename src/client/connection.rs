//! Peer connection.
//!
//! A [`Connection`] owns at most one transport session to one peer. The
//! session is opened on first use: dial, then the handshake frame, both under
//! the writer lock so concurrent first callers share a single setup. Any
//! transport failure drops the session; the next use dials again.
//!
//! # Reading
//!
//! The read half of a session lives in a slot. A reader takes it out for the
//! duration of the read and puts it back afterwards, so exactly one of
//! [`Connection::receive_one`] or [`Connection::receive_loop`] reads at a
//! time. A second concurrent reader fails with [`PeerError::ReaderBusy`].
//!
//! # Example
//!
//! ```no_run
//! use chia_peer::prelude::*;
//!
//! # async fn run() -> Result<(), PeerError> {
//! let keys = PemKeyFiles::new("private_full_node.crt", "private_full_node.key");
//! let peer: PeerAddress = "10.0.0.5:8444".parse().expect("valid address");
//! let conn = Connection::new(peer, &keys, ConnectionConfig::default())?;
//!
//! conn.request_peers().await?;
//! let reply = conn.receive_one().await?;
//! println!("{}", reply.msg_type);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::{ConnectionConfig, DecodeErrorPolicy};
use super::keys::KeyMaterialSource;
use crate::core::{MessagePayload, PeerError, Streamable, TransportError};
use crate::protocol::Handshake;
use crate::transport::{
    Dialer, FrameSink, FrameSource, PeerAddress, ProxyRules, TransportConfig, WsDialer,
};
use crate::wire::{Message, ProtocolMessageType, decode_message};

/// Lifecycle of the connection's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No session has been opened yet.
    Unconnected,
    /// Dialing and sending the handshake. A cancelled attempt returns to the
    /// phase it started from.
    Handshaking,
    /// Session open, handshake sent.
    Ready,
    /// The last dial, write or read failed. The next use dials again.
    Failed,
    /// Closed by the owner. The next use dials again.
    Closed,
}

/// Receives every inbound message of [`Connection::receive_loop`], in order.
pub trait MessageHandler: Send {
    /// Handle one message, or the error decoding it.
    fn handle(&mut self, message: Result<Message, PeerError>);
}

impl<F> MessageHandler for F
where
    F: FnMut(Result<Message, PeerError>) + Send,
{
    fn handle(&mut self, message: Result<Message, PeerError>) {
        self(message)
    }
}

struct WriteHalf<S> {
    generation: u64,
    sink: S,
}

struct ReadHalf<S> {
    generation: u64,
    source: S,
}

/// A lazily connected session to one full node peer.
///
/// Share it with `Arc` to read on one task and send from others.
pub struct Connection<D: Dialer = WsDialer> {
    peer: PeerAddress,
    dialer: D,
    handshake: Handshake,
    decode_policy: DecodeErrorPolicy,
    writer: Mutex<Option<WriteHalf<D::Sink>>>,
    reader: StdMutex<Option<ReadHalf<D::Source>>>,
    phase: RwLock<ConnectionPhase>,
    /// Generation of the open session, 0 when there is none.
    current_generation: AtomicU64,
    next_generation: AtomicU64,
}

impl Connection<WsDialer> {
    /// Create a connection to `peer` over secure WebSocket.
    ///
    /// Loads key material and builds the TLS configuration. Does not touch
    /// the network.
    pub fn new(
        peer: PeerAddress,
        keys: &impl KeyMaterialSource,
        config: ConnectionConfig,
    ) -> Result<Self, PeerError> {
        let material = keys.load_key_pair()?;
        let proxy = ProxyRules::resolve(&config.proxy)?;
        let transport = TransportConfig::new(material)?
            .with_proxy(proxy)
            .with_handshake_timeout(config.handshake_timeout)
            .with_max_message_size(config.max_message_size);

        Ok(Self::with_dialer(
            peer,
            WsDialer::new(transport),
            keys.listen_port(),
            config,
        ))
    }
}

impl<D: Dialer> Connection<D> {
    /// Create a connection that opens sessions with `dialer`.
    ///
    /// `listen_port` is our own listening port, announced in the handshake.
    pub fn with_dialer(
        peer: PeerAddress,
        dialer: D,
        listen_port: u16,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            peer,
            dialer,
            handshake: config.handshake(listen_port),
            decode_policy: config.decode_error_policy,
            writer: Mutex::new(None),
            reader: StdMutex::new(None),
            phase: RwLock::new(ConnectionPhase::Unconnected),
            current_generation: AtomicU64::new(0),
            next_generation: AtomicU64::new(1),
        }
    }

    /// The peer this connection targets.
    pub fn peer(&self) -> PeerAddress {
        self.peer
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handshake sent at the start of every session.
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Open a session unless one is already open.
    pub async fn ensure_connected(&self) -> Result<(), PeerError> {
        let mut writer = self.writer.lock().await;
        self.connect_locked(&mut writer).await?;
        Ok(())
    }

    /// Encode `payload`, wrap it under `msg_type`, and write it as one frame.
    pub async fn send<T: Streamable>(
        &self,
        msg_type: ProtocolMessageType,
        payload: &T,
    ) -> Result<(), PeerError> {
        let message = Message::new(msg_type, payload).map_err(PeerError::Encoding)?;
        self.send_message(&message).await
    }

    /// Send a typed payload under its own tag.
    pub async fn send_payload<T: MessagePayload>(&self, payload: &T) -> Result<(), PeerError> {
        self.send(T::MESSAGE_TYPE, payload).await
    }

    /// Send a typed payload carrying request id `id`.
    pub async fn send_with_id<T: MessagePayload>(
        &self,
        payload: &T,
        id: u16,
    ) -> Result<(), PeerError> {
        let message = Message::from_payload(payload)
            .map_err(PeerError::Encoding)?
            .with_id(id);
        self.send_message(&message).await
    }

    /// Write an already built envelope.
    pub async fn send_message(&self, message: &Message) -> Result<(), PeerError> {
        let frame = message.to_bytes().map_err(PeerError::Encoding)?;

        let mut writer = self.writer.lock().await;
        let session = self.connect_locked(&mut writer).await?;
        if let Err(e) = session.sink.send_frame(frame).await {
            warn!(peer = %self.peer, msg_type = %message.msg_type, error = %e, "write failed, dropping session");
            self.reset_locked(&mut writer, ConnectionPhase::Failed);
            return Err(e.into());
        }
        debug!(peer = %self.peer, msg_type = %message.msg_type, id = ?message.id, "sent");
        Ok(())
    }

    /// Wait for one message.
    ///
    /// Opens a session first if there is none. An undecodable frame is
    /// consumed and reported as [`PeerError::Decoding`]; the session stays
    /// open.
    pub async fn receive_one(&self) -> Result<Message, PeerError> {
        let mut reader = self.take_reader().await?;
        let frame = reader.read_frame().await?;
        drop(reader);

        decode_message(&frame).map_err(|e| {
            debug!(peer = %self.peer, error = %e, len = frame.len(), "undecodable frame");
            PeerError::Decoding(e)
        })
    }

    /// Read messages and hand each to `handler`, in arrival order.
    ///
    /// Decode failures are passed to the handler as [`PeerError::Decoding`].
    /// Returns only on a terminal error: a transport failure, or the first
    /// decode failure under [`DecodeErrorPolicy::Terminate`].
    pub async fn receive_loop<H: MessageHandler>(&self, mut handler: H) -> PeerError {
        let mut reader = match self.take_reader().await {
            Ok(reader) => reader,
            Err(e) => return e,
        };
        debug!(peer = %self.peer, "receive loop started");

        loop {
            let frame = match reader.read_frame().await {
                Ok(frame) => frame,
                Err(e) => {
                    info!(peer = %self.peer, error = %e, "receive loop ended");
                    return e;
                }
            };

            match decode_message(&frame) {
                Ok(message) => handler.handle(Ok(message)),
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, len = frame.len(), "undecodable frame");
                    handler.handle(Err(PeerError::Decoding(e.clone())));
                    if self.decode_policy == DecodeErrorPolicy::Terminate {
                        return PeerError::Decoding(e);
                    }
                }
            }
        }
    }

    /// Close the session, if any. A later send opens a new one.
    pub async fn close(&self) -> Result<(), PeerError> {
        let mut writer = self.writer.lock().await;
        if let Some(mut sink) = self.reset_locked(&mut writer, ConnectionPhase::Closed) {
            debug!(peer = %self.peer, "closing session");
            sink.close().await?;
        }
        Ok(())
    }

    async fn connect_locked<'a>(
        &self,
        slot: &'a mut Option<WriteHalf<D::Sink>>,
    ) -> Result<&'a mut WriteHalf<D::Sink>, PeerError> {
        let session = match slot.take() {
            Some(session) => session,
            None => self.establish().await?,
        };
        Ok(slot.insert(session))
    }

    async fn establish(&self) -> Result<WriteHalf<D::Sink>, PeerError> {
        let handshake = Message::from_payload(&self.handshake)
            .and_then(|message| message.to_bytes())
            .map_err(PeerError::Encoding)?;

        let attempt = HandshakeAttempt::start(self);
        debug!(peer = %self.peer, url = %self.peer.ws_url(), "dialing");

        let (mut sink, source) = match self.dialer.dial(&self.peer).await {
            Ok(halves) => halves,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "dial failed");
                attempt.finish(ConnectionPhase::Failed);
                return Err(e.into());
            }
        };
        if let Err(e) = sink.send_frame(handshake).await {
            warn!(peer = %self.peer, error = %e, "handshake write failed");
            attempt.finish(ConnectionPhase::Failed);
            return Err(e.into());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        *self.reader_slot() = Some(ReadHalf { generation, source });
        self.current_generation.store(generation, Ordering::SeqCst);
        attempt.finish(ConnectionPhase::Ready);
        info!(
            peer = %self.peer,
            generation,
            network_id = %self.handshake.network_id,
            "session ready"
        );

        Ok(WriteHalf { generation, sink })
    }

    /// Drop the session held in `slot` and move to `phase`. Returns its sink.
    fn reset_locked(
        &self,
        slot: &mut Option<WriteHalf<D::Sink>>,
        phase: ConnectionPhase,
    ) -> Option<D::Sink> {
        let sink = slot.take().map(|session| {
            self.reader_slot()
                .take_if(|half| half.generation == session.generation);
            session.sink
        });
        self.current_generation.store(0, Ordering::SeqCst);
        self.set_phase(phase);
        sink
    }

    /// Drop the session if it is still `generation`.
    async fn invalidate(&self, generation: u64) {
        let mut writer = self.writer.lock().await;
        if writer
            .as_ref()
            .is_some_and(|session| session.generation == generation)
        {
            self.reset_locked(&mut writer, ConnectionPhase::Failed);
        }
    }

    async fn take_reader(&self) -> Result<ReaderGuard<'_, D>, PeerError> {
        self.ensure_connected().await?;
        let half = self.reader_slot().take().ok_or(PeerError::ReaderBusy)?;
        Ok(ReaderGuard {
            conn: self,
            half: Some(half),
        })
    }

    fn return_reader(&self, half: ReadHalf<D::Source>) {
        let mut slot = self.reader_slot();
        if slot.is_none() && half.generation == self.current_generation.load(Ordering::SeqCst) {
            *slot = Some(half);
        }
    }

    fn reader_slot(&self) -> MutexGuard<'_, Option<ReadHalf<D::Source>>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}

impl<D: Dialer> fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("phase", &self.phase())
            .field("generation", &self.current_generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on a session's read half. Returned to the slot on drop
/// unless the session failed or was replaced meanwhile.
struct ReaderGuard<'a, D: Dialer> {
    conn: &'a Connection<D>,
    half: Option<ReadHalf<D::Source>>,
}

impl<D: Dialer> ReaderGuard<'_, D> {
    async fn read_frame(&mut self) -> Result<Vec<u8>, PeerError> {
        let half = self
            .half
            .as_mut()
            .ok_or(PeerError::Transport(TransportError::Closed))?;

        match half.source.next_frame().await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                let generation = half.generation;
                self.half = None;
                warn!(peer = %self.conn.peer, generation, error = %e, "read failed");
                self.conn.invalidate(generation).await;
                Err(e.into())
            }
        }
    }
}

impl<D: Dialer> Drop for ReaderGuard<'_, D> {
    fn drop(&mut self) {
        if let Some(half) = self.half.take() {
            self.conn.return_reader(half);
        }
    }
}

/// Holds `Handshaking` for one dial. Dropped unfinished (the caller's
/// future was cancelled), it puts back the phase seen before the dial.
struct HandshakeAttempt<'a, D: Dialer> {
    conn: &'a Connection<D>,
    previous: Option<ConnectionPhase>,
}

impl<'a, D: Dialer> HandshakeAttempt<'a, D> {
    fn start(conn: &'a Connection<D>) -> Self {
        let previous = conn.phase();
        conn.set_phase(ConnectionPhase::Handshaking);
        Self {
            conn,
            previous: Some(previous),
        }
    }

    fn finish(mut self, phase: ConnectionPhase) {
        self.previous = None;
        self.conn.set_phase(phase);
    }
}

impl<D: Dialer> Drop for HandshakeAttempt<'_, D> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            debug!(peer = %self.conn.peer, phase = ?previous, "handshake cancelled");
            self.conn.set_phase(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::client::mock::MockDialer;
    use crate::core::{CodecError, NETWORK_ID, PROTOCOL_VERSION};
    use crate::protocol::{RejectBlock, RequestPeers, RespondPeers, TimestampedPeerInfo};
    use crate::wire::make_message_bytes;

    const LISTEN_PORT: u16 = 8444;

    fn peer() -> PeerAddress {
        "10.0.0.5:8444".parse().unwrap()
    }

    fn connection(dialer: &MockDialer) -> Connection<MockDialer> {
        connection_with(dialer, ConnectionConfig::default())
    }

    fn connection_with(dialer: &MockDialer, config: ConnectionConfig) -> Connection<MockDialer> {
        Connection::with_dialer(peer(), dialer.clone(), LISTEN_PORT, config)
    }

    fn reject(height: u32) -> Vec<u8> {
        make_message_bytes(ProtocolMessageType::RejectBlock, &RejectBlock { height }).unwrap()
    }

    fn garbage() -> Vec<u8> {
        vec![0xfe, 0x00, 0x00, 0x00, 0x00, 0x00]
    }

    /// Fails to encode.
    struct Unencodable;

    impl Streamable for Unencodable {
        fn stream(&self, _out: &mut Vec<u8>) -> Result<(), CodecError> {
            Err(CodecError::LengthOverflow(usize::MAX))
        }

        fn parse(_input: &mut &[u8]) -> Result<Self, CodecError> {
            Ok(Unencodable)
        }
    }

    #[test]
    fn test_construction_is_lazy() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        assert_eq!(conn.phase(), ConnectionPhase::Unconnected);
        assert_eq!(conn.peer(), peer());
        assert_eq!(dialer.state().attempts, 0);
    }

    #[tokio::test]
    async fn test_ensure_connected_is_idempotent() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);

        conn.ensure_connected().await.unwrap();
        conn.ensure_connected().await.unwrap();

        assert_eq!(dialer.state().attempts, 1);
        assert_eq!(dialer.written().len(), 1);
        assert_eq!(conn.phase(), ConnectionPhase::Ready);
    }

    #[tokio::test]
    async fn test_request_peers_on_fresh_connection() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);

        conn.send(ProtocolMessageType::RequestPeers, &RequestPeers)
            .await
            .unwrap();

        let state = dialer.state();
        assert_eq!(state.attempts, 1);
        assert_eq!(state.dialed[0].ws_url(), "wss://10.0.0.5:8444/ws");
        assert_eq!(state.written.len(), 2);

        let first = decode_message(&state.written[0]).unwrap();
        let handshake: Handshake = first.payload().unwrap();
        assert_eq!(first.id, None);
        assert_eq!(handshake.network_id, NETWORK_ID);
        assert_eq!(handshake.protocol_version, PROTOCOL_VERSION);
        assert_eq!(handshake.server_port, LISTEN_PORT);

        assert_eq!(hex::encode(&state.written[1]), "2b0000000000");
    }

    #[tokio::test]
    async fn test_concurrent_first_use_dials_once() {
        let dialer = MockDialer::new();
        let conn = Arc::new(connection(&dialer));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let conn = Arc::clone(&conn);
                tokio::spawn(async move { conn.send_payload(&RequestPeers).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let written = dialer.written();
        assert_eq!(dialer.state().attempts, 1);
        assert_eq!(written.len(), 9);
        assert_eq!(
            decode_message(&written[0]).unwrap().msg_type,
            ProtocolMessageType::Handshake
        );
        assert!(written[1..].iter().all(|f| hex::encode(f) == "2b0000000000"));
    }

    #[tokio::test]
    async fn test_failed_dial_is_retried() {
        let dialer = MockDialer::new();
        dialer.state().fail_dials = 1;
        let conn = connection(&dialer);

        let err = conn.send_payload(&RequestPeers).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(conn.phase(), ConnectionPhase::Failed);
        assert!(dialer.written().is_empty());

        conn.send_payload(&RequestPeers).await.unwrap();
        assert_eq!(dialer.state().attempts, 2);
        assert_eq!(dialer.written().len(), 2);
        assert_eq!(conn.phase(), ConnectionPhase::Ready);
    }

    #[tokio::test]
    async fn test_cancelled_dial_restores_phase() {
        let dialer = MockDialer::new();
        dialer.state().hang_dials = true;
        let conn = connection(&dialer);

        let dial = tokio::time::timeout(Duration::from_millis(20), conn.ensure_connected()).await;
        assert!(dial.is_err());
        assert_eq!(conn.phase(), ConnectionPhase::Unconnected);

        {
            let mut state = dialer.state();
            state.hang_dials = false;
            state.fail_dials = 1;
        }
        assert!(conn.ensure_connected().await.is_err());
        assert_eq!(conn.phase(), ConnectionPhase::Failed);

        dialer.state().hang_dials = true;
        let dial = tokio::time::timeout(Duration::from_millis(20), conn.ensure_connected()).await;
        assert!(dial.is_err());
        assert_eq!(conn.phase(), ConnectionPhase::Failed);

        dialer.state().hang_dials = false;
        conn.ensure_connected().await.unwrap();
        assert_eq!(conn.phase(), ConnectionPhase::Ready);
        assert_eq!(dialer.state().attempts, 2);
        assert_eq!(dialer.written().len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_drops_session() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        dialer.state().fail_writes = true;
        let err = conn.send_payload(&RequestPeers).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(conn.phase(), ConnectionPhase::Failed);

        dialer.state().fail_writes = false;
        conn.send_payload(&RequestPeers).await.unwrap();

        let written = dialer.written();
        assert_eq!(dialer.state().attempts, 2);
        // handshake, handshake of the new session, request
        assert_eq!(written.len(), 3);
        assert_eq!(
            decode_message(&written[1]).unwrap().msg_type,
            ProtocolMessageType::Handshake
        );
    }

    #[tokio::test]
    async fn test_encoding_failure_keeps_session() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        let err = conn
            .send(ProtocolMessageType::RequestPeers, &Unencodable)
            .await
            .unwrap_err();
        assert!(matches!(err, PeerError::Encoding(_)));
        assert_eq!(conn.phase(), ConnectionPhase::Ready);
        assert_eq!(dialer.state().attempts, 1);
    }

    #[tokio::test]
    async fn test_send_with_id() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);

        conn.send_with_id(&RequestPeers, 7).await.unwrap();

        let sent = decode_message(&dialer.written()[1]).unwrap();
        assert_eq!(sent.msg_type, ProtocolMessageType::RequestPeers);
        assert_eq!(sent.id, Some(7));
    }

    #[tokio::test]
    async fn test_receive_one_respond_peers() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        let peers = RespondPeers {
            peer_list: vec![TimestampedPeerInfo {
                host: "10.0.0.6".into(),
                port: 8444,
                timestamp: 1_700_000_000,
            }],
        };
        dialer.push(make_message_bytes(ProtocolMessageType::RespondPeers, &peers).unwrap());

        let message = conn.receive_one().await.unwrap();
        assert_eq!(message.msg_type, ProtocolMessageType::RespondPeers);
        assert_eq!(message.payload::<RespondPeers>().unwrap(), peers);
    }

    #[tokio::test]
    async fn test_receive_one_connects_first() {
        let dialer = MockDialer::new();
        dialer.push(reject(3));
        let conn = connection(&dialer);

        let message = conn.receive_one().await.unwrap();
        assert_eq!(message.payload::<RejectBlock>().unwrap().height, 3);
        assert_eq!(dialer.state().attempts, 1);
        assert_eq!(dialer.written().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_one_decode_error_keeps_session() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        dialer.push(garbage());
        dialer.push(reject(1));

        let err = conn.receive_one().await.unwrap_err();
        assert!(matches!(
            err,
            PeerError::Decoding(CodecError::UnknownMessageType(0xfe))
        ));
        assert_eq!(conn.phase(), ConnectionPhase::Ready);

        let message = conn.receive_one().await.unwrap();
        assert_eq!(message.msg_type, ProtocolMessageType::RejectBlock);
    }

    #[tokio::test]
    async fn test_read_failure_invalidates_session() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        dialer.close_inbound();
        let err = conn.receive_one().await.unwrap_err();
        assert!(matches!(err, PeerError::Transport(TransportError::Closed)));
        assert_eq!(conn.phase(), ConnectionPhase::Failed);

        conn.send_payload(&RequestPeers).await.unwrap();
        assert_eq!(dialer.state().attempts, 2);
    }

    #[tokio::test]
    async fn test_receive_loop_preserves_order() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        for height in 0..5 {
            dialer.push(reject(height));
        }
        dialer.close_inbound();

        let mut heights = Vec::new();
        let err = conn
            .receive_loop(|message: Result<Message, PeerError>| {
                heights.push(message.unwrap().payload::<RejectBlock>().unwrap().height);
            })
            .await;

        assert!(matches!(err, PeerError::Transport(TransportError::Closed)));
        assert_eq!(heights, vec![0, 1, 2, 3, 4]);
        assert_eq!(conn.phase(), ConnectionPhase::Failed);
    }

    #[tokio::test]
    async fn test_receive_loop_reports_decode_errors() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        dialer.push(reject(1));
        dialer.push(garbage());
        dialer.push(reject(2));
        dialer.close_inbound();

        let mut seen = Vec::new();
        let err = conn
            .receive_loop(|message: Result<Message, PeerError>| {
                seen.push(message.map(|m| m.payload::<RejectBlock>().unwrap().height));
            })
            .await;

        assert!(err.is_transport());
        assert_eq!(seen.len(), 3);
        assert_eq!(*seen[0].as_ref().unwrap(), 1);
        assert!(matches!(seen[1], Err(PeerError::Decoding(_))));
        assert_eq!(*seen[2].as_ref().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_receive_loop_terminate_policy() {
        let dialer = MockDialer::new();
        let config = ConnectionConfig {
            decode_error_policy: DecodeErrorPolicy::Terminate,
            ..ConnectionConfig::default()
        };
        let conn = connection_with(&dialer, config);
        conn.ensure_connected().await.unwrap();

        dialer.push(reject(1));
        dialer.push(garbage());
        dialer.push(reject(2));

        let mut calls = 0;
        let err = conn
            .receive_loop(|_: Result<Message, PeerError>| calls += 1)
            .await;
        assert!(matches!(err, PeerError::Decoding(_)));
        assert_eq!(calls, 2);

        // The session survives; the next frame is still readable.
        let message = conn.receive_one().await.unwrap();
        assert_eq!(message.payload::<RejectBlock>().unwrap().height, 2);
        assert_eq!(conn.phase(), ConnectionPhase::Ready);
    }

    #[tokio::test]
    async fn test_second_reader_is_busy() {
        let dialer = MockDialer::new();
        let conn = Arc::new(connection(&dialer));
        conn.ensure_connected().await.unwrap();

        let first = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.receive_one().await })
        };
        while conn.reader_slot().is_some() {
            tokio::task::yield_now().await;
        }

        let err = conn.receive_one().await.unwrap_err();
        assert!(matches!(err, PeerError::ReaderBusy));

        dialer.push(reject(9));
        let message = first.await.unwrap().unwrap();
        assert_eq!(message.payload::<RejectBlock>().unwrap().height, 9);
        assert!(conn.reader_slot().is_some());
    }

    #[tokio::test]
    async fn test_stale_read_failure_spares_new_session() {
        let dialer = MockDialer::new();
        let conn = Arc::new(connection(&dialer));
        conn.ensure_connected().await.unwrap();

        let stale_reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.receive_one().await })
        };
        while conn.reader_slot().is_some() {
            tokio::task::yield_now().await;
        }

        // Replace the first session through a write failure.
        dialer.state().fail_writes = true;
        assert!(conn.send_payload(&RequestPeers).await.is_err());
        dialer.state().fail_writes = false;
        conn.ensure_connected().await.unwrap();

        dialer.close_session(0);
        assert!(stale_reader.await.unwrap().is_err());
        assert_eq!(conn.phase(), ConnectionPhase::Ready);

        dialer.push(reject(4));
        let message = conn.receive_one().await.unwrap();
        assert_eq!(message.payload::<RejectBlock>().unwrap().height, 4);
        assert_eq!(dialer.state().attempts, 2);
    }

    #[tokio::test]
    async fn test_close_then_send_redials() {
        let dialer = MockDialer::new();
        let conn = connection(&dialer);
        conn.ensure_connected().await.unwrap();

        conn.close().await.unwrap();
        assert_eq!(conn.phase(), ConnectionPhase::Closed);
        assert_eq!(dialer.state().closes, 1);

        conn.send_payload(&RequestPeers).await.unwrap();
        assert_eq!(dialer.state().attempts, 2);
        assert_eq!(conn.phase(), ConnectionPhase::Ready);
    }
}
