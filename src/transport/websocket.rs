//! Secure WebSocket transport.
//!
//! One protocol envelope per binary frame. Control frames are handled by
//! tungstenite and never surface; text frames are not part of the protocol
//! and are skipped.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, client_async_tls_with_config};
use tracing::{debug, warn};

use super::address::PeerAddress;
use super::proxy::connect_tunnel;
use super::tls::TransportConfig;
use super::{Dialer, FrameSink, FrameSource};
use crate::core::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials `wss://{ip}:{port}/ws` with the client certificate from a [`TransportConfig`].
#[derive(Debug, Clone)]
pub struct WsDialer {
    config: Arc<TransportConfig>,
}

impl WsDialer {
    /// Dialer sharing `config`.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Transport settings in use.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn open_tcp(&self, peer: &PeerAddress) -> Result<TcpStream, TransportError> {
        let stream = match self.config.proxy().proxy_for(&peer.ip().to_string()) {
            Some(proxy) => connect_tunnel(proxy, peer.socket_addr()).await?,
            None => TcpStream::connect(peer.socket_addr()).await?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn open(&self, peer: &PeerAddress) -> Result<WsStream, TransportError> {
        let tcp = self.open_tcp(peer).await?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size());
        ws_config.max_frame_size = Some(self.config.max_message_size());

        let (stream, response) = client_async_tls_with_config(
            peer.ws_url(),
            tcp,
            Some(ws_config),
            Some(Connector::Rustls(self.config.tls())),
        )
        .await?;
        debug!(%peer, status = %response.status(), "websocket upgraded");
        Ok(stream)
    }
}

impl Dialer for WsDialer {
    type Sink = WsSink;
    type Source = WsSource;

    async fn dial(&self, peer: &PeerAddress) -> Result<(WsSink, WsSource), TransportError> {
        let timeout = self.config.handshake_timeout();
        let stream = tokio::time::timeout(timeout, self.open(peer))
            .await
            .map_err(|_| TransportError::HandshakeTimeout(timeout))??;

        let (sink, source) = stream.split();
        Ok((WsSink { inner: sink }, WsSource { inner: source }))
    }
}

/// Write half of a WebSocket session.
pub struct WsSink {
    inner: SplitSink<WsStream, WsMessage>,
}

impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.inner.send(WsMessage::Binary(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await?;
        Ok(())
    }
}

/// Read half of a WebSocket session.
pub struct WsSource {
    inner: SplitStream<WsStream>,
}

impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Binary(data))) => return Ok(data),
                Some(Ok(WsMessage::Text(text))) => {
                    warn!(len = text.len(), "skipping text frame");
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "peer sent close");
                    return Err(TransportError::Closed);
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed),
            }
        }
    }
}
