//! Transport layer.
//!
//! Gets envelope bytes to and from one peer. The connection only sees the
//! three traits below; the production implementation is a secure WebSocket
//! dialed with a client certificate, optionally through an HTTP proxy.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Connection                   │
//! ├─────────────────────────────────────────┤
//! │   Dialer / FrameSink / FrameSource      │  ← This module
//! ├─────────────────────────────────────────┤
//! │   WebSocket (binary frames)             │
//! ├─────────────────────────────────────────┤
//! │   TLS (client cert, any peer cert)      │
//! ├─────────────────────────────────────────┤
//! │   TCP, or HTTP CONNECT tunnel           │
//! └─────────────────────────────────────────┘
//! ```

mod address;
mod proxy;
mod tls;
mod websocket;

use std::future::Future;

pub use address::PeerAddress;
pub use proxy::{ProxyConfig, ProxyEndpoint, ProxyRules, connect_tunnel};
pub use tls::{AcceptAnyPeerCertificate, KeyMaterial, TransportConfig};
pub use websocket::{WsDialer, WsSink, WsSource};

use crate::core::TransportError;

/// Write half of a session. Each call writes one whole frame.
pub trait FrameSink: Send + 'static {
    /// Write one binary frame.
    fn send_frame(
        &mut self,
        frame: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start a clean shutdown of the session.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Read half of a session.
pub trait FrameSource: Send + 'static {
    /// Wait for the next binary frame. `Err(Closed)` once the peer is gone.
    fn next_frame(&mut self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// Opens sessions to a peer.
pub trait Dialer: Send + Sync + 'static {
    /// Write half produced by [`dial`](Self::dial).
    type Sink: FrameSink;
    /// Read half produced by [`dial`](Self::dial).
    type Source: FrameSource;

    /// Open a fresh session to `peer`, ready for frames.
    fn dial(
        &self,
        peer: &PeerAddress,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Source), TransportError>> + Send;
}
