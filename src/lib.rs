//! # chia-peer
//!
//! Client side of the full node peer protocol.
//!
//! A [`Connection`] targets one peer. It dials `wss://{ip}:{port}/ws` on first
//! use, presenting a client certificate, sends the protocol handshake, and
//! then exchanges typed messages:
//!
//! - **Lazy**: constructing a connection does no I/O
//! - **Single-flight**: concurrent first users share one dial and one handshake
//! - **Ordered**: writes are serialized; the receive loop delivers in arrival order
//! - **No hidden retries**: a failed session is dropped and the next use dials again
//!
//! ## Modules
//!
//! - [`core`]: Codec traits, constants, and error types
//! - [`wire`]: Streamable encoding and the message envelope
//! - [`protocol`]: Handshake and request/response payloads
//! - [`transport`]: TLS, proxy, and WebSocket session plumbing
//! - [`client`]: The connection, its configuration, and key material sources
//!
//! ## Example Usage
//!
//! ```no_run
//! use chia_peer::prelude::*;
//!
//! # async fn run() -> Result<(), PeerError> {
//! let keys = PemKeyFiles::new("ssl/full_node/private_full_node.crt", "ssl/full_node/private_full_node.key");
//! let config = ConnectionConfigBuilder::new()
//!     .network_id("mainnet")
//!     .decode_error_policy(DecodeErrorPolicy::Report)
//!     .build();
//! let conn = Connection::new("10.0.0.5:8444".parse().expect("address"), &keys, config)?;
//!
//! conn.request_peers().await?;
//! let err = conn
//!     .receive_loop(|message: Result<Message, PeerError>| match message {
//!         Ok(msg) if msg.msg_type == ProtocolMessageType::RespondPeers => {
//!             if let Ok(peers) = msg.payload::<RespondPeers>() {
//!                 println!("{} peers", peers.peer_list.len());
//!             }
//!         }
//!         Ok(msg) => println!("{}", msg.msg_type),
//!         Err(e) => eprintln!("{e}"),
//!     })
//!     .await;
//! eprintln!("session ended: {err}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod core;
pub mod protocol;
pub mod transport;
pub mod wire;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{
        Connection, ConnectionConfig, ConnectionConfigBuilder, ConnectionPhase,
        DecodeErrorPolicy, KeyMaterialSource, MessageHandler, PemKeyFiles, StaticKeyMaterial,
    };
    pub use crate::core::{ConfigError, MessagePayload, PeerError, Streamable, TransportError};
    pub use crate::protocol::*;
    pub use crate::transport::{PeerAddress, ProxyConfig};
    pub use crate::wire::{Message, ProtocolMessageType};
}

// Re-export commonly used items at crate root
pub use crate::client::{Connection, ConnectionConfig, ConnectionPhase};
pub use crate::core::PeerError;
pub use crate::transport::PeerAddress;
pub use crate::wire::{Message, ProtocolMessageType};
