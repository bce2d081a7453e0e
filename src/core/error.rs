//! Error types for the peer connection.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors from the wire codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a value was complete.
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the value being parsed.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// A complete value was parsed but input remains.
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// String field is not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Boolean byte was neither 0 nor 1.
    #[error("invalid bool byte: 0x{0:02x}")]
    InvalidBool(u8),

    /// Optional presence flag was neither 0 nor 1.
    #[error("invalid optional flag: 0x{0:02x}")]
    InvalidOptionFlag(u8),

    /// A length does not fit the `u32` prefix.
    #[error("length {0} does not fit in a u32 prefix")]
    LengthOverflow(usize),

    /// The envelope carries a tag this crate does not know.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// The envelope tag does not match the payload type requested.
    #[error("message type mismatch: expected {expected}, got {actual}")]
    MessageTypeMismatch {
        /// Tag of the requested payload type.
        expected: u8,
        /// Tag found in the envelope.
        actual: u8,
    },

    /// Node type byte is not a known role.
    #[error("unknown node type: {0}")]
    UnknownNodeType(u8),
}

/// Errors while resolving key material or building the transport config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a key or certificate file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No certificate found in the PEM input.
    #[error("no certificate found in PEM input")]
    MissingCertificate,

    /// No private key found in the PEM input.
    #[error("no private key found in PEM input")]
    MissingPrivateKey,

    /// PEM input could not be parsed.
    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    /// rustls rejected the configuration (bad key, unsupported algorithm).
    #[error("tls configuration rejected: {0}")]
    Tls(#[from] rustls::Error),

    /// Proxy URL could not be parsed.
    #[error("invalid proxy url {url:?}: {reason}")]
    InvalidProxy {
        /// The offending value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors at the network, TLS or WebSocket layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS or WebSocket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Dial did not finish within the handshake timeout.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Proxy refused or mangled the CONNECT tunnel.
    #[error("proxy tunnel failed: {0}")]
    Proxy(String),

    /// The peer closed the session.
    #[error("session closed by peer")]
    Closed,
}

/// Top-level peer connection errors.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Key material or configuration unavailable or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dial, write or read failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Outbound payload could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(#[source] CodecError),

    /// Inbound frame could not be decoded.
    #[error("decoding error: {0}")]
    Decoding(#[source] CodecError),

    /// Another reader currently owns the session's read half.
    #[error("another reader is active on this connection")]
    ReaderBusy,
}

impl PeerError {
    /// Whether this error invalidated the transport session.
    pub fn is_transport(&self) -> bool {
        matches!(self, PeerError::Transport(_))
    }
}
