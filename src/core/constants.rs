//! Protocol constants for the full node peer protocol.
//!
//! Wire-level values (`PROTOCOL_VERSION`, URL shape) are fixed by the
//! protocol. The identity values (`NETWORK_ID`, `SOFTWARE_VERSION`) are
//! defaults and can be overridden through
//! [`ConnectionConfig`](crate::client::ConnectionConfig).

use std::time::Duration;

// =============================================================================
// HANDSHAKE IDENTITY
// =============================================================================

/// Network this client announces in its handshake.
pub const NETWORK_ID: &str = "mainnet";

/// Protocol version this codebase speaks.
pub const PROTOCOL_VERSION: &str = "0.0.33";

/// Software version announced in the handshake.
pub const SOFTWARE_VERSION: &str = "1.2.11";

/// Value announced for the `Base` capability.
pub const BASE_CAPABILITY_VALUE: &str = "1";

/// Default full node listening port.
pub const DEFAULT_FULL_NODE_PORT: u16 = 8444;

// =============================================================================
// TRANSPORT
// =============================================================================

/// URL scheme for peer sessions (secure WebSocket).
pub const WS_SCHEME: &str = "wss";

/// Fixed WebSocket path on every full node.
pub const WS_PATH: &str = "/ws";

/// Upper bound on dialing: TCP connect, proxy tunnel, TLS and WebSocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(45);

/// Largest inbound WebSocket message accepted (50 MiB).
pub const MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// Largest proxy CONNECT response header we are willing to buffer.
pub const MAX_PROXY_RESPONSE_SIZE: usize = 8 * 1024;

// =============================================================================
// WIRE
// =============================================================================

/// Size of a hash on the wire.
pub const BYTES32_SIZE: usize = 32;

/// Size of the envelope header when no id is attached (type + id flag + data length).
pub const MIN_ENVELOPE_SIZE: usize = 1 + 1 + 4;
