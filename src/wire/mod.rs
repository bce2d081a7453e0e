//! Wire codec.
//!
//! Pure encode/decode functions for protocol values and the message
//! envelope. Nothing in here performs I/O; the connection treats the codec as
//! an opaque `encode(value) -> bytes` / `decode(bytes) -> Message` pair.

mod message;
mod streamable;

pub use message::{Message, ProtocolMessageType, decode_message, make_message_bytes};
pub use streamable::Bytes32;
