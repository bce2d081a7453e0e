//! Full node protocol payloads.
//!
//! Only the payloads a peer client sends or commonly receives are defined
//! here. A message under any other modelled
//! [`ProtocolMessageType`](crate::wire::ProtocolMessageType) is still received,
//! with its data left as raw bytes in the [`Message`](crate::wire::Message).
//! Tags outside that enum fail to decode with
//! [`CodecError::UnknownMessageType`](crate::core::CodecError::UnknownMessageType).

mod blocks;
mod handshake;
mod peers;

pub use blocks::{NewPeak, RejectBlock, RequestBlock, RequestBlocks};
pub use handshake::{Capability, Handshake, NodeType};
pub use peers::{RequestPeers, RespondPeers, TimestampedPeerInfo};
