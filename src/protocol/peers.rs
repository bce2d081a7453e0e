//! Peer exchange payloads.

use crate::core::{CodecError, MessagePayload, Streamable};
use crate::wire::ProtocolMessageType;

/// Ask the peer for the peers it knows. Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestPeers;

impl Streamable for RequestPeers {
    fn stream(&self, _out: &mut Vec<u8>) -> Result<(), CodecError> {
        Ok(())
    }

    fn parse(_input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(RequestPeers)
    }
}

impl MessagePayload for RequestPeers {
    const MESSAGE_TYPE: ProtocolMessageType = ProtocolMessageType::RequestPeers;
}

/// A peer address with the time it was last seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedPeerInfo {
    /// Host (IP address as text).
    pub host: String,
    /// Port.
    pub port: u16,
    /// Last seen, seconds since the Unix epoch.
    pub timestamp: u64,
}

impl Streamable for TimestampedPeerInfo {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.host.stream(out)?;
        self.port.stream(out)?;
        self.timestamp.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            host: String::parse(input)?,
            port: u16::parse(input)?,
            timestamp: u64::parse(input)?,
        })
    }
}

/// Answer to [`RequestPeers`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RespondPeers {
    /// Known peers.
    pub peer_list: Vec<TimestampedPeerInfo>,
}

impl Streamable for RespondPeers {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.peer_list.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            peer_list: Vec::parse(input)?,
        })
    }
}

impl MessagePayload for RespondPeers {
    const MESSAGE_TYPE: ProtocolMessageType = ProtocolMessageType::RespondPeers;
}
