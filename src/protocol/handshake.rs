//! Handshake payload.
//!
//! Sent once as the first frame of every new session. Declares who we are;
//! the peer answers with its own handshake, which callers read through the
//! normal receive path.

use crate::core::{
    BASE_CAPABILITY_VALUE, CodecError, MessagePayload, NETWORK_ID, PROTOCOL_VERSION,
    SOFTWARE_VERSION, Streamable,
};
use crate::wire::ProtocolMessageType;

/// Role a node plays on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    /// Validates and relays blocks and transactions.
    FullNode = 1,
    /// Looks up proofs of space on plots.
    Harvester = 2,
    /// Coordinates harvesters and signs blocks.
    Farmer = 3,
    /// Computes proofs of time.
    Timelord = 4,
    /// Hands out peer lists to bootstrapping nodes.
    Introducer = 5,
    /// Light client.
    Wallet = 6,
    /// Data layer node.
    DataLayer = 7,
}

impl TryFrom<u8> for NodeType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => NodeType::FullNode,
            2 => NodeType::Harvester,
            3 => NodeType::Farmer,
            4 => NodeType::Timelord,
            5 => NodeType::Introducer,
            6 => NodeType::Wallet,
            7 => NodeType::DataLayer,
            other => return Err(CodecError::UnknownNodeType(other)),
        })
    }
}

impl Streamable for NodeType {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        (*self as u8).stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Self::try_from(u8::parse(input)?)
    }
}

/// Capability identifiers advertised in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Capability {
    /// Baseline protocol support; every node must announce it.
    Base = 1,
    /// Header-only block requests.
    BlockHeaders = 2,
    /// Second generation rate limits.
    RateLimitsV2 = 3,
    /// Explicit "none" responses instead of silence.
    NoneResponse = 4,
}

impl Capability {
    /// Wire identifier.
    pub fn id(self) -> u16 {
        self as u16
    }
}

/// Handshake payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Network the node is on (e.g. `mainnet`).
    pub network_id: String,
    /// Protocol version spoken.
    pub protocol_version: String,
    /// Software version of the node.
    pub software_version: String,
    /// Port this node listens on, so the peer can dial back.
    pub server_port: u16,
    /// Role of this node.
    pub node_type: NodeType,
    /// `(capability id, value)` pairs.
    pub capabilities: Vec<(u16, String)>,
}

impl Handshake {
    /// Handshake of a full node on the default network announcing only `Base`.
    pub fn full_node(server_port: u16) -> Self {
        Self {
            network_id: NETWORK_ID.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            software_version: SOFTWARE_VERSION.to_string(),
            server_port,
            node_type: NodeType::FullNode,
            capabilities: vec![(Capability::Base.id(), BASE_CAPABILITY_VALUE.to_string())],
        }
    }

    /// Value announced for `capability`, if any.
    pub fn capability(&self, capability: Capability) -> Option<&str> {
        self.capabilities
            .iter()
            .find(|(id, _)| *id == capability.id())
            .map(|(_, value)| value.as_str())
    }

    /// Whether `capability` is announced with value `"1"`.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capability(capability) == Some("1")
    }
}

impl Streamable for Handshake {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.network_id.stream(out)?;
        self.protocol_version.stream(out)?;
        self.software_version.stream(out)?;
        self.server_port.stream(out)?;
        self.node_type.stream(out)?;
        self.capabilities.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            network_id: String::parse(input)?,
            protocol_version: String::parse(input)?,
            software_version: String::parse(input)?,
            server_port: u16::parse(input)?,
            node_type: NodeType::parse(input)?,
            capabilities: Vec::parse(input)?,
        })
    }
}

impl MessagePayload for Handshake {
    const MESSAGE_TYPE: ProtocolMessageType = ProtocolMessageType::Handshake;
}
