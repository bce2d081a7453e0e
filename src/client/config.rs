//! Connection configuration.

use std::time::Duration;

use crate::core::{
    BASE_CAPABILITY_VALUE, HANDSHAKE_TIMEOUT, MAX_MESSAGE_SIZE, NETWORK_ID, PROTOCOL_VERSION,
    SOFTWARE_VERSION,
};
use crate::protocol::{Capability, Handshake, NodeType};
use crate::transport::ProxyConfig;

/// What the receive loop does after reporting an undecodable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrorPolicy {
    /// Report to the handler and keep reading.
    #[default]
    Report,
    /// Report to the handler, then end the loop with the error.
    Terminate,
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Network announced in the handshake.
    pub network_id: String,

    /// Protocol version announced in the handshake.
    pub protocol_version: String,

    /// Software version announced in the handshake.
    pub software_version: String,

    /// Role announced in the handshake.
    pub node_type: NodeType,

    /// `(capability id, value)` pairs announced in the handshake.
    pub capabilities: Vec<(u16, String)>,

    /// Bound on each dial, TLS and WebSocket upgrade included.
    pub handshake_timeout: Duration,

    /// How to reach the peer.
    pub proxy: ProxyConfig,

    /// Largest inbound message accepted.
    pub max_message_size: usize,

    /// Receive loop behaviour on undecodable frames.
    pub decode_error_policy: DecodeErrorPolicy,
}

impl ConnectionConfig {
    /// Handshake announcing this configuration, with `server_port` as our listening port.
    pub fn handshake(&self, server_port: u16) -> Handshake {
        Handshake {
            network_id: self.network_id.clone(),
            protocol_version: self.protocol_version.clone(),
            software_version: self.software_version.clone(),
            server_port,
            node_type: self.node_type,
            capabilities: self.capabilities.clone(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            network_id: NETWORK_ID.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            software_version: SOFTWARE_VERSION.to_string(),
            node_type: NodeType::FullNode,
            capabilities: vec![(Capability::Base.id(), BASE_CAPABILITY_VALUE.to_string())],
            handshake_timeout: HANDSHAKE_TIMEOUT,
            proxy: ProxyConfig::default(),
            max_message_size: MAX_MESSAGE_SIZE,
            decode_error_policy: DecodeErrorPolicy::default(),
        }
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the network id.
    pub fn network_id(mut self, network_id: impl Into<String>) -> Self {
        self.config.network_id = network_id.into();
        self
    }

    /// Set the protocol version announced in the handshake.
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    /// Set the software version.
    pub fn software_version(mut self, version: impl Into<String>) -> Self {
        self.config.software_version = version.into();
        self
    }

    /// Set the node type.
    pub fn node_type(mut self, node_type: NodeType) -> Self {
        self.config.node_type = node_type;
        self
    }

    /// Announce `capability` with `value`, replacing an earlier value.
    pub fn capability(mut self, capability: Capability, value: impl Into<String>) -> Self {
        let value = value.into();
        match self
            .config
            .capabilities
            .iter_mut()
            .find(|(id, _)| *id == capability.id())
        {
            Some(entry) => entry.1 = value,
            None => self.config.capabilities.push((capability.id(), value)),
        }
        self
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the proxy behaviour.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = proxy;
        self
    }

    /// Set the inbound message limit.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the decode error policy.
    pub fn decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.config.decode_error_policy = policy;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}
