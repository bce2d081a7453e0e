//! Peer addressing.

use std::fmt;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::str::FromStr;

use crate::core::{WS_PATH, WS_SCHEME};

/// IP and port of the remote peer. Fixed for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    addr: SocketAddr,
}

impl PeerAddress {
    /// Create a peer address.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::new(ip, port),
        }
    }

    /// Peer IP.
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Peer port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// As a socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Session URL: `wss://{ip}:{port}/ws`, IPv6 hosts in brackets.
    pub fn ws_url(&self) -> String {
        format!("{WS_SCHEME}://{}{WS_PATH}", self.addr)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl FromStr for PeerAddress {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>().map(Self::from)
    }
}
