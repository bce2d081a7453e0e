//! HTTP CONNECT proxy support.
//!
//! Rules follow the usual environment conventions: `HTTPS_PROXY` (or
//! `ALL_PROXY`) names the proxy, `NO_PROXY` lists hosts that bypass it, and
//! loopback peers are always dialed directly.

use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::debug;

use crate::core::{ConfigError, MAX_PROXY_RESPONSE_SIZE, TransportError};

const PROXY_VARS: [&str; 4] = ["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"];
const NO_PROXY_VARS: [&str; 2] = ["NO_PROXY", "no_proxy"];
const DEFAULT_PROXY_PORT: u16 = 80;

/// How sessions reach the peer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyConfig {
    /// Always dial the peer directly.
    Direct,
    /// Use the proxy named by the environment, if any.
    #[default]
    FromEnvironment,
    /// Tunnel every session through this proxy.
    Http(ProxyEndpoint),
}

/// An HTTP proxy that accepts CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl ProxyEndpoint {
    /// Parse `http://host[:port]` or bare `host[:port]`.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidProxy {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let normalized = if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{url}")
        };
        let uri: Uri = normalized.parse().map_err(|_| invalid("not a url"))?;

        match uri.scheme_str() {
            Some("http") => {}
            _ => return Err(invalid("only http proxies are supported")),
        }
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?;

        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: uri.port_u16().unwrap_or(DEFAULT_PROXY_PORT),
        })
    }
}

/// Resolved proxy rules, consulted on every dial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRules {
    proxy: Option<ProxyEndpoint>,
    no_proxy: Vec<String>,
}

impl ProxyRules {
    /// Never use a proxy.
    pub fn direct() -> Self {
        Self::default()
    }

    /// Resolve `config`, reading the process environment when asked to.
    pub fn resolve(config: &ProxyConfig) -> Result<Self, ConfigError> {
        match config {
            ProxyConfig::Direct => Ok(Self::direct()),
            ProxyConfig::Http(endpoint) => Ok(Self {
                proxy: Some(endpoint.clone()),
                no_proxy: Vec::new(),
            }),
            ProxyConfig::FromEnvironment => Self::from_lookup(|key| std::env::var(key).ok()),
        }
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .find(|value| !value.trim().is_empty())
        };

        let proxy = first(&PROXY_VARS[..])
            .map(|url| ProxyEndpoint::parse(url.trim()))
            .transpose()?;
        let no_proxy = first(&NO_PROXY_VARS[..])
            .map(|list| {
                list.split(',')
                    .map(|entry| entry.trim().to_ascii_lowercase())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { proxy, no_proxy })
    }

    /// Proxy to use for `host`, or `None` to dial directly.
    pub fn proxy_for(&self, host: &str) -> Option<&ProxyEndpoint> {
        let proxy = self.proxy.as_ref()?;
        if self.bypasses(host) {
            return None;
        }
        Some(proxy)
    }

    fn bypasses(&self, host: &str) -> bool {
        if host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback()) {
            return true;
        }
        let host = host.to_ascii_lowercase();
        self.no_proxy.iter().any(|entry| {
            let suffix = entry.trim_start_matches('.');
            entry == "*" || host == suffix || host.ends_with(&format!(".{suffix}"))
        })
    }
}

/// Open a TCP stream to `target` through `proxy` with HTTP CONNECT.
pub async fn connect_tunnel(
    proxy: &ProxyEndpoint,
    target: SocketAddr,
) -> Result<TcpStream, TransportError> {
    debug!(proxy = %proxy.host, port = proxy.port, %target, "opening proxy tunnel");
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;

    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    // Read byte by byte so nothing past the header (the TLS server hello) is consumed.
    let mut response = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    while !response.ends_with(b"\r\n\r\n") {
        if response.len() >= MAX_PROXY_RESPONSE_SIZE {
            return Err(TransportError::Proxy("response header too large".into()));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(TransportError::Proxy("proxy closed the connection".into()));
        }
        response.push(byte[0]);
    }

    let head = String::from_utf8_lossy(&response);
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line.split_whitespace().nth(1);
    if status != Some("200") {
        return Err(TransportError::Proxy(format!(
            "CONNECT rejected: {status_line}"
        )));
    }

    Ok(stream)
}
