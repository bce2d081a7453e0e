//! TLS client configuration.
//!
//! Full nodes authenticate with client certificates and serve self-signed
//! certificates of their own. Peer identity is carried by the protocol
//! handshake, not by a certificate chain, so the client presents its key pair
//! and accepts whatever certificate the peer serves. Handshake signatures are
//! still verified, so the peer must hold the key of the certificate it sent.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

use super::proxy::ProxyRules;
use crate::core::{ConfigError, HANDSHAKE_TIMEOUT, MAX_MESSAGE_SIZE};

/// Certificate chain and private key presented to peers.
pub struct KeyMaterial {
    cert_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
}

impl KeyMaterial {
    /// Create from DER values. The chain must hold at least the leaf.
    pub fn new(
        cert_chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
    ) -> Result<Self, ConfigError> {
        if cert_chain.is_empty() {
            return Err(ConfigError::MissingCertificate);
        }
        Ok(Self {
            cert_chain,
            private_key,
        })
    }

    /// Parse a PEM certificate chain and a PEM private key (PKCS#8, PKCS#1 or SEC1).
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, ConfigError> {
        let cert_chain = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidPem(e.to_string()))?;
        let private_key = rustls_pemfile::private_key(&mut &key_pem[..])
            .map_err(|e| ConfigError::InvalidPem(e.to_string()))?
            .ok_or(ConfigError::MissingPrivateKey)?;
        Self::new(cert_chain, private_key)
    }

    /// Certificate chain, leaf first.
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        Self {
            cert_chain: self.cert_chain.clone(),
            private_key: self.private_key.clone_key(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("certificates", &self.cert_chain.len())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Accepts any peer certificate; verifies handshake signatures only.
///
/// Peers run with self-signed certificates, so chain validation against a
/// trust root would reject every honest peer.
#[derive(Debug)]
pub struct AcceptAnyPeerCertificate {
    provider: Arc<CryptoProvider>,
}

impl AcceptAnyPeerCertificate {
    /// Verifier backed by `provider`'s signature algorithms.
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for AcceptAnyPeerCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Everything needed to open sessions: TLS settings, proxy rules and limits.
///
/// Built once per connection and read-only afterwards.
#[derive(Clone)]
pub struct TransportConfig {
    tls: Arc<rustls::ClientConfig>,
    proxy: ProxyRules,
    handshake_timeout: Duration,
    max_message_size: usize,
}

impl TransportConfig {
    /// Build a config presenting `key_material`, dialing directly, with default limits.
    pub fn new(key_material: KeyMaterial) -> Result<Self, ConfigError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = Arc::new(AcceptAnyPeerCertificate::new(Arc::clone(&provider)));

        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_auth_cert(key_material.cert_chain, key_material.private_key)?;

        Ok(Self {
            tls: Arc::new(tls),
            proxy: ProxyRules::direct(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    /// Use `proxy` when dialing.
    pub fn with_proxy(mut self, proxy: ProxyRules) -> Self {
        self.proxy = proxy;
        self
    }

    /// Bound on the whole dial (TCP, proxy, TLS, upgrade).
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Largest inbound message accepted.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Shared rustls client config.
    pub fn tls(&self) -> Arc<rustls::ClientConfig> {
        Arc::clone(&self.tls)
    }

    /// Proxy rules.
    pub fn proxy(&self) -> &ProxyRules {
        &self.proxy
    }

    /// Dial timeout.
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Inbound message limit.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("proxy", &self.proxy)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> (String, String) {
        let certified = rcgen::generate_simple_self_signed(vec!["chia.net".to_string()]).unwrap();
        (certified.cert.pem(), certified.key_pair.serialize_pem())
    }

    #[test]
    fn test_key_material_from_pem() {
        let (cert, key) = self_signed();
        let material = KeyMaterial::from_pem(cert.as_bytes(), key.as_bytes()).unwrap();
        assert_eq!(material.cert_chain().len(), 1);
        assert!(format!("{material:?}").contains("REDACTED"));
    }

    #[test]
    fn test_key_material_missing_parts() {
        let (cert, key) = self_signed();
        assert!(matches!(
            KeyMaterial::from_pem(b"", key.as_bytes()),
            Err(ConfigError::MissingCertificate)
        ));
        assert!(matches!(
            KeyMaterial::from_pem(cert.as_bytes(), b""),
            Err(ConfigError::MissingPrivateKey)
        ));
    }

    #[test]
    fn test_transport_config_builds() {
        let (cert, key) = self_signed();
        let material = KeyMaterial::from_pem(cert.as_bytes(), key.as_bytes()).unwrap();
        let config = TransportConfig::new(material)
            .unwrap()
            .with_handshake_timeout(Duration::from_secs(5));

        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_message_size(), MAX_MESSAGE_SIZE);
        assert!(config.proxy().proxy_for("10.0.0.5").is_none());
    }

    #[test]
    fn test_accepts_unrelated_peer_certificate() {
        let peer = rcgen::generate_simple_self_signed(vec!["someone-else".to_string()]).unwrap();
        let verifier =
            AcceptAnyPeerCertificate::new(Arc::new(rustls::crypto::ring::default_provider()));
        let name = ServerName::try_from("10.0.0.5").unwrap();

        let verdict = verifier.verify_server_cert(peer.cert.der(), &[], &name, &[], UnixTime::now());
        assert!(verdict.is_ok());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }
}
