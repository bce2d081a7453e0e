//! Key material sources.
//!
//! The connection does not know where certificates live. It asks a
//! [`KeyMaterialSource`] once, at construction.

use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::core::{ConfigError, DEFAULT_FULL_NODE_PORT};
use crate::transport::KeyMaterial;

/// Supplies the client certificate and our own listening port.
pub trait KeyMaterialSource {
    /// Load the certificate chain and private key.
    fn load_key_pair(&self) -> Result<KeyMaterial, ConfigError>;

    /// Port this node listens on, announced in the handshake.
    fn listen_port(&self) -> u16;
}

/// Certificate and key PEM files on disk.
#[derive(Debug, Clone)]
pub struct PemKeyFiles {
    cert_path: PathBuf,
    key_path: PathBuf,
    listen_port: u16,
}

impl PemKeyFiles {
    /// Files at `cert_path` and `key_path`, announcing the default full node port.
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            listen_port: DEFAULT_FULL_NODE_PORT,
        }
    }

    /// Announce `port` instead of the default.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }
}

fn read(path: &Path) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    fs::read(path)
        .map(Zeroizing::new)
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}

impl KeyMaterialSource for PemKeyFiles {
    fn load_key_pair(&self) -> Result<KeyMaterial, ConfigError> {
        let cert = read(&self.cert_path)?;
        let key = read(&self.key_path)?;
        KeyMaterial::from_pem(&cert, &key)
    }

    fn listen_port(&self) -> u16 {
        self.listen_port
    }
}

/// Key material already in memory.
#[derive(Debug, Clone)]
pub struct StaticKeyMaterial {
    material: KeyMaterial,
    listen_port: u16,
}

impl StaticKeyMaterial {
    /// Serve `material`, announcing `listen_port`.
    pub fn new(material: KeyMaterial, listen_port: u16) -> Self {
        Self {
            material,
            listen_port,
        }
    }
}

impl KeyMaterialSource for StaticKeyMaterial {
    fn load_key_pair(&self) -> Result<KeyMaterial, ConfigError> {
        Ok(self.material.clone())
    }

    fn listen_port(&self) -> u16 {
        self.listen_port
    }
}
