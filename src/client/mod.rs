//! Client API.
//!
//! [`Connection`] is the entry point: one lazily opened session to one peer,
//! with a send path and two read disciplines.

mod config;
mod connection;
mod keys;
#[cfg(test)]
mod mock;
mod requests;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, DecodeErrorPolicy};
pub use connection::{Connection, ConnectionPhase, MessageHandler};
pub use keys::{KeyMaterialSource, PemKeyFiles, StaticKeyMaterial};
