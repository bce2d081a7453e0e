//! Core traits for the wire codec.
//!
//! These traits define how protocol values become bytes and how a payload
//! type is bound to its envelope tag.

use super::error::CodecError;
use crate::wire::ProtocolMessageType;

/// A value with a canonical binary encoding on the peer wire.
///
/// # Requirements
///
/// - `parse(stream(v)) == v` for every value `v`
/// - `parse` consumes exactly the bytes `stream` produced and advances the
///   input slice past them
/// - encoding is deterministic: equal values produce equal bytes
///
/// # Example
///
/// ```
/// use chia_peer::core::{CodecError, Streamable};
///
/// #[derive(Debug, PartialEq)]
/// struct Point {
///     x: u32,
///     y: u32,
/// }
///
/// impl Streamable for Point {
///     fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
///         self.x.stream(out)?;
///         self.y.stream(out)
///     }
///
///     fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
///         Ok(Self {
///             x: u32::parse(input)?,
///             y: u32::parse(input)?,
///         })
///     }
/// }
///
/// let bytes = Point { x: 1, y: 2 }.to_bytes().unwrap();
/// assert_eq!(bytes, [0, 0, 0, 1, 0, 0, 0, 2]);
/// assert_eq!(Point::from_bytes(&bytes).unwrap(), Point { x: 1, y: 2 });
/// ```
pub trait Streamable: Sized {
    /// Append the encoding of `self` to `out`.
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Parse one value from the front of `input`, advancing it.
    fn parse(input: &mut &[u8]) -> Result<Self, CodecError>;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.stream(&mut out)?;
        Ok(out)
    }

    /// Decode a value that must span all of `bytes`.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut input = bytes;
        let value = Self::parse(&mut input)?;
        if !input.is_empty() {
            return Err(CodecError::TrailingBytes(input.len()));
        }
        Ok(value)
    }
}

/// A payload type that always travels under one envelope tag.
pub trait MessagePayload: Streamable {
    /// Tag written into the envelope for this payload.
    const MESSAGE_TYPE: ProtocolMessageType;
}
