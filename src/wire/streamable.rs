//! `Streamable` implementations for primitive and container types.
//!
//! Wire format:
//! ```text
//! uN           big-endian, N/8 bytes
//! bool         1 byte, 0x00 or 0x01
//! String       u32 byte length + UTF-8 bytes
//! Vec<T>       u32 element count + elements
//! Option<T>    0x00, or 0x01 + value
//! (A, B)       A then B
//! Bytes32      32 raw bytes
//! ```

use std::fmt;

use crate::core::{BYTES32_SIZE, CodecError, Streamable};

/// Split `n` bytes off the front of `input`.
pub(crate) fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < n {
        return Err(CodecError::UnexpectedEof {
            needed: n,
            remaining: input.len(),
        });
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

fn stream_len(len: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let len = u32::try_from(len).map_err(|_| CodecError::LengthOverflow(len))?;
    len.stream(out)
}

macro_rules! impl_streamable_int {
    ($($ty:ty),*) => {
        $(
            impl Streamable for $ty {
                fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
                    out.extend_from_slice(&self.to_be_bytes());
                    Ok(())
                }

                fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
                    let bytes = take(input, std::mem::size_of::<$ty>())?;
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    Ok(<$ty>::from_be_bytes(buf))
                }
            }
        )*
    };
}

impl_streamable_int!(u8, u16, u32, u64, u128);

impl Streamable for bool {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.push(u8::from(*self));
        Ok(())
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        match u8::parse(input)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }
}

impl Streamable for String {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        stream_len(self.len(), out)?;
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        let len = u32::parse(input)? as usize;
        let bytes = take(input, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

/// Elements to reserve for a list claiming `count` items with `remaining`
/// input bytes left. The reservation never exceeds `remaining` bytes; the
/// count is peer-controlled and only checked as elements are parsed.
fn preallocation<T>(count: usize, remaining: usize) -> usize {
    count.min(remaining / std::mem::size_of::<T>().max(1))
}

impl<T: Streamable> Streamable for Vec<T> {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        stream_len(self.len(), out)?;
        for item in self {
            item.stream(out)?;
        }
        Ok(())
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        let count = u32::parse(input)? as usize;
        let mut items = Vec::with_capacity(preallocation::<T>(count, input.len()));
        for _ in 0..count {
            items.push(T::parse(input)?);
        }
        Ok(items)
    }
}

impl<T: Streamable> Streamable for Option<T> {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        match self {
            None => {
                out.push(0);
                Ok(())
            }
            Some(value) => {
                out.push(1);
                value.stream(out)
            }
        }
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        match u8::parse(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::parse(input)?)),
            other => Err(CodecError::InvalidOptionFlag(other)),
        }
    }
}

impl<A: Streamable, B: Streamable> Streamable for (A, B) {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.0.stream(out)?;
        self.1.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok((A::parse(input)?, B::parse(input)?))
    }
}

/// Unit payload for messages without a body.
impl Streamable for () {
    fn stream(&self, _out: &mut Vec<u8>) -> Result<(), CodecError> {
        Ok(())
    }

    fn parse(_input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(())
    }
}

/// A 32-byte hash (header hash, reward block hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bytes32(pub [u8; BYTES32_SIZE]);

impl Bytes32 {
    /// Create from raw bytes.
    pub fn new(bytes: [u8; BYTES32_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; BYTES32_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({self})")
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; BYTES32_SIZE]> for Bytes32 {
    fn from(bytes: [u8; BYTES32_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Streamable for Bytes32 {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.extend_from_slice(&self.0);
        Ok(())
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        let bytes = take(input, BYTES32_SIZE)?;
        let mut hash = [0u8; BYTES32_SIZE];
        hash.copy_from_slice(bytes);
        Ok(Self(hash))
    }
}
