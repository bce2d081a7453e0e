//! Message envelope and message-type tags.
//!
//! Every frame on the wire is one envelope:
//! ```text
//! +0   Message Type (u8)
//! +1   Id Flag (u8, 0x00 or 0x01)
//! +2   Id (u16 BE, present only when flag = 0x01)
//! +N   Data Length (u32 BE)
//! +N+4 Data (payload encoded with the same codec)
//! ```

use std::fmt;

use crate::core::{CodecError, MessagePayload, Streamable};

macro_rules! message_types {
    ($($(#[$doc:meta])* $name:ident = $value:literal,)*) => {
        /// Tag identifying the payload carried by an envelope.
        ///
        /// Only the full node subset used by a peer client is modelled. Decoding
        /// any other tag fails with [`CodecError::UnknownMessageType`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum ProtocolMessageType {
            $($(#[$doc])* $name = $value,)*
        }

        impl ProtocolMessageType {
            /// Every modelled tag, in wire order.
            pub const ALL: &'static [Self] = &[$(Self::$name,)*];
        }

        impl TryFrom<u8> for ProtocolMessageType {
            type Error = CodecError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    other => Err(CodecError::UnknownMessageType(other)),
                }
            }
        }
    };
}

message_types! {
    /// Session opener declaring version and capabilities.
    Handshake = 1,
    /// A peer announces a new chain peak.
    NewPeak = 20,
    /// A peer announces a new mempool transaction.
    NewTransaction = 21,
    /// Ask for a transaction by id.
    RequestTransaction = 22,
    /// Transaction answer.
    RespondTransaction = 23,
    /// Ask for a weight proof of the chain.
    RequestProofOfWeight = 24,
    /// Weight proof answer.
    RespondProofOfWeight = 25,
    /// Ask for one block.
    RequestBlock = 26,
    /// Block answer.
    RespondBlock = 27,
    /// The requested block is unavailable.
    RejectBlock = 28,
    /// Ask for a range of blocks.
    RequestBlocks = 29,
    /// Block range answer.
    RespondBlocks = 30,
    /// The requested range is unavailable.
    RejectBlocks = 31,
    /// A peer announces an unfinished block.
    NewUnfinishedBlock = 32,
    /// Ask for an unfinished block.
    RequestUnfinishedBlock = 33,
    /// Unfinished block answer.
    RespondUnfinishedBlock = 34,
    /// A peer announces a signage point or sub-slot end.
    NewSignagePointOrEndOfSubSlot = 35,
    /// Ask for a signage point or sub-slot end.
    RequestSignagePointOrEndOfSubSlot = 36,
    /// Signage point answer.
    RespondSignagePoint = 37,
    /// Sub-slot end answer.
    RespondEndOfSubSlot = 38,
    /// Ask for mempool transactions missing from a filter.
    RequestMempoolTransactions = 39,
    /// Ask for a compact proof of time.
    RequestCompactVdf = 40,
    /// Compact proof of time answer.
    RespondCompactVdf = 41,
    /// A peer announces a compact proof of time.
    NewCompactVdf = 42,
    /// Ask the peer for its peer list.
    RequestPeers = 43,
    /// Peer list answer.
    RespondPeers = 44,
    /// Ask an introducer for peers.
    RequestPeersIntroducer = 63,
    /// Introducer peer list answer.
    RespondPeersIntroducer = 64,
}

impl ProtocolMessageType {
    /// Wire tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ProtocolMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u8())
    }
}

impl Streamable for ProtocolMessageType {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.as_u8().stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Self::try_from(u8::parse(input)?)
    }
}

/// A framed protocol message: type tag, optional request id, encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Payload tag.
    pub msg_type: ProtocolMessageType,
    /// Request id used to pair requests with responses; `None` when unsolicited.
    pub id: Option<u16>,
    /// Payload bytes, encoded with [`Streamable`].
    pub data: Vec<u8>,
}

impl Message {
    /// Encode `payload` and wrap it under `msg_type`.
    pub fn new<T: Streamable>(msg_type: ProtocolMessageType, payload: &T) -> Result<Self, CodecError> {
        Ok(Self {
            msg_type,
            id: None,
            data: payload.to_bytes()?,
        })
    }

    /// Wrap a typed payload under its own tag.
    pub fn from_payload<T: MessagePayload>(payload: &T) -> Result<Self, CodecError> {
        Self::new(T::MESSAGE_TYPE, payload)
    }

    /// Attach a request id.
    pub fn with_id(mut self, id: u16) -> Self {
        self.id = Some(id);
        self
    }

    /// Decode the payload as `T` without checking the tag.
    pub fn decode_data<T: Streamable>(&self) -> Result<T, CodecError> {
        T::from_bytes(&self.data)
    }

    /// Decode the payload as `T`, which must be the payload bound to this tag.
    pub fn payload<T: MessagePayload>(&self) -> Result<T, CodecError> {
        if self.msg_type != T::MESSAGE_TYPE {
            return Err(CodecError::MessageTypeMismatch {
                expected: T::MESSAGE_TYPE.as_u8(),
                actual: self.msg_type.as_u8(),
            });
        }
        self.decode_data()
    }
}

impl Streamable for Message {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.msg_type.stream(out)?;
        self.id.stream(out)?;
        self.data.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            msg_type: ProtocolMessageType::parse(input)?,
            id: Option::<u16>::parse(input)?,
            data: Vec::<u8>::parse(input)?,
        })
    }
}

/// Encode `payload`, wrap it in an envelope tagged `msg_type`, and encode the envelope.
pub fn make_message_bytes<T: Streamable>(
    msg_type: ProtocolMessageType,
    payload: &T,
) -> Result<Vec<u8>, CodecError> {
    Message::new(msg_type, payload)?.to_bytes()
}

/// Decode one frame into an envelope.
pub fn decode_message(bytes: &[u8]) -> Result<Message, CodecError> {
    Message::from_bytes(bytes)
}
