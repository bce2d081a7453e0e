//! Block and peak payloads.
//!
//! Only the request side and the small announcements are modelled; full
//! block bodies stay opaque bytes to this crate.

use crate::core::{CodecError, MessagePayload, Streamable};
use crate::wire::{Bytes32, ProtocolMessageType};

/// Ask for the block at `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBlock {
    /// Block height.
    pub height: u32,
    /// Include the transactions generator in the answer.
    pub include_transaction_block: bool,
}

impl Streamable for RequestBlock {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.height.stream(out)?;
        self.include_transaction_block.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            height: u32::parse(input)?,
            include_transaction_block: bool::parse(input)?,
        })
    }
}

impl MessagePayload for RequestBlock {
    const MESSAGE_TYPE: ProtocolMessageType = ProtocolMessageType::RequestBlock;
}

/// The peer does not have the requested block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectBlock {
    /// Height that was requested.
    pub height: u32,
}

impl Streamable for RejectBlock {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.height.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            height: u32::parse(input)?,
        })
    }
}

impl MessagePayload for RejectBlock {
    const MESSAGE_TYPE: ProtocolMessageType = ProtocolMessageType::RejectBlock;
}

/// Ask for blocks in `start_height..=end_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBlocks {
    /// First height, inclusive.
    pub start_height: u32,
    /// Last height, inclusive.
    pub end_height: u32,
    /// Include transactions generators in the answer.
    pub include_transaction_block: bool,
}

impl Streamable for RequestBlocks {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.start_height.stream(out)?;
        self.end_height.stream(out)?;
        self.include_transaction_block.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            start_height: u32::parse(input)?,
            end_height: u32::parse(input)?,
            include_transaction_block: bool::parse(input)?,
        })
    }
}

impl MessagePayload for RequestBlocks {
    const MESSAGE_TYPE: ProtocolMessageType = ProtocolMessageType::RequestBlocks;
}

/// Peer announces a new peak. Usually the first message after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPeak {
    /// Header hash of the peak block.
    pub header_hash: Bytes32,
    /// Height of the peak.
    pub height: u32,
    /// Total chain weight at the peak.
    pub weight: u128,
    /// Fork point relative to the previous peak.
    pub fork_point_with_previous_peak: u32,
    /// Reward chain hash of the unfinished block.
    pub unfinished_reward_block_hash: Bytes32,
}

impl Streamable for NewPeak {
    fn stream(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.header_hash.stream(out)?;
        self.height.stream(out)?;
        self.weight.stream(out)?;
        self.fork_point_with_previous_peak.stream(out)?;
        self.unfinished_reward_block_hash.stream(out)
    }

    fn parse(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            header_hash: Bytes32::parse(input)?,
            height: u32::parse(input)?,
            weight: u128::parse(input)?,
            fork_point_with_previous_peak: u32::parse(input)?,
            unfinished_reward_block_hash: Bytes32::parse(input)?,
        })
    }
}

impl MessagePayload for NewPeak {
    const MESSAGE_TYPE: ProtocolMessageType = ProtocolMessageType::NewPeak;
}
