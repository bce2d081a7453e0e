//! Request builders.
//!
//! Each builds one payload and sends it. Answers arrive through the receive
//! paths like any other message.

use super::connection::Connection;
use crate::core::PeerError;
use crate::protocol::{RequestBlock, RequestBlocks, RequestPeers};
use crate::transport::Dialer;

impl<D: Dialer> Connection<D> {
    /// Ask the peer for its peer list. Answered by `RespondPeers`.
    pub async fn request_peers(&self) -> Result<(), PeerError> {
        self.send_payload(&RequestPeers).await
    }

    /// Ask for the block at `height`. Answered by `RespondBlock` or `RejectBlock`.
    pub async fn request_block(
        &self,
        height: u32,
        include_transaction_block: bool,
    ) -> Result<(), PeerError> {
        self.send_payload(&RequestBlock {
            height,
            include_transaction_block,
        })
        .await
    }

    /// Ask for blocks `start_height..=end_height`.
    pub async fn request_blocks(
        &self,
        start_height: u32,
        end_height: u32,
        include_transaction_block: bool,
    ) -> Result<(), PeerError> {
        self.send_payload(&RequestBlocks {
            start_height,
            end_height,
            include_transaction_block,
        })
        .await
    }
}
