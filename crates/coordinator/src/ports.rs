//! Outbound port: the node RPC surface the coordinator consumes.

use async_trait::async_trait;
use primitive_types::H256;
use shared_types::{
    ClientError, ExternalBlock, Location, Receipt, ReceiptBlock, SealedBlock, Tier, TieredHeader,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A shared handle to one chain's RPC client.
pub type NodeHandle = Arc<dyn NodeRpc>;

/// Sync status reported by a chain that is still catching up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    /// Block the sync started from.
    pub starting_block: u64,
    /// Block currently processed.
    pub current_block: u64,
    /// Best known block.
    pub highest_block: u64,
}

/// A node's request for an external block it could not assemble locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingBlockRequest {
    /// Hash of the missing block.
    pub hash: H256,
    /// Tier the proof is needed at.
    pub context: Tier,
    /// Location of the chain that owns the block.
    pub location: Location,
}

/// The RPC surface of one chain node.
///
/// Every call is a suspension point and carries the adapter's per-call
/// deadline; expiry surfaces as [`ClientError::Timeout`] and is treated
/// as transient by all services. Subscriptions are delivered on plain
/// channels; dropping the receiver unsubscribes.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// `None` when the chain is fully synced.
    async fn sync_progress(&self) -> Result<Option<SyncState>, ClientError>;

    /// Push notifications for new pending blocks. The payload is only a
    /// trigger; consumers re-query [`NodeRpc::pending_block`].
    async fn subscribe_pending_blocks(&self)
        -> Result<mpsc::Receiver<TieredHeader>, ClientError>;

    /// Push notifications for newly accepted heads.
    async fn subscribe_new_heads(&self) -> Result<mpsc::Receiver<TieredHeader>, ClientError>;

    /// Push notifications for external blocks the node is missing.
    async fn subscribe_missing_external_blocks(
        &self,
    ) -> Result<mpsc::Receiver<MissingBlockRequest>, ClientError>;

    /// The chain's current pending block with receipts.
    async fn pending_block(&self) -> Result<Option<ReceiptBlock>, ClientError>;

    /// Look up a block by hash.
    async fn block_by_hash(&self, hash: H256) -> Result<Option<SealedBlock>, ClientError>;

    /// Header at `number`, or the latest header for `None`.
    async fn header_by_number(&self, number: Option<u64>) -> Result<TieredHeader, ClientError>;

    /// Receipts of the block with the given hash.
    async fn block_receipts(&self, hash: H256) -> Result<Option<ReceiptBlock>, ClientError>;

    /// The node's external-block record for `hash` at `context`.
    async fn external_block(
        &self,
        hash: H256,
        context: Tier,
    ) -> Result<Option<ExternalBlock>, ClientError>;

    /// Deliver a cross-tier proof. `context` annotates the tier the
    /// block was mined at.
    async fn send_external_block(
        &self,
        block: &SealedBlock,
        receipts: &[Receipt],
        context: Tier,
    ) -> Result<(), ClientError>;

    /// Deliver a sealed block to its mining chain.
    async fn send_mined_block(
        &self,
        block: &SealedBlock,
        broadcast: bool,
        announce: bool,
    ) -> Result<(), ClientError>;

    /// Report an observed hashrate under a stable miner id.
    async fn submit_hashrate(&self, rate: u64, id: H256) -> Result<(), ClientError>;
}
