//! Block, body and receipt types relayed between chains.

use crate::header::TieredHeader;
use crate::location::Tier;
use primitive_types::H256;
use serde::{Deserialize, Serialize};

/// A transaction carried opaquely by the coordinator.
///
/// The coordinator never executes or validates transactions; it only
/// moves them between chains, so the raw encoding plus the hash is all
/// it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: H256,
    /// Raw consensus encoding.
    pub raw: Vec<u8>,
}

/// An execution receipt, relayed alongside its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to.
    pub tx_hash: H256,
    /// Execution status, 1 on success.
    pub status: u64,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
}

/// Transactions and uncles of one block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockBody {
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,
    /// Uncle headers.
    pub uncles: Vec<TieredHeader>,
}

/// A pending block as returned by a chain's pending-block query:
/// header, body and the ordered receipts produced by executing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptBlock {
    /// The pending header.
    pub header: TieredHeader,
    /// The pending body.
    pub body: BlockBody,
    /// Receipts, one per transaction.
    pub receipts: Vec<Receipt>,
}

impl ReceiptBlock {
    /// The block number at a tier slot, if populated.
    pub fn number(&self, tier: Tier) -> Option<u64> {
        self.header.number[tier.index()]
    }
}

/// A block ready to be handed to a chain: a (possibly sealed) header
/// plus its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedBlock {
    /// Header; carries the seal after [`SealedBlock::with_seal`].
    pub header: TieredHeader,
    /// Body the header commits to.
    pub body: BlockBody,
}

impl SealedBlock {
    /// Assemble a block from a header and body.
    pub fn new(header: TieredHeader, body: BlockBody) -> Self {
        Self { header, body }
    }

    /// Replace the header wholesale, carrying the seal of `header` onto
    /// this block's body.
    pub fn with_seal(mut self, header: TieredHeader) -> Self {
        self.header = header;
        self
    }

    /// Hash of the (sealed) header.
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }
}

/// A cross-tier proof retrieved from a dominant chain, carrying enough
/// material to reconstruct the block on the requesting chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalBlock {
    /// The original header of the proven block.
    pub header: TieredHeader,
    /// The original body.
    pub body: BlockBody,
    /// Receipts of the proven block.
    pub receipts: Vec<Receipt>,
    /// Tier the proof was recorded at.
    pub context: Tier,
}

impl ExternalBlock {
    /// Rebuild the block this proof describes.
    pub fn into_sealed(self) -> SealedBlock {
        SealedBlock::new(self.header, self.body)
    }
}
