//! The merged header shared by all three tiers.

use crate::location::{Location, Tier, TIER_COUNT};
use crate::Address;
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// Size of the per-tier log bloom in bytes.
pub const BLOOM_BYTES: usize = 256;

/// A per-tier log bloom filter.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bloom(#[serde_as(as = "Bytes")] pub [u8; BLOOM_BYTES]);

impl Bloom {
    /// The empty bloom.
    pub fn zero() -> Self {
        Bloom([0u8; BLOOM_BYTES])
    }
}

impl Default for Bloom {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bloom(0x{}..)", hex::encode(&self.0[..4]))
    }
}

/// The combined header mined by the coordinator.
///
/// Every chain-state field is a three-slot array indexed by
/// [`Tier::index`]; `time`, `location` and the seal (`nonce`,
/// `mix_digest`) are single scalars that apply to all tiers at once. A
/// header is feedable to the sealing engine only when `number` is
/// populated for every tier; see [`TieredHeader::missing_tier`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TieredHeader {
    /// Parent hash per tier.
    pub parent_hash: [H256; TIER_COUNT],
    /// Uncle-set hash per tier.
    pub uncle_hash: [H256; TIER_COUNT],
    /// Block number per tier; `None` until the first pending block for
    /// that tier has been observed.
    pub number: [Option<u64>; TIER_COUNT],
    /// Extra bytes per tier.
    pub extra: [Vec<u8>; TIER_COUNT],
    /// Base fee per tier.
    pub base_fee: [U256; TIER_COUNT],
    /// Gas limit per tier.
    pub gas_limit: [u64; TIER_COUNT],
    /// Gas used per tier.
    pub gas_used: [u64; TIER_COUNT],
    /// Transaction-trie root per tier.
    pub tx_root: [H256; TIER_COUNT],
    /// Receipt-trie root per tier.
    pub receipt_root: [H256; TIER_COUNT],
    /// State-trie root per tier.
    pub state_root: [H256; TIER_COUNT],
    /// Block difficulty per tier, strongest at slot 0.
    pub difficulty: [U256; TIER_COUNT],
    /// Network difficulty per tier.
    pub network_difficulty: [U256; TIER_COUNT],
    /// Coinbase per tier.
    pub coinbase: [Address; TIER_COUNT],
    /// Log bloom per tier.
    pub bloom: [Bloom; TIER_COUNT],

    /// Block timestamp, shared by all tiers.
    pub time: u64,
    /// The `(region, zone)` slice this header was assembled for.
    pub location: Location,
    /// Proof-of-work nonce, zero while unsealed.
    pub nonce: u64,
    /// Seal digest, zero while unsealed.
    pub mix_digest: H256,
}

impl TieredHeader {
    /// Copy every per-tier field of `src` at slot `tier` into this
    /// header's matching slot. Scalar fields are not touched.
    pub fn copy_slot_from(&mut self, tier: Tier, src: &TieredHeader) {
        let i = tier.index();
        self.parent_hash[i] = src.parent_hash[i];
        self.uncle_hash[i] = src.uncle_hash[i];
        self.number[i] = src.number[i];
        self.extra[i] = src.extra[i].clone();
        self.base_fee[i] = src.base_fee[i];
        self.gas_limit[i] = src.gas_limit[i];
        self.gas_used[i] = src.gas_used[i];
        self.tx_root[i] = src.tx_root[i];
        self.receipt_root[i] = src.receipt_root[i];
        self.state_root[i] = src.state_root[i];
        self.difficulty[i] = src.difficulty[i];
        self.network_difficulty[i] = src.network_difficulty[i];
        self.coinbase[i] = src.coinbase[i];
        self.bloom[i] = src.bloom[i].clone();
    }

    /// Zero the seal fields.
    pub fn clear_seal(&mut self) {
        self.nonce = 0;
        self.mix_digest = H256::zero();
    }

    /// The lowest tier whose `number` slot is still unset, if any.
    pub fn missing_tier(&self) -> Option<Tier> {
        Tier::ALL
            .into_iter()
            .find(|tier| self.number[tier.index()].is_none())
    }

    /// Whether every tier slot carries a block number.
    pub fn is_complete(&self) -> bool {
        self.missing_tier().is_none()
    }

    /// Canonical encoding of everything under the seal: all per-tier
    /// fields plus time and location, nonce and mix digest excluded.
    fn seal_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2048);
        for i in 0..TIER_COUNT {
            bytes.extend_from_slice(self.parent_hash[i].as_bytes());
            bytes.extend_from_slice(self.uncle_hash[i].as_bytes());
            bytes.extend_from_slice(&self.number[i].unwrap_or(0).to_le_bytes());
            bytes.push(self.number[i].is_some() as u8);
            bytes.extend_from_slice(&self.extra[i]);
            bytes.extend_from_slice(&u256_bytes(self.base_fee[i]));
            bytes.extend_from_slice(&self.gas_limit[i].to_le_bytes());
            bytes.extend_from_slice(&self.gas_used[i].to_le_bytes());
            bytes.extend_from_slice(self.tx_root[i].as_bytes());
            bytes.extend_from_slice(self.receipt_root[i].as_bytes());
            bytes.extend_from_slice(self.state_root[i].as_bytes());
            bytes.extend_from_slice(&u256_bytes(self.difficulty[i]));
            bytes.extend_from_slice(&u256_bytes(self.network_difficulty[i]));
            bytes.extend_from_slice(&self.coinbase[i]);
            bytes.extend_from_slice(&self.bloom[i].0);
        }
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes.extend_from_slice(&self.location.to_bytes());
        bytes
    }

    /// Digest of the sealed content for a given nonce; this is the value
    /// compared against the per-tier targets during the nonce search.
    pub fn seal_digest(&self, nonce: u64) -> H256 {
        let mut bytes = self.seal_bytes();
        bytes.extend_from_slice(&nonce.to_le_bytes());
        H256::from(*blake3::hash(&bytes).as_bytes())
    }

    /// Full header hash including the seal.
    pub fn hash(&self) -> H256 {
        let mut bytes = self.seal_bytes();
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes.extend_from_slice(self.mix_digest.as_bytes());
        H256::from(*blake3::hash(&bytes).as_bytes())
    }
}

fn u256_bytes(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

/// A sealed header tagged with the highest tier its digest satisfies.
///
/// Posted by the sealing engine on the result channel; `Tier::Prime` is
/// the strongest outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBundle {
    /// Highest tier whose difficulty target the seal meets.
    pub context: Tier,
    /// The header with nonce and mix digest stamped on.
    pub header: TieredHeader,
}
