//! # Shared Types
//!
//! Core data model for the Strata merge-mining coordinator.
//!
//! The Strata network is organized as one PRIME chain, a fixed number of
//! REGION chains and a fixed number of ZONE chains per region. A single
//! proof-of-work solution seals a block at up to all three tiers at once,
//! so the header type carries one slot of chain state per tier under a
//! single nonce and mix digest.
//!
//! ## Clusters
//!
//! - **Topology**: [`Tier`], [`Location`]
//! - **Chain**: [`TieredHeader`], [`BlockBody`], [`ReceiptBlock`],
//!   [`SealedBlock`], [`ExternalBlock`]
//! - **Mining**: [`HeaderBundle`]

pub mod block;
pub mod errors;
pub mod header;
pub mod location;

pub use block::{BlockBody, ExternalBlock, Receipt, ReceiptBlock, SealedBlock, Transaction};
pub use errors::ClientError;
pub use header::{Bloom, HeaderBundle, TieredHeader, BLOOM_BYTES};
pub use location::{Location, Tier, REGIONS, TIER_COUNT, ZONES_PER_REGION};

// Re-export the arithmetic types used across all crates.
pub use primitive_types::{H256, U256};

/// A 20-byte coinbase address.
pub type Address = [u8; 20];
