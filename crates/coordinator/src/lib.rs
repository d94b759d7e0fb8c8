//! # Coordinator
//!
//! The concurrent core of the Strata merge-mining coordinator.
//!
//! One nonce search serves three chains at once: the coordinator merges
//! the pending headers of the currently selected PRIME/REGION/ZONE slice
//! into a single [`shared_types::TieredHeader`], feeds it to the sealing
//! engine, classifies every solution by the highest tier it satisfies
//! and fans the sealed block plus cross-tier external-block proofs out
//! to the full client registry. In parallel it relays every new head
//! across tiers and re-serves external blocks that nodes report missing.
//!
//! ## Services
//!
//! - [`registry::ClientRegistry`] - RPC handles for every chain, stable
//!   indexing under partial availability.
//! - [`aggregator::HeaderAggregator`] - pending-block subscriptions and
//!   the combined-header update protocol.
//! - [`head_relay::HeadRelay`] - new-head fan-out as external proofs.
//! - [`missing_blocks::MissingBlockResponder`] - pull-based proof
//!   recovery with dominant-chain fallback.
//! - [`mining::MiningDriver`] - drives the engine, interrupting stale
//!   searches on every header update.
//! - [`dispatcher::ResultDispatcher`] - two-phase solution fan-out under
//!   the coordinator lock.
//! - [`locator::AutoLocator`] - periodic lowest-difficulty slice
//!   selection with atomic rebinding.
//!
//! All chain I/O goes through the [`ports::NodeRpc`] trait; the
//! production WebSocket adapter lives in the runtime crate, and tests
//! drive the services with in-memory nodes.

pub mod aggregator;
pub(crate) mod broadcast;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod head_relay;
pub mod locator;
pub mod mining;
pub mod missing_blocks;
pub mod ports;
pub mod registry;
pub mod state;

pub use error::{CoordinatorError, Result};

/// Capacity of the sealing-result channel.
pub const RESULT_QUEUE_SIZE: usize = 10;
