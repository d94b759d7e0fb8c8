//! Head propagation: every accepted head becomes an external-block proof
//! on the other tiers.

use crate::broadcast::broadcast_external_block;
use crate::domain::{head_broadcast_tiers, implied_child_tiers};
use crate::ports::NodeHandle;
use crate::registry::ClientRegistry;
use shared_types::{Location, Tier, TieredHeader};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Relays new heads across tiers.
///
/// One task per registered node. A head observed at a dominant tier also
/// certifies child blocks at the weaker tiers for the same location;
/// those are fetched from the source node's external-block view and
/// delivered to their owners as sealed blocks before the head itself is
/// broadcast as a proof.
#[derive(Clone)]
pub struct HeadRelay {
    registry: Arc<ClientRegistry>,
}

impl HeadRelay {
    /// Create a relay over the registry.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Spawn one relay task per registered node.
    pub fn spawn_all(&self, cancel: &watch::Sender<bool>) -> Vec<JoinHandle<()>> {
        self.registry
            .nodes()
            .map(|(location, node)| {
                let task = self
                    .clone()
                    .run_node(location, node.clone(), cancel.subscribe());
                tokio::spawn(task)
            })
            .collect()
    }

    async fn run_node(self, location: Location, node: NodeHandle, mut cancel: watch::Receiver<bool>) {
        let origin = location.tier();
        let mut heads = match node.subscribe_new_heads().await {
            Ok(receiver) => receiver,
            Err(error) => {
                warn!(%location, %error, "new-head subscription failed");
                return;
            }
        };
        debug!(%location, "subscribed to new heads");

        loop {
            tokio::select! {
                head = heads.recv() => match head {
                    Some(head) => self.handle_head(&node, origin, head).await,
                    None => {
                        warn!(%location, "new-head subscription closed");
                        return;
                    }
                },
                _ = cancel.changed() => return,
            }
        }
    }

    /// Process one new-head event from a node at tier `origin`.
    pub async fn handle_head(&self, source: &NodeHandle, origin: Tier, head: TieredHeader) {
        let hash = head.hash();

        let block = match source.block_by_hash(hash).await {
            Ok(Some(block)) => block,
            Ok(None) => {
                warn!(%origin, %hash, "block for new head not found");
                return;
            }
            Err(error) => {
                warn!(%origin, %hash, %error, "block fetch for new head failed");
                return;
            }
        };
        let receipts = match source.block_receipts(hash).await {
            Ok(Some(receipt_block)) => receipt_block.receipts,
            Ok(None) => {
                warn!(%origin, %hash, "receipts for new head not found");
                return;
            }
            Err(error) => {
                warn!(%origin, %hash, %error, "receipt fetch for new head failed");
                return;
            }
        };

        let location = block.header.location;
        if location == Location::PRIME && origin != Tier::Prime {
            debug!(%origin, %hash, "head carries no location; ignored");
            return;
        }
        info!(%origin, %location, number = ?block.header.number, %hash, "relaying new head");

        // A dominant head also certifies blocks on the weaker tiers;
        // materialize them on their owners before broadcasting the proof.
        for child_tier in implied_child_tiers(origin) {
            let external = match source.external_block(hash, *child_tier).await {
                Ok(Some(external)) => external,
                Ok(None) => {
                    warn!(%origin, %child_tier, %hash, "child external block missing; relay aborted");
                    return;
                }
                Err(error) => {
                    warn!(%origin, %child_tier, %hash, %error, "child external block fetch failed");
                    return;
                }
            };
            let owner = external.header.location.at_tier(*child_tier);
            let sealed = external.into_sealed();
            match self.registry.client_at(owner) {
                Some(owner_node) => {
                    if let Err(error) = owner_node.send_mined_block(&sealed, true, true).await {
                        warn!(%owner, %error, "child block delivery failed");
                    }
                }
                None => warn!(%owner, "child block owner unavailable"),
            }
        }

        broadcast_external_block(
            &self.registry,
            &block,
            &receipts,
            origin,
            head_broadcast_tiers(origin),
        )
        .await;
    }
}
