//! Two-phase fan-out of sealing results.

use crate::broadcast::broadcast_external_block;
use crate::domain::{external_routes, sealed_targets};
use crate::registry::ClientRegistry;
use crate::state::CoordinatorState;
use futures_util::future::join_all;
use shared_types::{HeaderBundle, Location, SealedBlock, Tier};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Distributes every sealing result to the network.
///
/// The whole fan-out runs under the coordinator lock so a sealed block
/// is never assembled from pending bodies that are mid-update. Phase A
/// delivers external-block proofs, Phase B the sealed blocks; the
/// phases are separated by a barrier, and within each phase the sends
/// run concurrently. A solution is dispatched only when every chain is
/// reachable; partial fan-out is never attempted.
pub struct ResultDispatcher {
    registry: Arc<ClientRegistry>,
    state: Arc<CoordinatorState>,
}

impl ResultDispatcher {
    /// Create a dispatcher over the registry and shared state.
    pub fn new(registry: Arc<ClientRegistry>, state: Arc<CoordinatorState>) -> Self {
        Self { registry, state }
    }

    /// Consume sealing results until the channel closes or `cancel`
    /// fires.
    pub async fn run(
        self,
        mut results: mpsc::Receiver<HeaderBundle>,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                bundle = results.recv() => match bundle {
                    Some(bundle) => self.dispatch(bundle).await,
                    None => return,
                },
                _ = cancel.changed() => return,
            }
        }
    }

    /// Fan one solution out to the network.
    pub async fn dispatch(&self, bundle: HeaderBundle) {
        let HeaderBundle { context, header } = bundle;
        info!(
            tier = %context,
            numbers = ?header.number,
            hash = %header.hash(),
            "block sealed"
        );

        if header.number[context.index()].is_none() {
            warn!(tier = %context, "sealed header missing its own tier number; dropped");
            return;
        }

        // Serializes with slot updates for the whole fan-out.
        let state = self.state.lock().await;

        if !self.registry.all_chains_online().await {
            warn!(tier = %context, "at least one chain is offline; solution discarded");
            return;
        }

        let location = state.location();

        // Phase A: external-block proofs from each certified body.
        let phase_a = external_routes(context)
            .iter()
            .filter_map(|(mined, targets)| {
                let pending = state.pending(*mined)?;
                let block = SealedBlock::new(header.clone(), pending.body.clone());
                let receipts = pending.receipts.clone();
                Some((*mined, *targets, block, receipts))
            })
            .collect::<Vec<_>>();
        join_all(phase_a.iter().map(|(mined, targets, block, receipts)| {
            broadcast_external_block(&self.registry, block, receipts, *mined, *targets)
        }))
        .await;

        // Phase B: sealed blocks to the mining chains, leaf first.
        let sealed_sends = sealed_targets(context)
            .iter()
            .filter_map(|tier| {
                let pending = state.pending(*tier)?;
                let block = SealedBlock::new(pending.header.clone(), pending.body.clone())
                    .with_seal(header.clone());
                Some((*tier, block))
            })
            .collect::<Vec<_>>();
        join_all(
            sealed_sends
                .iter()
                .map(|(tier, block)| self.send_sealed(*tier, block, location)),
        )
        .await;
    }

    /// Deliver the sealed block to the tier's mining chain.
    async fn send_sealed(&self, tier: Tier, block: &SealedBlock, location: Location) {
        let chain = location.at_tier(tier);
        match self.registry.client_at(chain) {
            Some(node) => match node.send_mined_block(block, true, true).await {
                Ok(()) => info!(%tier, %chain, number = ?block.header.number[tier.index()], "sealed block delivered"),
                Err(error) => warn!(%tier, %chain, %error, "sealed block delivery failed"),
            },
            None => warn!(%tier, %chain, "mining chain unavailable for sealed block"),
        }
    }
}
