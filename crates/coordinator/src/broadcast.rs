//! External-block delivery shared by the head propagator and the result
//! dispatcher.

use crate::registry::ClientRegistry;
use futures_util::future::join_all;
use shared_types::{Location, Receipt, SealedBlock, Tier};
use tracing::warn;

/// Deliver `block` as an external-block proof across the network.
///
/// `mined` annotates the tier the block was produced at. The proof goes
/// to (i) the chains owning the block's location at each tier in
/// `targets`, and (ii) every REGION and ZONE node that is not the
/// block's own chain. Sends run concurrently; failures are logged and do
/// not abort the remaining deliveries. Returns the number of successful
/// sends.
pub(crate) async fn broadcast_external_block(
    registry: &ClientRegistry,
    block: &SealedBlock,
    receipts: &[Receipt],
    mined: Tier,
    targets: [Tier; 2],
) -> usize {
    let owner = block.header.location;
    if owner == Location::PRIME && mined != Tier::Prime {
        // A non-prime block without a location cannot be routed.
        warn!(%mined, "external block carries no location; dropped");
        return 0;
    }

    let mut sends = Vec::new();

    // The mining slice at each addressed tier.
    for tier in targets {
        let chain = owner.at_tier(tier);
        match registry.client_at(chain) {
            Some(node) => sends.push((chain, node)),
            None => warn!(%chain, "external block target unavailable"),
        }
    }

    // Every other REGION and ZONE node.
    for (chain, node) in registry.nodes() {
        let skip = match chain.tier() {
            Tier::Prime => true,
            Tier::Region => chain.region == owner.region,
            Tier::Zone => chain.region == owner.region && chain.zone == owner.zone,
        };
        if !skip {
            sends.push((chain, node));
        }
    }

    let results = join_all(sends.into_iter().map(|(chain, node)| async move {
        match node.send_external_block(block, receipts, mined).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%chain, %error, "external block delivery failed");
                false
            }
        }
    }))
    .await;

    results.into_iter().filter(|ok| *ok).count()
}
