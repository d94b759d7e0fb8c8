//! Pull-based recovery of external blocks a node could not assemble.

use crate::ports::{MissingBlockRequest, NodeHandle};
use crate::registry::ClientRegistry;
use shared_types::{Location, Receipt, SealedBlock, Tier};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Answers missing-external-block requests.
///
/// One task per registered node. A request is resolved against the chain
/// owning the block first, then against the dominant chains' external
/// views (PRIME, then the region of the block's location). A request
/// that misses all three is logged and dropped; the requester will ask
/// again if it still needs the block.
#[derive(Clone)]
pub struct MissingBlockResponder {
    registry: Arc<ClientRegistry>,
}

impl MissingBlockResponder {
    /// Create a responder over the registry.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Spawn one responder task per registered node.
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

    async fn run_node(
        self,
        location: Location,
        node: NodeHandle,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut requests = match node.subscribe_missing_external_blocks().await {
            Ok(receiver) => receiver,
            Err(error) => {
                warn!(%location, %error, "missing-block subscription failed");
                return;
            }
        };
        debug!(%location, "subscribed to missing-block requests");

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(&node, location, request).await,
                    None => {
                        warn!(%location, "missing-block subscription closed");
                        return;
                    }
                },
                _ = cancel.changed() => return,
            }
        }
    }

    /// Resolve one request and reply to the asking node. No retries: a
    /// miss on all three sources drops the request.
    pub async fn handle_request(
        &self,
        requester: &NodeHandle,
        requester_location: Location,
        request: MissingBlockRequest,
    ) {
        let MissingBlockRequest {
            hash,
            context,
            location,
        } = request;

        if let Some((block, receipts)) = self.resolve(hash, context, location).await {
            info!(
                %requester_location,
                %hash,
                %context,
                "replying with recovered external block"
            );
            if let Err(error) = requester
                .send_external_block(&block, &receipts, context)
                .await
            {
                warn!(%requester_location, %hash, %error, "external block reply failed");
            }
        } else {
            warn!(
                %hash,
                %context,
                %location,
                "external block unresolved on owner, prime and region; dropping request"
            );
        }
    }

    /// Owner chain first, then PRIME's external view, then the region's.
    async fn resolve(
        &self,
        hash: primitive_types::H256,
        context: Tier,
        location: Location,
    ) -> Option<(SealedBlock, Vec<Receipt>)> {
        let owner_chain = location.at_tier(context);
        if let Some(owner) = self.registry.client_at(owner_chain) {
            match owner.block_by_hash(hash).await {
                Ok(Some(block)) => match owner.block_receipts(hash).await {
                    Ok(Some(receipt_block)) => return Some((block, receipt_block.receipts)),
                    Ok(None) => {
                        warn!(%owner_chain, %hash, "owner returned block but no receipts");
                        return None;
                    }
                    Err(error) => {
                        warn!(%owner_chain, %hash, %error, "receipt lookup on owner failed");
                        return None;
                    }
                },
                Ok(None) => {}
                Err(error) => debug!(%owner_chain, %hash, %error, "owner block lookup failed"),
            }
        }

        // Reconstruct from a dominant chain's backup: PRIME, then the
        // region above the block's location.
        if let Some(prime) = self.registry.prime() {
            match prime.external_block(hash, context).await {
                Ok(Some(external)) => {
                    let receipts = external.receipts.clone();
                    return Some((external.into_sealed(), receipts));
                }
                Ok(None) => {}
                Err(error) => debug!(%hash, %error, "prime external lookup failed"),
            }
        }

        if let Some(region) = self.registry.region(location.region) {
            match region.external_block(hash, context).await {
                Ok(Some(external)) => {
                    let receipts = external.receipts.clone();
                    return Some((external.into_sealed(), receipts));
                }
                Ok(None) => {}
                Err(error) => debug!(%hash, %error, "region external lookup failed"),
            }
        }

        None
    }
}
