//! Pending-header aggregation: one subscriber per selected chain, merged
//! into the combined header.

use crate::domain::RetryPolicy;
use crate::ports::NodeHandle;
use crate::registry::ClientRegistry;
use crate::state::CoordinatorState;
use shared_types::{Location, ReceiptBlock, Tier, TieredHeader};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often a still-syncing chain is re-polled.
const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The subscriber tasks bound to one mining slice.
///
/// Relocation shuts the old set down before binding the new one: the
/// cancellation signal stops the tasks, and awaiting their handles is
/// the launch barrier that guarantees no stale subscriber outlives the
/// switch.
pub struct SubscriberSet {
    cancel: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// A set with no tasks, used as a placeholder during swaps.
    pub fn empty() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel,
            handles: Vec::new(),
        }
    }

    /// Number of live task handles in the set.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the set holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every task to stop and wait for all of them to finish.
    /// Safe to call any number of times on clones of the signal.
    pub async fn shutdown(self) {
        let _ = self.cancel.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Maintains the combined pending header for the selected slice.
///
/// One subscriber task per chain (PRIME, selected REGION, selected ZONE)
/// feeds [`HeaderAggregator::update`]; every update publishes a
/// by-value snapshot onto a lossy-latest channel consumed by the mining
/// driver. Producers never block: an unconsumed snapshot is overwritten.
#[derive(Clone)]
pub struct HeaderAggregator {
    state: Arc<CoordinatorState>,
    registry: Arc<ClientRegistry>,
    updates: Arc<watch::Sender<Option<TieredHeader>>>,
}

impl HeaderAggregator {
    /// Create an aggregator over the shared state and registry.
    pub fn new(state: Arc<CoordinatorState>, registry: Arc<ClientRegistry>) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            state,
            registry,
            updates: Arc::new(updates),
        }
    }

    /// A receiver of combined-header snapshots for the mining driver.
    pub fn subscribe_updates(&self) -> watch::Receiver<Option<TieredHeader>> {
        self.updates.subscribe()
    }

    /// Spawn one subscriber task per chain of `location`'s slice.
    pub fn bind(&self, location: Location) -> SubscriberSet {
        let (cancel, cancel_rx) = watch::channel(false);
        let mut handles = Vec::new();
        for (tier, chain) in slice_chains(location) {
            match self.registry.client_at(chain) {
                Some(node) => {
                    let task = self
                        .clone()
                        .run_subscriber(tier, chain, node.clone(), cancel_rx.clone());
                    handles.push(tokio::spawn(task));
                }
                None => warn!(%chain, "chain unavailable; pending-block subscription skipped"),
            }
        }
        SubscriberSet { cancel, handles }
    }

    /// Issue a one-shot pending fetch per chain so mining can start
    /// before the first push notification arrives.
    pub fn prime(&self, location: Location, set: &mut SubscriberSet) {
        for (tier, chain) in slice_chains(location) {
            if let Some(node) = self.registry.client_at(chain) {
                let aggregator = self.clone();
                let node = node.clone();
                let mut cancel = set.cancel.subscribe();
                set.handles.push(tokio::spawn(async move {
                    aggregator.fetch_pending(tier, &node, &mut cancel).await;
                }));
            }
        }
    }

    async fn run_subscriber(
        self,
        tier: Tier,
        chain: Location,
        node: NodeHandle,
        mut cancel: watch::Receiver<bool>,
    ) {
        info!(%tier, %chain, "pending-block subscriber starting");

        // Wait out the chain's initial sync.
        loop {
            if *cancel.borrow() {
                return;
            }
            match node.sync_progress().await {
                Ok(None) => break,
                Ok(Some(sync)) => debug!(
                    %chain,
                    current = sync.current_block,
                    highest = sync.highest_block,
                    "chain still syncing"
                ),
                Err(error) => warn!(%chain, %error, "sync check failed"),
            }
            tokio::select! {
                _ = tokio::time::sleep(SYNC_POLL_INTERVAL) => {}
                _ = cancel.changed() => return,
            }
        }

        let mut notifications = match node.subscribe_pending_blocks().await {
            Ok(receiver) => receiver,
            Err(error) => {
                error!(%chain, %error, "pending-block subscription failed");
                return;
            }
        };
        info!(%tier, %chain, "subscribed to pending blocks");

        loop {
            tokio::select! {
                notification = notifications.recv() => match notification {
                    Some(_) => self.fetch_pending(tier, &node, &mut cancel).await,
                    None => {
                        warn!(%chain, "pending-block subscription closed");
                        return;
                    }
                },
                // Dropping the notification receiver unsubscribes.
                _ = cancel.changed() => return,
            }
        }
    }

    /// Fetch the chain's pending block, guarding against stale heights,
    /// and merge it into the combined header.
    pub(crate) async fn fetch_pending(
        &self,
        tier: Tier,
        node: &NodeHandle,
        cancel: &mut watch::Receiver<bool>,
    ) {
        let current = self.state.lock().await.slot_number(tier);
        let fresh =
            |block: &ReceiptBlock| block.number(tier).is_some() && block.number(tier) != current;

        let mut fetched = node.pending_block().await;

        // A pending block at the height already merged is stale;
        // refetch once before falling back to the retry loop.
        if let Ok(Some(block)) = &fetched {
            if block.number(tier).is_some() && block.number(tier) == current {
                warn!(%tier, number = ?current, "pending block height unchanged; refetching");
                fetched = node.pending_block().await;
            }
        }

        let block = match fetched {
            Ok(Some(block)) if fresh(&block) => block,
            other => {
                match &other {
                    Err(error) => warn!(%tier, %error, "pending block fetch failed"),
                    _ => warn!(%tier, "pending block absent or stale"),
                }
                let mut retry = RetryPolicy::new();
                loop {
                    if *cancel.borrow() {
                        return;
                    }
                    let delay = retry.next_delay();
                    if !delay.is_zero() {
                        debug!(
                            %tier,
                            attempt = retry.attempts(),
                            delay_secs = delay.as_secs(),
                            "waiting before pending block retry"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.changed() => return,
                        }
                    }
                    let current = self.state.lock().await.slot_number(tier);
                    match node.pending_block().await {
                        Ok(Some(block))
                            if block.number(tier).is_some() && block.number(tier) != current =>
                        {
                            break block
                        }
                        Ok(_) => {}
                        Err(error) => debug!(%tier, %error, "pending block fetch failed"),
                    }
                }
            }
        };
        self.update(tier, block).await;
    }

    /// Merge a pending block into the combined header and publish a
    /// snapshot for the mining driver.
    pub async fn update(&self, tier: Tier, block: ReceiptBlock) {
        let mut state = self.state.lock().await;
        state.apply_update(tier, block);
        let snapshot = state.snapshot();
        info!(
            %tier,
            number = ?snapshot.number[tier.index()],
            time = snapshot.time,
            location = %snapshot.location,
            "combined header updated"
        );
        // Lossy-latest: an unconsumed snapshot is replaced, never queued.
        let _ = self.updates.send(Some(snapshot));
    }
}

/// The three chains making up the slice at `location`.
fn slice_chains(location: Location) -> [(Tier, Location); 3] {
    [
        (Tier::Prime, Location::PRIME),
        (Tier::Region, location.at_tier(Tier::Region)),
        (Tier::Zone, location),
    ]
}
