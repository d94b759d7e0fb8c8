//! Auto-location: follow the lowest-difficulty REGION/ZONE pair.

use crate::aggregator::{HeaderAggregator, SubscriberSet};
use crate::registry::ClientRegistry;
use crate::state::CoordinatorState;
use primitive_types::U256;
use shared_types::{Location, Tier, REGIONS, ZONES_PER_REGION};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Periodically re-evaluates the mining slice and atomically rebinds the
/// pending-header subscriptions when a cheaper one appears.
pub struct AutoLocator {
    registry: Arc<ClientRegistry>,
    state: Arc<CoordinatorState>,
}

impl AutoLocator {
    /// Create a locator over the registry and shared state.
    pub fn new(registry: Arc<ClientRegistry>, state: Arc<CoordinatorState>) -> Self {
        Self { registry, state }
    }

    /// The `(region, zone)` pair with the lowest difficulty.
    pub async fn find_best_location(&self) -> Option<Location> {
        Self::scan(&self.registry).await
    }

    /// Scan the network for the cheapest slice: first the region with
    /// the smallest `difficulty[1]`, then the zone within it with the
    /// smallest `difficulty[2]`. Unreachable chains are skipped; returns
    /// `None` when no region or no zone answered. Also used once at
    /// startup to pick the initial slice in auto mode.
    pub async fn scan(registry: &ClientRegistry) -> Option<Location> {
        let mut best_region: Option<(u8, U256)> = None;
        for r in 1..=REGIONS as u8 {
            let Some(node) = registry.region(r) else {
                continue;
            };
            match node.header_by_number(None).await {
                Ok(header) => {
                    let difficulty = header.difficulty[Tier::Region.index()];
                    info!(region = r, %difficulty, "region difficulty");
                    if best_region.map_or(true, |(_, best)| difficulty < best) {
                        best_region = Some((r, difficulty));
                    }
                }
                Err(error) => warn!(region = r, %error, "region head lookup failed"),
            }
        }
        let (region, _) = best_region?;

        let mut best_zone: Option<(u8, U256)> = None;
        for z in 1..=ZONES_PER_REGION as u8 {
            let Some(node) = registry.zone(region, z) else {
                continue;
            };
            match node.header_by_number(None).await {
                Ok(header) => {
                    let difficulty = header.difficulty[Tier::Zone.index()];
                    info!(region, zone = z, %difficulty, "zone difficulty");
                    if best_zone.map_or(true, |(_, best)| difficulty < best) {
                        best_zone = Some((z, difficulty));
                    }
                }
                Err(error) => warn!(region, zone = z, %error, "zone head lookup failed"),
            }
        }
        let (zone, _) = best_zone?;

        let location = Location::new(region, zone);
        info!(%location, "best mining location");
        Some(location)
    }

    /// Atomically move the mining slice to `target`: stop the old
    /// subscriber tasks, wait for them to finish, swap the location, and
    /// bind fresh subscribers primed with one-shot pending fetches. No
    /// in-flight work is dropped: the old tasks drain before the state
    /// flips.
    pub async fn relocate(
        &self,
        aggregator: &HeaderAggregator,
        subscribers: SubscriberSet,
        target: Location,
    ) -> SubscriberSet {
        subscribers.shutdown().await;
        self.state.lock().await.set_location(target);
        let mut replacement = aggregator.bind(target);
        aggregator.prime(target, &mut replacement);
        replacement
    }

    /// Re-evaluate every `timer_minutes` until `cancel` fires. Owns the
    /// subscriber set for the lifetime of the loop and shuts it down on
    /// exit.
    pub async fn run(
        self,
        aggregator: HeaderAggregator,
        mut subscribers: SubscriberSet,
        timer_minutes: u64,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(Duration::from_secs(timer_minutes * 60));
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let current = self.state.lock().await.location();
                    let Some(best) = self.find_best_location().await else {
                        warn!("no reachable region/zone pair; keeping current location");
                        continue;
                    };
                    if best != current {
                        info!(%current, %best, "relocating mining slice");
                        let old = std::mem::replace(&mut subscribers, SubscriberSet::empty());
                        subscribers = self.relocate(&aggregator, old, best).await;
                    }
                }
                _ = cancel.changed() => {
                    subscribers.shutdown().await;
                    return;
                }
            }
        }
    }
}
