//! Client registry: one slot per chain, stable indexing under partial
//! availability.

use crate::error::{CoordinatorError, Result};
use crate::ports::{NodeHandle, NodeRpc};
use shared_types::{Location, Tier, REGIONS, ZONES_PER_REGION};
use tracing::warn;

/// Holds the RPC handle for PRIME, each REGION and each ZONE.
///
/// Slots for chains that were not configured or could not be dialed stay
/// empty; the layout is fixed so `(r, z)` indexing is stable regardless
/// of which chains are reachable. Construction fails only when every
/// slot is empty.
pub struct ClientRegistry {
    prime: Option<NodeHandle>,
    regions: Vec<Option<NodeHandle>>,
    zones: Vec<Vec<Option<NodeHandle>>>,
}

impl ClientRegistry {
    /// Build a registry from pre-dialed handles.
    ///
    /// Shorter vectors are padded with empty slots up to the configured
    /// topology.
    pub fn new(
        prime: Option<NodeHandle>,
        mut regions: Vec<Option<NodeHandle>>,
        mut zones: Vec<Vec<Option<NodeHandle>>>,
    ) -> Result<Self> {
        regions.resize_with(REGIONS, || None);
        zones.resize_with(REGIONS, Vec::new);
        for row in &mut zones {
            row.resize_with(ZONES_PER_REGION, || None);
        }

        let registry = Self {
            prime,
            regions,
            zones,
        };
        if registry.nodes().next().is_none() {
            return Err(CoordinatorError::NoClients);
        }
        Ok(registry)
    }

    /// The PRIME client, if available.
    pub fn prime(&self) -> Option<&NodeHandle> {
        self.prime.as_ref()
    }

    /// The client of REGION `r` (1-based), if available.
    pub fn region(&self, r: u8) -> Option<&NodeHandle> {
        let index = (r as usize).checked_sub(1)?;
        self.regions.get(index)?.as_ref()
    }

    /// The client of ZONE `(r, z)` (1-based), if available.
    pub fn zone(&self, r: u8, z: u8) -> Option<&NodeHandle> {
        let region = (r as usize).checked_sub(1)?;
        let zone = (z as usize).checked_sub(1)?;
        self.zones.get(region)?.get(zone)?.as_ref()
    }

    /// The client owning `location`, if available.
    pub fn client_at(&self, location: Location) -> Option<&NodeHandle> {
        match location.tier() {
            Tier::Prime => self.prime(),
            Tier::Region => self.region(location.region),
            Tier::Zone => self.zone(location.region, location.zone),
        }
    }

    /// Whether a client is registered for `location`.
    pub fn is_available(&self, location: Location) -> bool {
        self.client_at(location).is_some()
    }

    /// Whether every chain of the topology has a registered client.
    pub fn all_available(&self) -> bool {
        self.prime.is_some()
            && self.regions.iter().all(Option::is_some)
            && self
                .zones
                .iter()
                .all(|row| row.iter().all(Option::is_some))
    }

    /// All registered clients with their locations: PRIME first, then
    /// regions, then zones in `(r, z)` order.
    pub fn nodes(&self) -> impl Iterator<Item = (Location, &NodeHandle)> {
        let prime = self
            .prime
            .iter()
            .map(|node| (Location::PRIME, node));
        let regions = self.regions.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref()
                .map(|node| (Location::region(i as u8 + 1), node))
        });
        let zones = self.zones.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().filter_map(move |(z, slot)| {
                slot.as_ref()
                    .map(|node| (Location::new(r as u8 + 1, z as u8 + 1), node))
            })
        });
        prime.chain(regions).chain(zones)
    }

    /// Cheap reachability probe: a head lookup that succeeds.
    pub async fn check_online(node: &dyn NodeRpc) -> bool {
        match node.header_by_number(None).await {
            Ok(_) => true,
            Err(error) => {
                warn!(%error, "chain connection lost");
                false
            }
        }
    }

    /// Whether every chain of the topology is registered and currently
    /// answering. Gates result dispatch: partial fan-out is never
    /// attempted.
    pub async fn all_chains_online(&self) -> bool {
        if !self.all_available() {
            return false;
        }
        for (location, node) in self.nodes() {
            if !Self::check_online(node.as_ref()).await {
                warn!(%location, "chain offline");
                return false;
            }
        }
        true
    }
}
