//! Network topology: tiers and locations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of tiers in the hierarchy (PRIME, REGION, ZONE).
pub const TIER_COUNT: usize = 3;

/// Number of REGION chains under PRIME.
pub const REGIONS: usize = 3;

/// Number of ZONE chains under each REGION.
pub const ZONES_PER_REGION: usize = 3;

/// A tier of the hierarchy, strongest difficulty first.
///
/// The discriminant doubles as the slot index into the per-tier arrays of
/// [`crate::TieredHeader`], and as the `context` annotation on external
/// block messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tier {
    /// The single top-level chain.
    Prime = 0,
    /// A mid-level chain.
    Region = 1,
    /// A leaf chain.
    Zone = 2,
}

impl Tier {
    /// All tiers, strongest first.
    pub const ALL: [Tier; TIER_COUNT] = [Tier::Prime, Tier::Region, Tier::Zone];

    /// Slot index for per-tier arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tier for a slot index, if in range.
    pub fn from_index(index: usize) -> Option<Tier> {
        match index {
            0 => Some(Tier::Prime),
            1 => Some(Tier::Region),
            2 => Some(Tier::Zone),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Prime => write!(f, "PRIME"),
            Tier::Region => write!(f, "REGION"),
            Tier::Zone => write!(f, "ZONE"),
        }
    }
}

/// Identifies one chain in the hierarchy as a `(region, zone)` byte pair.
///
/// `(0, 0)` is PRIME, `(r, 0)` is REGION `r`, `(r, z)` is ZONE `z` under
/// REGION `r`. Region and zone ordinals are 1-based on the wire; the
/// `*_index` accessors convert to 0-based registry indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    /// 1-based region ordinal, 0 for PRIME.
    pub region: u8,
    /// 1-based zone ordinal, 0 for PRIME and REGION locations.
    pub zone: u8,
}

impl Location {
    /// The PRIME location `(0, 0)`.
    pub const PRIME: Location = Location { region: 0, zone: 0 };

    /// Build a location from 1-based ordinals.
    pub fn new(region: u8, zone: u8) -> Self {
        Self { region, zone }
    }

    /// Build a REGION location `(r, 0)`.
    pub fn region(region: u8) -> Self {
        Self { region, zone: 0 }
    }

    /// Location values arriving from the CLI or config are 64-bit
    /// integers; only the low byte of the little-endian encoding is
    /// significant on the wire.
    pub fn from_wire(region: u64, zone: u64) -> Self {
        Self {
            region: region.to_le_bytes()[0],
            zone: zone.to_le_bytes()[0],
        }
    }

    /// Whether this names the PRIME chain.
    pub fn is_prime(&self) -> bool {
        self.region == 0 && self.zone == 0
    }

    /// Whether this names a REGION chain.
    pub fn is_region(&self) -> bool {
        self.region != 0 && self.zone == 0
    }

    /// Whether this names a ZONE chain.
    pub fn is_zone(&self) -> bool {
        self.region != 0 && self.zone != 0
    }

    /// The tier this location names.
    pub fn tier(&self) -> Tier {
        if self.is_prime() {
            Tier::Prime
        } else if self.is_region() {
            Tier::Region
        } else {
            Tier::Zone
        }
    }

    /// 0-based region index for registry lookup.
    ///
    /// Returns `None` for PRIME.
    pub fn region_index(&self) -> Option<usize> {
        (self.region != 0).then(|| self.region as usize - 1)
    }

    /// 0-based zone index for registry lookup.
    ///
    /// Returns `None` unless this is a ZONE location.
    pub fn zone_index(&self) -> Option<usize> {
        (self.is_zone()).then(|| self.zone as usize - 1)
    }

    /// The chain at `tier` that owns this location: PRIME for
    /// [`Tier::Prime`], `(r, 0)` for [`Tier::Region`], the location
    /// itself for [`Tier::Zone`].
    pub fn at_tier(&self, tier: Tier) -> Location {
        match tier {
            Tier::Prime => Location::PRIME,
            Tier::Region => Location::region(self.region),
            Tier::Zone => *self,
        }
    }

    /// Two-byte wire form.
    pub fn to_bytes(&self) -> [u8; 2] {
        [self.region, self.zone]
    }

    /// Parse the two-byte wire form.
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            region: bytes[0],
            zone: bytes[1],
        }
    }

    /// Whether the ordinals fit the configured topology.
    pub fn in_bounds(&self) -> bool {
        self.region as usize <= REGIONS && self.zone as usize <= ZONES_PER_REGION
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier() {
            Tier::Prime => write!(f, "prime"),
            Tier::Region => write!(f, "region-{}", self.region),
            Tier::Zone => write!(f, "zone-{}-{}", self.region, self.zone),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_index_round_trip() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_index(tier.index()), Some(tier));
        }
        assert_eq!(Tier::from_index(3), None);
    }

    #[test]
    fn location_tiers() {
        assert!(Location::PRIME.is_prime());
        assert!(Location::region(2).is_region());
        assert!(Location::new(2, 1).is_zone());
        assert_eq!(Location::new(2, 1).tier(), Tier::Zone);
        assert_eq!(Location::region(3).tier(), Tier::Region);
        assert_eq!(Location::PRIME.tier(), Tier::Prime);
    }

    #[test]
    fn location_indices_are_zero_based() {
        let loc = Location::new(2, 3);
        assert_eq!(loc.region_index(), Some(1));
        assert_eq!(loc.zone_index(), Some(2));
        assert_eq!(Location::PRIME.region_index(), None);
        assert_eq!(Location::region(1).zone_index(), None);
    }

    #[test]
    fn wire_encoding_takes_low_byte() {
        let loc = Location::from_wire(0x0102, 0x0201);
        assert_eq!(loc, Location::new(0x02, 0x01));
        assert_eq!(loc.to_bytes(), [0x02, 0x01]);
        assert_eq!(Location::from_bytes([0x02, 0x01]), loc);
    }

    #[test]
    fn at_tier_projects_ownership() {
        let loc = Location::new(2, 3);
        assert_eq!(loc.at_tier(Tier::Prime), Location::PRIME);
        assert_eq!(loc.at_tier(Tier::Region), Location::region(2));
        assert_eq!(loc.at_tier(Tier::Zone), loc);
    }

    #[test]
    fn bounds_check() {
        assert!(Location::new(3, 3).in_bounds());
        assert!(!Location::new(4, 1).in_bounds());
        assert!(!Location::new(1, 4).in_bounds());
    }
}
