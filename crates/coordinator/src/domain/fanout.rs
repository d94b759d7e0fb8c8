//! Static routing tables for solution and head fan-out.
//!
//! A solution at a given tier certifies blocks at that tier and every
//! weaker one, so the dispatch policy is keyed on the solution's
//! context: which pending bodies become external proofs, which tiers
//! receive them, and which chains get the sealed block itself.

use shared_types::Tier;

use Tier::{Prime, Region, Zone};

/// Phase-A routes for a solution at `context`: for each entry, the
/// pending body at `.0` is combined with the sealed header and delivered
/// as an external-block proof to the two tiers in `.1`.
pub fn external_routes(context: Tier) -> &'static [(Tier, [Tier; 2])] {
    match context {
        Prime => &[
            (Prime, [Region, Zone]),
            (Region, [Prime, Zone]),
            (Zone, [Prime, Region]),
        ],
        Region => &[(Region, [Prime, Zone]), (Zone, [Prime, Region])],
        Zone => &[(Zone, [Prime, Region])],
    }
}

/// Phase-B deliveries for a solution at `context`: the tiers whose
/// mining node receives the sealed block, leaf first.
pub fn sealed_targets(context: Tier) -> &'static [Tier] {
    match context {
        Prime => &[Zone, Region, Prime],
        Region => &[Zone, Region],
        Zone => &[Zone],
    }
}

/// The two tiers that receive the external-block proof of a new head
/// observed at `origin`.
pub fn head_broadcast_tiers(origin: Tier) -> [Tier; 2] {
    match origin {
        Prime => [Region, Zone],
        Region => [Prime, Zone],
        Zone => [Prime, Region],
    }
}

/// The child tiers a head at `origin` implies blocks for: a PRIME head
/// also certifies a REGION and a ZONE block, a REGION head a ZONE block.
pub fn implied_child_tiers(origin: Tier) -> &'static [Tier] {
    match origin {
        Prime => &[Region, Zone],
        Region => &[Zone],
        Zone => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prime_solution_routes_three_bodies() {
        let routes = external_routes(Prime);
        assert_eq!(routes.len(), 3);
        // Every route targets the two tiers other than the body's own.
        for (body, targets) in routes {
            assert!(!targets.contains(body));
            assert_eq!(targets.len(), 2);
        }
        assert_eq!(sealed_targets(Prime), &[Zone, Region, Prime]);
    }

    #[test]
    fn region_solution_skips_prime_body() {
        let routes = external_routes(Region);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].0, Region);
        assert_eq!(routes[1].0, Zone);
        assert_eq!(sealed_targets(Region), &[Zone, Region]);
    }

    #[test]
    fn zone_solution_is_minimal() {
        assert_eq!(external_routes(Zone), &[(Zone, [Prime, Region])]);
        assert_eq!(sealed_targets(Zone), &[Zone]);
    }

    #[test]
    fn head_broadcast_excludes_origin() {
        for origin in Tier::ALL {
            let targets = head_broadcast_tiers(origin);
            assert!(!targets.contains(&origin));
        }
    }

    #[test]
    fn child_materialization_follows_dominance() {
        assert_eq!(implied_child_tiers(Prime), &[Region, Zone]);
        assert_eq!(implied_child_tiers(Region), &[Zone]);
        assert!(implied_child_tiers(Zone).is_empty());
    }
}
