//! Missing-external-block recovery with dominant-chain fallback.

mod common;

use common::{pending_block, settle, MockNetwork, Sent};
use coordinator::missing_blocks::MissingBlockResponder;
use coordinator::ports::{MissingBlockRequest, NodeHandle};
use primitive_types::H256;
use shared_types::{ExternalBlock, Location, SealedBlock, Tier};
use tokio::sync::watch;

fn sample_request(hash: H256, location: Location) -> MissingBlockRequest {
    MissingBlockRequest {
        hash,
        context: Tier::Zone,
        location,
    }
}

fn external_record(hash_marker: u8, context: Tier, location: Location) -> ExternalBlock {
    let pending = pending_block(context, hash_marker as u64, 10, location);
    ExternalBlock {
        header: pending.header,
        body: pending.body,
        receipts: pending.receipts,
        context,
    }
}

#[tokio::test]
async fn local_hit_answers_without_probing_prime() {
    let network = MockNetwork::full();
    let responder = MissingBlockResponder::new(network.registry());

    let owner_location = Location::new(2, 3);
    let pending = pending_block(Tier::Zone, 9, 10, owner_location);
    let block = SealedBlock::new(pending.header.clone(), pending.body.clone());
    let hash = block.hash();
    let owner = network.node_at(owner_location);
    owner.insert_block(block);
    owner.insert_receipts(hash, pending);

    let requester_location = Location::region(1);
    let requester: NodeHandle = network.node_at(requester_location).clone();
    responder
        .handle_request(
            &requester,
            requester_location,
            sample_request(hash, owner_location),
        )
        .await;

    assert_eq!(
        network.node_at(requester_location).sent(),
        vec![Sent::External {
            context: Tier::Zone
        }]
    );
    assert!(network.prime.external_lookups().is_empty());
}

#[tokio::test]
async fn prime_fallback_issues_one_probe() {
    let network = MockNetwork::full();
    let responder = MissingBlockResponder::new(network.registry());

    let owner_location = Location::new(1, 2);
    let hash = H256::repeat_byte(0x5A);
    network
        .prime
        .insert_external(hash, external_record(7, Tier::Zone, owner_location));

    let requester_location = Location::new(3, 3);
    let requester: NodeHandle = network.node_at(requester_location).clone();
    responder
        .handle_request(
            &requester,
            requester_location,
            sample_request(hash, owner_location),
        )
        .await;

    assert_eq!(network.node_at(requester_location).external_count(), 1);
    assert_eq!(network.prime.external_lookups(), vec![(hash, Tier::Zone)]);
    // The region was never consulted.
    assert!(network
        .node_at(Location::region(1))
        .external_lookups()
        .is_empty());
}

#[tokio::test]
async fn region_fallback_probes_prime_first() {
    let network = MockNetwork::full();
    let responder = MissingBlockResponder::new(network.registry());

    // ZONE(2,3) has no block, PRIME has no record, REGION 2 does.
    let owner_location = Location::new(2, 3);
    let hash = H256::repeat_byte(0x77);
    network
        .node_at(Location::region(2))
        .insert_external(hash, external_record(3, Tier::Zone, owner_location));

    let requester_location = Location::region(2);
    let requester: NodeHandle = network.node_at(requester_location).clone();
    responder
        .handle_request(
            &requester,
            requester_location,
            sample_request(hash, owner_location),
        )
        .await;

    // Exactly one reply, reconstructed from the region's record.
    assert_eq!(network.node_at(requester_location).external_count(), 1);
    // Probe order: PRIME, then the region above the block's location.
    assert_eq!(network.prime.external_lookups(), vec![(hash, Tier::Zone)]);
    assert_eq!(
        network.node_at(Location::region(2)).external_lookups(),
        vec![(hash, Tier::Zone)]
    );
}

#[tokio::test]
async fn triple_miss_drops_request_silently() {
    let network = MockNetwork::full();
    let responder = MissingBlockResponder::new(network.registry());

    let requester_location = Location::new(1, 1);
    let requester: NodeHandle = network.node_at(requester_location).clone();
    responder
        .handle_request(
            &requester,
            requester_location,
            sample_request(H256::repeat_byte(0xEE), Location::new(3, 1)),
        )
        .await;

    for (_, node) in network.all() {
        assert!(node.sent().is_empty());
    }
}

#[tokio::test]
async fn subscription_drives_responder_end_to_end() {
    let network = MockNetwork::full();
    let responder = MissingBlockResponder::new(network.registry());
    let (cancel, _) = watch::channel(false);
    let handles = responder.spawn_all(&cancel);
    assert_eq!(handles.len(), 13);
    settle().await;

    let owner_location = Location::new(1, 3);
    let hash = H256::repeat_byte(0x42);
    network
        .prime
        .insert_external(hash, external_record(9, Tier::Zone, owner_location));

    let requester_location = Location::region(3);
    network
        .node_at(requester_location)
        .push_missing_request(sample_request(hash, owner_location))
        .await;
    settle().await;

    assert_eq!(network.node_at(requester_location).external_count(), 1);
    let _ = cancel.send(true);
}
