//! The combined-header merge protocol.

use shared_types::{Location, ReceiptBlock, Tier, TieredHeader, TIER_COUNT};

/// The coordinator's shared mining state: the combined header plus the
/// latest pending block per tier.
///
/// Mutated only under the coordinator lock (see
/// [`crate::state::CoordinatorState`]); the invariants below hold after
/// every [`CombinedState::apply_update`]:
///
/// - the updated slot's number equals the incoming block's number,
/// - `time` never decreases,
/// - the seal is cleared,
/// - `location` equals the currently selected slice.
#[derive(Debug)]
pub struct CombinedState {
    header: TieredHeader,
    pending: [Option<ReceiptBlock>; TIER_COUNT],
    location: Location,
}

impl CombinedState {
    /// Fresh state bound to `location`.
    pub fn new(location: Location) -> Self {
        let mut header = TieredHeader::default();
        header.location = location;
        Self {
            header,
            pending: Default::default(),
            location,
        }
    }

    /// The currently selected mining slice.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Rebind the state to a new slice. Existing slots are kept; they
    /// are replaced as the new subscriptions deliver pending blocks.
    pub fn set_location(&mut self, location: Location) {
        self.location = location;
        self.header.location = location;
    }

    /// Merge a freshly fetched pending block into tier `tier`.
    pub fn apply_update(&mut self, tier: Tier, block: ReceiptBlock) {
        self.header.copy_slot_from(tier, &block.header);
        self.header.clear_seal();
        self.header.time = self.header.time.max(block.header.time);
        self.header.location = self.location;
        self.pending[tier.index()] = Some(block);
    }

    /// The combined header's number at a tier slot.
    pub fn slot_number(&self, tier: Tier) -> Option<u64> {
        self.header.number[tier.index()]
    }

    /// The stored pending block for a tier.
    pub fn pending(&self, tier: Tier) -> Option<&ReceiptBlock> {
        self.pending[tier.index()].as_ref()
    }

    /// A by-value copy of the combined header for the mining driver.
    pub fn snapshot(&self) -> TieredHeader {
        self.header.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::{H256, U256};
    use shared_types::BlockBody;

    fn pending_block(tier: Tier, number: u64, time: u64) -> ReceiptBlock {
        let mut header = TieredHeader::default();
        header.number[tier.index()] = Some(number);
        header.difficulty[tier.index()] = U256::from(1000u64);
        header.parent_hash[tier.index()] = H256::repeat_byte(number as u8);
        header.time = time;
        ReceiptBlock {
            header,
            body: BlockBody::default(),
            receipts: vec![],
        }
    }

    #[test]
    fn update_copies_slot_and_stores_pending() {
        let mut state = CombinedState::new(Location::new(2, 1));
        state.apply_update(Tier::Zone, pending_block(Tier::Zone, 42, 100));

        assert_eq!(state.slot_number(Tier::Zone), Some(42));
        assert_eq!(state.snapshot().parent_hash[2], H256::repeat_byte(42));
        assert!(state.pending(Tier::Zone).is_some());
        assert!(state.pending(Tier::Prime).is_none());
    }

    #[test]
    fn time_is_monotonic() {
        let mut state = CombinedState::new(Location::new(1, 1));
        state.apply_update(Tier::Prime, pending_block(Tier::Prime, 1, 100));
        assert_eq!(state.snapshot().time, 100);

        // An older timestamp must not move time backwards.
        state.apply_update(Tier::Region, pending_block(Tier::Region, 2, 50));
        assert_eq!(state.snapshot().time, 100);

        state.apply_update(Tier::Zone, pending_block(Tier::Zone, 3, 200));
        assert_eq!(state.snapshot().time, 200);
    }

    #[test]
    fn update_clears_seal_and_stamps_location() {
        let location = Location::new(3, 2);
        let mut state = CombinedState::new(location);

        let mut block = pending_block(Tier::Prime, 7, 10);
        block.header.nonce = 1234;
        block.header.location = Location::new(1, 1);
        state.apply_update(Tier::Prime, block);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.nonce, 0);
        assert_eq!(snapshot.mix_digest, H256::zero());
        assert_eq!(snapshot.location, location);
    }

    #[test]
    fn relocation_restamps_future_updates() {
        let mut state = CombinedState::new(Location::new(1, 1));
        state.set_location(Location::new(2, 3));
        state.apply_update(Tier::Zone, pending_block(Tier::Zone, 9, 1));
        assert_eq!(state.snapshot().location, Location::new(2, 3));
        assert_eq!(state.location(), Location::new(2, 3));
    }
}
