//! In-memory node implementations for driving the coordination services.

// Each integration-test binary compiles this module separately and uses
// a different subset of the helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use coordinator::ports::{MissingBlockRequest, NodeHandle, NodeRpc, SyncState};
use coordinator::registry::ClientRegistry;
use parking_lot::Mutex;
use primitive_types::{H256, U256};
use shared_types::{
    BlockBody, ClientError, ExternalBlock, Location, Receipt, ReceiptBlock, SealedBlock, Tier,
    TieredHeader, Transaction, REGIONS, ZONES_PER_REGION,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A message a mock node received from the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    /// `send_external_block` with the mined-context annotation.
    External { context: Tier },
    /// `send_mined_block`.
    Mined,
}

/// Scriptable in-memory chain node.
#[derive(Default)]
pub struct MockNode {
    online: AtomicBool,
    sent: Mutex<Vec<Sent>>,
    pending_queue: Mutex<VecDeque<Option<ReceiptBlock>>>,
    default_pending: Mutex<Option<ReceiptBlock>>,
    pending_calls: Mutex<u64>,
    latest_header: Mutex<TieredHeader>,
    blocks: Mutex<HashMap<H256, SealedBlock>>,
    receipt_blocks: Mutex<HashMap<H256, ReceiptBlock>>,
    externals: Mutex<HashMap<(H256, Tier), ExternalBlock>>,
    external_lookups: Mutex<Vec<(H256, Tier)>>,
    pending_subs: Mutex<Vec<mpsc::Sender<TieredHeader>>>,
    head_subs: Mutex<Vec<mpsc::Sender<TieredHeader>>>,
    missing_subs: Mutex<Vec<mpsc::Sender<MissingBlockRequest>>>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        let node = Self::default();
        node.online.store(true, Ordering::SeqCst);
        Arc::new(node)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Queue one scripted `pending_block` response; once the queue is
    /// drained the default pending block is served.
    pub fn queue_pending(&self, block: Option<ReceiptBlock>) {
        self.pending_queue.lock().push_back(block);
    }

    pub fn set_default_pending(&self, block: ReceiptBlock) {
        *self.default_pending.lock() = Some(block);
    }

    pub fn set_latest_header(&self, header: TieredHeader) {
        *self.latest_header.lock() = header;
    }

    pub fn insert_block(&self, block: SealedBlock) {
        self.blocks.lock().insert(block.hash(), block);
    }

    pub fn insert_receipts(&self, hash: H256, block: ReceiptBlock) {
        self.receipt_blocks.lock().insert(hash, block);
    }

    pub fn insert_external(&self, hash: H256, external: ExternalBlock) {
        self.externals.lock().insert((hash, external.context), external);
    }

    /// Deliver a pending-block notification to every subscriber.
    pub async fn push_pending_notification(&self) {
        let senders = self.pending_subs.lock().clone();
        for sender in senders {
            let _ = sender.send(TieredHeader::default()).await;
        }
    }

    /// Deliver a new-head event to every subscriber.
    pub async fn push_head(&self, header: TieredHeader) {
        let senders = self.head_subs.lock().clone();
        for sender in senders {
            let _ = sender.send(header.clone()).await;
        }
    }

    /// Deliver a missing-block request to every subscriber.
    pub async fn push_missing_request(&self, request: MissingBlockRequest) {
        let senders = self.missing_subs.lock().clone();
        for sender in senders {
            let _ = sender.send(request).await;
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn external_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, Sent::External { .. }))
            .count()
    }

    pub fn mined_count(&self) -> usize {
        self.sent().iter().filter(|m| matches!(m, Sent::Mined)).count()
    }

    /// External-view probes this node answered, in call order.
    pub fn external_lookups(&self) -> Vec<(H256, Tier)> {
        self.external_lookups.lock().clone()
    }

    pub fn pending_calls(&self) -> u64 {
        *self.pending_calls.lock()
    }
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn sync_progress(&self) -> Result<Option<SyncState>, ClientError> {
        Ok(None)
    }

    async fn subscribe_pending_blocks(
        &self,
    ) -> Result<mpsc::Receiver<TieredHeader>, ClientError> {
        let (tx, rx) = mpsc::channel(16);
        self.pending_subs.lock().push(tx);
        Ok(rx)
    }

    async fn subscribe_new_heads(&self) -> Result<mpsc::Receiver<TieredHeader>, ClientError> {
        let (tx, rx) = mpsc::channel(16);
        self.head_subs.lock().push(tx);
        Ok(rx)
    }

    async fn subscribe_missing_external_blocks(
        &self,
    ) -> Result<mpsc::Receiver<MissingBlockRequest>, ClientError> {
        let (tx, rx) = mpsc::channel(16);
        self.missing_subs.lock().push(tx);
        Ok(rx)
    }

    async fn pending_block(&self) -> Result<Option<ReceiptBlock>, ClientError> {
        *self.pending_calls.lock() += 1;
        if let Some(scripted) = self.pending_queue.lock().pop_front() {
            return Ok(scripted);
        }
        Ok(self.default_pending.lock().clone())
    }

    async fn block_by_hash(&self, hash: H256) -> Result<Option<SealedBlock>, ClientError> {
        Ok(self.blocks.lock().get(&hash).cloned())
    }

    async fn header_by_number(&self, _number: Option<u64>) -> Result<TieredHeader, ClientError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(ClientError::Connection("node offline".into()));
        }
        Ok(self.latest_header.lock().clone())
    }

    async fn block_receipts(&self, hash: H256) -> Result<Option<ReceiptBlock>, ClientError> {
        Ok(self.receipt_blocks.lock().get(&hash).cloned())
    }

    async fn external_block(
        &self,
        hash: H256,
        context: Tier,
    ) -> Result<Option<ExternalBlock>, ClientError> {
        self.external_lookups.lock().push((hash, context));
        Ok(self.externals.lock().get(&(hash, context)).cloned())
    }

    async fn send_external_block(
        &self,
        _block: &SealedBlock,
        _receipts: &[Receipt],
        context: Tier,
    ) -> Result<(), ClientError> {
        self.sent.lock().push(Sent::External { context });
        Ok(())
    }

    async fn send_mined_block(
        &self,
        _block: &SealedBlock,
        _broadcast: bool,
        _announce: bool,
    ) -> Result<(), ClientError> {
        self.sent.lock().push(Sent::Mined);
        Ok(())
    }

    async fn submit_hashrate(&self, _rate: u64, _id: H256) -> Result<(), ClientError> {
        Ok(())
    }
}

/// A fully populated 1 + R + R*Z mock network.
pub struct MockNetwork {
    pub prime: Arc<MockNode>,
    pub regions: Vec<Arc<MockNode>>,
    pub zones: Vec<Vec<Arc<MockNode>>>,
}

impl MockNetwork {
    pub fn full() -> Self {
        Self {
            prime: MockNode::new(),
            regions: (0..REGIONS).map(|_| MockNode::new()).collect(),
            zones: (0..REGIONS)
                .map(|_| (0..ZONES_PER_REGION).map(|_| MockNode::new()).collect())
                .collect(),
        }
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        let prime: NodeHandle = self.prime.clone();
        let regions = self
            .regions
            .iter()
            .map(|n| Some(n.clone() as NodeHandle))
            .collect();
        let zones = self
            .zones
            .iter()
            .map(|row| row.iter().map(|n| Some(n.clone() as NodeHandle)).collect())
            .collect();
        Arc::new(ClientRegistry::new(Some(prime), regions, zones).unwrap())
    }

    pub fn node_at(&self, location: Location) -> &Arc<MockNode> {
        match location.tier() {
            Tier::Prime => &self.prime,
            Tier::Region => &self.regions[location.region_index().unwrap()],
            Tier::Zone => {
                &self.zones[location.region_index().unwrap()][location.zone_index().unwrap()]
            }
        }
    }

    /// Every node with its location, PRIME first.
    pub fn all(&self) -> Vec<(Location, &Arc<MockNode>)> {
        let mut nodes = vec![(Location::PRIME, &self.prime)];
        for (r, region) in self.regions.iter().enumerate() {
            nodes.push((Location::region(r as u8 + 1), region));
        }
        for (r, row) in self.zones.iter().enumerate() {
            for (z, zone) in row.iter().enumerate() {
                nodes.push((Location::new(r as u8 + 1, z as u8 + 1), zone));
            }
        }
        nodes
    }
}

/// A header with every tier slot filled and workable difficulties.
pub fn complete_header(location: Location) -> TieredHeader {
    let mut header = TieredHeader::default();
    header.location = location;
    header.number = [Some(100), Some(200), Some(300)];
    header.difficulty = [
        U256::from(4_000u64),
        U256::from(400u64),
        U256::from(40u64),
    ];
    header.time = 1_700_000_000;
    header
}

/// A pending block whose `tier` slot is populated.
pub fn pending_block(tier: Tier, number: u64, time: u64, location: Location) -> ReceiptBlock {
    let mut header = TieredHeader::default();
    header.location = location;
    header.number[tier.index()] = Some(number);
    header.difficulty[tier.index()] = U256::from(1_000u64);
    header.time = time;
    let tx = Transaction {
        hash: H256::repeat_byte(number as u8),
        raw: vec![tier.index() as u8, number as u8],
    };
    ReceiptBlock {
        header,
        body: BlockBody {
            transactions: vec![tx.clone()],
            uncles: vec![],
        },
        receipts: vec![Receipt {
            tx_hash: tx.hash,
            status: 1,
            gas_used: 21_000,
        }],
    }
}

/// Sleep long enough for spawned tasks to settle.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
}
