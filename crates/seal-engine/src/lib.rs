//! # Seal Engine
//!
//! Multi-threaded nonce search over the merged header.
//!
//! One digest is compared against three targets, strongest first; a
//! solution is classified by the highest tier it satisfies and posted on
//! the caller's result channel as a [`HeaderBundle`]. An in-flight search
//! is interrupted by flipping the stop signal handed to
//! [`SealEngine::seal_header`]; interruption is idempotent and
//! non-blocking for the caller.

mod meter;

pub use meter::HashrateMeter;

use parking_lot::RwLock;
use primitive_types::{H256, U256};
use shared_types::{HeaderBundle, Tier, TieredHeader, TIER_COUNT};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Result alias for sealing operations.
pub type Result<T> = std::result::Result<T, SealError>;

/// Errors raised when a header cannot be fed to the nonce search.
#[derive(Debug, Clone, Error)]
pub enum SealError {
    /// A tier slot carries no block number.
    #[error("header incomplete: {tier} slot has no number")]
    Incomplete {
        /// The offending tier.
        tier: Tier,
    },

    /// A tier difficulty is zero, so no target can be derived.
    #[error("zero difficulty at {tier} slot")]
    ZeroDifficulty {
        /// The offending tier.
        tier: Tier,
    },
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SealConfig {
    /// Worker threads for the nonce search.
    pub threads: usize,
    /// Nonces tried between stop-signal checks.
    pub batch_size: u64,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            batch_size: 4096,
        }
    }
}

/// The proof-of-work facility.
///
/// `seal_header` spawns detached worker threads and returns immediately;
/// solutions arrive on the result channel passed by the caller. The
/// engine also acts as the hashrate sink: locally measured throughput
/// and remotely submitted rates are aggregated by [`SealEngine::hashrate`].
pub struct SealEngine {
    config: SealConfig,
    meter: Arc<HashrateMeter>,
    remote_rates: RwLock<HashMap<H256, u64>>,
}

impl SealEngine {
    /// Create an engine with the given configuration.
    pub fn new(mut config: SealConfig) -> Self {
        config.threads = config.threads.max(1);
        config.batch_size = config.batch_size.max(1);
        info!(threads = config.threads, "seal engine initialized");
        Self {
            config,
            meter: Arc::new(HashrateMeter::new()),
            remote_rates: RwLock::new(HashMap::new()),
        }
    }

    /// Start a nonce search over `header`.
    ///
    /// The previous search must have been interrupted by the caller via
    /// its own stop signal; this function does not serialize searches.
    /// Workers terminate when `stop` flips to `true`, when the result is
    /// found, or when the result channel is dropped.
    pub fn seal_header(
        &self,
        header: TieredHeader,
        result_tx: mpsc::Sender<HeaderBundle>,
        stop: watch::Receiver<bool>,
    ) -> Result<()> {
        if let Some(tier) = header.missing_tier() {
            return Err(SealError::Incomplete { tier });
        }
        let targets = tier_targets(&header)?;

        debug!(
            location = %header.location,
            numbers = ?header.number,
            "starting nonce search"
        );

        let found = Arc::new(AtomicBool::new(false));
        let stripe = u64::MAX / self.config.threads as u64;
        for worker in 0..self.config.threads {
            let header = header.clone();
            let result_tx = result_tx.clone();
            let stop = stop.clone();
            let found = Arc::clone(&found);
            let meter = Arc::clone(&self.meter);
            let batch = self.config.batch_size;
            let start = worker as u64 * stripe;

            std::thread::spawn(move || {
                search_stripe(header, targets, start, batch, stop, found, result_tx, meter);
            });
        }
        Ok(())
    }

    /// Aggregate hashrate: locally measured plus remotely submitted.
    pub fn hashrate(&self) -> f64 {
        let remote: u64 = self.remote_rates.read().values().sum();
        self.meter.rate() + remote as f64
    }

    /// Record a rate reported by an external miner under its id.
    pub fn submit_hashrate(&self, rate: u64, id: H256) {
        self.remote_rates.write().insert(id, rate);
    }
}

/// Derive the per-tier targets, strongest (smallest) at slot 0.
fn tier_targets(header: &TieredHeader) -> Result<[U256; TIER_COUNT]> {
    let mut targets = [U256::zero(); TIER_COUNT];
    for tier in Tier::ALL {
        let difficulty = header.difficulty[tier.index()];
        if difficulty.is_zero() {
            return Err(SealError::ZeroDifficulty { tier });
        }
        targets[tier.index()] = U256::MAX / difficulty;
    }
    Ok(targets)
}

/// The highest tier whose target the digest meets, if any.
///
/// Targets are ordered by difficulty, so meeting the PRIME target
/// implies meeting all three; the scan returns the first (strongest)
/// satisfied tier.
fn classify(digest: U256, targets: &[U256; TIER_COUNT]) -> Option<Tier> {
    Tier::ALL
        .into_iter()
        .find(|tier| digest <= targets[tier.index()])
}

#[allow(clippy::too_many_arguments)]
fn search_stripe(
    mut header: TieredHeader,
    targets: [U256; TIER_COUNT],
    start: u64,
    batch: u64,
    stop: watch::Receiver<bool>,
    found: Arc<AtomicBool>,
    result_tx: mpsc::Sender<HeaderBundle>,
    meter: Arc<HashrateMeter>,
) {
    let mut nonce = start;
    loop {
        if *stop.borrow() || found.load(Ordering::Relaxed) || result_tx.is_closed() {
            return;
        }
        for _ in 0..batch {
            let digest = header.seal_digest(nonce);
            let value = U256::from_big_endian(digest.as_bytes());
            if let Some(context) = classify(value, &targets) {
                if found.swap(true, Ordering::Relaxed) {
                    return;
                }
                header.nonce = nonce;
                header.mix_digest = digest;
                info!(
                    tier = %context,
                    nonce,
                    location = %header.location,
                    "seal found"
                );
                if result_tx
                    .blocking_send(HeaderBundle { context, header })
                    .is_err()
                {
                    warn!("seal result dropped: receiver gone");
                }
                return;
            }
            nonce = nonce.wrapping_add(1);
        }
        meter.record(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mineable_header(difficulties: [u64; 3]) -> TieredHeader {
        let mut header = TieredHeader::default();
        header.number = [Some(1), Some(2), Some(3)];
        header.difficulty = difficulties.map(U256::from);
        header
    }

    #[test]
    fn classify_picks_highest_satisfied_tier() {
        let targets = [U256::from(10u64), U256::from(100u64), U256::from(1000u64)];
        assert_eq!(classify(U256::from(5u64), &targets), Some(Tier::Prime));
        assert_eq!(classify(U256::from(50u64), &targets), Some(Tier::Region));
        assert_eq!(classify(U256::from(500u64), &targets), Some(Tier::Zone));
        assert_eq!(classify(U256::from(5000u64), &targets), None);
    }

    #[test]
    fn targets_require_nonzero_difficulty() {
        let mut header = mineable_header([1, 1, 1]);
        header.difficulty[1] = U256::zero();
        assert!(matches!(
            tier_targets(&header),
            Err(SealError::ZeroDifficulty { tier: Tier::Region })
        ));
    }

    #[test]
    fn rejects_incomplete_header() {
        let engine = SealEngine::new(SealConfig::default());
        let mut header = mineable_header([1, 1, 1]);
        header.number[2] = None;
        let (result_tx, _result_rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);
        assert!(matches!(
            engine.seal_header(header, result_tx, stop_rx),
            Err(SealError::Incomplete { tier: Tier::Zone })
        ));
    }

    #[tokio::test]
    async fn trivial_difficulty_seals_at_prime() {
        let engine = SealEngine::new(SealConfig {
            threads: 2,
            batch_size: 64,
        });
        // Difficulty 1 at every tier: the first digest tried meets the
        // PRIME target.
        let header = mineable_header([1, 2, 3]);
        let (result_tx, mut result_rx) = mpsc::channel(4);
        let (_stop_tx, stop_rx) = watch::channel(false);
        engine.seal_header(header, result_tx, stop_rx).unwrap();

        let bundle = tokio::time::timeout(std::time::Duration::from_secs(10), result_rx.recv())
            .await
            .expect("sealing timed out")
            .expect("channel closed");
        assert_eq!(bundle.context, Tier::Prime);
        let digest = bundle.header.seal_digest(bundle.header.nonce);
        assert_eq!(digest, bundle.header.mix_digest);
    }

    #[tokio::test]
    async fn stop_signal_interrupts_search() {
        let engine = SealEngine::new(SealConfig {
            threads: 2,
            batch_size: 64,
        });
        // U256::MAX difficulty leaves a target of one; no realistic
        // digest meets it.
        let mut header = mineable_header([1, 1, 1]);
        header.difficulty = [U256::MAX, U256::MAX, U256::MAX];

        let (result_tx, mut result_rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = watch::channel(false);
        engine.seal_header(header, result_tx, stop_rx).unwrap();

        stop_tx.send(true).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(result_rx.try_recv().is_err());
    }

    #[test]
    fn remote_rates_feed_hashrate() {
        let engine = SealEngine::new(SealConfig::default());
        assert_eq!(engine.hashrate(), 0.0);
        engine.submit_hashrate(500, H256::repeat_byte(1));
        engine.submit_hashrate(250, H256::repeat_byte(2));
        // Re-submitting under the same id replaces, not accumulates.
        engine.submit_hashrate(300, H256::repeat_byte(1));
        assert_eq!(engine.hashrate(), 550.0);
    }
}
