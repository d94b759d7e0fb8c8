//! Mining driver: feeds combined headers to the sealing engine and the
//! hashrate reporter.

use primitive_types::H256;
use seal_engine::SealEngine;
use shared_types::{HeaderBundle, TieredHeader};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// Interval between hashrate submissions.
const HASHRATE_INTERVAL: Duration = Duration::from_secs(60);

/// Owns the single in-flight sealing job.
///
/// Consumes the lossy-latest header channel: on every snapshot the
/// previous search is interrupted *before* the new one starts, so a
/// header update never re-uses a stale stop signal. Incomplete headers
/// are skipped until every tier slot is filled.
pub struct MiningDriver {
    engine: Arc<SealEngine>,
    updates: watch::Receiver<Option<TieredHeader>>,
    result_tx: mpsc::Sender<HeaderBundle>,
}

impl MiningDriver {
    /// Create a driver over the engine.
    pub fn new(
        engine: Arc<SealEngine>,
        updates: watch::Receiver<Option<TieredHeader>>,
        result_tx: mpsc::Sender<HeaderBundle>,
    ) -> Self {
        Self {
            engine,
            updates,
            result_tx,
        }
    }

    /// Run until the update channel closes or `cancel` fires.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        let mut stop: Option<watch::Sender<bool>> = None;
        let interrupt = |stop: &mut Option<watch::Sender<bool>>| {
            if let Some(previous) = stop.take() {
                let _ = previous.send(true);
            }
        };

        loop {
            tokio::select! {
                changed = self.updates.changed() => {
                    if changed.is_err() {
                        interrupt(&mut stop);
                        return;
                    }
                    let Some(header) = self.updates.borrow_and_update().clone() else {
                        continue;
                    };

                    // Interrupt the in-flight search before anything else.
                    interrupt(&mut stop);

                    if let Some(tier) = header.missing_tier() {
                        info!(%tier, "header slot missing; not mining yet");
                        continue;
                    }

                    info!(
                        numbers = ?header.number,
                        location = %header.location,
                        "sealing combined header"
                    );
                    let (stop_tx, stop_rx) = watch::channel(false);
                    match self.engine.seal_header(header, self.result_tx.clone(), stop_rx) {
                        Ok(()) => stop = Some(stop_tx),
                        // The driver survives engine failures and picks
                        // up the next header update.
                        Err(error) => error!(%error, "header sealing failed"),
                    }
                }
                _ = cancel.changed() => {
                    interrupt(&mut stop);
                    return;
                }
            }
        }
    }
}

/// Periodically samples the engine hashrate and submits it to the
/// engine's hashrate sink under a stable per-process id.
pub struct HashrateReporter {
    engine: Arc<SealEngine>,
}

impl HashrateReporter {
    /// Create a reporter over the engine.
    pub fn new(engine: Arc<SealEngine>) -> Self {
        Self { engine }
    }

    /// Run until `cancel` fires.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        let id = H256::from(rand::random::<[u8; 32]>());
        let mut ticker = tokio::time::interval(HASHRATE_INTERVAL);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rate = self.engine.hashrate();
                    if rate > 0.0 {
                        info!(hashes_per_sec = rate, "miner hashrate");
                        self.engine.submit_hashrate(rate as u64, id);
                    }
                }
                _ = cancel.changed() => return,
            }
        }
    }
}
