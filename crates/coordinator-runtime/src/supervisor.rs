//! Startup, wiring and graceful shutdown.

use crate::adapters::WsNodeClient;
use crate::config::CoordinatorConfig;
use anyhow::{Context, Result};
use coordinator::aggregator::{HeaderAggregator, SubscriberSet};
use coordinator::dispatcher::ResultDispatcher;
use coordinator::domain::RetryPolicy;
use coordinator::head_relay::HeadRelay;
use coordinator::locator::AutoLocator;
use coordinator::mining::{HashrateReporter, MiningDriver};
use coordinator::missing_blocks::MissingBlockResponder;
use coordinator::ports::NodeHandle;
use coordinator::registry::ClientRegistry;
use coordinator::state::CoordinatorState;
use coordinator::RESULT_QUEUE_SIZE;
use seal_engine::{SealConfig, SealEngine};
use shared_types::Location;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Manual `region zone mine` override from the command line.
#[derive(Debug, Clone, Copy)]
pub struct ManualOverride {
    /// The slice to mine.
    pub location: Location,
    /// Whether to mine or just listen.
    pub mine: bool,
}

/// Run the coordinator until an exit signal arrives.
pub async fn run(config: CoordinatorConfig, manual: Option<ManualOverride>) -> Result<()> {
    let registry = connect_all(&config).await?;
    info!("all configured chains connected");

    // Resolve the operating mode.
    let (location, mine, optimize) = match manual {
        Some(manual) => {
            info!(location = %manual.location, mine = manual.mine, "manual mode");
            (manual.location, manual.mine, false)
        }
        None if config.auto && config.mine => {
            let location = AutoLocator::scan(&registry)
                .await
                .context("auto mode found no reachable region/zone pair")?;
            info!(
                %location,
                optimize = config.optimize,
                timer_mins = config.optimize_timer_mins,
                "auto-miner mode"
            );
            (location, true, config.optimize)
        }
        None => {
            info!("listening mode");
            (
                config.location().unwrap_or(Location::new(1, 1)),
                false,
                false,
            )
        }
    };

    let state = Arc::new(CoordinatorState::new(location));
    let (exit_tx, _) = watch::channel(false);

    // Head propagation and missing-block recovery run in every mode.
    let relay_handles = HeadRelay::new(registry.clone()).spawn_all(&exit_tx);
    let responder_handles = MissingBlockResponder::new(registry.clone()).spawn_all(&exit_tx);
    info!(
        relays = relay_handles.len(),
        responders = responder_handles.len(),
        "relay services started"
    );

    // Mining pipeline only when a slice is actually mined.
    let mut held_subscribers: Option<SubscriberSet> = None;
    if mine {
        info!(%location, "starting miner");
        let threads = if config.seal_threads == 0 {
            num_cpus::get()
        } else {
            config.seal_threads
        };
        let engine = Arc::new(SealEngine::new(SealConfig {
            threads,
            ..SealConfig::default()
        }));

        let aggregator = HeaderAggregator::new(state.clone(), registry.clone());
        let (result_tx, result_rx) = mpsc::channel(RESULT_QUEUE_SIZE);

        let driver = MiningDriver::new(engine.clone(), aggregator.subscribe_updates(), result_tx);
        tokio::spawn(driver.run(exit_tx.subscribe()));

        let dispatcher = ResultDispatcher::new(registry.clone(), state.clone());
        tokio::spawn(dispatcher.run(result_rx, exit_tx.subscribe()));

        tokio::spawn(HashrateReporter::new(engine).run(exit_tx.subscribe()));

        let mut subscribers = aggregator.bind(location);
        aggregator.prime(location, &mut subscribers);

        if optimize {
            let locator = AutoLocator::new(registry.clone(), state.clone());
            tokio::spawn(locator.run(
                aggregator,
                subscribers,
                config.optimize_timer_mins,
                exit_tx.subscribe(),
            ));
        } else {
            held_subscribers = Some(subscribers);
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the exit signal")?;
    info!("exit signal received; shutting down");

    let _ = exit_tx.send(true);
    if let Some(subscribers) = held_subscribers.take() {
        subscribers.shutdown().await;
    }
    info!("shutdown complete");
    Ok(())
}

/// Dial every configured URL, retrying with bounded exponential backoff
/// until all of them answer.
async fn connect_all(config: &CoordinatorConfig) -> Result<Arc<ClientRegistry>> {
    let mut retry = RetryPolicy::new();
    loop {
        let (prime, regions, zones, all_reachable) = dial_everything(config).await;
        if all_reachable {
            let registry = ClientRegistry::new(prime, regions, zones)?;
            return Ok(Arc::new(registry));
        }
        let delay = retry.next_delay();
        warn!(
            attempt = retry.attempts(),
            delay_secs = delay.as_secs(),
            "not every configured chain is reachable; retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

type DialOutcome = (
    Option<NodeHandle>,
    Vec<Option<NodeHandle>>,
    Vec<Vec<Option<NodeHandle>>>,
    bool,
);

async fn dial_everything(config: &CoordinatorConfig) -> DialOutcome {
    let timeout = Duration::from_secs(config.rpc_timeout_secs);
    let mut all_reachable = true;

    let prime = dial(&config.prime_url, "prime", timeout, &mut all_reachable).await;

    let mut regions = Vec::with_capacity(config.region_urls.len());
    for (i, url) in config.region_urls.iter().enumerate() {
        let label = format!("region-{}", i + 1);
        regions.push(dial(url, &label, timeout, &mut all_reachable).await);
    }

    let mut zones = Vec::with_capacity(config.zone_urls.len());
    for (r, row) in config.zone_urls.iter().enumerate() {
        let mut dialed = Vec::with_capacity(row.len());
        for (z, url) in row.iter().enumerate() {
            let label = format!("zone-{}-{}", r + 1, z + 1);
            dialed.push(dial(url, &label, timeout, &mut all_reachable).await);
        }
        zones.push(dialed);
    }

    (prime, regions, zones, all_reachable)
}

/// Dial one URL; an empty URL is an intentionally absent chain.
async fn dial(
    url: &str,
    label: &str,
    timeout: Duration,
    all_reachable: &mut bool,
) -> Option<NodeHandle> {
    if url.is_empty() {
        return None;
    }
    match WsNodeClient::connect(url, timeout).await {
        Ok(client) => Some(client as NodeHandle),
        Err(error) => {
            warn!(chain = label, url, %error, "unable to connect to node");
            *all_reachable = false;
            None
        }
    }
}
