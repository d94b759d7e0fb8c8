//! # Strata Coordinator
//!
//! Entry point for the merge-mining coordinator: loads the config,
//! applies the optional manual location override and hands off to the
//! supervisor.
//!
//! ```text
//! strata-coordinator                    # per config: auto-mine or listen
//! strata-coordinator <region> <zone> 1  # mine the given slice
//! strata-coordinator <region> <zone> 0  # listen only
//! ```

mod adapters;
mod config;
mod supervisor;

use anyhow::{bail, Result};
use clap::Parser;
use config::CoordinatorConfig;
use shared_types::Location;
use std::path::PathBuf;
use supervisor::ManualOverride;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "strata-coordinator",
    about = "Merge-mining coordinator for the Strata network"
)]
struct Cli {
    /// Region ordinal of the slice to mine (manual override).
    region: Option<u64>,

    /// Zone ordinal of the slice to mine (manual override).
    zone: Option<u64>,

    /// 1 to mine the slice, anything else to listen.
    mine: Option<u64>,

    /// Path to the configuration file.
    #[arg(long, env = "STRATA_CONFIG", default_value = "coordinator.toml")]
    config: PathBuf,
}

impl Cli {
    fn manual_override(&self) -> Result<Option<ManualOverride>> {
        let location = match (self.region, self.zone) {
            (Some(region), Some(zone)) => Location::from_wire(region, zone),
            (None, None) => return Ok(None),
            _ => bail!("a manual location needs both a region and a zone"),
        };
        if !location.is_zone() || !location.in_bounds() {
            bail!("location {location} does not name a zone in the topology");
        }
        Ok(Some(ManualOverride {
            location,
            mine: self.mine == Some(1),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let manual = cli.manual_override()?;
    let config = CoordinatorConfig::load(&cli.config)?;
    info!(config = %cli.config.display(), "configuration loaded");

    supervisor::run(config, manual).await
}
