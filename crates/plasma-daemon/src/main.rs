// crates/plasma-daemon/src/main.rs
//
// Binary entrypoint for the Plasma daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, bootstraps
// the simulated network of root chains and staking, and runs the block
// scheduler until the block limit or Ctrl-C.

mod config;
mod network;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::RwLock;

use config::NodeConfig;
use network::Network;
use plasma_economics::NetworkProfile;
use scheduler::BlockScheduler;

/// Plasma daemon: runs root chains that commit to a seigniorage staking engine.
#[derive(Parser, Debug)]
#[command(name = "plasma-daemon", version = "0.1.0", about = "Plasma root-chain network daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "plasma.toml")]
    config: String,

    /// Deployment profile: mainnet, rinkeby, or development.
    #[arg(long)]
    profile: Option<String>,

    /// Number of root blocks to simulate before exiting.
    #[arg(long)]
    blocks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found. The warning is logged once tracing is up.
    let (mut node_config, load_error) = match NodeConfig::load(&args.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (NodeConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&node_config.log_level)),
        )
        .init();

    match load_error {
        None => tracing::info!("Loaded configuration from {}", args.config),
        Some(e) => tracing::warn!("{}. Using defaults.", e),
    }

    // CLI --profile overrides the config file value.
    if let Some(profile) = &args.profile {
        node_config.profile = profile.parse::<NetworkProfile>()?;
    }
    node_config.validate()?;

    let stake = node_config.stake_config();
    tracing::info!("Plasma Daemon v0.1.0");
    tracing::info!("Profile: {:?}", node_config.profile);
    tracing::info!("Root chains: {}", node_config.num_root_chains);
    tracing::info!(
        "Seigniorage: {} WTON/block, withdrawal delay {} blocks, PowerTON round {}s",
        stake.seig_per_block,
        stake.withdrawal_delay,
        stake.round_duration
    );

    let genesis_time = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    let network = Arc::new(RwLock::new(Network::bootstrap(&node_config, genesis_time)?));
    for address in network.read().await.root_chain_addresses() {
        tracing::info!("Root chain deployed at {}", address);
    }

    let mut scheduler = BlockScheduler::new(
        network.clone(),
        Duration::from_millis(node_config.block_interval_ms),
        args.blocks,
    );
    let handle = tokio::spawn(async move { scheduler.run().await });
    let produced = handle.await??;

    let summary = network.read().await.summary()?;
    tracing::info!("Produced {} root blocks", produced);
    tracing::info!("Final state: {}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
