// crates/plasma-daemon/src/config.rs
//
// Runtime configuration for the Plasma daemon.
// Loaded from a TOML file or populated with defaults.

use std::fs;

use serde::Deserialize;

use plasma_chain::ChainParams;
use plasma_core::PlasmaError;
use plasma_economics::{NetworkProfile, StakeConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] PlasmaError),
}

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Deployment profile: "mainnet", "rinkeby", or "development".
    #[serde(default = "default_profile")]
    pub profile: NetworkProfile,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Wall-clock time between simulated root blocks.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,

    /// Simulated seconds per root block.
    #[serde(default = "default_block_time_secs")]
    pub block_time_secs: u64,

    #[serde(default = "default_num_root_chains")]
    pub num_root_chains: usize,

    /// TON minted to the token owner at startup.
    #[serde(default = "default_initial_ton")]
    pub initial_ton: u64,

    /// TON the token owner stakes on each root chain.
    #[serde(default = "default_stake_per_root_chain")]
    pub stake_per_root_chain: u64,

    /// Deposit requests entered on the committing root chain each block.
    #[serde(default = "default_enters_per_block")]
    pub enters_per_block: u64,

    /// Exit requests entered on the committing root chain each block.
    #[serde(default)]
    pub exits_per_block: u64,

    #[serde(default)]
    pub chain: ChainParams,

    /// Explicit staking parameters. When absent, the profile's are used.
    #[serde(default)]
    pub stake: Option<StakeConfig>,
}

fn default_profile() -> NetworkProfile {
    NetworkProfile::Development
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_block_interval_ms() -> u64 {
    1_000
}

fn default_block_time_secs() -> u64 {
    12
}

fn default_num_root_chains() -> usize {
    4
}

fn default_initial_ton() -> u64 {
    10_000
}

fn default_stake_per_root_chain() -> u64 {
    100
}

fn default_enters_per_block() -> u64 {
    1
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            block_interval_ms: default_block_interval_ms(),
            block_time_secs: default_block_time_secs(),
            num_root_chains: default_num_root_chains(),
            initial_ton: default_initial_ton(),
            stake_per_root_chain: default_stake_per_root_chain(),
            enters_per_block: default_enters_per_block(),
            exits_per_block: 0,
            chain: ChainParams::default(),
            stake: None,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Staking parameters in effect.
    pub fn stake_config(&self) -> StakeConfig {
        self.stake
            .clone()
            .unwrap_or_else(|| StakeConfig::for_profile(self.profile))
    }

    pub fn validate(&self) -> Result<(), PlasmaError> {
        self.chain.validate()?;
        self.stake_config().validate()?;
        if self.num_root_chains == 0 {
            return Err(PlasmaError::Config("num_root_chains must be at least 1".to_string()));
        }
        let staked = self
            .stake_per_root_chain
            .checked_mul(self.num_root_chains as u64)
            .ok_or_else(|| PlasmaError::Config("total stake overflows".to_string()))?;
        if staked > self.initial_ton {
            return Err(PlasmaError::Config(format!(
                "staking {} TON needs more than the initial {} TON",
                staked, self.initial_ton
            )));
        }
        Ok(())
    }
}
