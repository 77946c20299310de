// crates/plasma-economics/src/config.rs
//
// Staking parameters, read from the `[stake]` section of the node config.
// Deployment profiles fix the withdrawal delay and PowerTON round length.

use serde::{Deserialize, Serialize};

use plasma_core::{PlasmaError, Ray};

use crate::split::SeigRates;

/// Known deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    Mainnet,
    Rinkeby,
    Development,
}

impl NetworkProfile {
    /// Withdrawal delay in blocks.
    pub fn withdrawal_delay(self) -> u64 {
        match self {
            NetworkProfile::Mainnet => 93_046,
            NetworkProfile::Rinkeby => 138,
            NetworkProfile::Development => 10,
        }
    }

    /// PowerTON round length in seconds.
    pub fn round_duration(self) -> u64 {
        match self {
            NetworkProfile::Mainnet => 1_209_600,
            NetworkProfile::Rinkeby => 1_800,
            NetworkProfile::Development => 60,
        }
    }
}

impl std::str::FromStr for NetworkProfile {
    type Err = PlasmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(NetworkProfile::Mainnet),
            "rinkeby" => Ok(NetworkProfile::Rinkeby),
            "development" | "dev" => Ok(NetworkProfile::Development),
            other => Err(PlasmaError::Config(format!("unknown network profile: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeConfig {
    /// WTON minted per block.
    #[serde(default = "default_seig_per_block")]
    pub seig_per_block: Ray,

    /// Blocks between a withdrawal request and its release.
    #[serde(default = "default_withdrawal_delay")]
    pub withdrawal_delay: u64,

    /// PowerTON round length in seconds.
    #[serde(default = "default_round_duration")]
    pub round_duration: u64,

    #[serde(default = "default_powerton_seig_rate")]
    pub powerton_seig_rate: Ray,

    #[serde(default)]
    pub dao_seig_rate: Ray,

    #[serde(default)]
    pub relative_seig_rate: Ray,

    /// Commission rate applied to newly registered root chains.
    #[serde(default)]
    pub default_commission_rate: Ray,
}

fn default_seig_per_block() -> Ray {
    // 3.91615931 WTON
    Ray::from_raw(plasma_core::U256::from(391_615_931u64) * plasma_core::U256::exp10(19))
}

fn default_withdrawal_delay() -> u64 {
    NetworkProfile::Development.withdrawal_delay()
}

fn default_round_duration() -> u64 {
    NetworkProfile::Development.round_duration()
}

fn default_powerton_seig_rate() -> Ray {
    Ray::ONE
}

impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            seig_per_block: default_seig_per_block(),
            withdrawal_delay: default_withdrawal_delay(),
            round_duration: default_round_duration(),
            powerton_seig_rate: default_powerton_seig_rate(),
            dao_seig_rate: Ray::ZERO,
            relative_seig_rate: Ray::ZERO,
            default_commission_rate: Ray::ZERO,
        }
    }
}

impl StakeConfig {
    /// Defaults with the delay and round length of `profile`.
    pub fn for_profile(profile: NetworkProfile) -> Self {
        Self {
            withdrawal_delay: profile.withdrawal_delay(),
            round_duration: profile.round_duration(),
            ..Self::default()
        }
    }

    pub fn rates(&self) -> SeigRates {
        SeigRates {
            powerton: self.powerton_seig_rate,
            dao: self.dao_seig_rate,
            relative: self.relative_seig_rate,
        }
    }

    pub fn validate(&self) -> Result<(), PlasmaError> {
        self.rates().validate()?;
        if self.default_commission_rate > Ray::ONE {
            return Err(PlasmaError::Config(format!(
                "default_commission_rate {} exceeds 1",
                self.default_commission_rate
            )));
        }
        if self.round_duration == 0 {
            return Err(PlasmaError::Config("round_duration must be positive".to_string()));
        }
        Ok(())
    }
}
