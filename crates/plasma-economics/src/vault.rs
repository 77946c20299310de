// crates/plasma-economics/src/vault.rs
//
// Reward pools fed by the unstaked part of each seigniorage mint.
//
//   - PowerTON: collects its share in fixed-length rounds. Each closed round
//     records how much it collected. Picking a winner is out of scope.
//   - DAO vault: a plain balance the DAO may spend from.

use serde::{Deserialize, Serialize};

use plasma_core::{Address, PlasmaError, Ray, RewardPool};

/// A closed PowerTON round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub index: u64,
    pub started_at: u64,
    pub ended_at: u64,
    pub reward: Ray,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerTon {
    address: Address,
    /// Round length in seconds.
    round_duration: u64,
    current_round: u64,
    round_start: Option<u64>,
    round_reward: Ray,
    balance: Ray,
    rounds: Vec<Round>,
}

impl PowerTon {
    pub fn new(address: Address, round_duration: u64) -> Self {
        Self {
            address,
            round_duration,
            current_round: 0,
            round_start: None,
            round_reward: Ray::ZERO,
            balance: Ray::ZERO,
            rounds: Vec::new(),
        }
    }

    /// Open the first round at `now`.
    ///
    /// # Errors
    /// Returns `PlasmaError::InvalidState` if already started.
    pub fn start(&mut self, now: u64) -> Result<(), PlasmaError> {
        if self.round_start.is_some() {
            return Err(PlasmaError::InvalidState("PowerTON already started".to_string()));
        }
        self.round_start = Some(now);
        tracing::info!(now, round_duration = self.round_duration, "PowerTON started");
        Ok(())
    }

    /// Close the current round and open the next one at `now`.
    ///
    /// # Errors
    /// Returns `PlasmaError::InvalidState` if not started or if the round
    /// has not lasted `round_duration` yet.
    pub fn end_round(&mut self, now: u64) -> Result<Round, PlasmaError> {
        let started_at = self
            .round_start
            .ok_or_else(|| PlasmaError::InvalidState("PowerTON not started".to_string()))?;
        let ends_at = started_at.saturating_add(self.round_duration);
        if now < ends_at {
            return Err(PlasmaError::InvalidState(format!(
                "round {} ends at {}, now {}",
                self.current_round, ends_at, now
            )));
        }
        let round = Round {
            index: self.current_round,
            started_at,
            ended_at: now,
            reward: std::mem::take(&mut self.round_reward),
        };
        self.rounds.push(round);
        self.current_round += 1;
        self.round_start = Some(now);
        tracing::info!(round = round.index, reward = %round.reward, "PowerTON round ended");
        Ok(round)
    }

    pub fn is_started(&self) -> bool {
        self.round_start.is_some()
    }

    pub fn current_round(&self) -> u64 {
        self.current_round
    }

    /// Reward collected by the open round so far.
    pub fn round_reward(&self) -> Ray {
        self.round_reward
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }
}

impl RewardPool for PowerTon {
    fn address(&self) -> Address {
        self.address
    }

    fn credit(&mut self, amount: Ray) -> Result<(), PlasmaError> {
        self.balance = self.balance.checked_add(amount)?;
        self.round_reward = self.round_reward.checked_add(amount)?;
        Ok(())
    }

    fn balance(&self) -> Ray {
        self.balance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaoVault {
    address: Address,
    balance: Ray,
}

impl DaoVault {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balance: Ray::ZERO,
        }
    }

    pub fn deposit(&mut self, amount: Ray) -> Result<(), PlasmaError> {
        self.balance = self.balance.checked_add(amount)?;
        Ok(())
    }

    /// # Errors
    /// Returns `PlasmaError::InsufficientBalance` if the vault holds less
    /// than `amount`.
    pub fn withdraw(&mut self, amount: Ray) -> Result<(), PlasmaError> {
        if amount > self.balance {
            return Err(PlasmaError::InsufficientBalance {
                account: self.address,
                requested: amount,
                available: self.balance,
            });
        }
        self.balance = self.balance.saturating_sub(amount);
        Ok(())
    }
}

impl RewardPool for DaoVault {
    fn address(&self) -> Address {
        self.address
    }

    fn credit(&mut self, amount: Ray) -> Result<(), PlasmaError> {
        self.deposit(amount)
    }

    fn balance(&self) -> Ray {
        self.balance
    }
}
