// crates/plasma-daemon/src/network.rs
//
// Network: several root chains plus the staking engine they commit to.
//
// Each simulated root block, one root chain (round robin) takes the
// requests entered since its last turn and submits the next block, or the
// whole non-request epoch at once. Every successful submission is a commit:
// the staking engine settles seigniorage for that root chain at the current
// block. Afterwards every root chain finalizes whatever its challenge
// periods allow.

use std::collections::BTreeMap;

use serde::Serialize;

use plasma_chain::{ChainEvent, RootChain, Submission};
use plasma_core::{
    trie_key, word_from_u256, Address, BlockPosition, BlockRoots, ExitHandler, ExitRelease,
    PlasmaError, Ray, U256, ZERO_WORD,
};
use plasma_economics::{Staking, TON_DECIMALS};

use crate::config::NodeConfig;

/// Counts exits released by finalized requests.
#[derive(Debug, Default)]
pub struct ExitLedger {
    released: Vec<ExitRelease>,
}

impl ExitLedger {
    pub fn released(&self) -> &[ExitRelease] {
        &self.released
    }
}

impl ExitHandler for ExitLedger {
    fn release(&mut self, exit: &ExitRelease) -> Result<(), PlasmaError> {
        tracing::debug!(request_id = exit.request_id, requester = %exit.requester, "exit released");
        self.released.push(exit.clone());
        Ok(())
    }
}

/// What one simulated root block did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub block_number: u64,
    pub root_chain: Option<Address>,
    pub submitted_block: Option<u64>,
    pub seigs: Ray,
    pub finalized_blocks: usize,
}

/// Snapshot for logging.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub block_number: u64,
    pub timestamp: u64,
    pub tot_total_supply: Ray,
    pub exits_released: usize,
    pub root_chains: Vec<RootChainSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RootChainSummary {
    pub address: Address,
    pub fork: u64,
    pub last_block: u64,
    pub last_finalized_block: u64,
    pub num_requests: u64,
    pub operator_stake: Ray,
    pub token_owner_stake: Ray,
}

pub struct Network {
    root_chains: BTreeMap<Address, RootChain>,
    order: Vec<Address>,
    staking: Staking,
    exits: ExitLedger,
    token: Address,
    token_owner: Address,
    block_number: u64,
    timestamp: u64,
    block_time_secs: u64,
    enters_per_block: u64,
    exits_per_block: u64,
    next_round_at: u64,
}

impl Network {
    /// Deploy `config.num_root_chains` root chains, register them for
    /// staking, and stake `config.stake_per_root_chain` TON on each.
    pub fn bootstrap(config: &NodeConfig, timestamp: u64) -> Result<Self, PlasmaError> {
        config.validate()?;
        let stake_config = config.stake_config();
        let round_duration = stake_config.round_duration;
        let mut staking = Staking::new(stake_config, 0)?;
        let token = Address::derive("TON");
        let token_owner = Address::derive("token-owner");

        let mut root_chains = BTreeMap::new();
        let mut order = Vec::with_capacity(config.num_root_chains);
        for i in 0..config.num_root_chains {
            let address = Address::derive(&format!("root-chain-{}", i));
            let operator = Address::derive(&format!("operator-{}", i));
            let mut chain =
                RootChain::new(config.chain.clone(), operator, BlockRoots::default(), timestamp)?;
            chain.map_token(token, token)?;
            staking.register_root_chain(address, operator)?;
            root_chains.insert(address, chain);
            order.push(address);
        }

        staking.mint_ton(token_owner, ton(config.initial_ton))?;
        let staked = config.stake_per_root_chain * config.num_root_chains as u64;
        staking.swap_from_ton(token_owner, ton(staked))?;
        for address in &order {
            staking.deposit(*address, token_owner, Ray::from_units(config.stake_per_root_chain), 0)?;
        }
        staking.start_powerton(timestamp)?;

        tracing::info!(
            root_chains = order.len(),
            initial_ton = config.initial_ton,
            staked,
            "network bootstrapped"
        );
        Ok(Self {
            root_chains,
            order,
            staking,
            exits: ExitLedger::default(),
            token,
            token_owner,
            block_number: 0,
            timestamp,
            block_time_secs: config.block_time_secs,
            enters_per_block: config.enters_per_block,
            exits_per_block: config.exits_per_block,
            next_round_at: timestamp.saturating_add(round_duration),
        })
    }

    /// Advance one root block.
    pub fn step(&mut self) -> Result<StepReport, PlasmaError> {
        self.block_number += 1;
        self.timestamp += self.block_time_secs;
        let index = (self.block_number as usize - 1) % self.order.len();
        let address = self.order[index];

        for _ in 0..self.enters_per_block {
            self.enter(address)?;
        }
        for _ in 0..self.exits_per_block {
            self.exit(address)?;
        }
        let submission = self.submit_next(address)?;
        let (outcome, _) = self.staking.commit(address, self.block_number)?;

        let mut finalized_blocks = 0;
        for chain in self.root_chains.values_mut() {
            finalized_blocks += finalize_all(chain, self.timestamp, &mut self.exits)?;
        }

        if self.timestamp >= self.next_round_at {
            let round = self.staking.end_powerton_round(self.timestamp)?;
            self.next_round_at = self
                .timestamp
                .saturating_add(self.staking.config().round_duration);
            tracing::info!(round = round.index, reward = %round.reward, "PowerTON round closed");
        }

        Ok(StepReport {
            block_number: self.block_number,
            root_chain: Some(address),
            submitted_block: Some(submission.block_number),
            seigs: outcome.seigs,
            finalized_blocks,
        })
    }

    /// Enter a deposit request for the token owner on `address`.
    pub fn enter(&mut self, address: Address) -> Result<u64, PlasmaError> {
        let (requester, token, now) = (self.token_owner, self.token, self.timestamp);
        let chain = self.chain_mut(&address)?;
        let key = trie_key(&requester, 0);
        let value = word_from_u256(U256::from(chain.num_requests() + 1));
        let (id, _) = chain.start_enter(requester, token, key, value, now)?;
        Ok(id)
    }

    /// Enter an exit request for the token owner on `address`, paying the
    /// exit fee.
    pub fn exit(&mut self, address: Address) -> Result<u64, PlasmaError> {
        let (requester, token, now) = (self.token_owner, self.token, self.timestamp);
        let chain = self.chain_mut(&address)?;
        let fee = chain.params().cost_eru;
        let (id, _) = chain.start_exit(
            requester,
            token,
            trie_key(&requester, 0),
            ZERO_WORD,
            fee,
            now,
        )?;
        Ok(id)
    }

    /// Submit what the open epoch of `address` expects next: the whole
    /// non-request epoch if untouched, otherwise a single block.
    fn submit_next(&mut self, address: Address) -> Result<Submission, PlasmaError> {
        let now = self.timestamp;
        let chain = self.chain_mut(&address)?;
        let fork = chain.current_fork();
        let next = chain
            .last_block(fork)
            .map(|b| b + 1)
            .ok_or_else(|| PlasmaError::NotFound(format!("fork {}", fork)))?;
        let epoch = chain
            .fork(fork)
            .and_then(|f| f.open_epoch())
            .cloned()
            .ok_or_else(|| {
                PlasmaError::InvalidState(format!("fork {} has no open epoch", fork))
            })?;
        let roots = BlockRoots::new(word_from_u256(U256::from(next)), ZERO_WORD, ZERO_WORD);
        let params = chain.params().clone();
        let position = BlockPosition::new(fork, next).encode();

        let untouched_nre =
            !epoch.is_request && epoch.start_block_number == next && epoch.num_blocks > 0;
        let submission = if untouched_nre {
            let epoch_position = BlockPosition::new(fork, epoch.number).encode();
            let range = BlockPosition::new(next, next + epoch.num_blocks - 1).encode();
            chain.submit_nre(epoch_position, range, roots, params.cost_nrb, now)?
        } else if epoch.accepts(plasma_chain::BlockKind::Orb) {
            chain.submit_orb(position, roots, params.cost_orb, now)?
        } else if epoch.accepts(plasma_chain::BlockKind::Nrb) {
            chain.submit_nrb(position, roots, params.cost_nrb, now)?
        } else {
            return Err(PlasmaError::InvalidState(format!(
                "epoch {} of fork {} takes user-submitted blocks only",
                epoch.number, fork
            )));
        };
        tracing::debug!(
            root_chain = %address,
            fork,
            block = submission.block_number,
            epoch = epoch.number,
            "operator submitted"
        );
        Ok(submission)
    }

    fn chain_mut(&mut self, address: &Address) -> Result<&mut RootChain, PlasmaError> {
        self.root_chains
            .get_mut(address)
            .ok_or_else(|| PlasmaError::NotFound(format!("root chain {}", address)))
    }

    pub fn root_chain(&self, address: &Address) -> Option<&RootChain> {
        self.root_chains.get(address)
    }

    pub fn root_chain_addresses(&self) -> &[Address] {
        &self.order
    }

    pub fn staking(&self) -> &Staking {
        &self.staking
    }

    pub fn exits(&self) -> &ExitLedger {
        &self.exits
    }

    pub fn token_owner(&self) -> Address {
        self.token_owner
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn summary(&self) -> Result<NetworkSummary, PlasmaError> {
        let mut root_chains = Vec::with_capacity(self.order.len());
        for address in &self.order {
            let chain = self
                .root_chain(address)
                .ok_or_else(|| PlasmaError::NotFound(format!("root chain {}", address)))?;
            let fork = chain.current_fork();
            root_chains.push(RootChainSummary {
                address: *address,
                fork,
                last_block: chain.last_block(fork).unwrap_or(0),
                last_finalized_block: chain.last_finalized_block(fork).unwrap_or(0),
                num_requests: chain.num_requests(),
                operator_stake: self.staking.stake_of(address, &chain.operator())?,
                token_owner_stake: self.staking.stake_of(address, &self.token_owner())?,
            });
        }
        Ok(NetworkSummary {
            block_number: self.block_number,
            timestamp: self.timestamp,
            tot_total_supply: self.staking.tot_total_supply()?,
            exits_released: self.exits().released().len(),
            root_chains,
        })
    }
}

/// Finalize every eligible block and settle every finalized request.
/// Returns the number of blocks finalized.
fn finalize_all(
    chain: &mut RootChain,
    now: u64,
    exits: &mut ExitLedger,
) -> Result<usize, PlasmaError> {
    let mut finalized = 0;
    loop {
        let events = chain.finalize_block(now)?;
        if events.is_empty() {
            break;
        }
        finalized += events
            .iter()
            .filter(|e| matches!(e, ChainEvent::BlockFinalized { .. }))
            .count();
    }
    while !chain.finalize_request(now, exits)?.is_empty() {}
    Ok(finalized)
}

fn ton(units: u64) -> U256 {
    U256::from(units) * U256::exp10(TON_DECIMALS as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NodeConfig {
        NodeConfig {
            num_root_chains: 2,
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_bootstrap_stakes_every_root_chain() {
        let network = Network::bootstrap(&config(), 1_000).unwrap();
        assert_eq!(network.root_chain_addresses().len(), 2);
        for address in network.root_chain_addresses() {
            assert_eq!(
                network.staking().stake_of(address, &network.token_owner()).unwrap(),
                Ray::from_units(100)
            );
        }
        assert_eq!(network.staking().tot_total_supply().unwrap(), Ray::from_units(200));
    }

    #[test]
    fn test_steps_alternate_root_chains() {
        let mut network = Network::bootstrap(&config(), 1_000).unwrap();
        let first = network.step().unwrap();
        let second = network.step().unwrap();
        assert_eq!(first.root_chain, Some(network.root_chain_addresses()[0]));
        assert_eq!(second.root_chain, Some(network.root_chain_addresses()[1]));
        // NRE#1 (two blocks) goes in as one submission.
        assert_eq!(first.submitted_block, Some(2));
        assert_eq!(network.timestamp(), 1_024);
    }

    #[test]
    fn test_commits_grow_stake() {
        let mut network = Network::bootstrap(&config(), 1_000).unwrap();
        for _ in 0..6 {
            network.step().unwrap();
        }
        let rc = network.root_chain_addresses()[0];
        let stake = network
            .staking()
            .stake_of(&rc, &network.token_owner())
            .unwrap();
        assert!(stake > Ray::from_units(100));
        let summary = network.summary().unwrap();
        assert_eq!(summary.block_number, 6);
        assert!(summary.root_chains[0].last_finalized_block > 0);
    }

    #[test]
    fn test_exits_released_after_exit_period() {
        let config = NodeConfig {
            num_root_chains: 1,
            exits_per_block: 1,
            ..NodeConfig::default()
        };
        let mut network = Network::bootstrap(&config, 0).unwrap();
        for _ in 0..20 {
            network.step().unwrap();
        }
        let rc = network.root_chain_addresses()[0];
        let chain = network.root_chain(&rc).unwrap();
        assert_eq!(chain.num_requests(), 40);
        assert!(chain.collected_fees() > 0);
        let released = network.exits().released();
        assert!(!released.is_empty());
        assert!(released.iter().all(|exit| exit.requester == network.token_owner()));
    }
}
