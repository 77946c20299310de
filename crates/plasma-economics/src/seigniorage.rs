// crates/plasma-economics/src/seigniorage.rs
//
// SeigManager: block-based seigniorage over compounding ledgers.
//
// `tot` holds each root chain's share of the staked supply. Every time a
// root chain commits, seigniorage accrued since the last seigniorage block is
// added to `tot` by growing its factor; the committing root chain then
// catches its coinage up to its `tot` balance (minus operator commission).
// Root chains that have not committed yet carry the difference as
// uncommitted stake.
//
// The manager only keeps the ledgers. Minting the WTON that backs the new
// balances is the caller's job (see `staking::Staking`), driven by the
// `SeigSplit` and `CommitOutcome` values returned here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plasma_core::{Address, PlasmaError, Ray, WAD};

use crate::coinage::Coinage;
use crate::events::StakeEvent;
use crate::split::{compute_split, SeigRates, SeigSplit};

/// What one commit produced, for the caller to mint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Seigniorage accrued by `tot` during this commit, if any.
    pub split: Option<SeigSplit>,
    /// Growth of the root chain's stakes, backed by WTON held for depositors.
    pub seigs: Ray,
    /// Part of `seigs` credited to the operator as commission.
    pub operator_seigs: Ray,
}

/// Seigniorage and stake ledgers for every registered root chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeigManager {
    seig_per_block: Ray,
    rates: SeigRates,
    tot: Coinage,
    coinages: BTreeMap<Address, Coinage>,
    commission_rates: BTreeMap<Address, Ray>,
    last_seig_block: u64,
    last_commit_block: BTreeMap<Address, u64>,
    paused_at: Option<u64>,
    /// Blocks spent paused since `last_seig_block`.
    paused_blocks: u64,
}

impl SeigManager {
    pub fn new(seig_per_block: Ray, rates: SeigRates, start_block: u64) -> Self {
        Self {
            seig_per_block,
            rates,
            tot: Coinage::new(),
            coinages: BTreeMap::new(),
            commission_rates: BTreeMap::new(),
            last_seig_block: start_block,
            last_commit_block: BTreeMap::new(),
            paused_at: None,
            paused_blocks: 0,
        }
    }

    // ---------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------

    /// Create the coinage of a newly registered root chain.
    pub fn deploy_coinage(&mut self, root_chain: Address) -> Result<StakeEvent, PlasmaError> {
        if self.coinages.contains_key(&root_chain) {
            return Err(PlasmaError::InvalidState(format!(
                "root chain {} already has a coinage",
                root_chain
            )));
        }
        self.coinages.insert(root_chain, Coinage::new());
        Ok(StakeEvent::CoinageCreated { root_chain })
    }

    /// # Errors
    /// Returns `PlasmaError::InvalidState` if `rate` exceeds 1 and
    /// `PlasmaError::NotFound` for an unknown root chain.
    pub fn set_commission_rate(
        &mut self,
        root_chain: Address,
        rate: Ray,
    ) -> Result<StakeEvent, PlasmaError> {
        if rate > Ray::ONE {
            return Err(PlasmaError::InvalidState(format!(
                "commission rate {} exceeds 1",
                rate
            )));
        }
        self.coinage(&root_chain)?;
        let previous = self
            .commission_rates
            .insert(root_chain, rate)
            .unwrap_or_default();
        Ok(StakeEvent::CommissionRateSet {
            root_chain,
            previous,
            current: rate,
        })
    }

    /// Stop minting from `block` on.
    pub fn pause(&mut self, block: u64) -> Result<StakeEvent, PlasmaError> {
        if self.paused_at.is_some() {
            return Err(PlasmaError::Paused);
        }
        self.paused_at = Some(block);
        tracing::info!(block, "seigniorage paused");
        Ok(StakeEvent::Paused { block })
    }

    /// Resume minting. Blocks spent paused never earn seigniorage.
    pub fn unpause(&mut self, block: u64) -> Result<StakeEvent, PlasmaError> {
        let paused_at = self.paused_at.ok_or_else(|| {
            PlasmaError::InvalidState("seigniorage is not paused".to_string())
        })?;
        let from = paused_at.max(self.last_seig_block);
        self.paused_blocks += block.saturating_sub(from);
        self.paused_at = None;
        tracing::info!(block, paused_blocks = self.paused_blocks, "seigniorage unpaused");
        Ok(StakeEvent::Unpaused { block })
    }

    // ---------------------------------------------------------------
    // Seigniorage
    // ---------------------------------------------------------------

    /// Accrue seigniorage for the blocks since the last seigniorage block by
    /// growing `tot`. Returns `None` when nothing accrued: same block, no
    /// stake yet, or only paused blocks elapsed.
    ///
    /// # Errors
    /// Returns `PlasmaError::Paused` while paused.
    pub fn increase_tot(
        &mut self,
        block: u64,
        total_token_supply: Ray,
    ) -> Result<Option<SeigSplit>, PlasmaError> {
        if self.paused_at.is_some() {
            return Err(PlasmaError::Paused);
        }
        if block <= self.last_seig_block {
            return Ok(None);
        }
        let blocks = (block - self.last_seig_block).saturating_sub(self.paused_blocks);
        let prev = self.tot.total_supply()?;
        if prev.is_zero() || blocks == 0 {
            self.last_seig_block = block;
            self.paused_blocks = 0;
            return Ok(None);
        }

        let max_seig = self.seig_per_block.mul_int(blocks)?;
        let split = compute_split(max_seig, prev, total_token_supply, &self.rates)?;
        let next = prev.checked_add(split.tot_growth()?)?;
        let factor = self.tot.factor().mul_div(next, prev)?;
        self.tot.set_factor(factor)?;
        self.last_seig_block = block;
        self.paused_blocks = 0;

        tracing::debug!(
            block,
            blocks,
            staked_seig = %split.staked_seig,
            unstaked_seig = %split.unstaked_seig,
            "tot increased"
        );
        Ok(Some(split))
    }

    /// Settle a root-chain commit at `block`.
    ///
    /// While paused only the commit cursor moves. Otherwise accrues `tot`,
    /// then grows the root chain's coinage to its `tot` balance, minting the
    /// operator's commission into the operator's own coinage balance.
    pub fn on_commit(
        &mut self,
        root_chain: Address,
        operator: Address,
        block: u64,
        total_token_supply: Ray,
    ) -> Result<(CommitOutcome, Vec<StakeEvent>), PlasmaError> {
        self.coinage(&root_chain)?;
        self.last_commit_block.insert(root_chain, block);
        if self.paused_at.is_some() {
            tracing::debug!(%root_chain, block, "commit while paused");
            return Ok((CommitOutcome::default(), Vec::new()));
        }

        let split = self.increase_tot(block, total_token_supply)?;
        let mut events = Vec::new();
        if let Some(split) = split {
            events.push(seig_given(Some(root_chain), &split));
        }

        let tot_balance = self.tot.balance_of(&root_chain)?;
        let commission_rate = self.commission_rate(&root_chain);
        let coinage = self.coinage_mut(&root_chain)?;
        let prev = coinage.total_supply()?;
        let mut outcome = CommitOutcome {
            split,
            ..CommitOutcome::default()
        };

        if !prev.is_zero() && tot_balance > prev {
            let seigs = tot_balance.checked_sub(prev)?;
            let operator_seigs = seigs.rmul(commission_rate)?;
            let next = prev.checked_add(seigs)?.checked_sub(operator_seigs)?;
            if next != prev {
                coinage.set_total_supply(next)?;
            }
            if !operator_seigs.is_zero() {
                coinage.mint(operator, operator_seigs)?;
            }
            outcome.seigs = seigs;
            outcome.operator_seigs = operator_seigs;
        }

        events.push(StakeEvent::CommitLog {
            root_chain,
            tot_balance,
            coinage_total_supply: prev,
            seigs: outcome.seigs,
            operator_seigs: outcome.operator_seigs,
        });
        events.push(StakeEvent::Committed { root_chain, block });
        tracing::debug!(
            %root_chain,
            block,
            seigs = %outcome.seigs,
            operator_seigs = %outcome.operator_seigs,
            "root chain committed"
        );
        Ok((outcome, events))
    }

    /// Record a deposit: accrue `tot` first (unless paused) so the new stake
    /// earns nothing for earlier blocks, then mint coinage and `tot`.
    pub fn on_deposit(
        &mut self,
        root_chain: Address,
        depositor: Address,
        amount: Ray,
        block: u64,
        total_token_supply: Ray,
    ) -> Result<(Option<SeigSplit>, Vec<StakeEvent>), PlasmaError> {
        self.coinage(&root_chain)?;
        let split = self.accrue(block, total_token_supply)?;
        // `tot` rounds up and coinage rounds down so the coinage never
        // outgrows the root chain's `tot` balance.
        self.tot.mint_up(root_chain, amount)?;
        self.coinage_mut(&root_chain)?.mint(depositor, amount)?;
        let events = split
            .iter()
            .map(|s| seig_given(None, s))
            .collect();
        Ok((split, events))
    }

    /// Record a withdrawal request: burn `amount` of coinage and the
    /// matching share of `tot`, including the depositor's part of the root
    /// chain's uncommitted seigniorage. Returns the `tot` amount burned.
    ///
    /// # Errors
    /// Returns `PlasmaError::InsufficientStake` if `amount` exceeds the
    /// depositor's stake.
    pub fn on_withdraw(
        &mut self,
        root_chain: Address,
        depositor: Address,
        amount: Ray,
        block: u64,
        total_token_supply: Ray,
    ) -> Result<(Option<SeigSplit>, Vec<StakeEvent>), PlasmaError> {
        let available = self.coinage(&root_chain)?.balance_of(&depositor)?;
        if amount > available {
            return Err(PlasmaError::InsufficientStake {
                requested: amount,
                available,
            });
        }
        let split = self.accrue(block, total_token_supply)?;
        let mut events: Vec<StakeEvent> = split.iter().map(|s| seig_given(None, s)).collect();

        let additional = self.additional_tot_burn_amount(&root_chain, amount)?;
        let tot_balance = self.tot.balance_of(&root_chain)?;
        let tot_burn_amount = amount.checked_add(additional)?.min(tot_balance);
        self.tot.burn_down(root_chain, tot_burn_amount)?;
        self.coinage_mut(&root_chain)?.burn_from(depositor, amount)?;

        events.push(StakeEvent::UnstakeLog {
            coinage_burn_amount: amount,
            tot_burn_amount,
        });
        Ok((split, events))
    }

    fn accrue(
        &mut self,
        block: u64,
        total_token_supply: Ray,
    ) -> Result<Option<SeigSplit>, PlasmaError> {
        if self.paused_at.is_some() {
            return Ok(None);
        }
        self.increase_tot(block, total_token_supply)
    }

    // ---------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------

    /// Committed stake of `depositor` on `root_chain`.
    pub fn stake_of(&self, root_chain: &Address, depositor: &Address) -> Result<Ray, PlasmaError> {
        self.coinage(root_chain)?.balance_of(depositor)
    }

    /// Seigniorage `depositor` would gain if `root_chain` committed now.
    pub fn uncommitted_stake_of(
        &self,
        root_chain: &Address,
        depositor: &Address,
    ) -> Result<Ray, PlasmaError> {
        let coinage = self.coinage(root_chain)?;
        let total = coinage.total_supply()?;
        let tot_balance = self.tot.balance_of(root_chain)?;
        if total.is_zero() || tot_balance <= total {
            return Ok(Ray::ZERO);
        }
        let balance = coinage.balance_of(depositor)?;
        Ok(balance.mul_div(tot_balance, total)?.saturating_sub(balance))
    }

    /// Extra `tot` to burn when `amount` is withdrawn from `root_chain`: the
    /// withdrawn share of the root chain's uncommitted seigniorage.
    pub fn additional_tot_burn_amount(
        &self,
        root_chain: &Address,
        amount: Ray,
    ) -> Result<Ray, PlasmaError> {
        let total = self.coinage(root_chain)?.total_supply()?;
        let tot_balance = self.tot.balance_of(root_chain)?;
        if total.is_zero() || tot_balance <= total.checked_add(Ray::from_raw(WAD))? {
            return Ok(Ray::ZERO);
        }
        tot_balance.checked_sub(total)?.mul_div(amount, total)
    }

    pub fn tot(&self) -> &Coinage {
        &self.tot
    }

    pub fn coinage(&self, root_chain: &Address) -> Result<&Coinage, PlasmaError> {
        self.coinages
            .get(root_chain)
            .ok_or_else(|| PlasmaError::NotFound(format!("coinage of root chain {}", root_chain)))
    }

    fn coinage_mut(&mut self, root_chain: &Address) -> Result<&mut Coinage, PlasmaError> {
        self.coinages
            .get_mut(root_chain)
            .ok_or_else(|| PlasmaError::NotFound(format!("coinage of root chain {}", root_chain)))
    }

    pub fn commission_rate(&self, root_chain: &Address) -> Ray {
        self.commission_rates
            .get(root_chain)
            .copied()
            .unwrap_or_default()
    }

    pub fn seig_per_block(&self) -> Ray {
        self.seig_per_block
    }

    pub fn rates(&self) -> &SeigRates {
        &self.rates
    }

    pub fn last_seig_block(&self) -> u64 {
        self.last_seig_block
    }

    pub fn last_commit_block(&self, root_chain: &Address) -> Option<u64> {
        self.last_commit_block.get(root_chain).copied()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}

fn seig_given(root_chain: Option<Address>, split: &SeigSplit) -> StakeEvent {
    StakeEvent::SeigGiven {
        root_chain,
        total_seig: split.total_seig,
        staked_seig: split.staked_seig,
        pseig: split.pseig,
        unstaked_seig: split.unstaked_seig,
        powerton_seig: split.powerton_seig,
        dao_seig: split.dao_seig,
    }
}
