// crates/plasma-economics/src/staking.rs
//
// Staking: the entry point for deposits, withdrawals, and root-chain commits.
//
// Composes the token ledger, the seigniorage manager, the deposit manager,
// the root-chain registry, and both reward pools. Every action validates
// before it mutates, returns the events it produced, and appends them to
// the staking event log.
//
// Token flows:
//   deposit          depositor WTON -> deposit manager
//   commit           seigs minted to deposit manager, pool shares minted
//                    to PowerTON and the DAO vault
//   process_request  deposit manager WTON -> depositor (optionally as TON)

use plasma_core::{Address, EventLog, PlasmaError, Ray, RewardPool, U256};

use crate::config::StakeConfig;
use crate::deposit::DepositManager;
use crate::events::StakeEvent;
use crate::registry::RootChainRegistry;
use crate::seigniorage::{CommitOutcome, SeigManager};
use crate::split::SeigSplit;
use crate::token::TokenLedger;
use crate::vault::{DaoVault, PowerTon, Round};

#[derive(Debug, Clone)]
pub struct Staking {
    config: StakeConfig,
    tokens: TokenLedger,
    seig: SeigManager,
    deposits: DepositManager,
    registry: RootChainRegistry,
    powerton: PowerTon,
    dao: DaoVault,
    events: EventLog<StakeEvent>,
}

impl Staking {
    /// Set up an empty staking system with seigniorage accruing from
    /// `start_block`.
    ///
    /// # Errors
    /// Returns `PlasmaError::Config` if `config` does not validate.
    pub fn new(config: StakeConfig, start_block: u64) -> Result<Self, PlasmaError> {
        config.validate()?;
        Ok(Self {
            tokens: TokenLedger::new(Address::derive("WTON")),
            seig: SeigManager::new(config.seig_per_block, config.rates(), start_block),
            deposits: DepositManager::new(
                Address::derive("DepositManager"),
                config.withdrawal_delay,
            ),
            registry: RootChainRegistry::new(),
            powerton: PowerTon::new(Address::derive("PowerTON"), config.round_duration),
            dao: DaoVault::new(Address::derive("DAOVault")),
            events: EventLog::new(),
            config,
        })
    }

    fn emit(&mut self, events: Vec<StakeEvent>) -> Vec<StakeEvent> {
        self.events.extend(&events);
        events
    }

    // ---------------------------------------------------------------
    // Tokens
    // ---------------------------------------------------------------

    pub fn mint_ton(&mut self, to: Address, amount: U256) -> Result<(), PlasmaError> {
        self.tokens.mint_ton(to, amount)
    }

    pub fn swap_from_ton(&mut self, account: Address, amount: U256) -> Result<Ray, PlasmaError> {
        self.tokens.swap_from_ton(account, amount)
    }

    pub fn swap_to_ton(&mut self, account: Address, amount: Ray) -> Result<U256, PlasmaError> {
        self.tokens.swap_to_ton(account, amount)
    }

    // ---------------------------------------------------------------
    // Root chains
    // ---------------------------------------------------------------

    /// Accept `root_chain` for staking and deploy its coinage.
    pub fn register_root_chain(
        &mut self,
        root_chain: Address,
        operator: Address,
    ) -> Result<Vec<StakeEvent>, PlasmaError> {
        self.registry.register(root_chain, operator)?;
        let mut events = vec![StakeEvent::RootChainRegistered {
            root_chain,
            operator,
        }];
        events.push(self.seig.deploy_coinage(root_chain)?);
        if !self.config.default_commission_rate.is_zero() {
            events.push(
                self.seig
                    .set_commission_rate(root_chain, self.config.default_commission_rate)?,
            );
        }
        tracing::info!(%root_chain, %operator, "root chain registered");
        Ok(self.emit(events))
    }

    pub fn set_commission_rate(
        &mut self,
        root_chain: Address,
        rate: Ray,
    ) -> Result<Vec<StakeEvent>, PlasmaError> {
        let event = self.seig.set_commission_rate(root_chain, rate)?;
        Ok(self.emit(vec![event]))
    }

    /// Settle a commit of `root_chain` at `block` and mint the WTON backing
    /// the new stake and pool shares.
    pub fn commit(
        &mut self,
        root_chain: Address,
        block: u64,
    ) -> Result<(CommitOutcome, Vec<StakeEvent>), PlasmaError> {
        let operator = self.registry.operator_of(&root_chain)?;
        let total_token_supply = self.tokens.total_supply_ray()?;
        let (outcome, events) =
            self.seig
                .on_commit(root_chain, operator, block, total_token_supply)?;

        self.tokens.mint_wton(self.deposits.address(), outcome.seigs)?;
        if let Some(split) = &outcome.split {
            self.pay_pools(split)?;
        }
        Ok((outcome, self.emit(events)))
    }

    fn pay_pools(&mut self, split: &SeigSplit) -> Result<(), PlasmaError> {
        if !split.powerton_seig.is_zero() {
            self.tokens.mint_wton(self.powerton.address(), split.powerton_seig)?;
            self.powerton.credit(split.powerton_seig)?;
        }
        if !split.dao_seig.is_zero() {
            self.tokens.mint_wton(self.dao.address(), split.dao_seig)?;
            self.dao.credit(split.dao_seig)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Deposits and withdrawals
    // ---------------------------------------------------------------

    /// Stake `amount` WTON of `depositor` on `root_chain`.
    ///
    /// # Errors
    /// Returns `PlasmaError::InsufficientBalance` if the depositor holds less
    /// than `amount` WTON and `PlasmaError::NotFound` for an unregistered
    /// root chain.
    pub fn deposit(
        &mut self,
        root_chain: Address,
        depositor: Address,
        amount: Ray,
        block: u64,
    ) -> Result<Vec<StakeEvent>, PlasmaError> {
        self.registry.operator_of(&root_chain)?;
        let available = self.tokens.wton_balance_of(&depositor);
        if amount > available {
            return Err(PlasmaError::InsufficientBalance {
                account: depositor,
                requested: amount,
                available,
            });
        }

        let total_token_supply = self.tokens.total_supply_ray()?;
        let (split, mut events) =
            self.seig
                .on_deposit(root_chain, depositor, amount, block, total_token_supply)?;
        if let Some(split) = &split {
            self.pay_pools(split)?;
        }
        self.tokens
            .transfer_wton(depositor, self.deposits.address(), amount)?;
        self.deposits.record_deposit(root_chain, depositor, amount)?;

        events.push(StakeEvent::Deposited {
            root_chain,
            depositor,
            amount,
        });
        tracing::debug!(%root_chain, %depositor, %amount, block, "deposited");
        Ok(self.emit(events))
    }

    /// Unstake `amount` now and queue its release after the withdrawal delay.
    pub fn request_withdrawal(
        &mut self,
        root_chain: Address,
        depositor: Address,
        amount: Ray,
        block: u64,
    ) -> Result<Vec<StakeEvent>, PlasmaError> {
        let total_token_supply = self.tokens.total_supply_ray()?;
        let (split, mut events) =
            self.seig
                .on_withdraw(root_chain, depositor, amount, block, total_token_supply)?;
        if let Some(split) = &split {
            self.pay_pools(split)?;
        }
        let withdrawable_block =
            self.deposits
                .enqueue_withdrawal(root_chain, depositor, amount, block)?;
        events.push(StakeEvent::WithdrawalRequested {
            root_chain,
            depositor,
            amount,
            withdrawable_block,
        });
        Ok(self.emit(events))
    }

    /// Unstake the depositor's whole committed stake.
    pub fn request_withdrawal_all(
        &mut self,
        root_chain: Address,
        depositor: Address,
        block: u64,
    ) -> Result<Vec<StakeEvent>, PlasmaError> {
        let amount = self.seig.stake_of(&root_chain, &depositor)?;
        self.request_withdrawal(root_chain, depositor, amount, block)
    }

    /// Release the oldest matured withdrawal of `depositor`, as WTON or,
    /// with `receive_ton`, unwrapped to TON.
    pub fn process_request(
        &mut self,
        root_chain: Address,
        depositor: Address,
        receive_ton: bool,
        block: u64,
    ) -> Result<Vec<StakeEvent>, PlasmaError> {
        let amount = self.deposits.next_matured(&root_chain, &depositor, block)?;
        self.tokens
            .transfer_wton(self.deposits.address(), depositor, amount)?;
        if receive_ton {
            self.tokens.swap_to_ton(depositor, amount)?;
        }
        self.deposits.complete_next(root_chain, depositor, block)?;

        tracing::debug!(%root_chain, %depositor, %amount, receive_ton, "withdrawal processed");
        Ok(self.emit(vec![StakeEvent::WithdrawalProcessed {
            root_chain,
            depositor,
            amount,
            receive_ton,
        }]))
    }

    /// Release up to `n` matured withdrawals in request order. Stops at the
    /// first one that cannot be processed; fails only if the first does.
    pub fn process_requests(
        &mut self,
        root_chain: Address,
        depositor: Address,
        n: usize,
        receive_ton: bool,
        block: u64,
    ) -> Result<Vec<StakeEvent>, PlasmaError> {
        let mut events = Vec::new();
        for i in 0..n {
            match self.process_request(root_chain, depositor, receive_ton, block) {
                Ok(mut processed) => events.append(&mut processed),
                Err(e) if i == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(events)
    }

    // ---------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------

    pub fn pause(&mut self, block: u64) -> Result<Vec<StakeEvent>, PlasmaError> {
        let event = self.seig.pause(block)?;
        Ok(self.emit(vec![event]))
    }

    pub fn unpause(&mut self, block: u64) -> Result<Vec<StakeEvent>, PlasmaError> {
        let event = self.seig.unpause(block)?;
        Ok(self.emit(vec![event]))
    }

    pub fn start_powerton(&mut self, now: u64) -> Result<(), PlasmaError> {
        self.powerton.start(now)
    }

    pub fn end_powerton_round(&mut self, now: u64) -> Result<Round, PlasmaError> {
        self.powerton.end_round(now)
    }

    // ---------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------

    pub fn stake_of(&self, root_chain: &Address, depositor: &Address) -> Result<Ray, PlasmaError> {
        self.seig.stake_of(root_chain, depositor)
    }

    pub fn uncommitted_stake_of(
        &self,
        root_chain: &Address,
        depositor: &Address,
    ) -> Result<Ray, PlasmaError> {
        self.seig.uncommitted_stake_of(root_chain, depositor)
    }

    pub fn additional_tot_burn_amount(
        &self,
        root_chain: &Address,
        amount: Ray,
    ) -> Result<Ray, PlasmaError> {
        self.seig.additional_tot_burn_amount(root_chain, amount)
    }

    pub fn tot_total_supply(&self) -> Result<Ray, PlasmaError> {
        self.seig.tot().total_supply()
    }

    pub fn coinage_total_supply(&self, root_chain: &Address) -> Result<Ray, PlasmaError> {
        self.seig.coinage(root_chain)?.total_supply()
    }

    pub fn wton_balance_of(&self, account: &Address) -> Ray {
        self.tokens.wton_balance_of(account)
    }

    pub fn ton_balance_of(&self, account: &Address) -> U256 {
        self.tokens.ton_balance_of(account)
    }

    pub fn config(&self) -> &StakeConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    pub fn seig_manager(&self) -> &SeigManager {
        &self.seig
    }

    pub fn deposit_manager(&self) -> &DepositManager {
        &self.deposits
    }

    pub fn registry(&self) -> &RootChainRegistry {
        &self.registry
    }

    pub fn powerton(&self) -> &PowerTon {
        &self.powerton
    }

    pub fn dao_vault(&self) -> &DaoVault {
        &self.dao
    }

    pub fn events(&self) -> &EventLog<StakeEvent> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TON_DECIMALS;

    fn ton(units: u64) -> U256 {
        U256::from(units) * U256::exp10(TON_DECIMALS as usize)
    }

    fn setup() -> (Staking, Address, Address) {
        let config = StakeConfig {
            seig_per_block: Ray::from_units(100),
            ..StakeConfig::default()
        };
        let mut staking = Staking::new(config, 0).unwrap();
        let rc = Address::derive("root-chain");
        let alice = Address::derive("alice");
        staking.register_root_chain(rc, Address::derive("operator")).unwrap();
        staking.mint_ton(alice, ton(100)).unwrap();
        staking.swap_from_ton(alice, ton(100)).unwrap();
        (staking, rc, alice)
    }

    #[test]
    fn test_deposit_moves_wton_to_deposit_manager() {
        let (mut staking, rc, alice) = setup();
        let events = staking.deposit(rc, alice, Ray::from_units(60), 1).unwrap();
        assert!(matches!(events.last(), Some(StakeEvent::Deposited { .. })));
        assert_eq!(staking.wton_balance_of(&alice), Ray::from_units(40));
        let dm = staking.deposit_manager().address();
        assert_eq!(staking.wton_balance_of(&dm), Ray::from_units(60));
        assert_eq!(staking.stake_of(&rc, &alice).unwrap(), Ray::from_units(60));
    }

    #[test]
    fn test_deposit_without_wton() {
        let (mut staking, rc, alice) = setup();
        let err = staking
            .deposit(rc, alice, Ray::from_units(101), 1)
            .unwrap_err();
        assert!(matches!(err, PlasmaError::InsufficientBalance { .. }));
        assert!(staking.tot_total_supply().unwrap().is_zero());
        assert_eq!(staking.events().len(), 2);
    }

    #[test]
    fn test_deposit_to_unregistered_root_chain() {
        let (mut staking, _, alice) = setup();
        let err = staking
            .deposit(Address::derive("unknown"), alice, Ray::ONE, 1)
            .unwrap_err();
        assert!(matches!(err, PlasmaError::NotFound(_)));
    }

    #[test]
    fn test_commit_mints_backing_wton() {
        let (mut staking, rc, alice) = setup();
        staking.deposit(rc, alice, Ray::from_units(100), 10).unwrap();
        let (outcome, events) = staking.commit(rc, 11).unwrap();
        assert_eq!(outcome.seigs, Ray::from_units(100));
        assert!(events
            .iter()
            .any(|e| matches!(e, StakeEvent::Committed { block: 11, .. })));
        let dm = staking.deposit_manager().address();
        assert_eq!(staking.wton_balance_of(&dm), Ray::from_units(200));
        assert!(staking.powerton().balance().is_zero());
    }

    #[test]
    fn test_process_requests_stops_at_immature() {
        let (mut staking, rc, alice) = setup();
        staking.deposit(rc, alice, Ray::from_units(100), 0).unwrap();
        staking.request_withdrawal(rc, alice, Ray::from_units(30), 0).unwrap();
        staking.request_withdrawal(rc, alice, Ray::from_units(20), 5).unwrap();

        let events = staking.process_requests(rc, alice, 5, false, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(staking.wton_balance_of(&alice), Ray::from_units(30));
        assert_eq!(
            staking.deposit_manager().num_pending_requests(&rc, &alice),
            1
        );
        assert!(matches!(
            staking.process_requests(rc, alice, 5, false, 14),
            Err(PlasmaError::WithdrawalNotMatured { .. })
        ));
    }
}
