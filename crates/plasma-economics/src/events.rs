// crates/plasma-economics/src/events.rs
//
// Events emitted by the staking engine, in the order the state changes
// happen. The staking facade appends every event to its event log.

use serde::{Deserialize, Serialize};

use plasma_core::{Address, Ray};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeEvent {
    RootChainRegistered {
        root_chain: Address,
        operator: Address,
    },
    CoinageCreated {
        root_chain: Address,
    },
    CommissionRateSet {
        root_chain: Address,
        previous: Ray,
        current: Ray,
    },
    Deposited {
        root_chain: Address,
        depositor: Address,
        amount: Ray,
    },
    WithdrawalRequested {
        root_chain: Address,
        depositor: Address,
        amount: Ray,
        withdrawable_block: u64,
    },
    WithdrawalProcessed {
        root_chain: Address,
        depositor: Address,
        amount: Ray,
        receive_ton: bool,
    },
    UnstakeLog {
        coinage_burn_amount: Ray,
        tot_burn_amount: Ray,
    },
    CommitLog {
        root_chain: Address,
        tot_balance: Ray,
        coinage_total_supply: Ray,
        seigs: Ray,
        operator_seigs: Ray,
    },
    SeigGiven {
        root_chain: Option<Address>,
        total_seig: Ray,
        staked_seig: Ray,
        pseig: Ray,
        unstaked_seig: Ray,
        powerton_seig: Ray,
        dao_seig: Ray,
    },
    Committed {
        root_chain: Address,
        block: u64,
    },
    Paused {
        block: u64,
    },
    Unpaused {
        block: u64,
    },
}
