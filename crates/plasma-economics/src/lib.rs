// crates/plasma-economics/src/lib.rs
//
// plasma-economics: TON/WTON bookkeeping, compounding stake ledgers,
// seigniorage distribution, the deposit manager, and reward pools.
//
// All amounts are `Ray` values (27 decimals) except raw TON balances, which
// are wad-scaled `U256`s.

pub mod coinage;
pub mod config;
pub mod deposit;
pub mod events;
pub mod registry;
pub mod seigniorage;
pub mod split;
pub mod staking;
pub mod token;
pub mod vault;

// Re-export key types for ergonomic access from downstream crates.
pub use coinage::Coinage;
pub use config::{NetworkProfile, StakeConfig};
pub use deposit::{DepositManager, WithdrawalRequest};
pub use events::StakeEvent;
pub use registry::RootChainRegistry;
pub use seigniorage::{CommitOutcome, SeigManager};
pub use split::{compute_split, SeigRates, SeigSplit};
pub use staking::Staking;
pub use token::{TokenLedger, TON_DECIMALS, WTON_DECIMALS};
pub use vault::{DaoVault, PowerTon, Round};
