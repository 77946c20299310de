// crates/plasma-core/src/error.rs
//
// Error taxonomy shared by every crate in the workspace.
//
// Every mutating operation validates fully before touching state, so any of
// these errors leaves the ledgers exactly as they were before the call.

use thiserror::Error;

use crate::ray::Ray;
use crate::types::Address;

/// Protocol-wide error types for the Plasma root chain and staking engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlasmaError {
    /// A block was submitted to the wrong fork or out of sequence.
    #[error("Out of order block: fork {fork} expects block {expected}, got {actual}")]
    OutOfOrderBlock { fork: u64, expected: u64, actual: u64 },

    /// The attached fee is below the cost of the operation (in wei).
    #[error("Insufficient fee: required {required} wei, paid {paid} wei")]
    InsufficientFee { required: u128, paid: u128 },

    /// A request referenced a root-chain token with no child-chain mapping.
    #[error("Unmapped token: {0}")]
    UnmappedToken(Address),

    /// A withdrawal asked for more than the depositor's compounding stake.
    #[error("Insufficient stake: requested {requested}, available {available}")]
    InsufficientStake { requested: Ray, available: Ray },

    /// A withdrawal was processed before its delay elapsed.
    #[error("Withdrawal not matured: withdrawable at block {withdrawable_at}, current block {current}")]
    WithdrawalNotMatured { withdrawable_at: u64, current: u64 },

    /// A request block was sealed twice.
    #[error("Request block {0} is already sealed")]
    AlreadySealed(u64),

    /// A fork could not be created (unknown, finalized, or unproven trigger block).
    #[error("Fork precondition unmet: {0}")]
    ForkPreconditionUnmet(String),

    /// A minting path was called while seigniorage is paused.
    #[error("Seigniorage is paused")]
    Paused,

    /// A token balance could not cover a transfer or burn.
    #[error("Insufficient balance for {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: Address,
        requested: Ray,
        available: Ray,
    },

    /// Fixed-point overflow, underflow, or division by zero.
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be read or was inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid state transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for PlasmaError {
    fn from(e: serde_json::Error) -> Self {
        PlasmaError::Serialization(e.to_string())
    }
}
