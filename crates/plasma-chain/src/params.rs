// crates/plasma-chain/src/params.rs
//
// Root-chain protocol parameters: request block capacity, non-request epoch
// length, per-operation costs (wei), and challenge periods (seconds).

use serde::{Deserialize, Serialize};

/// 10^18 wei.
pub const ETHER: u128 = 1_000_000_000_000_000_000;

/// Number of leading epochs in a new fork that replay the parent (ORE' and NRE').
/// The first regular request epoch of a fork sits at `first_epoch + REBASE_EPOCHS`.
///
/// Requests still pending at fork time are sealed for that epoch, the one
/// right after NRE'. ORE' plays the role of the previous request epoch, so the
/// usual two-epoch request delay holds. They are not pushed out to
/// `first_epoch + 4`, which would leave the epoch after NRE' empty.
pub const REBASE_EPOCHS: u64 = 2;

/// Tunable root-chain parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Maximum number of requests sealed into one request block.
    pub max_requests: u64,
    /// Number of blocks in every non-request epoch.
    pub nre_length: u64,
    /// Fee for an exit request.
    pub cost_eru: u128,
    /// Fee for activating user-submitted request blocks.
    pub cost_urb_prepare: u128,
    /// Fee for a user-submitted request block.
    pub cost_urb: u128,
    /// Fee for an operator request block.
    pub cost_orb: u128,
    /// Fee for a non-request block (or a whole non-request epoch).
    pub cost_nrb: u128,
    /// Window after submission in which a computation challenge may be opened.
    pub cp_computation: u64,
    /// Delay after submission before a block can finalize.
    pub cp_withholding: u64,
    /// Window after a request block finalizes in which its exits may be challenged.
    pub cp_exit: u64,
    /// Operator silence after which users may activate URB submission.
    pub prepare_timeout: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            max_requests: 20,
            nre_length: 2,
            cost_eru: ETHER / 5,
            cost_urb_prepare: ETHER / 10,
            cost_urb: ETHER / 10 * 9,
            cost_orb: ETHER / 10,
            cost_nrb: ETHER / 10,
            cp_computation: 15,
            cp_withholding: 20,
            cp_exit: 10,
            prepare_timeout: 60,
        }
    }
}

impl ChainParams {
    /// Reject parameter sets the epoch machine cannot run with.
    pub fn validate(&self) -> Result<(), plasma_core::PlasmaError> {
        if self.max_requests == 0 {
            return Err(plasma_core::PlasmaError::Config(
                "max_requests must be at least 1".to_string(),
            ));
        }
        if self.nre_length == 0 {
            return Err(plasma_core::PlasmaError::Config(
                "nre_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
