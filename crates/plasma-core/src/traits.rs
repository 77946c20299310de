// crates/plasma-core/src/traits.rs
//
// Collaborator interfaces between the root chain, the staking engine, and
// the outside world. Proof checking and value release are opaque to the
// ledgers; they only see these traits.

use serde::{Deserialize, Serialize};

use crate::error::PlasmaError;
use crate::ray::Ray;
use crate::types::{Address, Word};

/// Decides whether a challenge against a submitted block (or exit) holds.
pub trait ChallengeVerifier {
    /// Returns `true` when `proof` shows that block `block_number` of `fork`
    /// is invalid and a fork must be created.
    fn verify(&self, fork: u64, block_number: u64, proof: &[u8]) -> Result<bool, PlasmaError>;
}

/// Resolves a root-chain token to its requestable child-chain counterpart.
pub trait TokenMapping {
    fn resolve(&self, root_token: &Address) -> Option<Address>;
}

/// A pool that receives part of every seigniorage mint (PowerTON, DAO vault).
pub trait RewardPool {
    /// The account that holds the pool's minted tokens.
    fn address(&self) -> Address;

    /// Record `amount` of newly minted tokens as pool income.
    fn credit(&mut self, amount: Ray) -> Result<(), PlasmaError>;

    /// Total amount held by the pool.
    fn balance(&self) -> Ray;
}

/// A finalized exit request handed to the withdrawal-release side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRelease {
    pub request_id: u64,
    pub requester: Address,
    pub token: Address,
    pub trie_key: Word,
    pub trie_value: Word,
}

/// Releases root-chain funds once an exit request is finalized.
pub trait ExitHandler {
    fn release(&mut self, exit: &ExitRelease) -> Result<(), PlasmaError>;
}
