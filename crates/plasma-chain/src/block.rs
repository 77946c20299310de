// crates/plasma-chain/src/block.rs
//
// Plasma block records. A block belongs to exactly one fork and one epoch of
// that fork; request blocks additionally point at the request block whose
// requests they apply.

use serde::{Deserialize, Serialize};

use plasma_core::BlockRoots;

/// How a block entered the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Non-request block submitted by the operator.
    Nrb,
    /// Request block submitted by the operator.
    Orb,
    /// Request block submitted by a user after activating a fork.
    Urb,
}

impl BlockKind {
    pub fn is_request(self) -> bool {
        matches!(self, BlockKind::Orb | BlockKind::Urb)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockKind::Nrb => "NRB",
            BlockKind::Orb => "ORB",
            BlockKind::Urb => "URB",
        };
        f.write_str(name)
    }
}

/// A submitted plasma block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlasmaBlock {
    pub fork_number: u64,
    pub number: u64,
    pub epoch_number: u64,
    pub kind: BlockKind,
    pub is_request: bool,
    /// Request block applied by this block; meaningful only when `is_request`.
    pub request_block_id: u64,
    /// For blocks of a rebase epoch: the parent-fork block replayed here.
    pub reference_block: Option<u64>,
    pub roots: BlockRoots,
    pub timestamp: u64,
    pub finalized: bool,
    pub finalized_at: Option<u64>,
    /// Set while a computation challenge against this block is unresolved.
    pub challenging: bool,
}

impl PlasmaBlock {
    /// Whether the withholding period has elapsed at `now`.
    pub fn withholding_elapsed(&self, cp_withholding: u64, now: u64) -> bool {
        now >= self.timestamp.saturating_add(cp_withholding).saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withholding_boundary() {
        let block = PlasmaBlock {
            fork_number: 0,
            number: 1,
            epoch_number: 1,
            kind: BlockKind::Nrb,
            is_request: false,
            request_block_id: 0,
            reference_block: None,
            roots: BlockRoots::default(),
            timestamp: 100,
            finalized: false,
            finalized_at: None,
            challenging: false,
        };
        assert!(!block.withholding_elapsed(20, 120));
        assert!(block.withholding_elapsed(20, 121));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(BlockKind::Urb.to_string(), "URB");
        assert!(BlockKind::Orb.is_request());
        assert!(!BlockKind::Nrb.is_request());
    }
}
