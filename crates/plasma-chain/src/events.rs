// crates/plasma-chain/src/events.rs
//
// Events emitted by the root chain. Each mutating call returns the events it
// produced, in order, and the root chain appends them to its event log.

use serde::{Deserialize, Serialize};

use plasma_core::{Address, Word};

use crate::block::BlockKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    TokenMapped {
        root_token: Address,
        child_token: Address,
    },
    RequestCreated {
        request_id: u64,
        requester: Address,
        token: Address,
        is_exit: bool,
        trie_key: Word,
        trie_value: Word,
    },
    RequestBlockSealed {
        request_block_id: u64,
        request_start: u64,
        request_end: u64,
    },
    EpochPrepared {
        fork: u64,
        epoch_number: u64,
        start_block_number: u64,
        is_request: bool,
        is_empty: bool,
        rebase: bool,
        user_activated: bool,
        first_request_block_id: u64,
        request_start: u64,
        request_end: u64,
    },
    EpochRebased {
        fork: u64,
        epoch_number: u64,
        start_block_number: u64,
        is_request: bool,
        num_blocks: u64,
        request_start: u64,
        request_end: u64,
    },
    BlockSubmitted {
        fork: u64,
        epoch_number: u64,
        block_number: u64,
        kind: BlockKind,
    },
    EpochClosed {
        fork: u64,
        epoch_number: u64,
        start_block_number: u64,
        end_block_number: u64,
    },
    BlockFinalized {
        fork: u64,
        block_number: u64,
    },
    EpochFinalized {
        fork: u64,
        epoch_number: u64,
        start_block_number: u64,
        end_block_number: u64,
    },
    Forked {
        parent_fork: u64,
        new_fork: u64,
        first_block: u64,
        first_epoch: u64,
        user_activated: bool,
    },
    ChallengeOpened {
        fork: u64,
        block_number: u64,
    },
    ChallengeDismissed {
        fork: u64,
        block_number: u64,
    },
    RequestFinalized {
        request_id: u64,
        is_exit: bool,
        released: bool,
    },
    RequestChallenged {
        request_id: u64,
    },
}

impl ChainEvent {
    /// Whether this event records a newly submitted block (a root-chain commit).
    pub fn is_block_submission(&self) -> bool {
        matches!(self, ChainEvent::BlockSubmitted { .. })
    }
}
