// crates/plasma-chain/src/fork.rs
//
// Fork tracking and block finalization.
//
// Forks live in an arena indexed by fork number; only the newest fork accepts
// blocks. A fork is created when a challenge proves a block invalid, or when
// users take over request-block submission after the operator goes silent.
// A new fork restarts at the first unfinalized block of its parent and opens
// with two rebase epochs:
//
//   ORE' (first_epoch)      one block per unresolved request block, in id order
//   NRE' (first_epoch + 1)  one block per parent NRB at or after the fork point
//
// Requests still pending at fork time are sealed for the first regular ORE at
// `first_epoch + REBASE_EPOCHS`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use plasma_core::{BlockPosition, BlockRoots, ChallengeVerifier, PlasmaError};

use crate::block::{BlockKind, PlasmaBlock};
use crate::epoch::{self, Epoch, EpochStatus};
use crate::events::ChainEvent;
use crate::params::{ChainParams, REBASE_EPOCHS};
use crate::request::RequestRegistry;

/// One continuation of the child chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fork {
    pub number: u64,
    pub parent: Option<u64>,
    pub first_block: u64,
    /// Last submitted block.
    pub last_block: u64,
    pub first_epoch: u64,
    /// Last closed epoch.
    pub last_epoch: u64,
    pub last_finalized_block: u64,
    pub last_finalized_epoch: u64,
    /// First block replaced by a child fork, once one exists.
    pub forked_block: Option<u64>,
    pub user_activated: bool,
    /// Timestamp of the last block submission (or of fork creation).
    pub last_submitted_at: u64,
    pub epochs: BTreeMap<u64, Epoch>,
    pub blocks: BTreeMap<u64, PlasmaBlock>,
}

impl Fork {
    pub fn epoch(&self, number: u64) -> Option<&Epoch> {
        self.epochs.get(&number)
    }

    pub fn block(&self, number: u64) -> Option<&PlasmaBlock> {
        self.blocks.get(&number)
    }

    /// The epoch currently accepting blocks.
    pub fn open_epoch(&self) -> Option<&Epoch> {
        self.epochs
            .get(&(self.last_epoch + 1))
            .filter(|e| e.status == EpochStatus::Open)
    }

    /// Number of the first non-empty regular request epoch of this fork.
    pub fn first_filled_ore_number(&self) -> Option<u64> {
        self.epochs
            .values()
            .find(|e| e.is_request && !e.rebase && !e.is_empty && e.status != EpochStatus::Pending)
            .map(|e| e.number)
    }

    /// Mark every closed epoch whose last block is finalized.
    fn finalize_epochs(&mut self) -> Vec<ChainEvent> {
        let mut events = Vec::new();
        loop {
            let number = self.last_finalized_epoch + 1;
            match self.epochs.get_mut(&number) {
                Some(epoch)
                    if epoch.status == EpochStatus::Closed
                        && epoch.end_block_number <= self.last_finalized_block =>
                {
                    epoch.status = EpochStatus::Finalized;
                    self.last_finalized_epoch = number;
                    events.push(ChainEvent::EpochFinalized {
                        fork: self.number,
                        epoch_number: number,
                        start_block_number: epoch.start_block_number,
                        end_block_number: epoch.end_block_number,
                    });
                }
                _ => break,
            }
        }
        events
    }
}

/// Arena of forks. Fork 0 is created at genesis; the last fork is current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkManager {
    forks: Vec<Fork>,
}

impl ForkManager {
    /// Create fork 0 with the finalized genesis block and epoch, then open
    /// the first non-request epoch.
    pub fn genesis(
        roots: BlockRoots,
        requests: &mut RequestRegistry,
        params: &ChainParams,
        now: u64,
    ) -> Result<(Self, Vec<ChainEvent>), PlasmaError> {
        let mut genesis_epoch = Epoch::request(0, 0, 0, 0, 0);
        genesis_epoch.status = EpochStatus::Finalized;
        genesis_epoch.is_empty = true;
        genesis_epoch.timestamp = now;

        let genesis_block = PlasmaBlock {
            fork_number: 0,
            number: 0,
            epoch_number: 0,
            kind: BlockKind::Nrb,
            is_request: false,
            request_block_id: 0,
            reference_block: None,
            roots,
            timestamp: now,
            finalized: true,
            finalized_at: Some(now),
            challenging: false,
        };

        let mut fork = Fork {
            number: 0,
            parent: None,
            first_block: 0,
            last_block: 0,
            first_epoch: 0,
            last_epoch: 0,
            last_finalized_block: 0,
            last_finalized_epoch: 0,
            forked_block: None,
            user_activated: false,
            last_submitted_at: now,
            epochs: BTreeMap::from([(0, genesis_epoch)]),
            blocks: BTreeMap::from([(0, genesis_block)]),
        };
        let events = epoch::open_next_epoch(&mut fork, requests, params, now)?;
        Ok((Self { forks: vec![fork] }, events))
    }

    pub fn current_number(&self) -> u64 {
        self.forks.len() as u64 - 1
    }

    pub fn current(&self) -> &Fork {
        &self.forks[self.forks.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut Fork {
        let last = self.forks.len() - 1;
        &mut self.forks[last]
    }

    pub fn get(&self, number: u64) -> Option<&Fork> {
        self.forks.get(number as usize)
    }

    pub fn len(&self) -> usize {
        self.forks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forks.is_empty()
    }

    /// Fork away from the current fork because `trigger_block` was proven
    /// invalid. Returns the new fork number.
    ///
    /// # Errors
    /// Returns `PlasmaError::ForkPreconditionUnmet` if the block is not an
    /// unfinalized block of the current fork or the verifier rejects `proof`.
    pub fn create_fork(
        &mut self,
        trigger_block: u64,
        proof: &[u8],
        verifier: &dyn ChallengeVerifier,
        requests: &mut RequestRegistry,
        params: &ChainParams,
        now: u64,
    ) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
        let current = self.current();
        if current.block(trigger_block).is_none() {
            return Err(PlasmaError::ForkPreconditionUnmet(format!(
                "block {} is not submitted in fork {}",
                trigger_block, current.number
            )));
        }
        if trigger_block <= current.last_finalized_block {
            return Err(PlasmaError::ForkPreconditionUnmet(format!(
                "block {} of fork {} is already finalized",
                trigger_block, current.number
            )));
        }
        if !verifier.verify(current.number, trigger_block, proof)? {
            return Err(PlasmaError::ForkPreconditionUnmet(format!(
                "challenge against block {} of fork {} was rejected",
                trigger_block, current.number
            )));
        }
        self.spawn(false, requests, params, now)
    }

    /// Fork away from a silent operator so users can submit the unresolved
    /// request blocks themselves as URBs.
    ///
    /// # Errors
    /// Returns `PlasmaError::ForkPreconditionUnmet` if the operator submitted
    /// within `prepare_timeout`, URBs are already active, or there is no
    /// unresolved request block to carry.
    pub fn activate_user_fork(
        &mut self,
        requests: &mut RequestRegistry,
        params: &ChainParams,
        now: u64,
    ) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
        let current = self.current();
        let deadline = current.last_submitted_at.saturating_add(params.prepare_timeout);
        if now < deadline {
            return Err(PlasmaError::ForkPreconditionUnmet(format!(
                "operator of fork {} may submit until {}",
                current.number, deadline
            )));
        }
        if current
            .open_epoch()
            .map(|e| e.accepts(BlockKind::Urb))
            .unwrap_or(false)
        {
            return Err(PlasmaError::ForkPreconditionUnmet(format!(
                "fork {} already accepts user-submitted blocks",
                current.number
            )));
        }
        if requests.first_unfinalized_block() >= requests.num_request_blocks() {
            return Err(PlasmaError::ForkPreconditionUnmet(
                "no unresolved request block to submit".to_string(),
            ));
        }
        self.spawn(true, requests, params, now)
    }

    fn spawn(
        &mut self,
        user_activated: bool,
        requests: &mut RequestRegistry,
        params: &ChainParams,
        now: u64,
    ) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
        let parent_number = self.current_number();
        let parent = self.current();
        let first_block = parent.last_finalized_block + 1;
        let first_epoch = parent
            .block(first_block)
            .map(|b| b.epoch_number)
            .unwrap_or(parent.last_epoch + 1);

        // ORE' replays every request block not yet settled, pointing at the
        // parent block that carried it (if any).
        let covered = requests.first_unfinalized_block()..requests.num_request_blocks();
        let request_refs: Vec<Option<u64>> = covered
            .clone()
            .map(|id| {
                parent
                    .blocks
                    .range(first_block..)
                    .find(|(_, b)| b.is_request && b.request_block_id == id)
                    .map(|(n, _)| *n)
            })
            .collect();
        let nrb_refs: Vec<Option<u64>> = parent
            .blocks
            .range(first_block..)
            .filter(|(_, b)| !b.is_request)
            .map(|(n, _)| Some(*n))
            .collect();

        let mut rebase_ore = if covered.is_empty() {
            Epoch::empty_request(first_epoch, requests)
        } else {
            let start = requests
                .request_block(covered.start)
                .map(|b| b.request_start)
                .ok_or_else(|| PlasmaError::NotFound(format!("request block {}", covered.start)))?;
            let end = requests
                .request_block(covered.end - 1)
                .map(|b| b.request_end)
                .ok_or_else(|| PlasmaError::NotFound(format!("request block {}", covered.end - 1)))?;
            Epoch::request(
                first_epoch,
                covered.start,
                start,
                end,
                covered.end - covered.start,
            )
        };
        rebase_ore.rebase = true;
        rebase_ore.user_activated = user_activated;
        rebase_ore.reference_blocks = request_refs;

        let mut rebase_nre = Epoch::non_request(first_epoch + 1, nrb_refs.len() as u64);
        rebase_nre.rebase = true;
        rebase_nre.reference_blocks = nrb_refs;

        let new_number = parent_number + 1;
        let mut events = vec![
            ChainEvent::Forked {
                parent_fork: parent_number,
                new_fork: new_number,
                first_block,
                first_epoch,
                user_activated,
            },
            rebased_event(new_number, &rebase_ore, first_block),
            rebased_event(new_number, &rebase_nre, first_block + rebase_ore.num_blocks),
        ];

        let mut fork = Fork {
            number: new_number,
            parent: Some(parent_number),
            first_block,
            last_block: first_block - 1,
            first_epoch,
            last_epoch: first_epoch - 1,
            last_finalized_block: first_block - 1,
            last_finalized_epoch: first_epoch - 1,
            forked_block: None,
            user_activated,
            last_submitted_at: now,
            epochs: BTreeMap::from([
                (first_epoch, rebase_ore),
                (first_epoch + 1, rebase_nre),
            ]),
            blocks: BTreeMap::new(),
        };
        events.extend(epoch::assign_future_requests(
            &mut fork,
            requests,
            first_epoch + REBASE_EPOCHS,
        )?);
        events.extend(epoch::open_next_epoch(&mut fork, requests, params, now)?);
        events.extend(fork.finalize_epochs());

        self.current_mut().forked_block = Some(first_block);
        self.forks.push(fork);
        tracing::info!(
            parent_fork = parent_number,
            new_fork = new_number,
            first_block,
            first_epoch,
            user_activated,
            "fork created"
        );
        Ok((new_number, events))
    }

    /// Finalize the next block of the current fork if its withholding period
    /// elapsed and no challenge is open against it. A no-op otherwise.
    pub fn finalize_block(
        &mut self,
        requests: &mut RequestRegistry,
        params: &ChainParams,
        now: u64,
    ) -> Result<Vec<ChainEvent>, PlasmaError> {
        let fork = self.current_mut();
        let next = fork.last_finalized_block + 1;
        let Some(block) = fork.blocks.get(&next) else {
            return Ok(Vec::new());
        };
        if block.challenging || !block.withholding_elapsed(params.cp_withholding, now) {
            return Ok(Vec::new());
        }
        if block.is_request {
            requests.finalize_request_block(
                block.request_block_id,
                BlockPosition::new(fork.number, next),
                now,
            )?;
        }

        if let Some(block) = fork.blocks.get_mut(&next) {
            block.finalized = true;
            block.finalized_at = Some(now);
        }
        fork.last_finalized_block = next;
        let mut events = vec![ChainEvent::BlockFinalized {
            fork: fork.number,
            block_number: next,
        }];
        events.extend(fork.finalize_epochs());
        tracing::debug!(fork = fork.number, block = next, "block finalized");
        Ok(events)
    }

    /// Flag an unfinalized block of the current fork as challenged. A flagged
    /// block cannot finalize until the challenge is resolved.
    pub fn open_challenge(
        &mut self,
        block_number: u64,
        params: &ChainParams,
        now: u64,
    ) -> Result<ChainEvent, PlasmaError> {
        let fork = self.current_mut();
        let fork_number = fork.number;
        let block = fork
            .blocks
            .get_mut(&block_number)
            .filter(|b| !b.finalized)
            .ok_or_else(|| {
                PlasmaError::InvalidState(format!(
                    "block {} of fork {} is not an unfinalized block",
                    block_number, fork_number
                ))
            })?;
        if block.challenging {
            return Err(PlasmaError::InvalidState(format!(
                "block {} is already challenged",
                block_number
            )));
        }
        if now > block.timestamp.saturating_add(params.cp_computation) {
            return Err(PlasmaError::InvalidState(format!(
                "computation challenge period for block {} is over",
                block_number
            )));
        }
        block.challenging = true;
        Ok(ChainEvent::ChallengeOpened {
            fork: fork_number,
            block_number,
        })
    }

    /// Clear the challenge flag of a block whose challenge failed.
    pub fn dismiss_challenge(&mut self, block_number: u64) -> Result<ChainEvent, PlasmaError> {
        let fork = self.current_mut();
        let fork_number = fork.number;
        let block = fork
            .blocks
            .get_mut(&block_number)
            .filter(|b| b.challenging)
            .ok_or_else(|| {
                PlasmaError::InvalidState(format!(
                    "block {} of fork {} has no open challenge",
                    block_number, fork_number
                ))
            })?;
        block.challenging = false;
        Ok(ChainEvent::ChallengeDismissed {
            fork: fork_number,
            block_number,
        })
    }
}

fn rebased_event(fork: u64, epoch: &Epoch, start_block_number: u64) -> ChainEvent {
    ChainEvent::EpochRebased {
        fork,
        epoch_number: epoch.number,
        start_block_number,
        is_request: epoch.is_request,
        num_blocks: epoch.num_blocks,
        request_start: epoch.request_start,
        request_end: epoch.request_end,
    }
}
