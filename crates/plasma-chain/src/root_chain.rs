// crates/plasma-chain/src/root_chain.rs
//
// RootChain: the operator-facing facade over the fork arena, the epoch
// machine, and the request registry.
//
// Every mutating call validates position and fee before it touches any
// ledger, returns the events it produced, and appends them to the chain's
// event log. Time is always passed in explicitly (`now`, in seconds).

use serde::{Deserialize, Serialize};

use plasma_core::{
    Address, BlockPosition, BlockRoots, ChallengeVerifier, EventLog, ExitHandler, PlasmaError,
    Word, U256,
};

use crate::block::{BlockKind, PlasmaBlock};
use crate::epoch::{self, Epoch};
use crate::events::ChainEvent;
use crate::fork::{Fork, ForkManager};
use crate::params::ChainParams;
use crate::request::{Request, RequestBlock, RequestRegistry};

/// Outcome of a block (or whole-epoch) submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub fork: u64,
    /// Number of the last block submitted by the call.
    pub block_number: u64,
    pub events: Vec<ChainEvent>,
}

/// A root chain run by a single operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootChain {
    params: ChainParams,
    operator: Address,
    forks: ForkManager,
    requests: RequestRegistry,
    events: EventLog<ChainEvent>,
    collected_fees: u128,
}

impl RootChain {
    /// Create a root chain whose genesis block commits `genesis_roots`.
    ///
    /// # Errors
    /// Returns `PlasmaError::Config` if `params` are unusable.
    pub fn new(
        params: ChainParams,
        operator: Address,
        genesis_roots: BlockRoots,
        now: u64,
    ) -> Result<Self, PlasmaError> {
        params.validate()?;
        let mut requests = RequestRegistry::new(&params);
        let (forks, events) = ForkManager::genesis(genesis_roots, &mut requests, &params, now)?;
        let mut chain = Self {
            params,
            operator,
            forks,
            requests,
            events: EventLog::new(),
            collected_fees: 0,
        };
        chain.record(events);
        Ok(chain)
    }

    // ---------------------------------------------------------------
    // Requests
    // ---------------------------------------------------------------

    /// Make `root_token` requestable by mapping it to `child_token`.
    pub fn map_token(
        &mut self,
        root_token: Address,
        child_token: Address,
    ) -> Result<Vec<ChainEvent>, PlasmaError> {
        let event = self.requests.map_token(root_token, child_token)?;
        Ok(self.record(vec![event]))
    }

    /// Record a deposit request. Returns the request id.
    pub fn start_enter(
        &mut self,
        requester: Address,
        token: Address,
        trie_key: Word,
        trie_value: Word,
        now: u64,
    ) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
        let (id, event) = self
            .requests
            .start_enter(requester, token, trie_key, trie_value, now)?;
        Ok((id, self.record(vec![event])))
    }

    /// Record an exit request paying `fee` wei. Returns the request id.
    pub fn start_exit(
        &mut self,
        requester: Address,
        token: Address,
        trie_key: Word,
        trie_value: Word,
        fee: u128,
        now: u64,
    ) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
        let (id, event) = self
            .requests
            .start_exit(requester, token, trie_key, trie_value, fee, now)?;
        self.collected_fees += fee;
        Ok((id, self.record(vec![event])))
    }

    // ---------------------------------------------------------------
    // Block submission
    // ---------------------------------------------------------------

    /// Submit a non-request block at `position` (`fork << 128 | block`).
    pub fn submit_nrb(
        &mut self,
        position: U256,
        roots: BlockRoots,
        fee: u128,
        now: u64,
    ) -> Result<Submission, PlasmaError> {
        self.submit(BlockKind::Nrb, position, roots, fee, now)
    }

    /// Submit an operator request block.
    pub fn submit_orb(
        &mut self,
        position: U256,
        roots: BlockRoots,
        fee: u128,
        now: u64,
    ) -> Result<Submission, PlasmaError> {
        self.submit(BlockKind::Orb, position, roots, fee, now)
    }

    /// Submit a user request block to a user-activated fork.
    pub fn submit_urb(
        &mut self,
        position: U256,
        roots: BlockRoots,
        fee: u128,
        now: u64,
    ) -> Result<Submission, PlasmaError> {
        self.submit(BlockKind::Urb, position, roots, fee, now)
    }

    fn submit(
        &mut self,
        kind: BlockKind,
        position: U256,
        roots: BlockRoots,
        fee: u128,
        now: u64,
    ) -> Result<Submission, PlasmaError> {
        let cost = match kind {
            BlockKind::Nrb => self.params.cost_nrb,
            BlockKind::Orb => self.params.cost_orb,
            BlockKind::Urb => self.params.cost_urb,
        };
        check_fee(cost, fee)?;
        let position = BlockPosition::decode(position)?;
        self.check_next_block(position.fork, position.block)?;

        let (block_number, events) = epoch::append_block(
            self.forks.current_mut(),
            &mut self.requests,
            &self.params,
            kind,
            roots,
            now,
        )?;
        self.collected_fees += fee;
        tracing::debug!(fork = position.fork, block = block_number, %kind, "block submitted");
        Ok(Submission {
            fork: position.fork,
            block_number,
            events: self.record(events),
        })
    }

    /// Submit a whole non-request epoch at once.
    ///
    /// `epoch_position` packs `(fork, epoch)` and `block_range` packs
    /// `(start_block, end_block)`; every block commits `roots`.
    ///
    /// # Errors
    /// Returns `PlasmaError::OutOfOrderBlock` if the range does not continue the
    /// current fork, and `PlasmaError::InvalidState` if the epoch is not the
    /// open, untouched non-request epoch or the range has the wrong length.
    pub fn submit_nre(
        &mut self,
        epoch_position: U256,
        block_range: U256,
        roots: BlockRoots,
        fee: u128,
        now: u64,
    ) -> Result<Submission, PlasmaError> {
        check_fee(self.params.cost_nrb, fee)?;
        let target = BlockPosition::decode(epoch_position)?;
        let range = BlockPosition::decode(block_range)?;
        let (start_block, end_block) = (range.fork, range.block);
        self.check_next_block(target.fork, start_block)?;

        let fork = self.forks.current();
        let epoch = fork
            .open_epoch()
            .filter(|e| e.number == target.block)
            .ok_or_else(|| {
                PlasmaError::InvalidState(format!(
                    "epoch {} is not the open epoch of fork {}",
                    target.block, fork.number
                ))
            })?;
        if epoch.is_request || epoch.start_block_number != start_block {
            return Err(PlasmaError::InvalidState(format!(
                "epoch {} is not an untouched non-request epoch",
                epoch.number
            )));
        }
        if end_block < start_block || end_block - start_block + 1 != epoch.num_blocks {
            return Err(PlasmaError::InvalidState(format!(
                "epoch {} spans {} blocks, got {}..={}",
                epoch.number, epoch.num_blocks, start_block, end_block
            )));
        }

        let mut events = Vec::new();
        let mut block_number = start_block;
        for _ in start_block..=end_block {
            let (number, produced) = epoch::append_block(
                self.forks.current_mut(),
                &mut self.requests,
                &self.params,
                BlockKind::Nrb,
                roots,
                now,
            )?;
            block_number = number;
            events.extend(produced);
        }
        self.collected_fees += fee;
        tracing::debug!(
            fork = target.fork,
            epoch = target.block,
            start_block,
            end_block,
            "non-request epoch submitted"
        );
        Ok(Submission {
            fork: target.fork,
            block_number,
            events: self.record(events),
        })
    }

    fn check_next_block(&self, fork: u64, block: u64) -> Result<(), PlasmaError> {
        let current = self.forks.current();
        let expected = current.last_block + 1;
        if fork != current.number || block != expected {
            return Err(PlasmaError::OutOfOrderBlock {
                fork,
                expected,
                actual: block,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Challenges and forks
    // ---------------------------------------------------------------

    /// Fork because `block_number` of the current fork is proven invalid.
    /// Returns the new fork number.
    pub fn challenge_block(
        &mut self,
        block_number: u64,
        proof: &[u8],
        verifier: &dyn ChallengeVerifier,
        now: u64,
    ) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
        let (fork, events) = self.forks.create_fork(
            block_number,
            proof,
            verifier,
            &mut self.requests,
            &self.params,
            now,
        )?;
        Ok((fork, self.record(events)))
    }

    /// Flag a block within its computation challenge period. It cannot
    /// finalize until `resolve_challenge` is called.
    pub fn open_challenge(
        &mut self,
        block_number: u64,
        now: u64,
    ) -> Result<Vec<ChainEvent>, PlasmaError> {
        let event = self.forks.open_challenge(block_number, &self.params, now)?;
        Ok(self.record(vec![event]))
    }

    /// Resolve an open challenge: fork if `proof` holds, otherwise clear the
    /// flag. Returns the new fork number when a fork was created.
    pub fn resolve_challenge(
        &mut self,
        block_number: u64,
        proof: &[u8],
        verifier: &dyn ChallengeVerifier,
        now: u64,
    ) -> Result<(Option<u64>, Vec<ChainEvent>), PlasmaError> {
        let fork_number = self.forks.current_number();
        let challenged = self
            .forks
            .current()
            .block(block_number)
            .map(|b| b.challenging)
            .unwrap_or(false);
        if !challenged {
            return Err(PlasmaError::InvalidState(format!(
                "block {} of fork {} has no open challenge",
                block_number, fork_number
            )));
        }
        if verifier.verify(fork_number, block_number, proof)? {
            let (fork, events) = self.forks.create_fork(
                block_number,
                proof,
                verifier,
                &mut self.requests,
                &self.params,
                now,
            )?;
            return Ok((Some(fork), self.record(events)));
        }
        let event = self.forks.dismiss_challenge(block_number)?;
        Ok((None, self.record(vec![event])))
    }

    /// Let users take over request-block submission from a silent operator.
    /// Returns the new, user-activated fork number.
    pub fn prepare_to_submit_urb(
        &mut self,
        fee: u128,
        now: u64,
    ) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
        check_fee(self.params.cost_urb_prepare, fee)?;
        let (fork, events) = self
            .forks
            .activate_user_fork(&mut self.requests, &self.params, now)?;
        self.collected_fees += fee;
        Ok((fork, self.record(events)))
    }

    /// Challenge exit `request_id` within its exit challenge period.
    pub fn challenge_exit(
        &mut self,
        request_id: u64,
        proof: &[u8],
        verifier: &dyn ChallengeVerifier,
        now: u64,
    ) -> Result<Vec<ChainEvent>, PlasmaError> {
        let event =
            self.requests
                .challenge_exit(request_id, proof, verifier, self.params.cp_exit, now)?;
        Ok(self.record(vec![event]))
    }

    // ---------------------------------------------------------------
    // Finalization
    // ---------------------------------------------------------------

    /// Finalize the next eligible block of the current fork. Returns no
    /// events (and changes nothing) when no block is eligible at `now`.
    pub fn finalize_block(&mut self, now: u64) -> Result<Vec<ChainEvent>, PlasmaError> {
        let events = self
            .forks
            .finalize_block(&mut self.requests, &self.params, now)?;
        Ok(self.record(events))
    }

    /// Settle the next request whose request block finalized, releasing
    /// unchallenged exits through `handler`.
    pub fn finalize_request(
        &mut self,
        now: u64,
        handler: &mut dyn ExitHandler,
    ) -> Result<Vec<ChainEvent>, PlasmaError> {
        let event = self
            .requests
            .finalize_next(now, self.params.cp_exit, handler)?;
        Ok(self.record(event.into_iter().collect()))
    }

    // ---------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn collected_fees(&self) -> u128 {
        self.collected_fees
    }

    pub fn events(&self) -> &EventLog<ChainEvent> {
        &self.events
    }

    pub fn current_fork(&self) -> u64 {
        self.forks.current_number()
    }

    pub fn fork(&self, number: u64) -> Option<&Fork> {
        self.forks.get(number)
    }

    pub fn epoch(&self, fork: u64, number: u64) -> Option<&Epoch> {
        self.forks.get(fork)?.epoch(number)
    }

    /// Block `number` as seen from `fork`: blocks below the fork point are
    /// looked up in the ancestor that holds them.
    pub fn block(&self, fork: u64, number: u64) -> Option<&PlasmaBlock> {
        let mut current = self.forks.get(fork)?;
        loop {
            if number >= current.first_block {
                return current.block(number);
            }
            current = self.forks.get(current.parent?)?;
        }
    }

    pub fn last_block(&self, fork: u64) -> Option<u64> {
        self.forks.get(fork).map(|f| f.last_block)
    }

    pub fn last_epoch(&self, fork: u64) -> Option<u64> {
        self.forks.get(fork).map(|f| f.last_epoch)
    }

    pub fn last_finalized_block(&self, fork: u64) -> Option<u64> {
        self.forks.get(fork).map(|f| f.last_finalized_block)
    }

    pub fn first_filled_ore_number(&self, fork: u64) -> Option<u64> {
        self.forks.get(fork)?.first_filled_ore_number()
    }

    pub fn request(&self, id: u64) -> Option<&Request> {
        self.requests.request(id)
    }

    pub fn request_block(&self, id: u64) -> Option<&RequestBlock> {
        self.requests.request_block(id)
    }

    pub fn num_requests(&self) -> u64 {
        self.requests.num_requests()
    }

    pub fn num_request_blocks(&self) -> u64 {
        self.requests.num_request_blocks()
    }

    pub fn requests(&self) -> &RequestRegistry {
        &self.requests
    }

    fn record(&mut self, events: Vec<ChainEvent>) -> Vec<ChainEvent> {
        self.events.extend(&events);
        events
    }
}

fn check_fee(required: u128, paid: u128) -> Result<(), PlasmaError> {
    if paid < required {
        return Err(PlasmaError::InsufficientFee { required, paid });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasma_core::ZERO_WORD;

    fn chain() -> RootChain {
        RootChain::new(
            ChainParams::default(),
            Address::from_low_u64(1),
            BlockRoots::default(),
            0,
        )
        .unwrap()
    }

    fn pos(fork: u64, block: u64) -> U256 {
        BlockPosition::new(fork, block).encode()
    }

    #[test]
    fn test_genesis_opens_first_nre() {
        let rc = chain();
        assert_eq!(rc.current_fork(), 0);
        assert_eq!(rc.last_block(0), Some(0));
        assert_eq!(rc.last_epoch(0), Some(0));
        let nre = rc.epoch(0, 1).unwrap();
        assert!(!nre.is_request);
        assert_eq!(nre.start_block_number, 1);
        assert!(rc.block(0, 0).unwrap().finalized);
    }

    #[test]
    fn test_out_of_order_block_rejected() {
        let mut rc = chain();
        let fee = rc.params().cost_nrb;
        let err = rc
            .submit_nrb(pos(0, 2), BlockRoots::default(), fee, 1)
            .unwrap_err();
        assert_eq!(
            err,
            PlasmaError::OutOfOrderBlock {
                fork: 0,
                expected: 1,
                actual: 2
            }
        );
        let err = rc
            .submit_nrb(pos(1, 1), BlockRoots::default(), fee, 1)
            .unwrap_err();
        assert!(matches!(err, PlasmaError::OutOfOrderBlock { .. }));
        assert_eq!(rc.last_block(0), Some(0));
    }

    #[test]
    fn test_insufficient_fee_rejected() {
        let mut rc = chain();
        let err = rc
            .submit_nrb(pos(0, 1), BlockRoots::default(), 1, 1)
            .unwrap_err();
        assert!(matches!(err, PlasmaError::InsufficientFee { paid: 1, .. }));
        assert_eq!(rc.collected_fees(), 0);
    }

    #[test]
    fn test_wrong_block_kind_rejected() {
        let mut rc = chain();
        let fee = rc.params().cost_orb;
        let err = rc
            .submit_orb(pos(0, 1), BlockRoots::default(), fee, 1)
            .unwrap_err();
        assert!(matches!(err, PlasmaError::InvalidState(_)));
        assert_eq!(rc.last_block(0), Some(0));
    }

    #[test]
    fn test_submit_nre_whole_epoch() {
        let mut rc = chain();
        let fee = rc.params().cost_nrb;
        let submission = rc
            .submit_nre(pos(0, 1), pos(1, 2), BlockRoots::default(), fee, 5)
            .unwrap();
        assert_eq!(submission.block_number, 2);
        assert_eq!(
            submission
                .events
                .iter()
                .filter(|e| e.is_block_submission())
                .count(),
            2
        );
        // ORE#2 is empty and closes at once; NRE#3 is open.
        assert!(rc.epoch(0, 2).unwrap().is_empty);
        assert_eq!(rc.last_epoch(0), Some(2));
        assert_eq!(rc.epoch(0, 3).unwrap().start_block_number, 3);
        assert_eq!(rc.collected_fees(), fee);
    }

    #[test]
    fn test_submit_nre_rejects_wrong_range() {
        let mut rc = chain();
        let fee = rc.params().cost_nrb;
        let err = rc
            .submit_nre(pos(0, 1), pos(1, 3), BlockRoots::default(), fee, 5)
            .unwrap_err();
        assert!(matches!(err, PlasmaError::InvalidState(_)));
        let err = rc
            .submit_nre(pos(0, 3), pos(1, 2), BlockRoots::default(), fee, 5)
            .unwrap_err();
        assert!(matches!(err, PlasmaError::InvalidState(_)));
        assert_eq!(rc.last_block(0), Some(0));
    }

    #[test]
    fn test_finalize_waits_for_withholding_period() {
        let mut rc = chain();
        let fee = rc.params().cost_nrb;
        rc.submit_nrb(pos(0, 1), BlockRoots::default(), fee, 100)
            .unwrap();

        assert!(rc.finalize_block(120).unwrap().is_empty());
        assert_eq!(rc.last_finalized_block(0), Some(0));

        let events = rc.finalize_block(121).unwrap();
        assert_eq!(
            events[0],
            ChainEvent::BlockFinalized {
                fork: 0,
                block_number: 1
            }
        );
        assert_eq!(rc.last_finalized_block(0), Some(1));
        // Nothing left to finalize.
        assert!(rc.finalize_block(500).unwrap().is_empty());
    }

    #[test]
    fn test_open_challenge_blocks_finalization() {
        let mut rc = chain();
        let fee = rc.params().cost_nrb;
        rc.submit_nrb(pos(0, 1), BlockRoots::default(), fee, 100)
            .unwrap();
        rc.open_challenge(1, 110).unwrap();
        assert!(rc.finalize_block(200).unwrap().is_empty());
        assert!(rc.open_challenge(1, 110).is_err());
    }

    #[test]
    fn test_start_exit_collects_fee() {
        let mut rc = chain();
        let token = Address::from_low_u64(7);
        rc.map_token(token, token).unwrap();
        let cost = rc.params().cost_eru;
        let (id, events) = rc
            .start_exit(Address::from_low_u64(3), token, ZERO_WORD, ZERO_WORD, cost, 0)
            .unwrap();
        assert_eq!(id, 0);
        assert_eq!(events.len(), 1);
        assert_eq!(rc.collected_fees(), cost);
    }

    #[test]
    fn test_event_log_accumulates() {
        let mut rc = chain();
        let before = rc.events().len();
        let fee = rc.params().cost_nrb;
        let submission = rc
            .submit_nrb(pos(0, 1), BlockRoots::default(), fee, 1)
            .unwrap();
        let (new_events, _) = rc.events().since(before);
        assert_eq!(new_events, submission.events.as_slice());
    }
}
