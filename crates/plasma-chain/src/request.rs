// crates/plasma-chain/src/request.rs
//
// Request registry: the global log of enter/exit requests, the request blocks
// they are sealed into, and the root-token -> child-token mapping.
//
// Requests and request blocks are numbered globally (not per fork). A request
// block is sealed exactly once; sealing takes the contiguous run of pending
// request ids, at most `max_requests` of them. Request blocks finalize in id
// order, so everything below `first_unfinalized_block()` is settled on every
// future fork.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use plasma_core::{
    Address, BlockPosition, ChallengeVerifier, ExitHandler, ExitRelease, PlasmaError,
    TokenMapping, Word,
};

use crate::events::ChainEvent;
use crate::params::ChainParams;

/// An enter (deposit) or exit (withdrawal) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub requester: Address,
    /// Root-chain token contract.
    pub token: Address,
    /// Child-chain counterpart the token was mapped to.
    pub child_token: Address,
    pub is_exit: bool,
    /// True when the token maps onto itself.
    pub is_transfer: bool,
    pub trie_key: Word,
    pub trie_value: Word,
    pub timestamp: u64,
    /// Request block this request was sealed into, once sealed.
    pub request_block_id: Option<u64>,
    pub finalized: bool,
    pub challenged: bool,
}

/// A fixed batch of requests carried by one request-epoch block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBlock {
    pub id: u64,
    /// First request id (inclusive).
    pub request_start: u64,
    /// Last request id (inclusive).
    pub request_end: u64,
    /// Sealed: the request range is fixed and no request can join.
    pub submitted: bool,
    pub finalized: bool,
    pub finalized_at: Option<u64>,
    /// The plasma block whose finalization settled this request block.
    pub finalized_block: Option<BlockPosition>,
}

impl RequestBlock {
    pub fn num_requests(&self) -> u64 {
        if self.submitted {
            self.request_end - self.request_start + 1
        } else {
            0
        }
    }
}

/// Global request and request-block ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRegistry {
    requests: Vec<Request>,
    blocks: Vec<RequestBlock>,
    token_map: BTreeMap<Address, Address>,
    /// First request id not yet sealed into a request block.
    next_unsealed: u64,
    /// First request block id not yet finalized.
    next_unfinalized_block: u64,
    /// Next request id to hand to `finalize_request`.
    next_to_finalize: u64,
    max_requests: u64,
    cost_eru: u128,
}

impl RequestRegistry {
    pub fn new(params: &ChainParams) -> Self {
        Self {
            requests: Vec::new(),
            blocks: Vec::new(),
            token_map: BTreeMap::new(),
            next_unsealed: 0,
            next_unfinalized_block: 0,
            next_to_finalize: 0,
            max_requests: params.max_requests,
            cost_eru: params.cost_eru,
        }
    }

    /// Register `root_token` as requestable, mapped to `child_token`.
    ///
    /// # Errors
    /// Returns `PlasmaError::InvalidState` if the token is already mapped.
    pub fn map_token(
        &mut self,
        root_token: Address,
        child_token: Address,
    ) -> Result<ChainEvent, PlasmaError> {
        if let Some(existing) = self.token_map.get(&root_token) {
            return Err(PlasmaError::InvalidState(format!(
                "token {} is already mapped to {}",
                root_token, existing
            )));
        }
        self.token_map.insert(root_token, child_token);
        Ok(ChainEvent::TokenMapped {
            root_token,
            child_token,
        })
    }

    /// Record a deposit request.
    ///
    /// # Errors
    /// Returns `PlasmaError::UnmappedToken` if `token` has no child mapping.
    pub fn start_enter(
        &mut self,
        requester: Address,
        token: Address,
        trie_key: Word,
        trie_value: Word,
        now: u64,
    ) -> Result<(u64, ChainEvent), PlasmaError> {
        self.push_request(requester, token, trie_key, trie_value, false, now)
    }

    /// Record an exit request paying `fee` wei.
    ///
    /// # Errors
    /// Returns `PlasmaError::InsufficientFee` if `fee` is below the exit cost and
    /// `PlasmaError::UnmappedToken` if `token` has no child mapping.
    pub fn start_exit(
        &mut self,
        requester: Address,
        token: Address,
        trie_key: Word,
        trie_value: Word,
        fee: u128,
        now: u64,
    ) -> Result<(u64, ChainEvent), PlasmaError> {
        if fee < self.cost_eru {
            return Err(PlasmaError::InsufficientFee {
                required: self.cost_eru,
                paid: fee,
            });
        }
        self.push_request(requester, token, trie_key, trie_value, true, now)
    }

    fn push_request(
        &mut self,
        requester: Address,
        token: Address,
        trie_key: Word,
        trie_value: Word,
        is_exit: bool,
        now: u64,
    ) -> Result<(u64, ChainEvent), PlasmaError> {
        let child_token = self
            .resolve(&token)
            .ok_or(PlasmaError::UnmappedToken(token))?;
        let id = self.requests.len() as u64;
        self.requests.push(Request {
            id,
            requester,
            token,
            child_token,
            is_exit,
            is_transfer: child_token == token,
            trie_key,
            trie_value,
            timestamp: now,
            request_block_id: None,
            finalized: false,
            challenged: false,
        });
        tracing::debug!(request_id = id, is_exit, %requester, "request created");
        Ok((
            id,
            ChainEvent::RequestCreated {
                request_id: id,
                requester,
                token,
                is_exit,
                trie_key,
                trie_value,
            },
        ))
    }

    /// Allocate a new, unsealed request block and return its id.
    pub fn open_request_block(&mut self) -> u64 {
        let id = self.blocks.len() as u64;
        self.blocks.push(RequestBlock {
            id,
            request_start: self.next_unsealed,
            request_end: self.next_unsealed,
            submitted: false,
            finalized: false,
            finalized_at: None,
            finalized_block: None,
        });
        id
    }

    /// Seal the next run of pending requests (at most `max_requests`) into
    /// request block `request_block_id`.
    ///
    /// # Errors
    /// Returns `PlasmaError::NotFound` for an unknown block,
    /// `PlasmaError::AlreadySealed` if the block was sealed before, and
    /// `PlasmaError::InvalidState` if no request is pending.
    pub fn seal_pending_into(&mut self, request_block_id: u64) -> Result<ChainEvent, PlasmaError> {
        let pending = self.pending_count();
        let max_requests = self.max_requests;
        let start = self.next_unsealed;
        let block = self
            .blocks
            .get_mut(request_block_id as usize)
            .ok_or_else(|| PlasmaError::NotFound(format!("request block {}", request_block_id)))?;
        if block.submitted {
            return Err(PlasmaError::AlreadySealed(request_block_id));
        }
        if pending == 0 {
            return Err(PlasmaError::InvalidState(
                "no pending requests to seal".to_string(),
            ));
        }

        let count = pending.min(max_requests);
        let end = start + count - 1;
        let sealed = self
            .requests
            .get_mut(start as usize..=end as usize)
            .ok_or_else(|| PlasmaError::NotFound(format!("requests {}..={}", start, end)))?;
        block.request_start = start;
        block.request_end = end;
        block.submitted = true;
        for request in sealed {
            request.request_block_id = Some(request_block_id);
        }
        self.next_unsealed = end + 1;

        tracing::debug!(request_block_id, start, end, "request block sealed");
        Ok(ChainEvent::RequestBlockSealed {
            request_block_id,
            request_start: start,
            request_end: end,
        })
    }

    /// Seal every pending request, opening as many request blocks as needed.
    /// Returns the range of newly sealed request block ids.
    pub fn seal_all_pending(&mut self) -> Result<(Range<u64>, Vec<ChainEvent>), PlasmaError> {
        let first = self.blocks.len() as u64;
        let mut events = Vec::new();
        while self.pending_count() > 0 {
            let id = self.open_request_block();
            events.push(self.seal_pending_into(id)?);
        }
        Ok((first..self.blocks.len() as u64, events))
    }

    /// Number of requests not yet sealed into a request block.
    pub fn pending_count(&self) -> u64 {
        self.requests.len() as u64 - self.next_unsealed
    }

    /// Id of the last sealed request, if any.
    pub fn last_sealed_request(&self) -> Option<u64> {
        self.next_unsealed.checked_sub(1)
    }

    /// First request block id whose requests are not settled yet.
    pub fn first_unfinalized_block(&self) -> u64 {
        self.next_unfinalized_block
    }

    /// Mark a request block finalized because `carrier` finalized at `now`.
    pub fn finalize_request_block(
        &mut self,
        request_block_id: u64,
        carrier: BlockPosition,
        now: u64,
    ) -> Result<(), PlasmaError> {
        let block = self
            .blocks
            .get_mut(request_block_id as usize)
            .ok_or_else(|| PlasmaError::NotFound(format!("request block {}", request_block_id)))?;
        if block.finalized {
            return Ok(());
        }
        block.finalized = true;
        block.finalized_at = Some(now);
        block.finalized_block = Some(carrier);
        self.next_unfinalized_block = self.next_unfinalized_block.max(request_block_id + 1);
        Ok(())
    }

    /// Settle the next request in id order once its request block finalized
    /// (and, for exits, once the exit challenge period passed). Unchallenged
    /// exits are released through `handler`. Returns `None` when the next
    /// request is not eligible yet.
    pub fn finalize_next(
        &mut self,
        now: u64,
        cp_exit: u64,
        handler: &mut dyn ExitHandler,
    ) -> Result<Option<ChainEvent>, PlasmaError> {
        let id = self.next_to_finalize;
        let Some(request) = self.requests.get(id as usize) else {
            return Ok(None);
        };
        let Some(block_id) = request.request_block_id else {
            return Ok(None);
        };
        let block = self.request_block_ref(block_id)?;
        let Some(finalized_at) = block.finalized_at else {
            return Ok(None);
        };
        if request.is_exit && now < finalized_at.saturating_add(cp_exit) {
            return Ok(None);
        }
        self.finalize_request(id, handler).map(Some)
    }

    /// Mark request `id` finalized, releasing it through `handler` if it is
    /// an unchallenged exit.
    ///
    /// # Errors
    /// Returns `PlasmaError::InvalidState` if the containing request block has
    /// not finalized or the request was already finalized.
    pub fn finalize_request(
        &mut self,
        id: u64,
        handler: &mut dyn ExitHandler,
    ) -> Result<ChainEvent, PlasmaError> {
        let request = self
            .requests
            .get(id as usize)
            .ok_or_else(|| PlasmaError::NotFound(format!("request {}", id)))?;
        if request.finalized {
            return Err(PlasmaError::InvalidState(format!(
                "request {} is already finalized",
                id
            )));
        }
        let block_finalized = match request.request_block_id {
            Some(b) => self.request_block_ref(b)?.finalized,
            None => false,
        };
        if !block_finalized {
            return Err(PlasmaError::InvalidState(format!(
                "request {} is not in a finalized request block",
                id
            )));
        }

        let released = request.is_exit && !request.challenged;
        if released {
            handler.release(&ExitRelease {
                request_id: id,
                requester: request.requester,
                token: request.token,
                trie_key: request.trie_key,
                trie_value: request.trie_value,
            })?;
        }

        let is_exit = request.is_exit;
        self.request_mut(id)?.finalized = true;
        if id == self.next_to_finalize {
            self.next_to_finalize += 1;
        }
        tracing::debug!(request_id = id, is_exit, released, "request finalized");
        Ok(ChainEvent::RequestFinalized {
            request_id: id,
            is_exit,
            released,
        })
    }

    /// Challenge a finalized-block exit during its exit period. A valid proof
    /// marks the exit challenged so it is settled without release.
    pub fn challenge_exit(
        &mut self,
        id: u64,
        proof: &[u8],
        verifier: &dyn ChallengeVerifier,
        cp_exit: u64,
        now: u64,
    ) -> Result<ChainEvent, PlasmaError> {
        let request = self
            .requests
            .get(id as usize)
            .ok_or_else(|| PlasmaError::NotFound(format!("request {}", id)))?;
        if !request.is_exit || request.finalized || request.challenged {
            return Err(PlasmaError::InvalidState(format!(
                "request {} is not a challengeable exit",
                id
            )));
        }
        let block = match request.request_block_id {
            Some(b) => Some(self.request_block_ref(b)?),
            None => None,
        }
        .filter(|b| b.finalized)
        .ok_or_else(|| {
            PlasmaError::InvalidState(format!("request {} has not been applied yet", id))
        })?;
        let (Some(carrier), Some(finalized_at)) = (block.finalized_block, block.finalized_at)
        else {
            return Err(PlasmaError::InvalidState(format!(
                "request {} has no finalized carrier block",
                id
            )));
        };
        if now >= finalized_at.saturating_add(cp_exit) {
            return Err(PlasmaError::InvalidState(format!(
                "exit challenge period for request {} is over",
                id
            )));
        }
        if !verifier.verify(carrier.fork, carrier.block, proof)? {
            return Err(PlasmaError::InvalidState(format!(
                "challenge against request {} was rejected",
                id
            )));
        }
        self.request_mut(id)?.challenged = true;
        Ok(ChainEvent::RequestChallenged { request_id: id })
    }

    fn request_mut(&mut self, id: u64) -> Result<&mut Request, PlasmaError> {
        self.requests
            .get_mut(id as usize)
            .ok_or_else(|| PlasmaError::NotFound(format!("request {}", id)))
    }

    fn request_block_ref(&self, id: u64) -> Result<&RequestBlock, PlasmaError> {
        self.blocks
            .get(id as usize)
            .ok_or_else(|| PlasmaError::NotFound(format!("request block {}", id)))
    }

    pub fn request(&self, id: u64) -> Option<&Request> {
        self.requests.get(id as usize)
    }

    pub fn request_block(&self, id: u64) -> Option<&RequestBlock> {
        self.blocks.get(id as usize)
    }

    pub fn num_requests(&self) -> u64 {
        self.requests.len() as u64
    }

    pub fn num_request_blocks(&self) -> u64 {
        self.blocks.len() as u64
    }
}

impl TokenMapping for RequestRegistry {
    fn resolve(&self, root_token: &Address) -> Option<Address> {
        self.token_map.get(root_token).copied()
    }
}
