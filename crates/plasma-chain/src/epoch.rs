// crates/plasma-chain/src/epoch.rs
//
// Epoch lifecycle for the Plasma root chain.
//
// Within a fork, epochs alternate between non-request epochs (NRE, a fixed
// number of NRBs) and request epochs (ORE, one block per request block).
// Requests are delayed by one request epoch: when ORE n is prepared, every
// pending request is sealed into new request blocks and assigned to ORE n+2,
// whose metadata is recorded right away. An epoch with no blocks to carry is
// empty and closes the moment it is prepared.
//
// Lifecycle: Pending (metadata only) -> Open -> Closed -> Finalized.

use serde::{Deserialize, Serialize};

use plasma_core::{BlockRoots, PlasmaError};

use crate::block::{BlockKind, PlasmaBlock};
use crate::events::ChainEvent;
use crate::fork::Fork;
use crate::params::ChainParams;
use crate::request::RequestRegistry;

/// Where an epoch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochStatus {
    /// Request range assigned ahead of time; not yet accepting blocks.
    Pending,
    /// Accepting blocks.
    Open,
    /// All blocks submitted; `end_block_number` is fixed.
    Closed,
    /// Every block of the epoch is finalized.
    Finalized,
}

/// An epoch of one fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    pub number: u64,
    pub status: EpochStatus,
    pub is_request: bool,
    pub is_empty: bool,
    /// ORE'/NRE': replays the parent fork at the start of a new fork.
    pub rebase: bool,
    /// Request blocks of this epoch are user-submitted (URBs).
    pub user_activated: bool,
    pub start_block_number: u64,
    pub end_block_number: u64,
    pub first_request_block_id: u64,
    pub request_start: u64,
    pub request_end: u64,
    /// Number of blocks the epoch holds once complete.
    pub num_blocks: u64,
    /// For rebase epochs: the parent block replayed at each offset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_blocks: Vec<Option<u64>>,
    pub timestamp: u64,
}

impl Epoch {
    /// A non-request epoch of `num_blocks` blocks.
    pub fn non_request(number: u64, num_blocks: u64) -> Self {
        Self {
            number,
            status: EpochStatus::Pending,
            is_request: false,
            is_empty: num_blocks == 0,
            rebase: false,
            user_activated: false,
            start_block_number: 0,
            end_block_number: 0,
            first_request_block_id: 0,
            request_start: 0,
            request_end: 0,
            num_blocks,
            reference_blocks: Vec::new(),
            timestamp: 0,
        }
    }

    /// A request epoch carrying `num_blocks` request blocks starting at
    /// `first_request_block_id` and covering requests `request_start..=request_end`.
    pub fn request(
        number: u64,
        first_request_block_id: u64,
        request_start: u64,
        request_end: u64,
        num_blocks: u64,
    ) -> Self {
        Self {
            is_request: true,
            first_request_block_id,
            request_start,
            request_end,
            ..Self::non_request(number, num_blocks)
        }
    }

    /// A request epoch with nothing to carry. It records the last request
    /// block and the last sealed request at the time it was assigned.
    pub fn empty_request(number: u64, registry: &RequestRegistry) -> Self {
        let last_request = registry.last_sealed_request().unwrap_or(0);
        Self::request(
            number,
            registry.num_request_blocks().saturating_sub(1),
            last_request,
            last_request,
            0,
        )
    }

    /// Whether a block of `kind` may be appended to this epoch.
    ///
    /// Only the rebase ORE' of a user-activated fork takes URBs. Every later
    /// request epoch of that fork, including the first regular one, goes back
    /// to operator ORBs; users can activate a fresh fork if the operator stays
    /// silent.
    pub fn accepts(&self, kind: BlockKind) -> bool {
        let user_blocks = self.rebase && self.user_activated;
        match kind {
            BlockKind::Nrb => !self.is_request,
            BlockKind::Orb => self.is_request && !user_blocks,
            BlockKind::Urb => self.is_request && user_blocks,
        }
    }

    /// Number of requests the epoch applies.
    pub fn num_requests(&self) -> u64 {
        if self.is_request && !self.is_empty {
            self.request_end - self.request_start + 1
        } else {
            0
        }
    }

    fn prepared_event(&self, fork: u64) -> ChainEvent {
        ChainEvent::EpochPrepared {
            fork,
            epoch_number: self.number,
            start_block_number: self.start_block_number,
            is_request: self.is_request,
            is_empty: self.is_empty,
            rebase: self.rebase,
            user_activated: self.user_activated,
            first_request_block_id: self.first_request_block_id,
            request_start: self.request_start,
            request_end: self.request_end,
        }
    }

    fn closed_event(&self, fork: u64) -> ChainEvent {
        ChainEvent::EpochClosed {
            fork,
            epoch_number: self.number,
            start_block_number: self.start_block_number,
            end_block_number: self.end_block_number,
        }
    }
}

/// Seal every pending request and assign the new request blocks to request
/// epoch `target` of `fork`.
pub(crate) fn assign_future_requests(
    fork: &mut Fork,
    requests: &mut RequestRegistry,
    target: u64,
) -> Result<Vec<ChainEvent>, PlasmaError> {
    let (sealed, events) = requests.seal_all_pending()?;
    let epoch = if sealed.is_empty() {
        Epoch::empty_request(target, requests)
    } else {
        let first = requests
            .request_block(sealed.start)
            .ok_or_else(|| PlasmaError::NotFound(format!("request block {}", sealed.start)))?;
        let last = requests
            .request_block(sealed.end - 1)
            .ok_or_else(|| PlasmaError::NotFound(format!("request block {}", sealed.end - 1)))?;
        Epoch::request(
            target,
            sealed.start,
            first.request_start,
            last.request_end,
            sealed.end - sealed.start,
        )
    };
    fork.epochs.insert(target, epoch);
    Ok(events)
}

/// Prepare the epoch after `fork.last_epoch`. Empty epochs close at once and
/// the next one is prepared, until an epoch that needs blocks is open.
pub(crate) fn open_next_epoch(
    fork: &mut Fork,
    requests: &mut RequestRegistry,
    params: &ChainParams,
    now: u64,
) -> Result<Vec<ChainEvent>, PlasmaError> {
    let mut events = Vec::new();
    loop {
        let number = fork.last_epoch + 1;
        let previous_is_request = fork
            .epochs
            .get(&fork.last_epoch)
            .map(|e| e.is_request)
            .unwrap_or(true);

        let mut epoch = match fork.epochs.remove(&number) {
            Some(pending) => pending,
            None if previous_is_request => Epoch::non_request(number, params.nre_length),
            None => Epoch::empty_request(number, requests),
        };

        if epoch.is_request && !epoch.rebase {
            events.extend(assign_future_requests(fork, requests, number + 2)?);
        }

        epoch.timestamp = now;
        if epoch.num_blocks == 0 {
            epoch.is_empty = true;
            epoch.start_block_number = fork.last_block;
            epoch.end_block_number = fork.last_block;
            epoch.status = EpochStatus::Closed;
            events.push(epoch.prepared_event(fork.number));
            events.push(epoch.closed_event(fork.number));
            tracing::debug!(fork = fork.number, epoch = number, "empty epoch closed");
            fork.epochs.insert(number, epoch);
            fork.last_epoch = number;
            continue;
        }

        epoch.start_block_number = fork.last_block + 1;
        epoch.status = EpochStatus::Open;
        events.push(epoch.prepared_event(fork.number));
        tracing::debug!(
            fork = fork.number,
            epoch = number,
            is_request = epoch.is_request,
            num_blocks = epoch.num_blocks,
            "epoch opened"
        );
        fork.epochs.insert(number, epoch);
        return Ok(events);
    }
}

/// Append the next block to the open epoch of `fork`, closing the epoch (and
/// opening its successor) when the block completes it.
///
/// The caller has already checked the block position and fee.
///
/// # Errors
/// Returns `PlasmaError::InvalidState` if no epoch is open or the open epoch
/// does not accept blocks of `kind`.
pub(crate) fn append_block(
    fork: &mut Fork,
    requests: &mut RequestRegistry,
    params: &ChainParams,
    kind: BlockKind,
    roots: BlockRoots,
    now: u64,
) -> Result<(u64, Vec<ChainEvent>), PlasmaError> {
    let epoch_number = fork.last_epoch + 1;
    let epoch = fork
        .epochs
        .get(&epoch_number)
        .filter(|e| e.status == EpochStatus::Open)
        .ok_or_else(|| {
            PlasmaError::InvalidState(format!("fork {} has no open epoch", fork.number))
        })?;
    if !epoch.accepts(kind) {
        return Err(PlasmaError::InvalidState(format!(
            "epoch {} of fork {} does not accept {} blocks",
            epoch_number, fork.number, kind
        )));
    }

    let number = fork.last_block + 1;
    let offset = number - epoch.start_block_number;
    let is_request = kind.is_request();
    let block = PlasmaBlock {
        fork_number: fork.number,
        number,
        epoch_number,
        kind,
        is_request,
        request_block_id: if is_request {
            epoch.first_request_block_id + offset
        } else {
            0
        },
        reference_block: epoch.reference_blocks.get(offset as usize).copied().flatten(),
        roots,
        timestamp: now,
        finalized: false,
        finalized_at: None,
        challenging: false,
    };
    let completes_epoch = offset + 1 == epoch.num_blocks;

    fork.blocks.insert(number, block);
    fork.last_block = number;
    fork.last_submitted_at = now;
    let mut events = vec![ChainEvent::BlockSubmitted {
        fork: fork.number,
        epoch_number,
        block_number: number,
        kind,
    }];

    if completes_epoch {
        if let Some(epoch) = fork.epochs.get_mut(&epoch_number) {
            epoch.end_block_number = number;
            epoch.status = EpochStatus::Closed;
            events.push(epoch.closed_event(fork.number));
        }
        fork.last_epoch = epoch_number;
        events.extend(open_next_epoch(fork, requests, params, now)?);
    }

    Ok((number, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasma_core::Address;

    fn registry() -> RequestRegistry {
        RequestRegistry::new(&ChainParams::default())
    }

    #[test]
    fn test_accepts_by_kind() {
        let nre = Epoch::non_request(1, 2);
        assert!(nre.accepts(BlockKind::Nrb));
        assert!(!nre.accepts(BlockKind::Orb));

        let mut ore = Epoch::request(2, 0, 0, 3, 1);
        assert!(ore.accepts(BlockKind::Orb));
        assert!(!ore.accepts(BlockKind::Urb));

        ore.rebase = true;
        ore.user_activated = true;
        assert!(ore.accepts(BlockKind::Urb));
        assert!(!ore.accepts(BlockKind::Orb));

        // A regular ORE never takes URBs, even on a user-activated fork.
        let mut regular = Epoch::request(5, 1, 4, 4, 1);
        regular.user_activated = true;
        assert!(regular.accepts(BlockKind::Orb));
        assert!(!regular.accepts(BlockKind::Urb));
    }

    #[test]
    fn test_empty_request_metadata_without_requests() {
        let reg = registry();
        let epoch = Epoch::empty_request(2, &reg);
        assert_eq!(epoch.first_request_block_id, 0);
        assert_eq!(epoch.request_start, 0);
        assert_eq!(epoch.request_end, 0);
        assert_eq!(epoch.num_requests(), 0);
    }

    #[test]
    fn test_empty_request_metadata_after_sealing() {
        let mut reg = registry();
        let token = Address::from_low_u64(1);
        reg.map_token(token, token).unwrap();
        for _ in 0..8 {
            reg.start_enter(Address::ZERO, token, [0u8; 32], [0u8; 32], 0)
                .unwrap();
        }
        reg.seal_all_pending().unwrap();
        let epoch = Epoch::empty_request(8, &reg);
        assert_eq!(epoch.first_request_block_id, 0);
        assert_eq!(epoch.request_start, 7);
        assert_eq!(epoch.request_end, 7);
    }

    #[test]
    fn test_request_epoch_counts() {
        let epoch = Epoch::request(4, 0, 0, 3, 1);
        assert_eq!(epoch.num_requests(), 4);
        assert!(!epoch.is_empty);
    }
}
