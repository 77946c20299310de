// crates/plasma-chain/tests/epoch_sequence.rs
//
// Epoch sequencing on a single fork: empty request epochs, the two-epoch
// request delay, request block splitting, and block/request finalization.

use plasma_chain::{BlockKind, ChainEvent, ChainParams, EpochStatus, RootChain};
use plasma_core::{
    trie_key, word_from_u256, Address, BlockPosition, BlockRoots, ExitHandler, ExitRelease,
    PlasmaError, U256,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn token() -> Address {
    Address::derive("TON")
}

fn new_chain() -> RootChain {
    let mut rc = RootChain::new(
        ChainParams::default(),
        Address::derive("operator"),
        BlockRoots::default(),
        0,
    )
    .unwrap();
    rc.map_token(token(), token()).unwrap();
    rc
}

/// Submit the next block of the current fork.
fn submit(rc: &mut RootChain, kind: BlockKind, now: u64) -> u64 {
    let fork = rc.current_fork();
    let next = rc.last_block(fork).unwrap() + 1;
    let position = BlockPosition::new(fork, next).encode();
    let params = rc.params().clone();
    let result = match kind {
        BlockKind::Nrb => rc.submit_nrb(position, BlockRoots::default(), params.cost_nrb, now),
        BlockKind::Orb => rc.submit_orb(position, BlockRoots::default(), params.cost_orb, now),
        BlockKind::Urb => rc.submit_urb(position, BlockRoots::default(), params.cost_urb, now),
    };
    result.unwrap().block_number
}

fn enter(rc: &mut RootChain, user: &str, amount: u64, now: u64) -> u64 {
    let requester = Address::derive(user);
    let key = trie_key(&requester, 0);
    let value = word_from_u256(U256::from(amount) * U256::exp10(18));
    rc.start_enter(requester, token(), key, value, now).unwrap().0
}

fn finalize_all(rc: &mut RootChain, now: u64) {
    while !rc.finalize_block(now).unwrap().is_empty() {}
}

#[derive(Default)]
struct CollectExits(Vec<ExitRelease>);

impl ExitHandler for CollectExits {
    fn release(&mut self, exit: &ExitRelease) -> Result<(), PlasmaError> {
        self.0.push(exit.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_first_ore_is_empty_without_requests() {
    let mut rc = new_chain();
    submit(&mut rc, BlockKind::Nrb, 1);
    submit(&mut rc, BlockKind::Nrb, 2);

    let ore = rc.epoch(0, 2).unwrap();
    assert!(ore.is_request);
    assert!(ore.is_empty);
    assert_eq!(ore.status, EpochStatus::Closed);
    assert_eq!(ore.request_start, 0);
    assert_eq!(ore.request_end, 0);
    assert_eq!(ore.first_request_block_id, 0);
    assert_eq!(ore.start_block_number, 2);
    assert_eq!(ore.end_block_number, 2);

    let nre = rc.epoch(0, 3).unwrap();
    assert!(!nre.is_request);
    assert_eq!(nre.status, EpochStatus::Open);
    assert_eq!(nre.start_block_number, 3);
}

#[test]
fn test_requests_land_two_request_epochs_later() {
    let mut rc = new_chain();
    for user in ["alice", "bob", "carol", "dave"] {
        enter(&mut rc, user, 10, 1);
    }
    submit(&mut rc, BlockKind::Nrb, 2);
    submit(&mut rc, BlockKind::Nrb, 3);

    // ORE#2 was prepared before the requests were sealed.
    let ore2 = rc.epoch(0, 2).unwrap();
    assert!(ore2.is_empty);
    assert_eq!((ore2.request_start, ore2.request_end), (0, 0));

    let ore4 = rc.epoch(0, 4).unwrap();
    assert_eq!(ore4.status, EpochStatus::Pending);
    assert_eq!(ore4.request_start, 0);
    assert_eq!(ore4.request_end, 3);
    assert_eq!(ore4.first_request_block_id, 0);
    assert_eq!(ore4.num_requests(), 4);

    assert_eq!(rc.num_request_blocks(), 1);
    let block = rc.request_block(0).unwrap();
    assert!(block.submitted);
    assert_eq!((block.request_start, block.request_end), (0, 3));
    assert_eq!(block.num_requests(), 4);

    // NRE#3, then the single ORB of ORE#4.
    submit(&mut rc, BlockKind::Nrb, 4);
    submit(&mut rc, BlockKind::Nrb, 5);
    let orb = submit(&mut rc, BlockKind::Orb, 6);
    assert_eq!(orb, 5);
    let carried = rc.block(0, 5).unwrap();
    assert!(carried.is_request);
    assert_eq!(carried.epoch_number, 4);
    assert_eq!(carried.request_block_id, 0);

    // Nothing new arrived, so ORE#6 is empty and points at the last request.
    let ore6 = rc.epoch(0, 6).unwrap();
    assert!(ore6.is_empty);
    assert_eq!(ore6.status, EpochStatus::Closed);
    assert_eq!(ore6.first_request_block_id, 0);
    assert_eq!((ore6.request_start, ore6.request_end), (3, 3));
    assert_eq!(rc.first_filled_ore_number(0), Some(4));
}

#[test]
fn test_requests_split_by_max_requests() {
    let mut rc = new_chain();
    for i in 0..45 {
        enter(&mut rc, &format!("user-{i}"), 1, 1);
    }
    submit(&mut rc, BlockKind::Nrb, 2);
    submit(&mut rc, BlockKind::Nrb, 3);

    let ranges: Vec<(u64, u64)> = (0..rc.num_request_blocks())
        .map(|id| {
            let b = rc.request_block(id).unwrap();
            (b.request_start, b.request_end)
        })
        .collect();
    assert_eq!(ranges, vec![(0, 19), (20, 39), (40, 44)]);

    let ore4 = rc.epoch(0, 4).unwrap();
    assert_eq!(ore4.num_blocks, 3);
    assert_eq!((ore4.request_start, ore4.request_end), (0, 44));

    submit(&mut rc, BlockKind::Nrb, 4);
    submit(&mut rc, BlockKind::Nrb, 5);
    for expected_id in 0..3 {
        let n = submit(&mut rc, BlockKind::Orb, 6);
        assert_eq!(rc.block(0, n).unwrap().request_block_id, expected_id);
    }
    let ore4 = rc.epoch(0, 4).unwrap();
    assert_eq!(ore4.status, EpochStatus::Closed);
    assert_eq!((ore4.start_block_number, ore4.end_block_number), (5, 7));
}

#[test]
fn test_late_requests_wait_for_following_ore() {
    let mut rc = new_chain();
    for user in ["alice", "bob", "carol", "dave"] {
        enter(&mut rc, user, 10, 1);
    }
    submit(&mut rc, BlockKind::Nrb, 2);
    submit(&mut rc, BlockKind::Nrb, 3);

    // Requests 4..=7 arrive during NRE#3 and are sealed when ORE#4 opens.
    for user in ["erin", "frank", "grace", "heidi"] {
        enter(&mut rc, user, 5, 4);
    }
    submit(&mut rc, BlockKind::Nrb, 4);
    submit(&mut rc, BlockKind::Nrb, 5);

    let ore6 = rc.epoch(0, 6).unwrap();
    assert_eq!(ore6.status, EpochStatus::Pending);
    assert_eq!(ore6.first_request_block_id, 1);
    assert_eq!((ore6.request_start, ore6.request_end), (4, 7));

    submit(&mut rc, BlockKind::Orb, 6); // ORE#4
    submit(&mut rc, BlockKind::Nrb, 7); // NRE#5
    submit(&mut rc, BlockKind::Nrb, 7);

    // ORE#8 was prepared when ORE#6 opened, with nothing pending.
    let ore8 = rc.epoch(0, 8).unwrap();
    assert!(ore8.is_request);
    assert_eq!(ore8.status, EpochStatus::Pending);
    assert_eq!(ore8.first_request_block_id, 1);
    assert_eq!((ore8.request_start, ore8.request_end), (7, 7));

    let orb = submit(&mut rc, BlockKind::Orb, 8); // ORE#6
    assert_eq!(rc.block(0, orb).unwrap().request_block_id, 1);
}

#[test]
fn test_block_kind_must_match_open_epoch() {
    let mut rc = new_chain();
    enter(&mut rc, "alice", 10, 1);
    for now in 2..6 {
        submit(&mut rc, BlockKind::Nrb, now);
    }
    // ORE#4 is open.
    let position = BlockPosition::new(0, 5).encode();
    let cost = rc.params().cost_nrb;
    let err = rc
        .submit_nrb(position, BlockRoots::default(), cost, 6)
        .unwrap_err();
    assert!(matches!(err, PlasmaError::InvalidState(_)));

    let cost = rc.params().cost_urb;
    let err = rc
        .submit_urb(position, BlockRoots::default(), cost, 6)
        .unwrap_err();
    assert!(matches!(err, PlasmaError::InvalidState(_)));
    assert_eq!(rc.last_block(0), Some(4));
}

#[test]
fn test_finalization_settles_blocks_and_epochs() {
    let mut rc = new_chain();
    enter(&mut rc, "alice", 10, 1);
    for _ in 0..4 {
        submit(&mut rc, BlockKind::Nrb, 10);
    }
    submit(&mut rc, BlockKind::Orb, 10);

    // Withholding period is 20 seconds.
    assert!(rc.finalize_block(30).unwrap().is_empty());
    finalize_all(&mut rc, 31);

    let fork = rc.fork(0).unwrap();
    assert_eq!(fork.last_finalized_block, 5);
    assert_eq!(fork.last_finalized_epoch, 4);
    for n in 1..=5 {
        assert!(rc.block(0, n).unwrap().finalized);
    }
    assert_eq!(rc.epoch(0, 4).unwrap().status, EpochStatus::Finalized);
    assert_eq!(rc.epoch(0, 5).unwrap().status, EpochStatus::Open);

    let block = rc.request_block(0).unwrap();
    assert!(block.finalized);
    assert_eq!(block.finalized_at, Some(31));
    assert_eq!(block.finalized_block, Some(BlockPosition::new(0, 5)));

    let finalized_epochs: Vec<u64> = rc
        .events()
        .entries()
        .iter()
        .filter_map(|e| match e {
            ChainEvent::EpochFinalized { epoch_number, .. } => Some(*epoch_number),
            _ => None,
        })
        .collect();
    assert_eq!(finalized_epochs, vec![1, 2, 3, 4]);
}

#[test]
fn test_exit_released_after_exit_period() {
    let mut rc = new_chain();
    let requester = Address::derive("alice");
    let cost = rc.params().cost_eru;
    let (exit_id, _) = rc
        .start_exit(
            requester,
            token(),
            trie_key(&requester, 0),
            word_from_u256(U256::from(3u64)),
            cost,
            1,
        )
        .unwrap();
    enter(&mut rc, "bob", 10, 1);
    for _ in 0..4 {
        submit(&mut rc, BlockKind::Nrb, 10);
    }
    submit(&mut rc, BlockKind::Orb, 10);
    finalize_all(&mut rc, 100);

    let mut exits = CollectExits::default();
    // The exit waits for its challenge period, and blocks the enter behind it.
    assert!(rc.finalize_request(105, &mut exits).unwrap().is_empty());

    let events = rc.finalize_request(110, &mut exits).unwrap();
    assert_eq!(
        events,
        vec![ChainEvent::RequestFinalized {
            request_id: exit_id,
            is_exit: true,
            released: true
        }]
    );
    let events = rc.finalize_request(110, &mut exits).unwrap();
    assert_eq!(
        events,
        vec![ChainEvent::RequestFinalized {
            request_id: 1,
            is_exit: false,
            released: false
        }]
    );
    assert!(rc.finalize_request(200, &mut exits).unwrap().is_empty());

    assert_eq!(exits.0.len(), 1);
    assert_eq!(exits.0[0].requester, requester);
    assert!(rc.request(exit_id).unwrap().finalized);
}

#[test]
fn test_exit_without_fee_rejected() {
    let mut rc = new_chain();
    let requester = Address::derive("alice");
    let err = rc
        .start_exit(
            requester,
            token(),
            trie_key(&requester, 0),
            word_from_u256(U256::one()),
            0,
            1,
        )
        .unwrap_err();
    assert!(matches!(err, PlasmaError::InsufficientFee { paid: 0, .. }));
    assert_eq!(rc.num_requests(), 0);
}

#[test]
fn test_unmapped_token_rejected() {
    let mut rc = new_chain();
    let other = Address::derive("unknown");
    let requester = Address::derive("alice");
    let err = rc
        .start_enter(requester, other, trie_key(&requester, 0), [0u8; 32], 1)
        .unwrap_err();
    assert_eq!(err, PlasmaError::UnmappedToken(other));
}

/// One NRE/ORE cycle: how many requests arrive during the NRE, and what the
/// ORE that closes the cycle must carry.
struct Cycle {
    nre: u64,
    enters: u64,
    exits: u64,
    /// (request_start, request_end, first_request_block_id, num_blocks)
    ore: (u64, u64, u64, u64),
}

#[test]
fn test_long_epoch_sequence() {
    let schedule = [
        Cycle { nre: 1, enters: 4, exits: 0, ore: (0, 0, 0, 0) },
        Cycle { nre: 3, enters: 4, exits: 0, ore: (0, 3, 0, 1) },
        Cycle { nre: 5, enters: 0, exits: 0, ore: (4, 7, 1, 1) },
        Cycle { nre: 7, enters: 0, exits: 4, ore: (7, 7, 1, 0) },
        Cycle { nre: 9, enters: 0, exits: 40, ore: (8, 11, 2, 1) },
        Cycle { nre: 11, enters: 0, exits: 28, ore: (12, 51, 3, 2) },
        Cycle { nre: 13, enters: 0, exits: 0, ore: (52, 79, 5, 2) },
        Cycle { nre: 15, enters: 0, exits: 0, ore: (79, 79, 6, 0) },
        Cycle { nre: 17, enters: 0, exits: 0, ore: (79, 79, 6, 0) },
        Cycle { nre: 19, enters: 0, exits: 40, ore: (79, 79, 6, 0) },
        Cycle { nre: 21, enters: 0, exits: 0, ore: (80, 119, 7, 2) },
    ];

    let mut rc = new_chain();
    let exit_cost = rc.params().cost_eru;
    let mut now = 1;
    let mut next_request = 0u64;

    for cycle in &schedule {
        for _ in 0..cycle.enters {
            let id = enter(&mut rc, &format!("user-{next_request}"), 10, now);
            assert_eq!(id, next_request);
            next_request += 1;
        }
        for _ in 0..cycle.exits {
            let requester = Address::derive(&format!("user-{next_request}"));
            let (id, _) = rc
                .start_exit(
                    requester,
                    token(),
                    trie_key(&requester, 0),
                    word_from_u256(U256::from(next_request)),
                    exit_cost,
                    now,
                )
                .unwrap();
            assert_eq!(id, next_request);
            next_request += 1;
        }

        let nre = rc.epoch(0, cycle.nre).unwrap();
        assert!(!nre.is_request);
        assert_eq!(nre.status, EpochStatus::Open, "NRE#{}", cycle.nre);
        let first_nrb = submit(&mut rc, BlockKind::Nrb, now);
        let last_nrb = submit(&mut rc, BlockKind::Nrb, now);
        let nre = rc.epoch(0, cycle.nre).unwrap();
        assert_eq!((nre.start_block_number, nre.end_block_number), (first_nrb, last_nrb));

        let ore_number = cycle.nre + 1;
        let (request_start, request_end, first_id, num_blocks) = cycle.ore;
        for offset in 0..num_blocks {
            let n = submit(&mut rc, BlockKind::Orb, now);
            let block = rc.block(0, n).unwrap();
            assert_eq!(block.epoch_number, ore_number);
            assert_eq!(block.request_block_id, first_id + offset);
        }

        let ore = rc.epoch(0, ore_number).unwrap();
        assert!(ore.is_request, "ORE#{ore_number}");
        assert_eq!(ore.status, EpochStatus::Closed, "ORE#{ore_number}");
        assert_eq!(ore.is_empty, num_blocks == 0, "ORE#{ore_number}");
        assert_eq!(
            (ore.request_start, ore.request_end, ore.first_request_block_id),
            (request_start, request_end, first_id),
            "ORE#{ore_number}"
        );
        if num_blocks == 0 {
            assert_eq!(ore.start_block_number, last_nrb);
            assert_eq!(ore.end_block_number, last_nrb);
        } else {
            let covered: u64 = (first_id..first_id + num_blocks)
                .map(|id| rc.request_block(id).unwrap().num_requests())
                .sum();
            assert_eq!(covered, ore.num_requests());
            assert_eq!(ore.end_block_number - ore.start_block_number + 1, num_blocks);
        }
        now += 10;
    }

    // The last 40 exits were sealed for ORE#22 in two blocks of twenty.
    assert_eq!(rc.last_block(0), Some(31));
    assert_eq!(rc.num_requests(), 120);
    assert_eq!(rc.num_request_blocks(), 9);
    let ranges: Vec<(u64, u64)> = (7..9)
        .map(|id| {
            let b = rc.request_block(id).unwrap();
            (b.request_start, b.request_end)
        })
        .collect();
    assert_eq!(ranges, vec![(80, 99), (100, 119)]);
    let ore24 = rc.epoch(0, 24).unwrap();
    assert!(ore24.is_empty);
    assert_eq!(ore24.first_request_block_id, 8);
    assert_eq!((ore24.request_start, ore24.request_end), (119, 119));
}
