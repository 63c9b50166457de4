use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use block_state_cache::backend::SnapshotTree;
use block_state_cache::testutil::{CountingMvStates, MemDatabase, MemSnapshotTree};
use block_state_cache::{Error, StateCache};
use block_state_common::{Log, EMPTY_ROOT_HASH, KECCAK_EMPTY};

fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

fn slot(n: u8) -> B256 {
    B256::repeat_byte(n)
}

fn word(n: u8) -> B256 {
    B256::with_last_byte(n)
}

fn fresh_state() -> (Arc<MemDatabase>, StateCache) {
    let db = Arc::new(MemDatabase::empty());
    let state = StateCache::new(db.genesis_root(), db.clone(), None).unwrap();
    (db, state)
}

/// Seed a committed block holding one account with a balance and storage
/// slots, returning the database and the post-block root.
fn seeded_state(account: Address, slots: &[(B256, B256)]) -> (Arc<MemDatabase>, B256) {
    let (db, mut state) = fresh_state();
    state.set_balance(account, U256::from(50u64));
    for (key, value) in slots {
        state.set_state(account, *key, *value);
    }
    state.finalise(true);
    let root = state.commit(1, true).unwrap();
    (db, root)
}

// ── Concrete scenarios ──────────────────────────────────────────────

#[test]
fn simple_transfer() {
    let (_db, mut state) = fresh_state();
    state.create_account(addr(1));
    state.set_balance(addr(1), U256::from(100u64));
    state.create_account(addr(2));
    state.sub_balance(addr(1), U256::from(30u64));
    state.add_balance(addr(2), U256::from(30u64));
    state.finalise(true);
    let root = state.intermediate_root(true);

    assert_eq!(state.get_balance(addr(1)), U256::from(70u64));
    assert_eq!(state.get_balance(addr(2)), U256::from(30u64));
    assert_ne!(root, B256::ZERO);
    assert_ne!(root, EMPTY_ROOT_HASH);

    // The same sequence produces the same root from scratch.
    let (_db2, mut replay) = fresh_state();
    replay.create_account(addr(1));
    replay.set_balance(addr(1), U256::from(100u64));
    replay.create_account(addr(2));
    replay.sub_balance(addr(1), U256::from(30u64));
    replay.add_balance(addr(2), U256::from(30u64));
    assert_eq!(replay.intermediate_root(true), root);
}

#[test]
fn revert_restores_balances() {
    let (_db, mut state) = fresh_state();
    state.set_balance(addr(1), U256::from(70u64));
    state.set_balance(addr(2), U256::from(30u64));
    state.finalise(true);

    let id = state.snapshot();
    state.sub_balance(addr(1), U256::from(70u64));
    state.add_balance(addr(2), U256::from(70u64));
    assert_eq!(state.get_balance(addr(1)), U256::ZERO);
    state.revert_to_snapshot(id);

    assert_eq!(state.get_balance(addr(1)), U256::from(70u64));
    assert_eq!(state.get_balance(addr(2)), U256::from(30u64));
}

#[test]
fn storage_zeroing() {
    let (db, mut state) = fresh_state();
    let account = addr(1);
    let key = slot(0x11);
    state.set_balance(account, U256::from(1u64));

    state.set_state(account, key, word(0x11));
    state.intermediate_root(false);
    assert_eq!(
        state.buffered_storage(keccak256(account), keccak256(key)).map(|b| b.is_empty()),
        Some(false)
    );

    state.set_state(account, key, B256::ZERO);
    state.intermediate_root(false);
    // The deletion is published as empty bytes for the snapshot layer.
    assert_eq!(
        state.buffered_storage(keccak256(account), keccak256(key)).map(|b| b.is_empty()),
        Some(true)
    );

    let root = state.commit(1, false).unwrap();
    let committed = db.committed_account(root, account).unwrap();
    assert_eq!(committed.storage_root, EMPTY_ROOT_HASH);
}

#[test]
fn self_destruct_then_create() {
    let (_db, mut state) = fresh_state();
    let account = addr(1);
    state.set_balance(account, U256::from(50u64));
    state.self_destruct(account);
    state.create_account(account);
    state.set_balance(account, U256::from(7u64));
    state.finalise(true);

    assert!(state.exist(account));
    assert_eq!(state.get_balance(account), U256::from(7u64));
    assert!(state.has_destruct_marker(account));

    state.accounts_intermediate_root();
    state.state_intermediate_root();
    // The account was new this block, so its tracked origin is "absent".
    assert_eq!(state.account_origin(account), Some(None));
}

#[test]
fn self_destruct_semantics() {
    let (_db, mut state) = fresh_state();
    let account = addr(1);
    state.set_balance(account, U256::from(50u64));
    state.self_destruct(account);
    assert!(state.has_self_destructed(account));
    assert_eq!(state.get_balance(account), U256::ZERO);
    // Still visible until finalise.
    assert!(state.exist(account));

    state.finalise(false);
    assert!(!state.exist(account));
    assert_eq!(state.get_balance(account), U256::ZERO);
    assert!(state.has_destruct_marker(account));
}

#[test]
fn self_destruct_6780_only_hits_freshly_created_accounts() {
    let (db, root) = seeded_state(addr(1), &[]);
    let mut state = StateCache::new(root, db, None).unwrap();

    // Pre-existing account: no effect.
    state.self_destruct_6780(addr(1));
    assert!(!state.has_self_destructed(addr(1)));

    // Created in this transaction: destructed.
    state.create_account(addr(2));
    state.set_balance(addr(2), U256::from(5u64));
    state.self_destruct_6780(addr(2));
    assert!(state.has_self_destructed(addr(2)));

    // The created flag clears at finalise.
    state.create_account(addr(3));
    state.finalise(false);
    state.self_destruct_6780(addr(3));
    assert!(!state.has_self_destructed(addr(3)));
}

#[test]
fn resurrection_across_commit() {
    let key = slot(0x22);
    let (db, root) = seeded_state(addr(1), &[(key, word(9))]);

    let snaps = Arc::new(MemSnapshotTree::from_database(&db, root));
    let mut state =
        StateCache::new(root, db.clone(), Some(snaps.clone()))
            .unwrap();
    assert_eq!(state.get_state(addr(1), key), word(9));

    state.self_destruct(addr(1));
    state.finalise(true);
    state.create_account(addr(1));
    state.set_balance(addr(1), U256::from(7u64));
    // The old incarnation's storage is conceptually wiped.
    assert_eq!(state.get_state(addr(1), key), B256::ZERO);
    state.finalise(true);

    let expected = state.intermediate_root(true);
    state.set_expected_root(expected);
    let new_root = state.commit(2, true).unwrap();
    assert_eq!(new_root, expected);

    let committed = db.committed_account(new_root, addr(1)).unwrap();
    assert_eq!(committed.balance, U256::from(7u64));
    assert_eq!(committed.nonce, 0);
    assert_eq!(committed.code_hash, KECCAK_EMPTY);
    assert_eq!(committed.storage_root, EMPTY_ROOT_HASH);

    // The snapshot layer saw the destruct plus the resurrected account.
    let updates = snaps.recorded_updates();
    assert_eq!(updates.len(), 1);
    let update = &updates[0];
    assert!(update.destructs.contains(&keccak256(addr(1))));
    assert!(update.accounts.contains_key(&keccak256(addr(1))));
    let snap = snaps.snapshot(new_root).unwrap();
    assert!(snap.storage(keccak256(addr(1)), keccak256(key)).unwrap().is_none());
}

#[test]
fn storage_delete_abort_marks_incomplete() {
    let key = slot(0x33);
    let (db, root) = seeded_state(addr(1), &[(key, word(1)), (slot(0x34), word(2))]);

    let snaps = Arc::new(MemSnapshotTree::from_database(&db, root));
    let mut state =
        StateCache::new(root, db.clone(), Some(snaps)).unwrap();
    // Force the wipe over budget immediately.
    state.set_storage_delete_limit(0);

    state.self_destruct(addr(1));
    state.finalise(true);
    let expected = state.intermediate_root(true);
    state.set_expected_root(expected);
    state.commit(2, true).unwrap();

    let updates = db.recorded_updates();
    let update = updates.last().unwrap();
    assert!(update.incomplete.contains(&addr(1)));
    assert!(!update.storages_origin.contains_key(&addr(1)));
    // The account's own original value is still reported.
    assert!(update.accounts_origin.get(&addr(1)).unwrap().is_some());
}

#[test]
fn storage_wipe_reports_slot_origins() {
    let key = slot(0x44);
    let (db, root) = seeded_state(addr(1), &[(key, word(5))]);

    let snaps = Arc::new(MemSnapshotTree::from_database(&db, root));
    let mut state =
        StateCache::new(root, db.clone(), Some(snaps)).unwrap();
    state.self_destruct(addr(1));
    state.finalise(true);
    let expected = state.intermediate_root(true);
    state.set_expected_root(expected);
    state.commit(2, true).unwrap();

    let updates = db.recorded_updates();
    let update = updates.last().unwrap();
    assert!(!update.incomplete.contains(&addr(1)));
    let origins = update.storages_origin.get(&addr(1)).unwrap();
    // The wiped slot's pre-block value is tracked under its hashed key.
    assert!(!origins.get(&keccak256(key)).unwrap().is_empty());
}

// ── Universal properties ────────────────────────────────────────────

#[test]
fn revert_is_complete_over_mixed_mutations() {
    let (_db, mut state) = fresh_state();

    state.set_balance(addr(1), U256::from(100u64));
    state.set_nonce(addr(1), 3);
    state.set_state(addr(1), slot(1), word(1));
    state.add_refund(10);
    state.add_preimage(keccak256(b"pre"), b"pre");
    state.add_address_to_access_list(addr(9));
    state.finalise(false);

    let id = state.snapshot();
    state.set_balance(addr(1), U256::from(1u64));
    state.set_nonce(addr(1), 9);
    state.set_code(addr(1), Bytes::from_static(b"\x60\x00"));
    state.set_state(addr(1), slot(1), word(2));
    state.set_state(addr(1), slot(2), word(3));
    state.self_destruct(addr(2));
    state.set_balance(addr(2), U256::from(4u64));
    state.add_refund(5);
    state.sub_refund(2);
    state.add_preimage(keccak256(b"other"), b"other");
    state.add_slot_to_access_list(addr(9), slot(9));
    state.add_log(Log { address: addr(1), ..Default::default() });
    state.revert_to_snapshot(id);

    assert_eq!(state.get_balance(addr(1)), U256::from(100u64));
    assert_eq!(state.get_nonce(addr(1)), 3);
    assert_eq!(state.get_code_hash(addr(1)), KECCAK_EMPTY);
    assert_eq!(state.get_state(addr(1), slot(1)), word(1));
    assert_eq!(state.get_state(addr(1), slot(2)), B256::ZERO);
    assert_eq!(state.refund(), 10);
    assert!(!state.preimages().contains_key(&keccak256(b"other")));
    assert!(state.preimages().contains_key(&keccak256(b"pre")));
    assert_eq!(state.slot_in_access_list(addr(9), slot(9)), (true, false));
    assert!(state.logs().is_empty());
}

#[test]
fn journal_idempotence() {
    let (_db, mut state) = fresh_state();
    state.set_balance(addr(1), U256::from(5u64));
    let id = state.snapshot();
    state.revert_to_snapshot(id);
    assert_eq!(state.get_balance(addr(1)), U256::from(5u64));
}

#[test]
fn finalise_is_deterministic() {
    let run = |state: &mut StateCache| {
        state.create_account(addr(1));
        state.set_balance(addr(1), U256::from(11u64));
        state.set_state(addr(1), slot(1), word(7));
        state.set_balance(addr(2), U256::from(3u64));
        state.self_destruct(addr(2));
        state.finalise(true);
    };
    let (_da, mut a) = fresh_state();
    let (_db, mut b) = fresh_state();
    run(&mut a);
    run(&mut b);

    assert_eq!(a.exist(addr(1)), b.exist(addr(1)));
    assert_eq!(a.exist(addr(2)), b.exist(addr(2)));
    assert_eq!(a.has_destruct_marker(addr(2)), b.has_destruct_marker(addr(2)));
    assert_eq!(a.intermediate_root(true), b.intermediate_root(true));
    assert_eq!(
        a.buffered_account(keccak256(addr(1))),
        b.buffered_account(keccak256(addr(1)))
    );
}

#[test]
fn root_equivalence_of_intermediate_and_commit() {
    let run = |state: &mut StateCache| {
        state.set_balance(addr(1), U256::from(21u64));
        state.set_state(addr(1), slot(1), word(2));
        state.set_nonce(addr(2), 4);
        state.finalise(true);
    };
    let (_da, mut a) = fresh_state();
    run(&mut a);
    let intermediate = a.intermediate_root(true);
    let committed_after_intermediate = a.commit(1, true).unwrap();

    let (_db, mut b) = fresh_state();
    run(&mut b);
    let committed_directly = b.commit(1, true).unwrap();

    assert_eq!(committed_after_intermediate, intermediate);
    assert_eq!(committed_directly, intermediate);
}

#[test]
fn funds_preservation_on_create() {
    let (db, root) = seeded_state(addr(1), &[]);
    let mut state = StateCache::new(root, db, None).unwrap();
    assert_eq!(state.get_balance(addr(1)), U256::from(50u64));
    state.create_account(addr(1));
    assert_eq!(state.get_balance(addr(1)), U256::from(50u64));
    assert_eq!(state.get_nonce(addr(1)), 0);
}

#[test]
fn empty_accounts_are_deleted_on_finalise() {
    let (_db, mut state) = fresh_state();
    state.create_account(addr(1));
    state.set_balance(addr(2), U256::from(1u64));
    state.finalise(true);
    assert!(!state.exist(addr(1)));
    assert!(state.exist(addr(2)));
}

#[test]
fn copy_is_independent() {
    let (_db, mut state) = fresh_state();
    state.set_balance(addr(1), U256::from(10u64));
    state.set_state(addr(1), slot(1), word(1));
    state.finalise(false);

    let mut copy = state.copy();
    state.set_balance(addr(1), U256::from(99u64));
    state.set_state(addr(1), slot(1), word(9));
    copy.set_balance(addr(2), U256::from(5u64));

    assert_eq!(copy.get_balance(addr(1)), U256::from(10u64));
    assert_eq!(copy.get_state(addr(1), slot(1)), word(1));
    assert_eq!(state.get_balance(addr(2)), U256::ZERO);
    assert_eq!(state.get_balance(addr(1)), U256::from(99u64));
}

#[test]
fn copy_preserves_origin_maps() {
    let (db, root) = seeded_state(addr(1), &[]);
    let mut state = StateCache::new(root, db, None).unwrap();
    state.set_balance(addr(1), U256::from(60u64));
    state.finalise(false);
    state.accounts_intermediate_root();
    state.state_intermediate_root();
    // The pre-block value of the mutated account is tracked.
    assert!(matches!(state.account_origin(addr(1)), Some(Some(_))));

    let copy = state.copy();
    assert_eq!(copy.account_origin(addr(1)), state.account_origin(addr(1)));
    assert_eq!(
        copy.buffered_account(keccak256(addr(1))),
        state.buffered_account(keccak256(addr(1)))
    );
}

#[test]
fn copied_cache_commits_like_the_original() {
    let (_db, mut state) = fresh_state();
    state.set_balance(addr(1), U256::from(42u64));
    state.set_state(addr(1), slot(1), word(3));
    state.finalise(true);

    let mut copy = state.copy();
    let root = state.commit(1, true).unwrap();
    let copy_root = copy.commit(1, true).unwrap();
    assert_eq!(root, copy_root);
}

#[test]
fn read_errors_stick_until_commit() {
    let (db, mut state) = fresh_state();
    db.set_read_fault(true);
    // The failed read is absorbed: the VM sees a missing account.
    assert_eq!(state.get_balance(addr(1)), U256::ZERO);
    db.set_read_fault(false);

    // Later successful activity does not clear the fault.
    state.set_balance(addr(2), U256::from(5u64));
    state.finalise(true);
    let err = state.commit(1, true).unwrap_err();
    assert!(matches!(err, Error::EarlierError(_)));
}

#[test]
fn refunds_accumulate_and_clear_on_finalise() {
    let (_db, mut state) = fresh_state();
    state.add_refund(10);
    state.sub_refund(4);
    assert_eq!(state.refund(), 6);
    state.set_balance(addr(1), U256::from(1u64));
    state.finalise(false);
    assert_eq!(state.refund(), 0);
}

#[test]
fn logs_follow_the_tx_context() {
    let (_db, mut state) = fresh_state();
    let tx_a = keccak256(b"tx-a");
    let tx_b = keccak256(b"tx-b");

    state.set_tx_context(tx_a, 0);
    state.add_log(Log { address: addr(1), ..Default::default() });
    state.set_tx_context(tx_b, 1);
    state.add_log(Log { address: addr(2), ..Default::default() });
    state.add_log(Log { address: addr(3), ..Default::default() });

    let block_hash = keccak256(b"block");
    let logs = state.logs_for_tx(tx_b, 7, block_hash);
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].tx_index, 1);
    assert_eq!(logs[0].index, 1);
    assert_eq!(logs[1].index, 2);
    assert_eq!(logs[0].block_number, 7);
    assert_eq!(logs[0].block_hash, block_hash);
    assert_eq!(state.logs().len(), 3);
}

#[test]
fn log_revert_pops_in_order() {
    let (_db, mut state) = fresh_state();
    state.set_tx_context(keccak256(b"tx"), 0);
    state.add_log(Log { address: addr(1), ..Default::default() });
    let id = state.snapshot();
    state.add_log(Log { address: addr(2), ..Default::default() });
    state.revert_to_snapshot(id);
    let logs = state.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, addr(1));
}

#[test]
fn ripemd_touch_survives_revert_without_an_object() {
    let ripemd = Address::with_last_byte(3);
    let (_db, mut state) = fresh_state();
    let id = state.snapshot();
    // A zero-value transfer to an empty account only touches it.
    state.add_balance(ripemd, U256::ZERO);
    state.revert_to_snapshot(id);
    // The touch entry survives in the dirty set with no live object;
    // finalise must tolerate that.
    state.finalise(true);
    assert!(!state.exist(ripemd));
}

#[test]
fn committed_storage_is_readable_in_the_next_block() {
    let key = slot(0x55);
    let (db, root) = seeded_state(addr(1), &[(key, word(8))]);
    let mut state = StateCache::new(root, db, None).unwrap();
    assert_eq!(state.get_state(addr(1), key), word(8));
    assert_eq!(state.get_committed_state(addr(1), key), word(8));

    state.set_state(addr(1), key, word(9));
    assert_eq!(state.get_state(addr(1), key), word(9));
    assert_eq!(state.get_committed_state(addr(1), key), word(8));
}

#[test]
fn snapshot_reads_serve_the_lookup_pipeline() {
    let key = slot(0x66);
    let (db, root) = seeded_state(addr(1), &[(key, word(6))]);
    let snaps = Arc::new(MemSnapshotTree::from_database(&db, root));
    let mut state =
        StateCache::new(root, db.clone(), Some(snaps)).unwrap();

    // Reads are served by the snapshot even with trie reads disabled.
    db.set_read_fault(true);
    assert_eq!(state.get_balance(addr(1)), U256::from(50u64));
    assert_eq!(state.get_state(addr(1), key), word(6));
    db.set_read_fault(false);
    assert!(state.error().is_none());
}

#[test]
fn set_code_persists_through_commit() {
    let (db, mut state) = fresh_state();
    let code = Bytes::from_static(b"\x60\x01\x60\x02");
    let code_hash = keccak256(&code);

    state.set_balance(addr(1), U256::from(1u64));
    state.set_code(addr(1), code.clone());
    assert_eq!(state.get_code_hash(addr(1)), code_hash);
    assert_eq!(state.get_code(addr(1)), code);
    assert_eq!(state.get_code_size(addr(1)), 4);

    state.finalise(true);
    let root = state.commit(1, true).unwrap();
    assert_eq!(db.committed_account(root, addr(1)).unwrap().code_hash, code_hash);
    assert_eq!(db.committed_code(code_hash).unwrap(), code.to_vec());

    // A fresh cache loads the code lazily from the store.
    let mut next = StateCache::new(root, db, None).unwrap();
    assert_eq!(next.get_code(addr(1)), code);
}

#[test]
fn replace_storage_skips_disk_incarnation() {
    let key = slot(0x77);
    let (db, root) = seeded_state(addr(1), &[(key, word(1))]);
    let mut state = StateCache::new(root, db, None).unwrap();

    state.replace_storage(addr(1), HashMap::from([(slot(0x78), word(2))]));
    // The previous incarnation's slots are gone and the new ones visible.
    assert_eq!(state.get_state(addr(1), key), B256::ZERO);
    assert_eq!(state.get_state(addr(1), slot(0x78)), word(2));
    assert!(state.has_destruct_marker(addr(1)));
}

#[test]
fn mv_observer_counts_without_changing_semantics() {
    let run = |state: &mut StateCache| {
        state.set_balance(addr(1), U256::from(100u64));
        state.sub_balance(addr(1), U256::from(30u64));
        state.add_balance(addr(2), U256::from(30u64));
        state.set_state(addr(1), slot(1), word(1));
        state.finalise(true);
        state.intermediate_root(true)
    };
    let (_da, mut plain) = fresh_state();
    let plain_root = run(&mut plain);

    let (_db, mut observed) = fresh_state();
    let mv = Arc::new(CountingMvStates::default());
    let counters = mv.counters();
    observed.set_mv_states(mv);
    observed.start_tx_recorder(false);
    let observed_root = run(&mut observed);
    observed.stop_tx_recorder();

    assert_eq!(observed_root, plain_root);
    assert!(counters.account_reads.load(std::sync::atomic::Ordering::Relaxed) > 0);
    assert!(counters.storage_writes.load(std::sync::atomic::Ordering::Relaxed) > 0);
}

#[test]
fn snapshot_tree_receives_update_and_cap() {
    let (db, root) = seeded_state(addr(1), &[]);
    let snaps = Arc::new(MemSnapshotTree::from_database(&db, root));
    let mut state =
        StateCache::new(root, db.clone(), Some(snaps.clone()))
            .unwrap();

    state.set_balance(addr(1), U256::from(77u64));
    state.finalise(true);
    let expected = state.intermediate_root(true);
    state.set_expected_root(expected);
    state.commit(2, true).unwrap();

    let updates = snaps.recorded_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].new_root, expected);
    assert_eq!(updates[0].parent_root, root);

    // The cap runs detached; give it a moment.
    let deadline = Instant::now() + Duration::from_secs(2);
    while snaps.recorded_caps().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(snaps.recorded_caps(), vec![(expected, 128)]);
}

#[test]
fn randomized_reverts_match_a_naive_model() {
    use rand::{Rng, SeedableRng};

    #[derive(Clone, Default)]
    struct Model {
        balances: HashMap<Address, U256>,
        nonces: HashMap<Address, u64>,
        storage: HashMap<(Address, B256), B256>,
        refund: u64,
    }

    let (_db, mut state) = fresh_state();
    let mut rng = rand::rngs::StdRng::from_seed([7; 32]);
    let mut model = Model::default();
    let mut checkpoints: Vec<(usize, Model)> = Vec::new();
    let addrs: Vec<Address> = (1..=5).map(addr).collect();
    let slots: Vec<B256> = (1..=4).map(slot).collect();

    for _ in 0..500 {
        match rng.gen_range(0..8) {
            0 | 1 => {
                let account = addrs[rng.gen_range(0..addrs.len())];
                let value = U256::from(rng.gen_range(0..1_000u64));
                state.set_balance(account, value);
                model.balances.insert(account, value);
            }
            2 => {
                let account = addrs[rng.gen_range(0..addrs.len())];
                let nonce = rng.gen_range(0..100u64);
                state.set_nonce(account, nonce);
                model.nonces.insert(account, nonce);
            }
            3 | 4 => {
                let account = addrs[rng.gen_range(0..addrs.len())];
                let key = slots[rng.gen_range(0..slots.len())];
                let value = B256::with_last_byte(rng.gen_range(0..16u8));
                state.set_state(account, key, value);
                model.storage.insert((account, key), value);
            }
            5 => {
                let gas = rng.gen_range(0..50u64);
                state.add_refund(gas);
                model.refund += gas;
            }
            6 => {
                let id = state.snapshot();
                checkpoints.push((id, model.clone()));
            }
            _ => {
                if checkpoints.is_empty() {
                    continue;
                }
                let pick = rng.gen_range(0..checkpoints.len());
                let (id, snapshot_model) = checkpoints[pick].clone();
                state.revert_to_snapshot(id);
                checkpoints.truncate(pick);
                model = snapshot_model;
            }
        }
    }

    for account in &addrs {
        assert_eq!(
            state.get_balance(*account),
            model.balances.get(account).copied().unwrap_or_default(),
            "balance of {account}"
        );
        assert_eq!(
            state.get_nonce(*account),
            model.nonces.get(account).copied().unwrap_or_default(),
            "nonce of {account}"
        );
        for key in &slots {
            assert_eq!(
                state.get_state(*account, *key),
                model.storage.get(&(*account, *key)).copied().unwrap_or_default(),
                "slot {key} of {account}"
            );
        }
    }
    assert_eq!(state.refund(), model.refund);
}
