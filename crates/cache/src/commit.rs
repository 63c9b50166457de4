//! Finalisation and the commit pipeline: folding transaction effects into
//! the tries, wiping destructed storage, and persisting one block's diff.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use alloy_primitives::{keccak256, Address, Bytes, B256};
use block_state_common::{encode_slim_account, StateAccount, EMPTY_ROOT_HASH};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::backend::{
    code_db_key, AccountAccessKind, Database, MergedNodeSet, NodeSet, Snapshot, Trie,
    TrieIterEntry, TrieNode, TrieScheme, TrieStateSet,
};
use crate::metrics;
use crate::object::{ReadContext, StateObject};
use crate::state::StateCache;
use crate::{Error, Result, IDEAL_BATCH_SIZE, SNAPSHOT_DIFF_LAYERS};

impl StateCache {
    /// Seal the current transaction: merge staged destruction markers,
    /// sweep every journal-dirty object into the pending set (deleting
    /// self-destructed and, optionally, empty ones), hand touched
    /// addresses to the prefetcher and clear the journal and refund.
    ///
    /// Reverting across a finalise is not possible.
    pub fn finalise(&mut self, delete_empty: bool) {
        let fee_receivers =
            self.mv_states.as_ref().map(|mv| mv.fee_receivers()).unwrap_or_default();

        let staged: Vec<(Address, Option<StateAccount>)> = self.destruct_dirty.drain().collect();
        for (addr, account) in staged {
            self.destruct.insert(addr, account);
            if let Some(mv) = &self.mv_states {
                if !fee_receivers.contains(&addr) {
                    mv.record_account_write(addr, AccountAccessKind::Suicide);
                }
            }
        }

        let mut to_prefetch: Vec<Vec<u8>> = Vec::with_capacity(self.journal.dirties_len());
        let dirties: Vec<Address> = self.journal.dirty_addresses().copied().collect();
        for addr in dirties {
            // A journal-dirty address without an object is the historical
            // RIPEMD touch: the account ran out of gas before
            // materializing, yet the touch survives in the journal.
            let Some(obj) = self.state_objects.get_mut(&addr) else {
                continue;
            };
            if obj.self_destructed() || (delete_empty && obj.empty()) {
                obj.set_deleted(true);
                let origin = obj.origin().copied();
                let addr_hash = obj.addr_hash();

                // Deletions are tracked at transaction granularity: a later
                // transaction may resurrect the account, and the snapshot
                // layer needs both events.
                if !self.destruct.contains_key(&addr) {
                    self.destruct.insert(addr, origin);
                    if let Some(mv) = &self.mv_states {
                        if !fee_receivers.contains(&addr) {
                            mv.record_account_write(addr, AccountAccessKind::Suicide);
                        }
                    }
                }
                self.accounts.remove(&addr_hash);
                self.storages.remove(&addr_hash);
                self.accounts_origin.remove(&addr);
                self.storages_origin.remove(&addr);
            } else {
                if let Some(mv) = &self.mv_states {
                    if !fee_receivers.contains(&addr) {
                        for slot in obj.dirty_storage().keys() {
                            mv.record_storage_write(addr, *slot);
                        }
                    }
                }
                let moved = obj.finalise();
                let root = obj.storage_root();
                let addr_hash = obj.addr_hash();
                if let Some(prefetcher) = &self.prefetcher {
                    if !moved.is_empty() && root != EMPTY_ROOT_HASH {
                        let keys = moved.iter().map(|slot| slot.as_slice().to_vec()).collect();
                        prefetcher.prefetch(addr_hash, root, addr, keys);
                    }
                }
            }
            self.state_objects
                .get_mut(&addr)
                .expect("object checked above")
                .set_created(false);
            self.pending.insert(addr);
            self.dirty.insert(addr);
            to_prefetch.push(addr.as_slice().to_vec());
        }
        if let Some(prefetcher) = &self.prefetcher {
            if !to_prefetch.is_empty() {
                prefetcher.prefetch(B256::ZERO, self.original_root, Address::ZERO, to_prefetch);
            }
        }
        self.clear_journal_and_refund();
    }

    fn clear_journal_and_refund(&mut self) {
        if !self.journal.is_empty() {
            self.journal = crate::journal::Journal::new();
            self.refund = 0;
        }
        // Savepoints can exist without journal entries.
        self.valid_revisions.clear();
    }

    /// The state root after finalising everything executed so far, as it
    /// goes into transaction receipts. Storage tries flush in parallel,
    /// then the account trie serially.
    pub fn intermediate_root(&mut self, delete_empty: bool) -> B256 {
        self.finalise(delete_empty);
        self.accounts_intermediate_root();
        self.state_intermediate_root()
    }

    /// Recompute the storage root of every pending object, fanning the
    /// work across the available cores. Each worker owns its objects
    /// exclusively and returns its mutations in a flush buffer; the
    /// buffers merge into the block-scope maps only after all workers
    /// joined.
    pub fn accounts_intermediate_root(&mut self) {
        let StateCache {
            db,
            trie,
            snap,
            original_root,
            db_err,
            destruct,
            destruct_dirty,
            state_objects,
            pending,
            prefetcher,
            accounts,
            storages,
            storages_origin,
            storage_updated,
            storage_deleted,
            ..
        } = self;

        let mut objects: Vec<&mut StateObject> = state_objects
            .iter_mut()
            .filter(|(addr, obj)| pending.contains(*addr) && !obj.deleted())
            .map(|(_, obj)| obj)
            .collect();
        if objects.is_empty() {
            return;
        }

        let ctx = ReadContext {
            db: db.as_ref(),
            account_trie: trie.as_ref(),
            snap: snap.as_deref(),
            original_root: *original_root,
            db_err,
            destruct,
            destruct_dirty,
        };

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(objects.len());
        let chunk_size = objects.len().div_ceil(workers);
        let flushes = Mutex::new(Vec::with_capacity(objects.len()));
        std::thread::scope(|scope| {
            for chunk in objects.chunks_mut(chunk_size) {
                let ctx = &ctx;
                let flushes = &flushes;
                scope.spawn(move || {
                    let mut local = Vec::with_capacity(chunk.len());
                    for obj in chunk.iter_mut() {
                        local.push(obj.update_root(ctx));
                    }
                    flushes.lock().extend(local);
                });
            }
        });

        for flush in flushes.into_inner() {
            *storage_updated += flush.updated;
            *storage_deleted += flush.deleted;
            accounts.insert(flush.addr_hash, flush.slim_account.into());
            if !flush.storage.is_empty() {
                storages.entry(flush.addr_hash).or_default().extend(flush.storage);
                let origin = storages_origin.entry(flush.address).or_default();
                for (slot_hash, value) in flush.storage_origin {
                    origin.entry(slot_hash).or_insert(value);
                }
            }
            if let Some(prefetcher) = prefetcher.as_ref() {
                if !flush.used_slots.is_empty() {
                    prefetcher.used(flush.addr_hash, flush.prev_root, flush.used_slots);
                }
            }
        }
    }

    /// Flush pending account changes into the account trie and return its
    /// root. Adopts the prefetcher's pre-warmed trie when it matches, and
    /// retires the prefetcher either way.
    pub fn state_intermediate_root(&mut self) -> B256 {
        let prefetcher = self.prefetcher.take();
        if let Some(prefetcher) = &prefetcher {
            if let Some(trie) = prefetcher.trie(B256::ZERO, self.original_root) {
                self.trie = trie;
            }
        }

        let mut used_addrs: Vec<Vec<u8>> = Vec::with_capacity(self.pending.len());
        let pending: Vec<Address> = self.pending.drain().collect();
        for addr in pending {
            let deleted = self
                .state_objects
                .get(&addr)
                .map(|obj| obj.deleted())
                .expect("finalise keeps every pending object live");
            if deleted {
                self.delete_state_object(addr);
                self.account_deleted += 1;
            } else {
                self.update_state_object(addr);
                self.account_updated += 1;
            }
            used_addrs.push(addr.as_slice().to_vec());
        }
        if let Some(prefetcher) = prefetcher {
            prefetcher.used(B256::ZERO, self.original_root, used_addrs);
            prefetcher.close();
        }

        if self.no_trie {
            self.expected_root
        } else {
            self.trie.hash()
        }
    }

    /// Write one account into the account trie and the block buffers,
    /// tracking its pre-block value the first time it is seen.
    fn update_state_object(&mut self, address: Address) {
        let obj = self.state_objects.get(&address).expect("caller checked the object is live");
        let addr_hash = obj.addr_hash();
        let data = *obj.account();
        let origin_slim: Option<Bytes> =
            obj.origin().map(|origin| encode_slim_account(origin).into());
        let dirty_code = obj.code_if_dirty();

        if !self.no_trie {
            if let Err(source) = self.trie.update_account(address, &data) {
                self.set_error(Error::TrieMutation {
                    context: format!("update account {address}"),
                    source,
                });
            }
            if let Some((code_hash, code)) = dirty_code {
                if let Err(source) = self.trie.update_contract_code(address, code_hash, &code) {
                    self.set_error(Error::TrieMutation {
                        context: format!("update code of {address}"),
                        source,
                    });
                }
            }
        }

        self.accounts.insert(addr_hash, encode_slim_account(&data).into());
        // Updates may hit the same account many times per block; only the
        // first records the original value.
        self.accounts_origin.entry(address).or_insert(origin_slim);
    }

    fn delete_state_object(&mut self, address: Address) {
        if self.no_trie {
            return;
        }
        if let Err(source) = self.trie.delete_account(address) {
            self.set_error(Error::TrieMutation {
                context: format!("delete account {address}"),
                source,
            });
        }
    }

    /// Commit the block's aggregate state transition and return the new
    /// state root. Three tasks run concurrently: the trie commit (with
    /// destruction handling and per-object storage commits fanned out
    /// underneath), the contract-code batch write, and the snapshot-tree
    /// update. Afterwards the cached tries are spent; open a fresh cache
    /// on the returned root to continue.
    pub fn commit(&mut self, block: u64, delete_empty: bool) -> Result<B256> {
        let result = self.commit_inner(block, delete_empty);
        self.stop_prefetcher();
        result
    }

    fn commit_inner(&mut self, block: u64, delete_empty: bool) -> Result<B256> {
        // A read failure anywhere in the block poisons the commit.
        if let Some(err) = self.db_err.get() {
            return Err(Error::EarlierError(err.to_string()));
        }

        if !self.full_processed {
            self.state_root = self.intermediate_root(delete_empty);
        } else {
            // Fully pre-processed blocks finalized per transaction; the
            // computed root must match the header.
            self.state_root = self.state_intermediate_root();
            if self.expected_root != self.state_root {
                error!(remote = %self.expected_root, local = %self.state_root, "invalid merkle root");
                return Err(Error::RootMismatch {
                    expected: self.expected_root,
                    computed: self.state_root,
                });
            }
        }

        // Inputs of the code-write task, extracted up front so the trie
        // task holds the only live object borrows.
        let mut code_writes: Vec<(B256, Bytes)> = Vec::new();
        let dirty_addrs: Vec<Address> = self.dirty.iter().copied().collect();
        for addr in &dirty_addrs {
            if let Some(obj) = self.state_objects.get_mut(addr) {
                if obj.deleted() {
                    continue;
                }
                if let Some(entry) = obj.take_dirty_code() {
                    code_writes.push(entry);
                }
            }
        }

        // Inputs of the snapshot task.
        let destruct_hashes: HashSet<B256> = self
            .destruct
            .keys()
            .map(|addr| {
                self.state_objects
                    .get(addr)
                    .map(|obj| obj.addr_hash())
                    .unwrap_or_else(|| keccak256(addr))
            })
            .collect();
        let accounts_snapshot = self.accounts.clone();
        let storages_snapshot = self.storages.clone();
        let expected_root = self.expected_root;
        let original_root = self.original_root;
        let delete_limit = self.storage_delete_limit;
        let snaps_arc = self.snaps.clone();
        let snap_arc = self.snap.clone();

        let StateCache {
            db,
            trie,
            state_objects,
            dirty,
            accounts,
            accounts_origin,
            storages_origin,
            destruct,
            snap,
            no_trie,
            ..
        } = self;

        let mut dirty_objects: Vec<&mut StateObject> = state_objects
            .iter_mut()
            .filter(|(addr, obj)| dirty.contains(*addr) && !obj.deleted())
            .map(|(_, obj)| obj)
            .collect();

        let db_ref: &dyn Database = db.as_ref();
        let snap_ref: Option<&dyn Snapshot> = snap.as_deref();
        let no_trie = *no_trie;
        let merged = Mutex::new(MergedNodeSet::new());
        let merged_ref = &merged;
        let trie_ref = trie;
        let accounts_ref: &HashMap<B256, Bytes> = accounts;
        let accounts_origin_ref = accounts_origin;
        let storages_origin_ref = storages_origin;
        let destruct_ref: &HashMap<Address, Option<StateAccount>> = destruct;

        let (trie_res, code_res, snap_res) = std::thread::scope(|scope| {
            let trie_task = scope.spawn(move || -> Result<Option<B256>> {
                // Destructions first: their origin values overrule the
                // update-time ones and their node sets may share owners
                // with resurrected accounts.
                let incomplete = handle_destruction(
                    db_ref,
                    snap_ref,
                    trie_ref.as_ref(),
                    original_root,
                    delete_limit,
                    destruct_ref,
                    accounts_ref,
                    accounts_origin_ref,
                    storages_origin_ref,
                    merged_ref,
                )?;

                if !no_trie && !dirty_objects.is_empty() {
                    let workers = std::thread::available_parallelism()
                        .map(|n| n.get())
                        .unwrap_or(1)
                        .min(dirty_objects.len());
                    let chunk_size = dirty_objects.len().div_ceil(workers);
                    let first_err: Mutex<Option<Error>> = Mutex::new(None);
                    std::thread::scope(|inner| {
                        for chunk in dirty_objects.chunks_mut(chunk_size) {
                            let first_err = &first_err;
                            inner.spawn(move || {
                                for obj in chunk.iter_mut() {
                                    if first_err.lock().is_some() {
                                        // Another worker failed; drain.
                                        return;
                                    }
                                    match obj.commit() {
                                        Ok(Some(set)) => merged_ref.lock().merge(set),
                                        Ok(None) => {}
                                        Err(err) => {
                                            let mut slot = first_err.lock();
                                            if slot.is_none() {
                                                *slot = Some(err);
                                            }
                                            return;
                                        }
                                    }
                                }
                            });
                        }
                    });
                    if let Some(err) = first_err.into_inner() {
                        return Err(err);
                    }
                }

                if no_trie {
                    return Ok(None);
                }
                let (root, set) = trie_ref.commit(true).map_err(|source| {
                    Error::TrieMutation { context: "commit account trie".into(), source }
                })?;
                if let Some(set) = set {
                    let (updates, deletes) = set.size();
                    metrics::ACCOUNT_TRIE_NODES_UPDATED.inc_by(updates as u64);
                    metrics::ACCOUNT_TRIE_NODES_DELETED.inc_by(deletes as u64);
                    merged_ref.lock().merge(set);
                }

                let origin =
                    if original_root.is_zero() { EMPTY_ROOT_HASH } else { original_root };
                if root != origin {
                    let nodes = std::mem::take(&mut *merged_ref.lock());
                    let states = TrieStateSet {
                        accounts_origin: std::mem::take(accounts_origin_ref),
                        storages_origin: std::mem::take(storages_origin_ref),
                        incomplete,
                    };
                    db_ref.trie_db().update(root, origin, block, nodes, states).map_err(
                        |source| Error::TrieMutation {
                            context: "persist trie diff".into(),
                            source,
                        },
                    )?;
                    return Ok(Some(root));
                }
                Ok(None)
            });

            let code_task = scope.spawn(move || -> Result<()> {
                if code_writes.is_empty() {
                    return Ok(());
                }
                let mut batch = db_ref.disk_db().batch();
                for (code_hash, code) in code_writes {
                    batch.put(&code_db_key(code_hash), &code);
                    if batch.value_size() > IDEAL_BATCH_SIZE {
                        batch.write()?;
                        batch.reset();
                    }
                }
                if batch.value_size() > 0 {
                    if let Err(source) = batch.write() {
                        error!(err = %source, "failed to commit dirty contract code");
                        return Err(Error::Backend(source));
                    }
                }
                Ok(())
            });

            let snapshot_task = scope.spawn(move || {
                let (Some(snaps), Some(snap)) = (snaps_arc, snap_arc) else {
                    return;
                };
                // Only update on a real transition; empty blocks reuse
                // the parent layer.
                let parent = snap.root();
                if parent == expected_root {
                    return;
                }
                if let Err(err) = snaps.update(
                    expected_root,
                    parent,
                    destruct_hashes,
                    accounts_snapshot,
                    storages_snapshot,
                ) {
                    warn!(from = %parent, to = %expected_root, err = %err, "failed to update snapshot tree");
                }
                // Bound the diff-layer depth in the background; failures
                // only cost memory, not correctness.
                std::thread::spawn(move || {
                    if let Err(err) = snaps.cap(expected_root, SNAPSHOT_DIFF_LAYERS) {
                        warn!(root = %expected_root, layers = SNAPSHOT_DIFF_LAYERS, err = %err, "failed to cap snapshot tree");
                    }
                });
            });

            (trie_task.join(), code_task.join(), snapshot_task.join())
        });

        let new_root = trie_res.expect("trie commit task panicked")?;
        code_res.expect("code commit task panicked")?;
        snap_res.expect("snapshot update task panicked");
        if let Some(root) = new_root {
            self.original_root = root;
        }

        metrics::ACCOUNTS_UPDATED.inc_by(self.account_updated as u64);
        metrics::ACCOUNTS_DELETED.inc_by(self.account_deleted as u64);
        metrics::STORAGE_SLOTS_UPDATED.inc_by(self.storage_updated as u64);
        metrics::STORAGE_SLOTS_DELETED.inc_by(self.storage_deleted as u64);
        self.account_updated = 0;
        self.account_deleted = 0;
        self.storage_updated = 0;
        self.storage_deleted = 0;

        let root = if self.state_root.is_zero() { EMPTY_ROOT_HASH } else { self.state_root };
        self.snap = None;
        self.accounts.clear();
        self.storages.clear();
        self.accounts_origin.clear();
        self.storages_origin.clear();
        self.dirty.clear();
        self.destruct.clear();
        Ok(root)
    }
}

/// Process the block's destruction markers. Four situations arise:
///
///   (a) the account never existed and was destructed: nothing to do;
///   (b) like (a) but resurrected later in the block: record a nil
///       original so the diff layer sees the creation;
///   (c) the account existed and was destructed: its original value and
///       all of its storage slots must be recorded and wiped;
///   (d) like (c) but resurrected later: same as (c), the node sets of
///       both incarnations sharing one owner.
#[allow(clippy::too_many_arguments)]
fn handle_destruction(
    db: &dyn Database,
    snap: Option<&dyn Snapshot>,
    account_trie: &dyn Trie,
    original_root: B256,
    delete_limit: usize,
    destruct: &HashMap<Address, Option<StateAccount>>,
    accounts: &HashMap<B256, Bytes>,
    accounts_origin: &mut HashMap<Address, Option<Bytes>>,
    storages_origin: &mut HashMap<Address, HashMap<B256, Bytes>>,
    merged: &Mutex<MergedNodeSet>,
) -> Result<HashSet<Address>> {
    let mut incomplete = HashSet::new();
    // Storage deletion is unsupported under hash addressing; walking the
    // tries would be wasted work.
    if db.trie_db().scheme() == TrieScheme::Hash {
        return Ok(incomplete);
    }
    for (addr, prev) in destruct {
        let addr_hash = keccak256(addr);
        let Some(prev) = prev else {
            if accounts.contains_key(&addr_hash) {
                // Case (b): resurrected from nothing.
                accounts_origin.insert(*addr, None);
            }
            continue;
        };
        // Cases (c)/(d). The pre-destruction account is the true original;
        // it overrules any value recorded at update time.
        accounts_origin.insert(*addr, Some(encode_slim_account(prev).into()));
        if prev.storage_root == EMPTY_ROOT_HASH {
            continue;
        }
        let (aborted, slots, nodes) = delete_storage(
            db,
            snap,
            account_trie,
            original_root,
            delete_limit,
            *addr,
            addr_hash,
            prev.storage_root,
        )?;
        if aborted {
            // Too large to wipe within the budget: report the account as
            // incomplete and drop its slot diff, which can no longer be
            // trusted.
            metrics::SLOT_DELETION_SKIPPED.inc();
            incomplete.insert(*addr);
            storages_origin.remove(addr);
            continue;
        }
        let origin = storages_origin.entry(*addr).or_default();
        for (slot_hash, value) in slots {
            origin.entry(slot_hash).or_insert(value);
        }
        merged.lock().merge(nodes);
    }
    Ok(incomplete)
}

/// Wipe one account's storage, preferring the snapshot-fed stack trie and
/// falling back to a direct trie walk when the snapshot is unavailable or
/// corrupt. Returns `(aborted, slots, deletion_markers)`.
#[allow(clippy::too_many_arguments)]
fn delete_storage(
    db: &dyn Database,
    snap: Option<&dyn Snapshot>,
    account_trie: &dyn Trie,
    original_root: B256,
    delete_limit: usize,
    address: Address,
    addr_hash: B256,
    root: B256,
) -> Result<(bool, HashMap<B256, Bytes>, NodeSet)> {
    if let Some(snap) = snap {
        match fast_delete_storage(db, snap, original_root, delete_limit, address, addr_hash, root)
        {
            Ok(result) => return Ok(result),
            Err(err) => {
                warn!(address = %address, err = %err, "snapshot-based storage wipe failed, walking the trie");
            }
        }
    }
    slow_delete_storage(db, account_trie, original_root, delete_limit, address, addr_hash, root)
}

/// Iterate the slots through the snapshot and replay them into a stack
/// trie whose finished nodes become deletion markers. The stack-trie root
/// must reproduce the account's storage root, or the snapshot is corrupt.
fn fast_delete_storage(
    db: &dyn Database,
    snap: &dyn Snapshot,
    original_root: B256,
    delete_limit: usize,
    address: Address,
    addr_hash: B256,
    root: B256,
) -> Result<(bool, HashMap<B256, Bytes>, NodeSet)> {
    let iter = snap
        .storage_iterator(original_root, addr_hash, B256::ZERO)
        .map_err(|source| Error::StorageIterator { address, source })?;

    let size = Cell::new(0usize);
    let nodes = RefCell::new(NodeSet::new(addr_hash));
    let mut stack = db.new_stack_trie(Box::new(|path, _hash, _blob| {
        nodes.borrow_mut().add_node(path, TrieNode::deleted());
        size.set(size.get() + path.len());
    }));

    let mut slots = HashMap::new();
    for item in iter {
        if size.get() > delete_limit {
            return Ok((true, HashMap::new(), NodeSet::new(addr_hash)));
        }
        let (slot_hash, value) = item.map_err(|source| Error::StorageIterator { address, source })?;
        size.set(size.get() + 32 + value.len());
        slots.insert(slot_hash, Bytes::from(value.clone()));
        stack
            .update(slot_hash.as_slice(), &value)
            .map_err(|source| Error::StorageWipe { address, source })?;
    }
    let computed = stack.hash();
    drop(stack);
    if computed != root {
        return Err(Error::WipeRootMismatch { address, expected: root, got: computed });
    }
    Ok((false, slots, nodes.into_inner()))
}

/// Walk the storage trie directly, collecting every slot and marking every
/// resolved node as deleted.
#[allow(clippy::too_many_arguments)]
fn slow_delete_storage(
    db: &dyn Database,
    account_trie: &dyn Trie,
    original_root: B256,
    delete_limit: usize,
    address: Address,
    addr_hash: B256,
    root: B256,
) -> Result<(bool, HashMap<B256, Bytes>, NodeSet)> {
    let trie = db
        .open_storage_trie(original_root, address, root, account_trie)
        .map_err(|source| Error::StorageWipe { address, source })?;
    let iter =
        trie.node_iterator(&[]).map_err(|source| Error::StorageWipe { address, source })?;

    let mut size = 0usize;
    let mut nodes = NodeSet::new(addr_hash);
    let mut slots = HashMap::new();
    for entry in iter {
        if size > delete_limit {
            return Ok((true, HashMap::new(), NodeSet::new(addr_hash)));
        }
        match entry.map_err(|source| Error::StorageIterator { address, source })? {
            TrieIterEntry::Leaf { key, blob } => {
                size += 32 + blob.len();
                slots.insert(key, Bytes::from(blob));
            }
            TrieIterEntry::Node { path, hash } => {
                // Nodes embedded in their parent have no hash of their own
                // and nothing to delete on disk.
                if hash.is_zero() {
                    continue;
                }
                size += path.len();
                nodes.add_node(&path, TrieNode::deleted());
            }
        }
    }
    Ok((false, slots, nodes))
}
