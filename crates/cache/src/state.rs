use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use block_state_common::{Log, StateAccount};
use tracing::error;

use crate::access_list::AccessList;
use crate::backend::{
    AccountAccessKind, BackendResult, Database, MvStates, Prefetcher, Snapshot, SnapshotTree,
    Trie, TxDag, TxDep,
};
use crate::journal::{Journal, JournalEntry};
use crate::object::StateObject;
use crate::transient::TransientStorage;
use crate::{Error, Result};

/// The RIPEMD-160 precompile. A historical transaction touched it while
/// running out of gas, and that touch must survive journal reverts.
pub(crate) const RIPEMD_ADDRESS: Address = address!("0000000000000000000000000000000000000003");

/// A savepoint handle: the revision id handed to the caller and the journal
/// length to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub id: usize,
    pub journal_index: usize,
}

/// The fork rules relevant to transaction preparation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rules {
    pub is_berlin: bool,
    pub is_shanghai: bool,
}

/// One element of a transaction's declared access list.
#[derive(Debug, Clone)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

/// Assemble a [`crate::object::ReadContext`] from a cache's fields. Expands
/// to field accesses so the borrow checker sees the context and a mutable
/// state-object borrow as disjoint.
macro_rules! read_ctx {
    ($state:expr) => {
        crate::object::ReadContext {
            db: $state.db.as_ref(),
            account_trie: $state.trie.as_ref(),
            snap: $state.snap.as_deref(),
            original_root: $state.original_root,
            db_err: &$state.db_err,
            destruct: &$state.destruct,
            destruct_dirty: &$state.destruct_dirty,
        }
    };
}

/// The transactional cache between the execution engine and the backing
/// world state.
///
/// All reads funnel through live objects, then the snapshot layer, then the
/// account trie. All writes are buffered in per-account shadows and
/// journaled so any suffix can be reverted. `finalise` seals a
/// transaction's effects, `intermediate_root` flushes them into the tries,
/// and `commit` persists one block's aggregate diff.
///
/// A cache serves a single-threaded execution engine; only the internal
/// flush and commit phases fan out across worker threads. Once `commit`
/// returns, the cached tries are spent and a fresh cache must be opened on
/// the new root.
pub struct StateCache {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) prefetcher: Option<Box<dyn Prefetcher>>,
    pub(crate) trie: Box<dyn Trie>,
    pub(crate) no_trie: bool,
    pub(crate) snaps: Option<Arc<dyn SnapshotTree>>,
    pub(crate) snap: Option<Arc<dyn Snapshot>>,

    /// The pre-state root; advanced by `commit`.
    pub(crate) original_root: B256,
    /// The root carried by the block header, when known ahead of time.
    pub(crate) expected_root: B256,
    /// The result of the last intermediate-root computation.
    pub(crate) state_root: B256,
    pub(crate) full_processed: bool,

    // Block-scope write buffers: the mutated state (and its original
    // value) accumulated across the whole block.
    pub(crate) accounts: HashMap<B256, Bytes>,
    pub(crate) storages: HashMap<B256, HashMap<B256, Bytes>>,
    pub(crate) accounts_origin: HashMap<Address, Option<Bytes>>,
    pub(crate) storages_origin: HashMap<Address, HashMap<B256, Bytes>>,

    pub(crate) state_objects: HashMap<Address, StateObject>,
    /// Finalized, not yet flushed into the account trie.
    pub(crate) pending: HashSet<Address>,
    /// Touched during the current execution, not yet committed.
    pub(crate) dirty: HashSet<Address>,
    /// Destructed this block, with the pre-destruction origin account.
    pub(crate) destruct: HashMap<Address, Option<StateAccount>>,
    /// Unfinalised staging of `destruct`.
    pub(crate) destruct_dirty: HashMap<Address, Option<StateAccount>>,

    /// First backing-store failure of the block. The consensus core and
    /// the VM cannot handle database errors mid-execution, so reads
    /// memoize here and `commit` surfaces the failure.
    pub(crate) db_err: OnceLock<Error>,

    pub(crate) refund: u64,

    pub(crate) tx_hash: B256,
    pub(crate) tx_index: usize,
    pub(crate) logs: HashMap<B256, Vec<Log>>,
    pub(crate) log_size: u64,

    pub(crate) mv_states: Option<Arc<dyn MvStates>>,

    pub(crate) preimages: HashMap<B256, Bytes>,
    pub(crate) access_list: AccessList,
    pub(crate) transient_storage: TransientStorage,

    pub(crate) journal: Journal,
    pub(crate) valid_revisions: Vec<Revision>,
    pub(crate) next_revision_id: usize,

    /// Byte budget for wiping one account's storage at commit; defaults
    /// to [`crate::STORAGE_DELETE_LIMIT`].
    pub(crate) storage_delete_limit: usize,

    // Per-block counters, drained into metrics at commit.
    pub(crate) account_updated: usize,
    pub(crate) account_deleted: usize,
    pub(crate) storage_updated: usize,
    pub(crate) storage_deleted: usize,
}

impl StateCache {
    /// Open a cache on the state at `root`.
    pub fn new(
        root: B256,
        db: Arc<dyn Database>,
        snaps: Option<Arc<dyn SnapshotTree>>,
    ) -> Result<Self> {
        let trie = db.open_trie(root)?;
        Ok(Self::build(trie, root, db, snaps))
    }

    /// Open a cache over an already-opened account trie.
    pub fn new_with_trie(
        mut trie: Box<dyn Trie>,
        db: Arc<dyn Database>,
        snaps: Option<Arc<dyn SnapshotTree>>,
    ) -> Self {
        let root = trie.hash();
        Self::build(trie, root, db, snaps)
    }

    fn build(
        trie: Box<dyn Trie>,
        root: B256,
        db: Arc<dyn Database>,
        snaps: Option<Arc<dyn SnapshotTree>>,
    ) -> Self {
        let snap = snaps.as_ref().and_then(|tree| tree.snapshot(root));
        let no_trie = trie.is_stub();
        Self {
            db,
            prefetcher: None,
            trie,
            no_trie,
            snaps,
            snap,
            original_root: root,
            expected_root: B256::ZERO,
            state_root: B256::ZERO,
            full_processed: false,
            accounts: HashMap::new(),
            storages: HashMap::new(),
            accounts_origin: HashMap::new(),
            storages_origin: HashMap::new(),
            state_objects: HashMap::new(),
            pending: HashSet::new(),
            dirty: HashSet::new(),
            destruct: HashMap::new(),
            destruct_dirty: HashMap::new(),
            db_err: OnceLock::new(),
            refund: 0,
            tx_hash: B256::ZERO,
            tx_index: 0,
            logs: HashMap::new(),
            log_size: 0,
            mv_states: None,
            preimages: HashMap::new(),
            access_list: AccessList::new(),
            transient_storage: TransientStorage::new(),
            journal: Journal::new(),
            valid_revisions: Vec::new(),
            next_revision_id: 0,
            storage_delete_limit: crate::STORAGE_DELETE_LIMIT,
            account_updated: 0,
            account_deleted: 0,
            storage_updated: 0,
            storage_deleted: 0,
        }
    }

    // ── Lifecycle toggles ───────────────────────────────────────────

    /// Override the byte budget for wiping a single account's storage at
    /// commit. Deletions past the budget are reported as incomplete
    /// rather than performed.
    pub fn set_storage_delete_limit(&mut self, limit: usize) {
        self.storage_delete_limit = limit;
    }

    /// Install a prefetcher that warms trie nodes while the block runs.
    /// Only effective with a live snapshot; replaced if one is running.
    pub fn start_prefetcher(&mut self, prefetcher: Box<dyn Prefetcher>) {
        if self.no_trie {
            return;
        }
        if let Some(old) = self.prefetcher.take() {
            old.close();
        }
        if self.snap.is_some() {
            self.prefetcher = Some(prefetcher);
        } else {
            prefetcher.close();
        }
    }

    /// Terminate a running prefetcher.
    pub fn stop_prefetcher(&mut self) {
        if let Some(prefetcher) = self.prefetcher.take() {
            prefetcher.close();
        }
    }

    /// Mark that the block was fully pre-processed: `commit` will compute
    /// the root itself and verify it against the expected root.
    pub fn mark_full_processed(&mut self) {
        self.full_processed = true;
    }

    /// Record the state root carried by the block header.
    pub fn set_expected_root(&mut self, root: B256) {
        self.expected_root = root;
    }

    pub fn no_trie(&self) -> bool {
        self.no_trie
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn snapshot_handle(&self) -> Option<Arc<dyn Snapshot>> {
        self.snap.clone()
    }

    pub fn original_root(&self) -> B256 {
        self.original_root
    }

    /// The memoized backing-store failure, if any occurred.
    pub fn error(&self) -> Option<&Error> {
        self.db_err.get()
    }

    pub(crate) fn set_error(&self, err: Error) {
        let _ = self.db_err.set(err);
    }

    /// Open the storage trie of the given account at its current root.
    pub fn open_storage_trie(&mut self, address: Address) -> BackendResult<Box<dyn Trie>> {
        let root = self.storage_root(address);
        self.db.open_storage_trie(self.original_root, address, root, self.trie.as_ref())
    }

    // ── Logs, preimages, refund ─────────────────────────────────────

    /// Record a log against the current transaction context.
    pub fn add_log(&mut self, mut log: Log) {
        self.journal.append(JournalEntry::AddLog { tx_hash: self.tx_hash });
        log.tx_hash = self.tx_hash;
        log.tx_index = self.tx_index as u64;
        log.index = self.log_size;
        self.logs.entry(self.tx_hash).or_default().push(log);
        self.log_size += 1;
    }

    /// Logs of one transaction, annotated with the block context.
    pub fn logs_for_tx(&mut self, tx_hash: B256, block_number: u64, block_hash: B256) -> Vec<Log> {
        let Some(logs) = self.logs.get_mut(&tx_hash) else {
            return Vec::new();
        };
        for log in logs.iter_mut() {
            log.block_number = block_number;
            log.block_hash = block_hash;
        }
        logs.clone()
    }

    /// All logs recorded in the block so far.
    pub fn logs(&self) -> Vec<Log> {
        self.logs.values().flatten().cloned().collect()
    }

    /// Record a hash preimage seen by the VM; the first write wins.
    pub fn add_preimage(&mut self, hash: B256, preimage: &[u8]) {
        if self.preimages.contains_key(&hash) {
            return;
        }
        self.journal.append(JournalEntry::AddPreimage { hash });
        self.preimages.insert(hash, Bytes::copy_from_slice(preimage));
    }

    pub fn preimages(&self) -> &HashMap<B256, Bytes> {
        &self.preimages
    }

    pub fn add_refund(&mut self, gas: u64) {
        self.journal.append(JournalEntry::RefundChange { prev: self.refund });
        self.refund += gas;
    }

    /// Panics if more gas is returned than the counter holds; that is a
    /// bug in the caller, not a state condition.
    pub fn sub_refund(&mut self, gas: u64) {
        self.journal.append(JournalEntry::RefundChange { prev: self.refund });
        if gas > self.refund {
            panic!("refund counter below zero (gas: {gas} > refund: {})", self.refund);
        }
        self.refund -= gas;
    }

    pub fn refund(&self) -> u64 {
        self.refund
    }

    // ── Read path ───────────────────────────────────────────────────

    /// Whether the account exists. Self-destructed accounts still exist
    /// until finalise.
    pub fn exist(&mut self, address: Address) -> bool {
        self.get_object(address).is_some()
    }

    /// Whether the account is non-existent or empty per EIP-161.
    pub fn empty(&mut self, address: Address) -> bool {
        self.get_object(address).map(|obj| obj.empty()).unwrap_or(true)
    }

    pub fn get_balance(&mut self, address: Address) -> U256 {
        self.record_account_read(address, AccountAccessKind::Balance);
        self.get_object(address).map(|obj| obj.balance()).unwrap_or(U256::ZERO)
    }

    pub fn get_nonce(&mut self, address: Address) -> u64 {
        self.record_account_read(address, AccountAccessKind::Nonce);
        self.get_object(address).map(|obj| obj.nonce()).unwrap_or(0)
    }

    pub fn get_code_hash(&mut self, address: Address) -> B256 {
        self.record_account_read(address, AccountAccessKind::CodeHash);
        self.get_object(address).map(|obj| obj.code_hash()).unwrap_or(B256::ZERO)
    }

    pub fn get_code(&mut self, address: Address) -> Bytes {
        self.record_account_read(address, AccountAccessKind::CodeHash);
        if self.get_object(address).is_none() {
            return Bytes::new();
        }
        let ctx = read_ctx!(self);
        let obj = self.state_objects.get_mut(&address).expect("object loaded above");
        obj.code(&ctx)
    }

    pub fn get_code_size(&mut self, address: Address) -> usize {
        self.record_account_read(address, AccountAccessKind::CodeHash);
        if self.get_object(address).is_none() {
            return 0;
        }
        let ctx = read_ctx!(self);
        let obj = self.state_objects.get_mut(&address).expect("object loaded above");
        obj.code_size(&ctx)
    }

    /// The storage root of the account, or zero if absent.
    pub fn storage_root(&mut self, address: Address) -> B256 {
        self.get_object(address).map(|obj| obj.storage_root()).unwrap_or(B256::ZERO)
    }

    pub fn get_state(&mut self, address: Address, slot: B256) -> B256 {
        self.record_storage_read(address, slot);
        if self.get_object(address).is_none() {
            return B256::ZERO;
        }
        let ctx = read_ctx!(self);
        let obj = self.state_objects.get_mut(&address).expect("object loaded above");
        obj.get_state(&ctx, slot)
    }

    /// The slot value as of the last finalised transaction.
    pub fn get_committed_state(&mut self, address: Address, slot: B256) -> B256 {
        self.record_storage_read(address, slot);
        if self.get_object(address).is_none() {
            return B256::ZERO;
        }
        let ctx = read_ctx!(self);
        let obj = self.state_objects.get_mut(&address).expect("object loaded above");
        obj.get_committed_state(&ctx, slot)
    }

    pub fn has_self_destructed(&mut self, address: Address) -> bool {
        self.get_object(address).map(|obj| obj.self_destructed()).unwrap_or(false)
    }

    /// Live object for the address, treating deleted objects as absent.
    pub(crate) fn get_object(&mut self, address: Address) -> Option<&mut StateObject> {
        match self.get_deleted_object(address) {
            Some(obj) if !obj.deleted() => Some(obj),
            _ => None,
        }
    }

    /// Live object for the address, including one already marked deleted.
    /// The journal needs the deleted incarnation to revert a destruct
    /// rather than forgetting the object ever existed.
    ///
    /// Lookups cascade: live set, then snapshot, then account trie. Reads
    /// that fail memoize the error and report absence so execution
    /// continues deterministically.
    pub(crate) fn get_deleted_object(&mut self, address: Address) -> Option<&mut StateObject> {
        if self.state_objects.contains_key(&address) {
            return self.state_objects.get_mut(&address);
        }
        let mut data: Option<StateAccount> = None;
        if let Some(snap) = self.snap.as_deref() {
            match snap.account(keccak256(address)) {
                Ok(Some(slim)) => data = Some(slim.into_account()),
                Ok(None) => return None,
                Err(source) => self.set_error(Error::BackingRead {
                    context: format!("snapshot account {address}"),
                    source,
                }),
            }
        }
        if data.is_none() {
            match self.trie.get_account(address) {
                Ok(Some(account)) => data = Some(account),
                Ok(None) => return None,
                Err(source) => {
                    self.set_error(Error::BackingRead {
                        context: format!("account {address}"),
                        source,
                    });
                    return None;
                }
            }
        }
        let account = data.expect("either source populated the account above");
        Some(self.state_objects.entry(address).or_insert_with(|| StateObject::new(address, Some(account))))
    }

    pub(crate) fn get_or_new_object(&mut self, address: Address) -> &mut StateObject {
        if self.get_object(address).is_none() {
            self.create_object(address);
        }
        self.state_objects.get_mut(&address).expect("object created above")
    }

    // ── Write path ──────────────────────────────────────────────────

    pub fn add_balance(&mut self, address: Address, amount: U256) {
        self.record_account_read(address, AccountAccessKind::Balance);
        let obj = self.get_or_new_object(address);
        if amount.is_zero() {
            if obj.empty() {
                self.touch(address);
            }
            return;
        }
        let prev = obj.balance();
        obj.set_balance_raw(prev + amount);
        self.journal.append(JournalEntry::BalanceChange { address, prev });
    }

    pub fn sub_balance(&mut self, address: Address, amount: U256) {
        self.record_account_read(address, AccountAccessKind::Balance);
        let obj = self.get_or_new_object(address);
        if amount.is_zero() {
            return;
        }
        let prev = obj.balance();
        obj.set_balance_raw(prev - amount);
        self.journal.append(JournalEntry::BalanceChange { address, prev });
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        let obj = self.get_or_new_object(address);
        let prev = obj.balance();
        obj.set_balance_raw(balance);
        self.journal.append(JournalEntry::BalanceChange { address, prev });
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        let obj = self.get_or_new_object(address);
        let prev = obj.nonce();
        obj.set_nonce_raw(nonce);
        self.journal.append(JournalEntry::NonceChange { address, prev });
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) {
        if self.get_object(address).is_none() {
            self.create_object(address);
        }
        let ctx = read_ctx!(self);
        let obj = self.state_objects.get_mut(&address).expect("object ensured above");
        let prev_hash = obj.code_hash();
        let prev_code = obj.code(&ctx);
        let code_hash = keccak256(&code);
        obj.set_code_dirty(code_hash, code);
        self.journal.append(JournalEntry::CodeChange { address, prev_hash, prev_code });
    }

    pub fn set_state(&mut self, address: Address, slot: B256, value: B256) {
        if self.get_object(address).is_none() {
            self.create_object(address);
        }
        let ctx = read_ctx!(self);
        let obj = self.state_objects.get_mut(&address).expect("object ensured above");
        let committed = obj.get_committed_state(&ctx, slot);
        let prev_dirty = obj.dirty_storage().get(&slot).copied();
        if prev_dirty.unwrap_or(committed) == value {
            return;
        }
        self.journal.append(JournalEntry::StorageChange { address, slot, prev: prev_dirty });
        if value == committed {
            // The slot is back at its committed value; drop the dirty
            // marker instead of carrying a no-op write to finalise.
            obj.dirty_storage_mut().remove(&slot);
        } else {
            obj.dirty_storage_mut().insert(slot, value);
        }
    }

    /// Replace the entire storage of an account. Debug-only: the wipe is
    /// staged through a destruct marker so lookups skip the disk, and all
    /// mutations must be discarded afterwards.
    pub fn replace_storage(&mut self, address: Address, storage: HashMap<B256, B256>) {
        if !self.destruct_dirty.contains_key(&address) && !self.destruct.contains_key(&address) {
            self.destruct_dirty.insert(address, None);
        }
        self.get_or_new_object(address);
        for (slot, value) in storage {
            self.set_state(address, slot, value);
        }
    }

    /// Mark the account self-destructed and zero its balance. The object
    /// stays visible until finalise flips it to deleted.
    pub fn self_destruct(&mut self, address: Address) {
        let Some(obj) = self.get_object(address) else {
            return;
        };
        let prev = obj.self_destructed();
        let prev_balance = obj.balance();
        obj.mark_self_destructed();
        obj.set_balance_raw(U256::ZERO);
        self.journal.append(JournalEntry::SelfDestruct { address, prev, prev_balance });
    }

    /// EIP-6780: self-destruct only applies to accounts created within the
    /// same transaction.
    pub fn self_destruct_6780(&mut self, address: Address) {
        let Some(obj) = self.get_object(address) else {
            return;
        };
        if obj.created() {
            self.self_destruct(address);
        }
    }

    /// Explicitly create an account object. If one already exists its
    /// balance carries over: a contract may fund a create target before
    /// the create executes, and that ether must not vanish.
    pub fn create_account(&mut self, address: Address) {
        if let Some(balance) = self.create_object(address) {
            self.state_objects
                .get_mut(&address)
                .expect("object inserted by create_object")
                .set_balance_raw(balance);
        }
    }

    /// Allocate a fresh object for the address, journaling either a plain
    /// creation or, when overwriting a live account, a reset record that
    /// carries every buffered view being purged. Returns the overwritten
    /// account's balance when one was live.
    ///
    /// Overwriting stages the original account for destruction: the
    /// snapshot layer must observe the old incarnation's account and slots
    /// as deletions, and the new incarnation starts from blank.
    pub(crate) fn create_object(&mut self, address: Address) -> Option<U256> {
        // Deleted incarnations count: their destruction must be preserved.
        self.get_deleted_object(address);
        let prev = self.state_objects.remove(&address);

        let mut new_obj = StateObject::new(address, None);
        new_obj.set_created(true);

        let Some(prev) = prev else {
            self.journal.append(JournalEntry::CreateObject { address });
            self.state_objects.insert(address, new_obj);
            return None;
        };

        let addr_hash = prev.addr_hash();
        let prev_destruct =
            self.destruct_dirty.contains_key(&address) || self.destruct.contains_key(&address);
        if !prev_destruct {
            self.destruct_dirty.insert(address, prev.origin().copied());
        }
        let prev_account = self.accounts.remove(&addr_hash);
        let prev_storage = self.storages.remove(&addr_hash);
        let (prev_account_origin_exists, prev_account_origin) =
            match self.accounts_origin.remove(&address) {
                Some(origin) => (true, origin),
                None => (false, None),
            };
        let prev_storage_origin = self.storages_origin.remove(&address);

        let prev_balance = (!prev.deleted()).then(|| prev.balance());
        self.journal.append(JournalEntry::ResetObject {
            address,
            prev: Box::new(prev),
            prev_destruct,
            prev_account,
            prev_storage,
            prev_account_origin_exists,
            prev_account_origin,
            prev_storage_origin,
        });
        self.state_objects.insert(address, new_obj);
        prev_balance
    }

    fn touch(&mut self, address: Address) {
        self.journal.append(JournalEntry::Touch { address });
        if address == RIPEMD_ADDRESS {
            // Pin the touch in the dirty set so it outlives reverts.
            self.journal.dirty(address);
        }
    }

    // ── Transient storage ───────────────────────────────────────────

    pub fn set_transient_state(&mut self, address: Address, slot: B256, value: B256) {
        let prev = self.transient_storage.get(address, slot);
        if prev == value {
            return;
        }
        self.journal.append(JournalEntry::TransientStorageChange { address, slot, prev });
        self.transient_storage.set(address, slot, value);
    }

    pub fn get_transient_state(&self, address: Address, slot: B256) -> B256 {
        self.transient_storage.get(address, slot)
    }

    // ── Savepoints ──────────────────────────────────────────────────

    /// Take a savepoint, returning its revision id.
    pub fn snapshot(&mut self) -> usize {
        let id = self.next_revision_id;
        self.next_revision_id += 1;
        self.valid_revisions.push(Revision { id, journal_index: self.journal.len() });
        id
    }

    /// Undo every change made since the given revision. Panics on an
    /// unknown or already-reverted id; reverting to a savepoint twice is a
    /// bug in the caller.
    pub fn revert_to_snapshot(&mut self, id: usize) {
        let idx = self.valid_revisions.partition_point(|revision| revision.id < id);
        if idx == self.valid_revisions.len() || self.valid_revisions[idx].id != id {
            panic!("revision id {id} cannot be reverted");
        }
        let journal_index = self.valid_revisions[idx].journal_index;

        let mut journal = std::mem::take(&mut self.journal);
        journal.revert(self, journal_index);
        self.journal = journal;
        self.valid_revisions.truncate(idx);
    }

    // ── Transaction context ─────────────────────────────────────────

    /// Set the hash and index of the transaction about to execute; logs
    /// record against this context.
    pub fn set_tx_context(&mut self, tx_hash: B256, tx_index: usize) {
        self.tx_hash = tx_hash;
        self.tx_index = tx_index;
    }

    pub fn tx_index(&self) -> usize {
        self.tx_index
    }

    /// Prepare for the next transaction: rebuild the warm sets per the
    /// fork rules and discard transient storage.
    pub fn prepare(
        &mut self,
        rules: Rules,
        sender: Address,
        coinbase: Address,
        dst: Option<Address>,
        precompiles: &[Address],
        list: &[AccessListItem],
    ) {
        if rules.is_berlin {
            let mut access_list = AccessList::new();
            access_list.add_address(sender);
            if let Some(dst) = dst {
                access_list.add_address(dst);
                // For a create-tx the destination is warmed once the
                // target address is derived.
            }
            for &addr in precompiles {
                access_list.add_address(addr);
            }
            for item in list {
                access_list.add_address(item.address);
                for &key in &item.storage_keys {
                    access_list.add_slot(item.address, key);
                }
            }
            if rules.is_shanghai {
                // EIP-3651: warm coinbase
                access_list.add_address(coinbase);
            }
            self.access_list = access_list;
        }
        self.transient_storage = TransientStorage::new();
    }

    // ── Access list ─────────────────────────────────────────────────

    pub fn add_address_to_access_list(&mut self, address: Address) {
        if self.access_list.add_address(address) {
            self.journal.append(JournalEntry::AccessListAddAccount { address });
        }
    }

    pub fn add_slot_to_access_list(&mut self, address: Address, slot: B256) {
        let (address_was_cold, slot_was_cold) = self.access_list.add_slot(address, slot);
        if address_was_cold {
            // Entering an account's scope normally warms it first, but
            // journal the addition anyway in case a caller skipped that.
            self.journal.append(JournalEntry::AccessListAddAccount { address });
        }
        if slot_was_cold {
            self.journal.append(JournalEntry::AccessListAddSlot { address, slot });
        }
    }

    pub fn address_in_access_list(&self, address: Address) -> bool {
        self.access_list.contains_address(address)
    }

    /// `(address_present, slot_present)`.
    pub fn slot_in_access_list(&self, address: Address, slot: B256) -> (bool, bool) {
        self.access_list.contains(address, slot)
    }

    // ── Multi-version recorder plumbing ─────────────────────────────

    /// Attach a read/write recorder for parallel-execution scheduling.
    pub fn set_mv_states(&mut self, mv_states: Arc<dyn MvStates>) {
        self.mv_states = Some(mv_states);
    }

    pub fn mv_states(&self) -> Option<&Arc<dyn MvStates>> {
        self.mv_states.as_ref()
    }

    pub(crate) fn record_account_read(&self, address: Address, kind: AccountAccessKind) {
        if let Some(mv) = &self.mv_states {
            mv.record_account_read(address, kind);
        }
    }

    pub(crate) fn record_storage_read(&self, address: Address, slot: B256) {
        if let Some(mv) = &self.mv_states {
            mv.record_storage_read(address, slot);
        }
    }

    /// Begin recording the current transaction. Excluded (system)
    /// transactions are sealed immediately with an empty read/write set.
    pub fn start_tx_recorder(&mut self, is_exclude: bool) {
        let Some(mv) = &self.mv_states else {
            return;
        };
        if is_exclude {
            if let Err(err) = mv.finalise_with_rw_set(self.tx_index, true) {
                error!(tx_index = self.tx_index, err = %err, "failed to seal excluded transaction rw-set");
            }
            mv.record_read_done();
            mv.record_write_done();
            return;
        }
        mv.record_new_tx(self.tx_index);
    }

    pub fn stop_tx_recorder(&self) {
        let Some(mv) = &self.mv_states else {
            return;
        };
        mv.record_read_done();
        mv.record_write_done();
    }

    /// Flag the recorder when a fee receiver was itself written this
    /// transaction; gas-fee settlement cannot be deferred in that case.
    pub fn check_fee_receivers_rw_set(&self) {
        let Some(mv) = &self.mv_states else {
            return;
        };
        mv.record_read_done();
        let receivers = mv.fee_receivers();
        for addr in &receivers {
            if self.destruct_dirty.contains_key(addr) {
                mv.record_cannot_delay_gas_fee();
                return;
            }
        }
        for addr in &receivers {
            if self.journal.is_dirty(*addr) {
                mv.record_cannot_delay_gas_fee();
                return;
            }
        }
    }

    pub fn resolve_tx_dag(&self, tx_count: usize, extras: &[TxDep]) -> BackendResult<TxDag> {
        match &self.mv_states {
            Some(mv) => mv.resolve_tx_dag(tx_count, extras),
            None => Ok(TxDag::default()),
        }
    }

    // ── Buffer inspection ───────────────────────────────────────────

    /// The slim encoding buffered for a mutated account, as fed to the
    /// snapshot layer.
    pub fn buffered_account(&self, addr_hash: B256) -> Option<&Bytes> {
        self.accounts.get(&addr_hash)
    }

    /// The encoded value buffered for a mutated slot; empty bytes mark a
    /// deletion.
    pub fn buffered_storage(&self, addr_hash: B256, slot_hash: B256) -> Option<&Bytes> {
        self.storages.get(&addr_hash).and_then(|slots| slots.get(&slot_hash))
    }

    /// The pre-block value tracked for a mutated account. The outer
    /// `None` means the account is untracked; the inner `None` that it did
    /// not exist before the block.
    pub fn account_origin(&self, address: Address) -> Option<Option<&Bytes>> {
        self.accounts_origin.get(&address).map(|origin| origin.as_ref())
    }

    /// The pre-block value tracked for a mutated slot.
    pub fn storage_origin(&self, address: Address, slot_hash: B256) -> Option<&Bytes> {
        self.storages_origin.get(&address).and_then(|slots| slots.get(&slot_hash))
    }

    /// Whether the address carries a destruction marker, staged or final.
    pub fn has_destruct_marker(&self, address: Address) -> bool {
        self.destruct_dirty.contains_key(&address) || self.destruct.contains_key(&address)
    }

    // ── Copy ────────────────────────────────────────────────────────

    /// A deep, independent copy sharing only the database and the
    /// snapshot tree. The journal is not carried: copies are taken
    /// between transactions, and their savepoints start fresh.
    pub fn copy(&self) -> Self {
        let mut state = Self {
            db: Arc::clone(&self.db),
            // An inactive prefetcher copy can serve loaded nodes but will
            // not schedule more.
            prefetcher: self.prefetcher.as_ref().map(|prefetcher| prefetcher.copy()),
            trie: self.trie.fork(),
            no_trie: self.no_trie,
            snaps: self.snaps.clone(),
            snap: self.snap.clone(),
            original_root: self.original_root,
            expected_root: self.expected_root,
            state_root: self.state_root,
            full_processed: self.full_processed,
            accounts: self.accounts.clone(),
            storages: self.storages.clone(),
            accounts_origin: self.accounts_origin.clone(),
            storages_origin: self.storages_origin.clone(),
            state_objects: HashMap::with_capacity(self.journal.dirties_len()),
            pending: self.pending.clone(),
            dirty: self.dirty.clone(),
            destruct: self.destruct.clone(),
            destruct_dirty: self.destruct_dirty.clone(),
            db_err: OnceLock::new(),
            refund: self.refund,
            tx_hash: B256::ZERO,
            tx_index: 0,
            logs: self.logs.clone(),
            log_size: self.log_size,
            mv_states: None,
            preimages: self.preimages.clone(),
            access_list: self.access_list.clone(),
            transient_storage: self.transient_storage.clone(),
            journal: Journal::new(),
            valid_revisions: Vec::new(),
            next_revision_id: 0,
            storage_delete_limit: self.storage_delete_limit,
            account_updated: 0,
            account_deleted: 0,
            storage_updated: 0,
            storage_deleted: 0,
        };
        // Objects dirtied by the journal carry uncommitted work the copy
        // cannot replay (the journal stays behind), so they are marked
        // both pending and dirty to force full commits downstream. A
        // journal-dirty address with no object is the ripeMD quirk again.
        for addr in self.journal.dirty_addresses() {
            if let Some(obj) = self.state_objects.get(addr) {
                state.state_objects.insert(*addr, obj.deep_copy());
                state.pending.insert(*addr);
                state.dirty.insert(*addr);
            }
        }
        // Copies of copies have an empty journal; the pending and dirty
        // sets carry the remaining objects.
        for addr in self.pending.iter().chain(self.dirty.iter()) {
            if !state.state_objects.contains_key(addr) {
                if let Some(obj) = self.state_objects.get(addr) {
                    state.state_objects.insert(*addr, obj.deep_copy());
                }
            }
        }
        state
    }

    /// [`Self::copy`], additionally forking the attached recorder.
    pub fn copy_with_mv_states(&self) -> Self {
        let mut state = self.copy();
        if let Some(mv) = &self.mv_states {
            state.mv_states = Some(mv.fork());
        }
        state
    }
}
