//! In-memory backend implementing the [`backend`](crate::backend) traits,
//! with real Merkle roots. Intended for tests and examples: state persists
//! across commits inside one process, the snapshot tree flattens diffs
//! eagerly, and every trie-database update is recorded for inspection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_trie::{HashBuilder, Nibbles, EMPTY_ROOT_HASH};
use block_state_common::{
    decode_slim_account, decode_storage_value, encode_slim_account, trim_left_zeroes,
    StateAccount, KECCAK_EMPTY,
};
use parking_lot::Mutex;

use crate::backend::{
    code_db_key, BackendError, BackendResult, Database, KeyValueStore, MergedNodeSet, MvStates,
    NodeSet, OnStackNode, SlimAccount, Snapshot, SnapshotTree, StackTrie, Trie, TrieDb,
    TrieIterEntry, TrieNode, TrieScheme, TrieStateSet, TxDag, TxDep, WriteBatch,
};

type TrieContent = BTreeMap<B256, Vec<u8>>;

/// Root of a trie whose leaves are `content`, keyed by hashed key.
fn compute_root(content: &TrieContent) -> B256 {
    if content.is_empty() {
        return EMPTY_ROOT_HASH;
    }
    let mut builder = HashBuilder::default();
    for (key, value) in content {
        builder.add_leaf(Nibbles::unpack(key), value);
    }
    builder.root()
}

fn nibble_path(key: &[u8]) -> Vec<u8> {
    Nibbles::unpack(key).to_vec()
}

/// A trie-database update as observed by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedUpdate {
    pub root: B256,
    pub parent: B256,
    pub block: u64,
    pub node_owners: Vec<B256>,
    pub accounts_origin: HashMap<Address, Option<Bytes>>,
    pub storages_origin: HashMap<Address, HashMap<B256, Bytes>>,
    pub incomplete: HashSet<Address>,
}

/// A snapshot-tree update as observed by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedSnapshotUpdate {
    pub new_root: B256,
    pub parent_root: B256,
    pub destructs: HashSet<B256>,
    pub accounts: HashMap<B256, Bytes>,
    pub storages: HashMap<B256, HashMap<B256, Bytes>>,
}

#[derive(Default)]
struct MemStore {
    /// Committed trie content per root, shared by account and storage tries.
    tries: Mutex<HashMap<B256, TrieContent>>,
    /// Contract code seeded directly, keyed by code hash.
    code: Mutex<HashMap<B256, Bytes>>,
    /// The flat disk store; committed code lands here.
    kv: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    updates: Mutex<Vec<RecordedUpdate>>,
    read_fault: AtomicBool,
}

// ── Database ────────────────────────────────────────────────────────

/// In-memory [`Database`] whose tries persist across commits.
pub struct MemDatabase {
    store: Arc<MemStore>,
    trie_db: MemTrieDb,
    disk: MemKvStore,
}

impl MemDatabase {
    /// A database holding only the empty trie, path-addressed.
    pub fn empty() -> Self {
        Self::with_scheme(TrieScheme::Path)
    }

    pub fn with_scheme(scheme: TrieScheme) -> Self {
        let store = Arc::new(MemStore::default());
        store.tries.lock().insert(EMPTY_ROOT_HASH, TrieContent::new());
        Self {
            trie_db: MemTrieDb { store: Arc::clone(&store), scheme },
            disk: MemKvStore { store: Arc::clone(&store) },
            store,
        }
    }

    /// The root a fresh cache should open at.
    pub fn genesis_root(&self) -> B256 {
        EMPTY_ROOT_HASH
    }

    /// Make every trie account/storage read fail until cleared, for
    /// exercising the deferred-error path.
    pub fn set_read_fault(&self, on: bool) {
        self.store.read_fault.store(on, Ordering::SeqCst);
    }

    /// Seed contract code so lazy code loads can find it.
    pub fn put_code(&self, code: &[u8]) -> B256 {
        let hash = keccak256(code);
        self.store.code.lock().insert(hash, Bytes::copy_from_slice(code));
        hash
    }

    /// Code as persisted through the disk write batch at commit.
    pub fn committed_code(&self, code_hash: B256) -> Option<Vec<u8>> {
        self.store.kv.lock().get(code_db_key(code_hash).as_slice()).cloned()
    }

    /// Every trie-database update observed so far.
    pub fn recorded_updates(&self) -> Vec<RecordedUpdate> {
        self.store.updates.lock().clone()
    }

    /// The committed account record at `root`, if any.
    pub fn committed_account(&self, root: B256, address: Address) -> Option<StateAccount> {
        let tries = self.store.tries.lock();
        let content = tries.get(&root)?;
        let rlp = content.get(&keccak256(address))?;
        StateAccount::from_rlp(rlp).ok()
    }

    /// The committed value of a slot under the given storage root.
    pub fn committed_storage(&self, storage_root: B256, slot: B256) -> Option<U256> {
        let tries = self.store.tries.lock();
        let content = tries.get(&storage_root)?;
        let rlp = content.get(&keccak256(slot))?;
        decode_storage_value(rlp).ok()
    }

    fn open_content(&self, root: B256, owner: B256) -> BackendResult<Box<dyn Trie>> {
        let tries = self.store.tries.lock();
        let content = match tries.get(&root) {
            Some(content) => content.clone(),
            None if root.is_zero() || root == EMPTY_ROOT_HASH => TrieContent::new(),
            None => return Err(BackendError::new(format!("unknown trie root {root}"))),
        };
        Ok(Box::new(MemTrie {
            store: Arc::clone(&self.store),
            owner,
            original: content.clone(),
            content,
        }))
    }
}

impl Database for MemDatabase {
    fn open_trie(&self, root: B256) -> BackendResult<Box<dyn Trie>> {
        self.open_content(root, B256::ZERO)
    }

    fn open_storage_trie(
        &self,
        _state_root: B256,
        address: Address,
        root: B256,
        _account_trie: &dyn Trie,
    ) -> BackendResult<Box<dyn Trie>> {
        self.open_content(root, keccak256(address))
    }

    fn contract_code(&self, _address: Address, code_hash: B256) -> BackendResult<Bytes> {
        if let Some(code) = self.store.code.lock().get(&code_hash) {
            return Ok(code.clone());
        }
        if let Some(code) = self.store.kv.lock().get(code_db_key(code_hash).as_slice()) {
            return Ok(Bytes::from(code.clone()));
        }
        Err(BackendError::new(format!("code {code_hash} not found")))
    }

    fn trie_db(&self) -> &dyn TrieDb {
        &self.trie_db
    }

    fn disk_db(&self) -> &dyn KeyValueStore {
        &self.disk
    }

    fn new_stack_trie<'a>(&self, on_node: OnStackNode<'a>) -> Box<dyn StackTrie + 'a> {
        Box::new(MemStackTrie { on_node, leaves: BTreeMap::new() })
    }
}

// ── Trie ────────────────────────────────────────────────────────────

struct MemTrie {
    store: Arc<MemStore>,
    owner: B256,
    /// Content at open time, for the commit-time node diff.
    original: TrieContent,
    content: TrieContent,
}

impl MemTrie {
    fn check_fault(&self) -> BackendResult<()> {
        if self.store.read_fault.load(Ordering::SeqCst) {
            return Err(BackendError::new("injected read fault"));
        }
        Ok(())
    }
}

impl Trie for MemTrie {
    fn get_account(&self, address: Address) -> BackendResult<Option<StateAccount>> {
        self.check_fault()?;
        match self.content.get(&keccak256(address)) {
            Some(rlp) => {
                let account =
                    StateAccount::from_rlp(rlp).map_err(|e| BackendError::new(e.to_string()))?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    fn update_account(&mut self, address: Address, account: &StateAccount) -> BackendResult<()> {
        self.content.insert(keccak256(address), account.to_rlp());
        Ok(())
    }

    fn delete_account(&mut self, address: Address) -> BackendResult<()> {
        self.content.remove(&keccak256(address));
        Ok(())
    }

    fn get_storage(&self, _address: Address, slot: B256) -> BackendResult<Option<Vec<u8>>> {
        self.check_fault()?;
        match self.content.get(&keccak256(slot)) {
            Some(rlp) => {
                let value =
                    decode_storage_value(rlp).map_err(|e| BackendError::new(e.to_string()))?;
                let be = value.to_be_bytes::<32>();
                Ok(Some(trim_left_zeroes(&be).to_vec()))
            }
            None => Ok(None),
        }
    }

    fn update_storage(&mut self, _address: Address, slot: B256, value: &[u8]) -> BackendResult<()> {
        let encoded = alloy_rlp::encode(Bytes::copy_from_slice(value));
        self.content.insert(keccak256(slot), encoded);
        Ok(())
    }

    fn delete_storage(&mut self, _address: Address, slot: B256) -> BackendResult<()> {
        self.content.remove(&keccak256(slot));
        Ok(())
    }

    fn update_contract_code(
        &mut self,
        _address: Address,
        code_hash: B256,
        code: &[u8],
    ) -> BackendResult<()> {
        self.store.code.lock().insert(code_hash, Bytes::copy_from_slice(code));
        Ok(())
    }

    fn hash(&mut self) -> B256 {
        compute_root(&self.content)
    }

    fn commit(&mut self, _collect_leaf: bool) -> BackendResult<(B256, Option<NodeSet>)> {
        let root = compute_root(&self.content);
        let mut set = NodeSet::new(self.owner);
        for (key, value) in &self.content {
            if self.original.get(key) != Some(value) {
                set.add_node(
                    &nibble_path(key.as_slice()),
                    TrieNode { hash: keccak256(value), blob: Bytes::from(value.clone()) },
                );
            }
        }
        for key in self.original.keys() {
            if !self.content.contains_key(key) {
                set.add_node(&nibble_path(key.as_slice()), TrieNode::deleted());
            }
        }
        self.store.tries.lock().insert(root, self.content.clone());
        self.original = self.content.clone();
        Ok((root, if set.is_empty() { None } else { Some(set) }))
    }

    fn node_iterator(
        &self,
        seek: &[u8],
    ) -> BackendResult<Box<dyn Iterator<Item = BackendResult<TrieIterEntry>> + '_>> {
        self.check_fault()?;
        let mut entries = Vec::with_capacity(self.content.len() + 1);
        if !self.content.is_empty() {
            entries.push(TrieIterEntry::Node {
                path: Vec::new(),
                hash: compute_root(&self.content),
            });
        }
        let start = if seek.len() == 32 { B256::from_slice(seek) } else { B256::ZERO };
        for (key, value) in self.content.range(start..) {
            entries.push(TrieIterEntry::Leaf { key: *key, blob: value.clone() });
        }
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn fork(&self) -> Box<dyn Trie> {
        Box::new(MemTrie {
            store: Arc::clone(&self.store),
            owner: self.owner,
            original: self.original.clone(),
            content: self.content.clone(),
        })
    }
}

// ── Stack trie ──────────────────────────────────────────────────────

struct MemStackTrie<'a> {
    on_node: OnStackNode<'a>,
    leaves: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl StackTrie for MemStackTrie<'_> {
    fn update(&mut self, key: &[u8], value: &[u8]) -> BackendResult<()> {
        (self.on_node)(&nibble_path(key), keccak256(value), value);
        self.leaves.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn hash(&mut self) -> B256 {
        if self.leaves.is_empty() {
            return EMPTY_ROOT_HASH;
        }
        let mut builder = HashBuilder::default();
        for (key, value) in &self.leaves {
            builder.add_leaf(Nibbles::unpack(key), value);
        }
        builder.root()
    }
}

// ── Trie database and disk store ────────────────────────────────────

struct MemTrieDb {
    store: Arc<MemStore>,
    scheme: TrieScheme,
}

impl TrieDb for MemTrieDb {
    fn scheme(&self) -> TrieScheme {
        self.scheme
    }

    fn update(
        &self,
        root: B256,
        parent: B256,
        block: u64,
        nodes: MergedNodeSet,
        states: TrieStateSet,
    ) -> BackendResult<()> {
        self.store.updates.lock().push(RecordedUpdate {
            root,
            parent,
            block,
            node_owners: nodes.sets().keys().copied().collect(),
            accounts_origin: states.accounts_origin,
            storages_origin: states.storages_origin,
            incomplete: states.incomplete,
        });
        Ok(())
    }
}

struct MemKvStore {
    store: Arc<MemStore>,
}

impl KeyValueStore for MemKvStore {
    fn batch(&self) -> Box<dyn WriteBatch + '_> {
        Box::new(MemWriteBatch { store: &self.store, ops: Vec::new(), size: 0 })
    }
}

struct MemWriteBatch<'a> {
    store: &'a MemStore,
    ops: Vec<(Vec<u8>, Vec<u8>)>,
    size: usize,
}

impl WriteBatch for MemWriteBatch<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.size += value.len();
        self.ops.push((key.to_vec(), value.to_vec()));
    }

    fn value_size(&self) -> usize {
        self.size
    }

    fn write(&mut self) -> BackendResult<()> {
        let mut kv = self.store.kv.lock();
        for (key, value) in self.ops.drain(..) {
            kv.insert(key, value);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.ops.clear();
        self.size = 0;
    }
}

// ── Snapshot tree ───────────────────────────────────────────────────

/// In-memory snapshot layer: the flattened state at one root.
pub struct MemSnapshot {
    root: B256,
    accounts: HashMap<B256, Bytes>,
    storages: HashMap<B256, BTreeMap<B256, Bytes>>,
}

impl Snapshot for MemSnapshot {
    fn root(&self) -> B256 {
        self.root
    }

    fn account(&self, addr_hash: B256) -> BackendResult<Option<SlimAccount>> {
        let Some(slim) = self.accounts.get(&addr_hash) else {
            return Ok(None);
        };
        let account = decode_slim_account(slim).map_err(|e| BackendError::new(e.to_string()))?;
        Ok(Some(SlimAccount {
            nonce: account.nonce,
            balance: account.balance,
            storage_root: (account.storage_root != EMPTY_ROOT_HASH)
                .then_some(account.storage_root),
            code_hash: (account.code_hash != KECCAK_EMPTY).then_some(account.code_hash),
        }))
    }

    fn storage(&self, addr_hash: B256, slot_hash: B256) -> BackendResult<Option<Bytes>> {
        Ok(self.storages.get(&addr_hash).and_then(|slots| slots.get(&slot_hash)).cloned())
    }

    fn storage_iterator(
        &self,
        _state_root: B256,
        addr_hash: B256,
        seek: B256,
    ) -> BackendResult<Box<dyn Iterator<Item = BackendResult<(B256, Vec<u8>)>> + '_>> {
        let items: Vec<(B256, Vec<u8>)> = self
            .storages
            .get(&addr_hash)
            .map(|slots| slots.range(seek..).map(|(k, v)| (*k, v.to_vec())).collect())
            .unwrap_or_default();
        Ok(Box::new(items.into_iter().map(Ok)))
    }
}

/// In-memory [`SnapshotTree`] that flattens each update into a full layer
/// and records every call for inspection.
#[derive(Default)]
pub struct MemSnapshotTree {
    layers: Mutex<HashMap<B256, Arc<MemSnapshot>>>,
    updates: Mutex<Vec<RecordedSnapshotUpdate>>,
    caps: Mutex<Vec<(B256, usize)>>,
}

impl MemSnapshotTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a base layer from the committed state at `root`.
    pub fn from_database(db: &MemDatabase, root: B256) -> Self {
        let tries = db.store.tries.lock();
        let content = tries.get(&root).cloned().unwrap_or_default();
        let mut accounts = HashMap::new();
        let mut storages: HashMap<B256, BTreeMap<B256, Bytes>> = HashMap::new();
        for (addr_hash, rlp) in &content {
            let Ok(account) = StateAccount::from_rlp(rlp) else {
                continue;
            };
            accounts.insert(*addr_hash, Bytes::from(encode_slim_account(&account)));
            if account.storage_root != EMPTY_ROOT_HASH {
                if let Some(slots) = tries.get(&account.storage_root) {
                    storages.insert(
                        *addr_hash,
                        slots.iter().map(|(k, v)| (*k, Bytes::from(v.clone()))).collect(),
                    );
                }
            }
        }
        drop(tries);
        let tree = Self::new();
        tree.layers.lock().insert(root, Arc::new(MemSnapshot { root, accounts, storages }));
        tree
    }

    pub fn recorded_updates(&self) -> Vec<RecordedSnapshotUpdate> {
        self.updates.lock().clone()
    }

    pub fn recorded_caps(&self) -> Vec<(B256, usize)> {
        self.caps.lock().clone()
    }
}

impl SnapshotTree for MemSnapshotTree {
    fn snapshot(&self, root: B256) -> Option<Arc<dyn Snapshot>> {
        self.layers.lock().get(&root).cloned().map(|layer| layer as Arc<dyn Snapshot>)
    }

    fn update(
        &self,
        new_root: B256,
        parent_root: B256,
        destructs: HashSet<B256>,
        accounts: HashMap<B256, Bytes>,
        storages: HashMap<B256, HashMap<B256, Bytes>>,
    ) -> BackendResult<()> {
        self.updates.lock().push(RecordedSnapshotUpdate {
            new_root,
            parent_root,
            destructs: destructs.clone(),
            accounts: accounts.clone(),
            storages: storages.clone(),
        });

        let mut layers = self.layers.lock();
        let (mut flat_accounts, mut flat_storages) = match layers.get(&parent_root) {
            Some(parent) => (parent.accounts.clone(), parent.storages.clone()),
            None => (HashMap::new(), HashMap::new()),
        };
        // Destructions apply before the overlay: a resurrected account's
        // fresh slots survive the wipe of its previous incarnation.
        for addr_hash in &destructs {
            flat_accounts.remove(addr_hash);
            flat_storages.remove(addr_hash);
        }
        for (addr_hash, slim) in accounts {
            flat_accounts.insert(addr_hash, slim);
        }
        for (addr_hash, slots) in storages {
            let entry = flat_storages.entry(addr_hash).or_default();
            for (slot_hash, value) in slots {
                if value.is_empty() {
                    entry.remove(&slot_hash);
                } else {
                    entry.insert(slot_hash, value);
                }
            }
        }
        layers.insert(
            new_root,
            Arc::new(MemSnapshot {
                root: new_root,
                accounts: flat_accounts,
                storages: flat_storages,
            }),
        );
        Ok(())
    }

    fn cap(&self, root: B256, layers: usize) -> BackendResult<()> {
        self.caps.lock().push((root, layers));
        Ok(())
    }
}

// ── Multi-version recorder ──────────────────────────────────────────

/// Shared counters behind [`CountingMvStates`].
#[derive(Default)]
pub struct MvCounters {
    pub account_reads: AtomicUsize,
    pub storage_reads: AtomicUsize,
    pub account_writes: AtomicUsize,
    pub storage_writes: AtomicUsize,
    pub new_txs: AtomicUsize,
    pub cannot_delay: AtomicUsize,
}

/// [`MvStates`] observer that only counts; forks share the counters.
#[derive(Default)]
pub struct CountingMvStates {
    counters: Arc<MvCounters>,
}

impl CountingMvStates {
    pub fn counters(&self) -> Arc<MvCounters> {
        Arc::clone(&self.counters)
    }
}

impl MvStates for CountingMvStates {
    fn record_account_read(&self, _address: Address, _kind: crate::backend::AccountAccessKind) {
        self.counters.account_reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_storage_read(&self, _address: Address, _slot: B256) {
        self.counters.storage_reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_account_write(&self, _address: Address, _kind: crate::backend::AccountAccessKind) {
        self.counters.account_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_storage_write(&self, _address: Address, _slot: B256) {
        self.counters.storage_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_new_tx(&self, _index: usize) {
        self.counters.new_txs.fetch_add(1, Ordering::Relaxed);
    }

    fn record_read_done(&self) {}

    fn record_write_done(&self) {}

    fn finalise_with_rw_set(&self, _tx_index: usize, _excluded: bool) -> BackendResult<()> {
        Ok(())
    }

    fn record_cannot_delay_gas_fee(&self) {
        self.counters.cannot_delay.fetch_add(1, Ordering::Relaxed);
    }

    fn fee_receivers(&self) -> Vec<Address> {
        Vec::new()
    }

    fn resolve_tx_dag(&self, _tx_count: usize, _extras: &[TxDep]) -> BackendResult<TxDag> {
        Ok(TxDag::default())
    }

    fn fork(&self) -> Arc<dyn MvStates> {
        Arc::new(CountingMvStates { counters: Arc::clone(&self.counters) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_hashes_to_empty_root() {
        assert_eq!(compute_root(&TrieContent::new()), EMPTY_ROOT_HASH);
    }

    #[test]
    fn trie_round_trips_accounts() {
        let db = MemDatabase::empty();
        let mut trie = db.open_trie(db.genesis_root()).unwrap();
        let addr = Address::repeat_byte(1);
        let account = StateAccount { nonce: 3, balance: U256::from(7u64), ..Default::default() };
        trie.update_account(addr, &account).unwrap();
        assert_eq!(trie.get_account(addr).unwrap(), Some(account));

        let (root, set) = trie.commit(true).unwrap();
        assert_ne!(root, EMPTY_ROOT_HASH);
        assert_eq!(set.unwrap().len(), 1);

        let reopened = db.open_trie(root).unwrap();
        assert_eq!(reopened.get_account(addr).unwrap(), Some(account));
    }

    #[test]
    fn stack_trie_matches_storage_trie_root() {
        let db = MemDatabase::empty();
        let addr = Address::repeat_byte(1);
        let account_trie = db.open_trie(db.genesis_root()).unwrap();
        let mut storage_trie = db
            .open_storage_trie(db.genesis_root(), addr, EMPTY_ROOT_HASH, account_trie.as_ref())
            .unwrap();
        let mut values: Vec<(B256, Vec<u8>)> = Vec::new();
        for i in 1u8..=5 {
            let slot = B256::repeat_byte(i);
            storage_trie.update_storage(addr, slot, &[i]).unwrap();
            values.push((keccak256(slot), alloy_rlp::encode(Bytes::from(vec![i]))));
        }
        let (root, _) = storage_trie.commit(false).unwrap();

        values.sort_by_key(|(hash, _)| *hash);
        let mut stack = db.new_stack_trie(Box::new(|_, _, _| {}));
        for (hash, value) in &values {
            stack.update(hash.as_slice(), value).unwrap();
        }
        assert_eq!(stack.hash(), root);
    }

    #[test]
    fn snapshot_tree_flattens_updates() {
        let tree = MemSnapshotTree::new();
        let root_a = B256::repeat_byte(0xa);
        let root_b = B256::repeat_byte(0xb);
        let addr_hash = keccak256(Address::repeat_byte(1));
        let account = StateAccount { nonce: 1, ..Default::default() };

        tree.update(
            root_a,
            B256::ZERO,
            HashSet::new(),
            HashMap::from([(addr_hash, Bytes::from(encode_slim_account(&account)))]),
            HashMap::new(),
        )
        .unwrap();
        // Destruct the account in the next layer.
        tree.update(root_b, root_a, HashSet::from([addr_hash]), HashMap::new(), HashMap::new())
            .unwrap();

        let snap_a = tree.snapshot(root_a).unwrap();
        assert!(snap_a.account(addr_hash).unwrap().is_some());
        let snap_b = tree.snapshot(root_b).unwrap();
        assert!(snap_b.account(addr_hash).unwrap().is_none());
    }

    #[test]
    fn write_batch_applies_on_write_only() {
        let db = MemDatabase::empty();
        let code_hash = keccak256(b"runtime");
        {
            let mut batch = db.disk_db().batch();
            batch.put(&code_db_key(code_hash), b"runtime");
            assert_eq!(batch.value_size(), 7);
            assert!(db.committed_code(code_hash).is_none());
            batch.write().unwrap();
        }
        assert_eq!(db.committed_code(code_hash).unwrap(), b"runtime".to_vec());
    }
}
