//! Capability traits for the external collaborators of the state cache:
//! the account/storage tries, the snapshot tree, the trie database, the
//! disk key-value store, the trie prefetcher and the optional multi-version
//! read/write recorder.
//!
//! The cache is written against these traits only; implementations decide
//! persistence format, node layout and caching policy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use block_state_common::{StateAccount, EMPTY_ROOT_HASH, KECCAK_EMPTY};

/// Error raised by a backend implementation. Carried as an opaque message;
/// the cache never branches on backend error contents.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

// ── Trie node change sets ───────────────────────────────────────────

/// A single dirty trie node. An empty blob marks the node as deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieNode {
    pub hash: B256,
    pub blob: Bytes,
}

impl TrieNode {
    /// A deletion marker.
    pub fn deleted() -> Self {
        Self { hash: B256::ZERO, blob: Bytes::new() }
    }

    pub fn is_deleted(&self) -> bool {
        self.blob.is_empty()
    }
}

/// Dirty nodes produced by committing a single trie, keyed by node path.
/// `owner` is the hashed account address for storage tries and zero for the
/// account trie.
#[derive(Debug, Clone)]
pub struct NodeSet {
    pub owner: B256,
    nodes: HashMap<Vec<u8>, TrieNode>,
    updates: usize,
    deletes: usize,
}

impl NodeSet {
    pub fn new(owner: B256) -> Self {
        Self { owner, nodes: HashMap::new(), updates: 0, deletes: 0 }
    }

    pub fn add_node(&mut self, path: &[u8], node: TrieNode) {
        if node.is_deleted() {
            self.deletes += 1;
        } else {
            self.updates += 1;
        }
        self.nodes.insert(path.to_vec(), node);
    }

    pub fn nodes(&self) -> &HashMap<Vec<u8>, TrieNode> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(updates, deletes)` recorded so far.
    pub fn size(&self) -> (usize, usize) {
        (self.updates, self.deletes)
    }

    fn merge(&mut self, other: NodeSet) {
        for (path, node) in other.nodes {
            if let Some(prev) = self.nodes.insert(path, node.clone()) {
                // Replacing an existing entry: correct the counters.
                if prev.is_deleted() {
                    self.deletes -= 1;
                } else {
                    self.updates -= 1;
                }
            }
            if node.is_deleted() {
                self.deletes += 1;
            } else {
                self.updates += 1;
            }
        }
    }
}

/// Node sets from many tries merged by owner. An account destructed and
/// resurrected within one block contributes two sets under the same owner.
#[derive(Debug, Default)]
pub struct MergedNodeSet {
    sets: HashMap<B256, NodeSet>,
}

impl MergedNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, set: NodeSet) {
        match self.sets.get_mut(&set.owner) {
            Some(existing) => existing.merge(set),
            None => {
                self.sets.insert(set.owner, set);
            }
        }
    }

    pub fn sets(&self) -> &HashMap<B256, NodeSet> {
        &self.sets
    }
}

/// Original state values accompanying a trie database update, so the diff
/// can later be reverted. Accounts map to their pre-block slim encoding
/// (`None` for previously non-existent); storage slots map to their
/// pre-block encoded value (empty bytes for previously absent). Addresses
/// in `incomplete` had their storage wipe aborted by the size budget.
#[derive(Debug, Default)]
pub struct TrieStateSet {
    pub accounts_origin: HashMap<Address, Option<Bytes>>,
    pub storages_origin: HashMap<Address, HashMap<B256, Bytes>>,
    pub incomplete: HashSet<Address>,
}

// ── Tries ───────────────────────────────────────────────────────────

/// One step of a depth-first trie walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrieIterEntry {
    /// An internal node at the given path. Nodes embedded in their parent
    /// report a zero hash.
    Node { path: Vec<u8>, hash: B256 },
    /// A leaf, with its full key and value blob.
    Leaf { key: B256, blob: Vec<u8> },
}

/// A Merkle-Patricia trie holding either accounts or one account's storage.
///
/// Storage values flow through the trie pre-trimmed: `update_storage` takes
/// the leading-zero-stripped big-endian value and `get_storage` returns it
/// in the same form.
pub trait Trie: Send + Sync {
    fn get_account(&self, address: Address) -> BackendResult<Option<StateAccount>>;
    fn update_account(&mut self, address: Address, account: &StateAccount) -> BackendResult<()>;
    fn delete_account(&mut self, address: Address) -> BackendResult<()>;

    fn get_storage(&self, address: Address, slot: B256) -> BackendResult<Option<Vec<u8>>>;
    fn update_storage(&mut self, address: Address, slot: B256, value: &[u8]) -> BackendResult<()>;
    fn delete_storage(&mut self, address: Address, slot: B256) -> BackendResult<()>;

    fn update_contract_code(
        &mut self,
        address: Address,
        code_hash: B256,
        code: &[u8],
    ) -> BackendResult<()>;

    /// Root hash over the current content.
    fn hash(&mut self) -> B256;

    /// Commit the trie, returning the new root and the dirty node set.
    /// The handle must not be mutated afterwards.
    fn commit(&mut self, collect_leaf: bool) -> BackendResult<(B256, Option<NodeSet>)>;

    /// Depth-first walk over nodes and leaves, starting at `seek`.
    fn node_iterator(
        &self,
        seek: &[u8],
    ) -> BackendResult<Box<dyn Iterator<Item = BackendResult<TrieIterEntry>> + '_>>;

    /// An independent handle over the same content.
    fn fork(&self) -> Box<dyn Trie>;

    /// Whether this handle is a placeholder that cannot hash or persist
    /// (trie-less fast processing). Such a cache reports the externally
    /// supplied expected root instead of computing one.
    fn is_stub(&self) -> bool {
        false
    }
}

/// Callback invoked by a stack trie as finished subtries are hashed:
/// `(path, node_hash, node_blob)`.
pub type OnStackNode<'a> = Box<dyn FnMut(&[u8], B256, &[u8]) + 'a>;

/// A write-once trie fed with keys in ascending order, used to re-derive
/// the shape (and thus the node paths) of a storage trie that is being
/// deleted wholesale.
pub trait StackTrie {
    fn update(&mut self, key: &[u8], value: &[u8]) -> BackendResult<()>;
    fn hash(&mut self) -> B256;
}

// ── Snapshots ───────────────────────────────────────────────────────

/// An account as served by the snapshot layer: sentinel hashes are elided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlimAccount {
    pub nonce: u64,
    pub balance: U256,
    /// `None` encodes the empty storage root.
    pub storage_root: Option<B256>,
    /// `None` encodes the empty code hash.
    pub code_hash: Option<B256>,
}

impl SlimAccount {
    /// Normalize into a full account record.
    pub fn into_account(self) -> StateAccount {
        StateAccount {
            nonce: self.nonce,
            balance: self.balance,
            storage_root: self.storage_root.unwrap_or(EMPTY_ROOT_HASH),
            code_hash: self.code_hash.unwrap_or(KECCAK_EMPTY),
        }
    }
}

/// Read access to the flattened state at one root.
pub trait Snapshot: Send + Sync {
    /// The state root this snapshot represents.
    fn root(&self) -> B256;

    /// Look up an account by hashed address.
    fn account(&self, addr_hash: B256) -> BackendResult<Option<SlimAccount>>;

    /// Look up a storage slot by hashed address and hashed slot key. The
    /// value is returned in its buffered encoding (RLP of the trimmed
    /// big-endian value); `None` or empty bytes mean an empty slot.
    fn storage(&self, addr_hash: B256, slot_hash: B256) -> BackendResult<Option<Bytes>>;

    /// Iterate an account's slots as `(slot_hash, trimmed_value)` pairs in
    /// ascending slot-hash order, starting at `seek`.
    fn storage_iterator(
        &self,
        state_root: B256,
        addr_hash: B256,
        seek: B256,
    ) -> BackendResult<Box<dyn Iterator<Item = BackendResult<(B256, Vec<u8>)>> + '_>>;
}

/// The tree of snapshot diff layers.
pub trait SnapshotTree: Send + Sync {
    /// The snapshot at the given root, if one is available.
    fn snapshot(&self, root: B256) -> Option<Arc<dyn Snapshot>>;

    /// Stack a new diff layer on `parent_root` carrying the block's
    /// destructed accounts (by hashed address), mutated accounts (slim
    /// encoding) and mutated slots (trimmed encoding, empty ⇒ deleted).
    fn update(
        &self,
        new_root: B256,
        parent_root: B256,
        destructs: HashSet<B256>,
        accounts: HashMap<B256, Bytes>,
        storages: HashMap<B256, HashMap<B256, Bytes>>,
    ) -> BackendResult<()>;

    /// Flatten diff layers so at most `layers` remain above disk.
    fn cap(&self, root: B256, layers: usize) -> BackendResult<()>;
}

// ── Trie database and disk store ────────────────────────────────────

/// Addressing scheme of the trie node database. Storage deletion is only
/// supported under path addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrieScheme {
    Hash,
    Path,
}

/// The database holding committed trie nodes.
pub trait TrieDb: Send + Sync {
    fn scheme(&self) -> TrieScheme;

    /// Persist one block's trie diff: all dirty nodes plus the original
    /// state values needed to reverse the transition.
    fn update(
        &self,
        root: B256,
        parent: B256,
        block: u64,
        nodes: MergedNodeSet,
        states: TrieStateSet,
    ) -> BackendResult<()>;
}

/// A buffered write into the disk key-value store. Writes accumulate in
/// memory until `write` flushes them atomically.
pub trait WriteBatch {
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Bytes buffered so far.
    fn value_size(&self) -> usize;

    fn write(&mut self) -> BackendResult<()>;

    fn reset(&mut self);
}

/// The disk key-value store beneath the trie database.
pub trait KeyValueStore: Send + Sync {
    fn batch(&self) -> Box<dyn WriteBatch + '_>;
}

/// Disk key under which contract code is stored.
pub fn code_db_key(code_hash: B256) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = b'c';
    key[1..].copy_from_slice(code_hash.as_slice());
    key
}

// ── Database ────────────────────────────────────────────────────────

/// Access to tries, contract code and the underlying stores.
pub trait Database: Send + Sync {
    /// Open the account trie at the given state root.
    fn open_trie(&self, root: B256) -> BackendResult<Box<dyn Trie>>;

    /// Open an account's storage trie. The account trie handle is supplied
    /// so implementations can resolve path-addressed nodes through it.
    fn open_storage_trie(
        &self,
        state_root: B256,
        address: Address,
        root: B256,
        account_trie: &dyn Trie,
    ) -> BackendResult<Box<dyn Trie>>;

    /// An independent handle over the same trie content.
    fn copy_trie(&self, trie: &dyn Trie) -> Box<dyn Trie> {
        trie.fork()
    }

    fn contract_code(&self, address: Address, code_hash: B256) -> BackendResult<Bytes>;

    fn contract_code_size(&self, address: Address, code_hash: B256) -> BackendResult<usize> {
        Ok(self.contract_code(address, code_hash)?.len())
    }

    fn trie_db(&self) -> &dyn TrieDb;

    fn disk_db(&self) -> &dyn KeyValueStore;

    /// A fresh stack trie reporting finished nodes through `on_node`.
    fn new_stack_trie<'a>(&self, on_node: OnStackNode<'a>) -> Box<dyn StackTrie + 'a>;
}

// ── Prefetcher ──────────────────────────────────────────────────────

/// Background loader that warms trie nodes the commit phase will read.
/// `owner` is zero for the account trie and the hashed account address for
/// storage tries.
pub trait Prefetcher: Send + Sync {
    /// Schedule `keys` under the given trie for background loading.
    fn prefetch(&self, owner: B256, root: B256, address: Address, keys: Vec<Vec<u8>>);

    /// Report which scheduled keys were actually used, for accounting.
    fn used(&self, owner: B256, root: B256, keys: Vec<Vec<u8>>);

    /// A pre-warmed trie with the given root, if loading completed.
    fn trie(&self, owner: B256, root: B256) -> Option<Box<dyn Trie>>;

    /// An inactive clone that can serve already-loaded data but schedules
    /// nothing new.
    fn copy(&self) -> Box<dyn Prefetcher>;

    /// Terminate background loading and release resources.
    fn close(&self);
}

// ── Multi-version state recorder ────────────────────────────────────

/// The account facet touched by a read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountAccessKind {
    Balance,
    Nonce,
    CodeHash,
    Suicide,
}

/// A transaction's position and the transactions it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxDep {
    pub index: u32,
    pub depends_on: Vec<u32>,
}

/// Dependency graph over a block's transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxDag {
    pub deps: Vec<TxDep>,
}

/// Observer recording per-transaction read/write sets for parallel
/// execution scheduling. Purely passive: implementations must never affect
/// state semantics.
pub trait MvStates: Send + Sync {
    fn record_account_read(&self, address: Address, kind: AccountAccessKind);
    fn record_storage_read(&self, address: Address, slot: B256);
    fn record_account_write(&self, address: Address, kind: AccountAccessKind);
    fn record_storage_write(&self, address: Address, slot: B256);

    fn record_new_tx(&self, index: usize);
    fn record_read_done(&self);
    fn record_write_done(&self);

    /// Seal the read/write set of the given transaction; `excluded` marks
    /// system transactions that never contend.
    fn finalise_with_rw_set(&self, tx_index: usize, excluded: bool) -> BackendResult<()>;

    /// Note that gas-fee settlement cannot be deferred for this block.
    fn record_cannot_delay_gas_fee(&self);

    /// Addresses receiving transaction fees, exempt from write recording.
    fn fee_receivers(&self) -> Vec<Address>;

    fn resolve_tx_dag(&self, tx_count: usize, extras: &[TxDep]) -> BackendResult<TxDag>;

    /// An independent recorder carrying the observations so far.
    fn fork(&self) -> Arc<dyn MvStates>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    #[test]
    fn node_set_counts_updates_and_deletes() {
        let mut set = NodeSet::new(B256::ZERO);
        set.add_node(&[0x01], TrieNode { hash: keccak256(b"n"), blob: Bytes::from(vec![1]) });
        set.add_node(&[0x02], TrieNode::deleted());
        assert_eq!(set.size(), (1, 1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn merged_set_folds_same_owner() {
        let owner = keccak256(b"owner");
        let mut first = NodeSet::new(owner);
        first.add_node(&[0x01], TrieNode::deleted());

        let mut second = NodeSet::new(owner);
        second.add_node(&[0x01], TrieNode { hash: keccak256(b"n"), blob: Bytes::from(vec![1]) });
        second.add_node(&[0x02], TrieNode::deleted());

        let mut merged = MergedNodeSet::new();
        merged.merge(first);
        merged.merge(second);

        let set = &merged.sets()[&owner];
        assert_eq!(set.len(), 2);
        // The later write for path [0x01] replaced the deletion marker.
        assert_eq!(set.size(), (1, 1));
        assert!(!set.nodes()[&vec![0x01]].is_deleted());
    }

    #[test]
    fn slim_account_normalizes() {
        let slim = SlimAccount {
            nonce: 1,
            balance: U256::from(5u64),
            storage_root: None,
            code_hash: None,
        };
        let account = slim.into_account();
        assert_eq!(account.storage_root, EMPTY_ROOT_HASH);
        assert_eq!(account.code_hash, KECCAK_EMPTY);
    }

    #[test]
    fn code_key_is_prefixed() {
        let hash = keccak256(b"code");
        let key = code_db_key(hash);
        assert_eq!(key[0], b'c');
        assert_eq!(&key[1..], hash.as_slice());
    }
}
