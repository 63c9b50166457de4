use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use block_state_common::{
    encode_slim_account, encode_storage_value, decode_storage_value, trim_left_zeroes,
    StateAccount, KECCAK_EMPTY,
};

use crate::backend::{Database, NodeSet, Snapshot, Trie};
use crate::Error;

/// Borrowed view of the cache pieces a state object needs while serving a
/// read: the backing stores, the memoized-error slot and the block's
/// destruction markers. Assembled per call so objects never hold a back
/// pointer into the cache.
pub(crate) struct ReadContext<'a> {
    pub db: &'a dyn Database,
    pub account_trie: &'a dyn Trie,
    pub snap: Option<&'a dyn Snapshot>,
    pub original_root: B256,
    pub db_err: &'a OnceLock<Error>,
    pub destruct: &'a HashMap<Address, Option<StateAccount>>,
    pub destruct_dirty: &'a HashMap<Address, Option<StateAccount>>,
}

impl ReadContext<'_> {
    /// Whether the address carries a destruction marker, staged or final.
    pub(crate) fn destructed(&self, address: &Address) -> bool {
        self.destruct_dirty.contains_key(address) || self.destruct.contains_key(address)
    }

    /// Memoize a backing-store failure; only the first error sticks.
    pub(crate) fn set_error(&self, err: Error) {
        let _ = self.db_err.set(err);
    }
}

/// Buffered output of one object's [`StateObject::update_root`], merged into
/// the cache's block-scope maps by the caller once the parallel phase has
/// joined.
pub(crate) struct StorageFlush {
    pub address: Address,
    pub addr_hash: B256,
    /// Storage root before this flush, for prefetcher accounting.
    pub prev_root: B256,
    pub slim_account: Vec<u8>,
    /// Mutated slots by hashed key; empty bytes mark deletion.
    pub storage: HashMap<B256, Bytes>,
    /// Pre-block value of each mutated slot; inserted into the cache map
    /// only where no earlier flush recorded one.
    pub storage_origin: HashMap<B256, Bytes>,
    pub used_slots: Vec<Vec<u8>>,
    pub updated: usize,
    pub deleted: usize,
}

/// In-memory shadow of one account: the value read from the backing store,
/// the current value, lazily loaded code and the three storage maps slots
/// move through on their way to the trie.
pub struct StateObject {
    address: Address,
    addr_hash: B256,

    /// Account value as loaded from the backing store; `None` for objects
    /// created in this block.
    origin: Option<StateAccount>,
    data: StateAccount,

    /// Storage trie handle, opened on first use.
    trie: Option<Box<dyn Trie>>,
    code: Option<Bytes>,

    /// Slot values as read from the backing store this block.
    origin_storage: HashMap<B256, B256>,
    /// Slots finalized across transactions but not yet flushed to the trie.
    pending_storage: HashMap<B256, B256>,
    /// Slots written in the current transaction.
    dirty_storage: HashMap<B256, B256>,

    dirty_code: bool,
    self_destructed: bool,
    /// Set by finalise when the object is slated for removal.
    deleted: bool,
    /// Set when the object was created in the current transaction.
    created: bool,
}

impl fmt::Debug for StateObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateObject")
            .field("address", &self.address)
            .field("origin", &self.origin)
            .field("data", &self.data)
            .field("dirty_code", &self.dirty_code)
            .field("self_destructed", &self.self_destructed)
            .field("deleted", &self.deleted)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl StateObject {
    pub(crate) fn new(address: Address, account: Option<StateAccount>) -> Self {
        Self {
            address,
            addr_hash: keccak256(address),
            origin: account,
            data: account.unwrap_or_default(),
            trie: None,
            code: None,
            origin_storage: HashMap::new(),
            pending_storage: HashMap::new(),
            dirty_storage: HashMap::new(),
            dirty_code: false,
            self_destructed: false,
            deleted: false,
            created: false,
        }
    }

    // ── Plain accessors ─────────────────────────────────────────────

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn addr_hash(&self) -> B256 {
        self.addr_hash
    }

    pub fn account(&self) -> &StateAccount {
        &self.data
    }

    pub fn origin(&self) -> Option<&StateAccount> {
        self.origin.as_ref()
    }

    pub fn balance(&self) -> U256 {
        self.data.balance
    }

    pub fn nonce(&self) -> u64 {
        self.data.nonce
    }

    pub fn code_hash(&self) -> B256 {
        self.data.code_hash
    }

    pub fn storage_root(&self) -> B256 {
        self.data.storage_root
    }

    pub fn empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn self_destructed(&self) -> bool {
        self.self_destructed
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn created(&self) -> bool {
        self.created
    }

    pub fn dirty_code(&self) -> bool {
        self.dirty_code
    }

    // ── Raw mutators (no journaling; used by setters and revert) ────

    pub(crate) fn set_balance_raw(&mut self, balance: U256) {
        self.data.balance = balance;
    }

    pub(crate) fn set_nonce_raw(&mut self, nonce: u64) {
        self.data.nonce = nonce;
    }

    pub(crate) fn set_code_raw(&mut self, code_hash: B256, code: Bytes) {
        self.code = Some(code);
        self.data.code_hash = code_hash;
    }

    pub(crate) fn set_code_dirty(&mut self, code_hash: B256, code: Bytes) {
        self.set_code_raw(code_hash, code);
        self.dirty_code = true;
    }

    pub(crate) fn mark_self_destructed(&mut self) {
        self.self_destructed = true;
    }

    pub(crate) fn set_self_destructed(&mut self, flag: bool) {
        self.self_destructed = flag;
    }

    pub(crate) fn set_deleted(&mut self, flag: bool) {
        self.deleted = flag;
    }

    pub(crate) fn set_created(&mut self, flag: bool) {
        self.created = flag;
    }

    pub(crate) fn dirty_storage(&self) -> &HashMap<B256, B256> {
        &self.dirty_storage
    }

    pub(crate) fn dirty_storage_mut(&mut self) -> &mut HashMap<B256, B256> {
        &mut self.dirty_storage
    }

    /// Code and hash when marked dirty, leaving the flag intact. Empty
    /// code means "no code" and is never written out.
    pub(crate) fn code_if_dirty(&self) -> Option<(B256, Bytes)> {
        if self.dirty_code {
            if let Some(code) = &self.code {
                if !code.is_empty() {
                    return Some((self.data.code_hash, code.clone()));
                }
            }
        }
        None
    }

    /// Code and hash when marked dirty, clearing the flag. Used by the
    /// commit-time code writer.
    pub(crate) fn take_dirty_code(&mut self) -> Option<(B256, Bytes)> {
        let entry = self.code_if_dirty();
        if entry.is_some() {
            self.dirty_code = false;
        }
        entry
    }

    // ── Reads through the backing store ─────────────────────────────

    /// Contract code, loaded lazily from the code store and memoized.
    pub(crate) fn code(&mut self, ctx: &ReadContext<'_>) -> Bytes {
        if let Some(code) = &self.code {
            return code.clone();
        }
        if self.data.code_hash == KECCAK_EMPTY {
            return Bytes::new();
        }
        match ctx.db.contract_code(self.address, self.data.code_hash) {
            Ok(code) => {
                self.code = Some(code.clone());
                code
            }
            Err(source) => {
                ctx.set_error(Error::BackingRead {
                    context: format!("code {} of {}", self.data.code_hash, self.address),
                    source,
                });
                Bytes::new()
            }
        }
    }

    pub(crate) fn code_size(&mut self, ctx: &ReadContext<'_>) -> usize {
        if let Some(code) = &self.code {
            return code.len();
        }
        if self.data.code_hash == KECCAK_EMPTY {
            return 0;
        }
        match ctx.db.contract_code_size(self.address, self.data.code_hash) {
            Ok(size) => size,
            Err(source) => {
                ctx.set_error(Error::BackingRead {
                    context: format!("code size {} of {}", self.data.code_hash, self.address),
                    source,
                });
                0
            }
        }
    }

    /// Value of a slot within the current transaction: the dirty write if
    /// one exists, the committed value otherwise.
    pub(crate) fn get_state(&mut self, ctx: &ReadContext<'_>, slot: B256) -> B256 {
        if let Some(value) = self.dirty_storage.get(&slot) {
            return *value;
        }
        self.get_committed_state(ctx, slot)
    }

    /// Value of a slot as of the last finalised transaction: pending
    /// writes, then memoized backing values, then the snapshot or the
    /// storage trie. An object created this block, or one whose address
    /// was destructed this block, reads zero without touching disk since
    /// its previous storage is conceptually already wiped.
    pub(crate) fn get_committed_state(&mut self, ctx: &ReadContext<'_>, slot: B256) -> B256 {
        if let Some(value) = self.pending_storage.get(&slot) {
            return *value;
        }
        if let Some(value) = self.origin_storage.get(&slot) {
            return *value;
        }
        if self.origin.is_none() || ctx.destructed(&self.address) {
            return B256::ZERO;
        }
        let mut value = B256::ZERO;
        let mut served_by_snapshot = false;
        if let Some(snap) = ctx.snap {
            match snap.storage(self.addr_hash, keccak256(slot)) {
                Ok(enc) => {
                    served_by_snapshot = true;
                    let enc = enc.unwrap_or_default();
                    if !enc.is_empty() {
                        match decode_storage_value(&enc) {
                            Ok(decoded) => value = decoded.into(),
                            Err(err) => ctx.set_error(Error::BackingRead {
                                context: format!("slot {slot} of {}", self.address),
                                source: crate::backend::BackendError::new(err.to_string()),
                            }),
                        }
                    }
                }
                Err(source) => ctx.set_error(Error::BackingRead {
                    context: format!("snapshot slot {slot} of {}", self.address),
                    source,
                }),
            }
        }
        if !served_by_snapshot {
            if !self.ensure_trie(ctx) {
                return B256::ZERO;
            }
            let trie = self.trie.as_ref().expect("storage trie opened above");
            match trie.get_storage(self.address, slot) {
                Ok(raw) => {
                    if let Some(raw) = raw {
                        match value_from_trimmed(&raw) {
                            Some(decoded) => value = decoded,
                            None => {
                                ctx.set_error(Error::BackingRead {
                                    context: format!(
                                        "oversized slot value for {slot} of {}",
                                        self.address
                                    ),
                                    source: crate::backend::BackendError::new(format!(
                                        "{} bytes",
                                        raw.len()
                                    )),
                                });
                                return B256::ZERO;
                            }
                        }
                    }
                }
                Err(source) => {
                    ctx.set_error(Error::BackingRead {
                        context: format!("slot {slot} of {}", self.address),
                        source,
                    });
                    return B256::ZERO;
                }
            }
        }
        self.origin_storage.insert(slot, value);
        value
    }

    fn ensure_trie(&mut self, ctx: &ReadContext<'_>) -> bool {
        if self.trie.is_some() {
            return true;
        }
        match ctx.db.open_storage_trie(
            ctx.original_root,
            self.address,
            self.data.storage_root,
            ctx.account_trie,
        ) {
            Ok(trie) => {
                self.trie = Some(trie);
                true
            }
            Err(source) => {
                ctx.set_error(Error::BackingRead {
                    context: format!("storage trie of {}", self.address),
                    source,
                });
                false
            }
        }
    }

    // ── Finalise / flush / commit ───────────────────────────────────

    /// Fold the current transaction's writes into the pending set,
    /// returning the slots whose value actually moved (candidates for
    /// trie-node prefetching).
    pub(crate) fn finalise(&mut self) -> Vec<B256> {
        let mut moved = Vec::with_capacity(self.dirty_storage.len());
        for (slot, value) in self.dirty_storage.drain() {
            self.pending_storage.insert(slot, value);
            if value != self.origin_storage.get(&slot).copied().unwrap_or_default() {
                moved.push(slot);
            }
        }
        moved
    }

    /// Flush pending storage into the storage trie and recompute the
    /// account's storage root. Mutated slots and their original values are
    /// returned in the flush buffer rather than written into the shared
    /// cache maps, so many objects can flush concurrently. Trie failures
    /// are memoized and leave the root untouched.
    pub(crate) fn update_root(&mut self, ctx: &ReadContext<'_>) -> StorageFlush {
        let mut flush = StorageFlush {
            address: self.address,
            addr_hash: self.addr_hash,
            prev_root: self.data.storage_root,
            slim_account: Vec::new(),
            storage: HashMap::new(),
            storage_origin: HashMap::new(),
            used_slots: Vec::new(),
            updated: 0,
            deleted: 0,
        };
        if self.update_trie(ctx, &mut flush) {
            if let Some(trie) = self.trie.as_mut() {
                self.data.storage_root = trie.hash();
            }
        }
        flush.slim_account = encode_slim_account(&self.data);
        flush
    }

    fn update_trie(&mut self, ctx: &ReadContext<'_>, flush: &mut StorageFlush) -> bool {
        if self.pending_storage.is_empty() {
            return true;
        }
        if !self.ensure_trie(ctx) {
            return false;
        }
        let entries: Vec<(B256, B256)> =
            self.pending_storage.iter().map(|(slot, value)| (*slot, *value)).collect();
        for (slot, value) in entries {
            let prev = self.origin_storage.get(&slot).copied().unwrap_or_default();
            if value == prev {
                continue;
            }
            self.origin_storage.insert(slot, value);

            let trie = self.trie.as_mut().expect("storage trie opened above");
            let encoded;
            if value.is_zero() {
                if let Err(source) = trie.delete_storage(self.address, slot) {
                    ctx.set_error(Error::TrieMutation {
                        context: format!("delete slot {slot} of {}", self.address),
                        source,
                    });
                    return false;
                }
                encoded = Bytes::new();
                flush.deleted += 1;
            } else {
                let trimmed = trim_left_zeroes(value.as_slice());
                if let Err(source) = trie.update_storage(self.address, slot, trimmed) {
                    ctx.set_error(Error::TrieMutation {
                        context: format!("update slot {slot} of {}", self.address),
                        source,
                    });
                    return false;
                }
                encoded = encode_storage_value(value.into());
                flush.updated += 1;
            }
            let slot_hash = keccak256(slot);
            flush.storage.insert(slot_hash, encoded);
            flush.storage_origin.entry(slot_hash).or_insert_with(|| {
                if prev.is_zero() {
                    Bytes::new()
                } else {
                    encode_storage_value(prev.into())
                }
            });
            flush.used_slots.push(slot.as_slice().to_vec());
        }
        self.pending_storage.clear();
        true
    }

    /// Commit the storage trie, fold the committed value into `origin` and
    /// return the dirty node set. Must run after [`Self::update_root`].
    pub(crate) fn commit(&mut self) -> crate::Result<Option<NodeSet>> {
        let Some(mut trie) = self.trie.take() else {
            self.origin = Some(self.data);
            return Ok(None);
        };
        let (root, nodes) = trie.commit(false).map_err(|source| Error::TrieMutation {
            context: format!("commit storage trie of {}", self.address),
            source,
        })?;
        self.data.storage_root = root;
        self.origin = Some(self.data);
        Ok(nodes)
    }

    /// An independent copy with all storage views and code duplicated. The
    /// journal is not part of the object and is deliberately not carried.
    pub(crate) fn deep_copy(&self) -> Self {
        Self {
            address: self.address,
            addr_hash: self.addr_hash,
            origin: self.origin,
            data: self.data,
            trie: self.trie.as_ref().map(|trie| trie.fork()),
            code: self.code.clone(),
            origin_storage: self.origin_storage.clone(),
            pending_storage: self.pending_storage.clone(),
            dirty_storage: self.dirty_storage.clone(),
            dirty_code: self.dirty_code,
            self_destructed: self.self_destructed,
            deleted: self.deleted,
            created: self.created,
        }
    }
}

/// Left-pad a trimmed big-endian value back to a full word. `None` if the
/// backend handed back more than 32 bytes.
fn value_from_trimmed(raw: &[u8]) -> Option<B256> {
    if raw.len() > 32 {
        return None;
    }
    let mut buf = [0u8; 32];
    buf[32 - raw.len()..].copy_from_slice(raw);
    Some(B256::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_object_defaults() {
        let addr = Address::repeat_byte(1);
        let obj = StateObject::new(addr, None);
        assert_eq!(obj.addr_hash(), keccak256(addr));
        assert!(obj.origin().is_none());
        assert!(obj.empty());
        assert!(!obj.created());
    }

    #[test]
    fn finalise_reports_moved_slots() {
        let mut obj = StateObject::new(Address::repeat_byte(1), None);
        let slot_a = B256::repeat_byte(0xa);
        let slot_b = B256::repeat_byte(0xb);
        obj.origin_storage.insert(slot_b, B256::repeat_byte(2));
        obj.dirty_storage.insert(slot_a, B256::repeat_byte(1));
        obj.dirty_storage.insert(slot_b, B256::repeat_byte(2));

        let moved = obj.finalise();
        // Only the slot whose value differs from the backing value moved.
        assert_eq!(moved, vec![slot_a]);
        assert!(obj.dirty_storage.is_empty());
        assert_eq!(obj.pending_storage.len(), 2);
    }

    #[test]
    fn trimmed_value_round_trip() {
        assert_eq!(value_from_trimmed(&[]), Some(B256::ZERO));
        assert_eq!(value_from_trimmed(&[0x11]), Some(B256::with_last_byte(0x11)));
        assert_eq!(value_from_trimmed(&[0u8; 33]), None);
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut obj = StateObject::new(Address::repeat_byte(1), None);
        obj.dirty_storage.insert(B256::repeat_byte(1), B256::repeat_byte(2));
        let copy = obj.deep_copy();
        obj.dirty_storage.insert(B256::repeat_byte(3), B256::repeat_byte(4));
        assert_eq!(copy.dirty_storage.len(), 1);
    }
}
