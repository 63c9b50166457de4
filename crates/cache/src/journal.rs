use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::object::StateObject;
use crate::state::StateCache;

/// A single reversible edit. Each variant carries enough prior state to
/// undo itself against the owning [`StateCache`]. Hot variants (storage and
/// balance) are grouped first.
#[derive(Debug)]
pub enum JournalEntry {
    /// A slot changed in an account's dirty storage.
    /// Revert: restore the previous value, removing the entry if the slot
    /// had not been dirtied before.
    StorageChange { address: Address, slot: B256, prev: Option<B256> },

    /// An account balance changed.
    /// Revert: restore the previous balance.
    BalanceChange { address: Address, prev: U256 },

    /// An account nonce changed.
    /// Revert: restore the previous nonce.
    NonceChange { address: Address, prev: u64 },

    /// Contract code was set.
    /// Revert: restore the previous code and code hash.
    CodeChange { address: Address, prev_hash: B256, prev_code: Bytes },

    /// A new account object materialized where none existed.
    /// Revert: drop the live object.
    CreateObject { address: Address },

    /// An existing account was overwritten by `create_object`. Carries the
    /// prior object and every buffered view purged at overwrite time.
    /// Revert: reinstate them all and withdraw the staged destruct marker
    /// if this overwrite introduced it.
    ResetObject {
        address: Address,
        prev: Box<StateObject>,
        prev_destruct: bool,
        prev_account: Option<Bytes>,
        prev_storage: Option<HashMap<B256, Bytes>>,
        prev_account_origin_exists: bool,
        prev_account_origin: Option<Bytes>,
        prev_storage_origin: Option<HashMap<B256, Bytes>>,
    },

    /// An account was marked self-destructed and its balance zeroed.
    /// Revert: restore the flag and the balance.
    SelfDestruct { address: Address, prev: bool, prev_balance: U256 },

    /// A transient slot changed.
    /// Revert: restore the previous value. No commit side effects.
    TransientStorageChange { address: Address, slot: B256, prev: B256 },

    /// The refund counter changed.
    /// Revert: restore the previous counter.
    RefundChange { prev: u64 },

    /// A log was recorded for the given transaction.
    /// Revert: pop that transaction's most recent log.
    AddLog { tx_hash: B256 },

    /// A hash preimage was recorded.
    /// Revert: drop it.
    AddPreimage { hash: B256 },

    /// An account was touched without any value change. Carries no undo
    /// action; exists so the touch marks the address dirty.
    Touch { address: Address },

    /// An address was warmed in the access list.
    /// Revert: forget it.
    AccessListAddAccount { address: Address },

    /// A slot was warmed in the access list. The implicit address warming
    /// is journaled separately, so revert only forgets the slot.
    AccessListAddSlot { address: Address, slot: B256 },
}

impl JournalEntry {
    /// The address this entry marks dirty, if any.
    fn dirtied(&self) -> Option<Address> {
        match self {
            JournalEntry::StorageChange { address, .. }
            | JournalEntry::BalanceChange { address, .. }
            | JournalEntry::NonceChange { address, .. }
            | JournalEntry::CodeChange { address, .. }
            | JournalEntry::CreateObject { address }
            | JournalEntry::ResetObject { address, .. }
            | JournalEntry::SelfDestruct { address, .. }
            | JournalEntry::Touch { address } => Some(*address),
            JournalEntry::TransientStorageChange { .. }
            | JournalEntry::RefundChange { .. }
            | JournalEntry::AddLog { .. }
            | JournalEntry::AddPreimage { .. }
            | JournalEntry::AccessListAddAccount { .. }
            | JournalEntry::AccessListAddSlot { .. } => None,
        }
    }

    fn undo(self, state: &mut StateCache) {
        match self {
            JournalEntry::StorageChange { address, slot, prev } => {
                if let Some(obj) = state.state_objects.get_mut(&address) {
                    match prev {
                        Some(value) => {
                            obj.dirty_storage_mut().insert(slot, value);
                        }
                        None => {
                            obj.dirty_storage_mut().remove(&slot);
                        }
                    }
                }
            }
            JournalEntry::BalanceChange { address, prev } => {
                if let Some(obj) = state.state_objects.get_mut(&address) {
                    obj.set_balance_raw(prev);
                }
            }
            JournalEntry::NonceChange { address, prev } => {
                if let Some(obj) = state.state_objects.get_mut(&address) {
                    obj.set_nonce_raw(prev);
                }
            }
            JournalEntry::CodeChange { address, prev_hash, prev_code } => {
                if let Some(obj) = state.state_objects.get_mut(&address) {
                    obj.set_code_raw(prev_hash, prev_code);
                }
            }
            JournalEntry::CreateObject { address } => {
                state.state_objects.remove(&address);
            }
            JournalEntry::ResetObject {
                address,
                prev,
                prev_destruct,
                prev_account,
                prev_storage,
                prev_account_origin_exists,
                prev_account_origin,
                prev_storage_origin,
            } => {
                let addr_hash = prev.addr_hash();
                state.state_objects.insert(address, *prev);
                if !prev_destruct {
                    state.destruct_dirty.remove(&address);
                }
                if let Some(account) = prev_account {
                    state.accounts.insert(addr_hash, account);
                }
                if let Some(storage) = prev_storage {
                    state.storages.insert(addr_hash, storage);
                }
                if prev_account_origin_exists {
                    state.accounts_origin.insert(address, prev_account_origin);
                }
                if let Some(origin) = prev_storage_origin {
                    state.storages_origin.insert(address, origin);
                }
            }
            JournalEntry::SelfDestruct { address, prev, prev_balance } => {
                if let Some(obj) = state.state_objects.get_mut(&address) {
                    obj.set_self_destructed(prev);
                    obj.set_balance_raw(prev_balance);
                }
            }
            JournalEntry::TransientStorageChange { address, slot, prev } => {
                state.transient_storage.set(address, slot, prev);
            }
            JournalEntry::RefundChange { prev } => {
                state.refund = prev;
            }
            JournalEntry::AddLog { tx_hash } => {
                if let Some(logs) = state.logs.get_mut(&tx_hash) {
                    logs.pop();
                    if logs.is_empty() {
                        state.logs.remove(&tx_hash);
                    }
                }
                state.log_size -= 1;
            }
            JournalEntry::AddPreimage { hash } => {
                state.preimages.remove(&hash);
            }
            JournalEntry::Touch { .. } => {}
            JournalEntry::AccessListAddAccount { address } => {
                state.access_list.remove_address(address);
            }
            JournalEntry::AccessListAddSlot { address, slot } => {
                state.access_list.remove_slot(address, slot);
            }
        }
    }
}

/// Ordered log of reversible edits made since the last finalise, plus the
/// multiset of addresses those edits touched.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    dirties: HashMap<Address, usize>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: JournalEntry) {
        if let Some(address) = entry.dirtied() {
            self.dirty(address);
        }
        self.entries.push(entry);
    }

    /// Explicitly mark an address dirty. Used for the historical quirk of
    /// the RIPEMD precompile, whose touch must survive journal reverts.
    pub fn dirty(&mut self, address: Address) {
        *self.dirties.entry(address).or_default() += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dirty_addresses(&self) -> impl Iterator<Item = &Address> {
        self.dirties.keys()
    }

    pub fn dirties_len(&self) -> usize {
        self.dirties.len()
    }

    pub fn is_dirty(&self, address: Address) -> bool {
        self.dirties.contains_key(&address)
    }

    /// Undo entries down to `snapshot_len`, newest first.
    pub(crate) fn revert(&mut self, state: &mut StateCache, snapshot_len: usize) {
        while self.entries.len() > snapshot_len {
            let entry = self.entries.pop().expect("journal length checked above");
            if let Some(address) = entry.dirtied() {
                if let Some(count) = self.dirties.get_mut(&address) {
                    *count -= 1;
                    if *count == 0 {
                        self.dirties.remove(&address);
                    }
                }
            }
            entry.undo(state);
        }
    }
}
