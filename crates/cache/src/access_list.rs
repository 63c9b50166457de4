use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, B256};

/// Per-transaction warm set of addresses and storage slots (EIP-2929).
///
/// Warming a slot implicitly warms its address. Deep copies are `Clone`.
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    addresses: HashSet<Address>,
    slots: HashMap<Address, HashSet<B256>>,
}

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_address(&self, address: Address) -> bool {
        self.addresses.contains(&address)
    }

    /// `(address_present, slot_present)`.
    pub fn contains(&self, address: Address, slot: B256) -> (bool, bool) {
        let address_present = self.addresses.contains(&address);
        let slot_present =
            self.slots.get(&address).map(|slots| slots.contains(&slot)).unwrap_or(false);
        (address_present, slot_present)
    }

    /// Warm an address, returning whether it was cold before.
    pub fn add_address(&mut self, address: Address) -> bool {
        self.addresses.insert(address)
    }

    /// Warm a slot, returning `(address_was_cold, slot_was_cold)`.
    pub fn add_slot(&mut self, address: Address, slot: B256) -> (bool, bool) {
        let address_was_cold = self.addresses.insert(address);
        let slot_was_cold = self.slots.entry(address).or_default().insert(slot);
        (address_was_cold, slot_was_cold)
    }

    /// Journal-revert helper: forget an address warmed by the last change.
    pub(crate) fn remove_address(&mut self, address: Address) {
        self.addresses.remove(&address);
        self.slots.remove(&address);
    }

    /// Journal-revert helper: forget a slot warmed by the last change.
    /// Slot additions are journaled after their implicit address addition,
    /// so the address entry is handled by its own journal record.
    pub(crate) fn remove_slot(&mut self, address: Address, slot: B256) {
        if let Some(slots) = self.slots.get_mut(&address) {
            slots.remove(&slot);
            if slots.is_empty() {
                self.slots.remove(&address);
            }
        }
    }
}
