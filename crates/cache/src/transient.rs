use std::collections::HashMap;

use alloy_primitives::{Address, B256};

/// Per-transaction transient storage (EIP-1153).
///
/// Setting a slot to zero is still a write; only the journal distinguishes
/// it from absence. The whole map is discarded when the next transaction is
/// prepared.
#[derive(Debug, Clone, Default)]
pub struct TransientStorage {
    storage: HashMap<Address, HashMap<B256, B256>>,
}

impl TransientStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: Address, slot: B256) -> B256 {
        self.storage
            .get(&address)
            .and_then(|slots| slots.get(&slot))
            .copied()
            .unwrap_or(B256::ZERO)
    }

    pub fn set(&mut self, address: Address, slot: B256, value: B256) {
        self.storage.entry(address).or_default().insert(slot, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reads_zero() {
        let storage = TransientStorage::new();
        assert_eq!(storage.get(Address::ZERO, B256::ZERO), B256::ZERO);
    }

    #[test]
    fn set_and_get() {
        let mut storage = TransientStorage::new();
        let addr = Address::repeat_byte(1);
        storage.set(addr, B256::repeat_byte(2), B256::repeat_byte(3));
        assert_eq!(storage.get(addr, B256::repeat_byte(2)), B256::repeat_byte(3));
        assert_eq!(storage.get(addr, B256::repeat_byte(4)), B256::ZERO);
    }

    #[test]
    fn zero_write_is_stored() {
        let mut storage = TransientStorage::new();
        let addr = Address::repeat_byte(1);
        storage.set(addr, B256::ZERO, B256::repeat_byte(9));
        storage.set(addr, B256::ZERO, B256::ZERO);
        assert_eq!(storage.get(addr, B256::ZERO), B256::ZERO);
    }
}
