use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// A log record emitted during contract execution.
///
/// The emitting contract fills `address`, `topics` and `data`; the state
/// cache annotates the transaction context when the log is recorded and the
/// block context when logs are retrieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,

    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub tx_index: u64,
    /// Position of the log within the block.
    pub index: u64,
}
