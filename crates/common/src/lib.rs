mod account;
mod log;

pub use account::{
    decode_slim_account, decode_storage_value, encode_slim_account, encode_storage_value,
    trim_left_zeroes, SlimDecodeError, StateAccount,
};
pub use log::Log;

// Re-export the primitives used throughout the project
pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use alloy_trie::{EMPTY_ROOT_HASH, KECCAK_EMPTY};
