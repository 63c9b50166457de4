use alloy_primitives::{Bytes, B256, U256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use alloy_trie::{EMPTY_ROOT_HASH, KECCAK_EMPTY};
use serde::{Deserialize, Serialize};

/// An account as committed to the world-state trie.
///
/// Encoded as the canonical four-field RLP list
/// `[nonce, balance, storage_root, code_hash]`. For accounts with no storage
/// the root is [`EMPTY_ROOT_HASH`]; for accounts without code the code hash
/// is [`KECCAK_EMPTY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize, Deserialize)]
pub struct StateAccount {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: B256,
    pub code_hash: B256,
}

impl Default for StateAccount {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: EMPTY_ROOT_HASH,
            code_hash: KECCAK_EMPTY,
        }
    }
}

impl StateAccount {
    /// Whether the account is empty per EIP-161: zero nonce, zero balance
    /// and no code. A zero code hash counts as "no code" since some callers
    /// leave the field unset for accounts that never held code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0
            && self.balance.is_zero()
            && (self.code_hash == KECCAK_EMPTY || self.code_hash == B256::ZERO)
    }

    /// Encode as the canonical four-field RLP list.
    pub fn to_rlp(&self) -> Vec<u8> {
        alloy_rlp::encode(self)
    }

    /// Decode from the canonical four-field RLP list.
    pub fn from_rlp(data: &[u8]) -> Result<Self, alloy_rlp::Error> {
        StateAccount::decode(&mut &*data)
    }
}

/// Slim account layout used on the snapshot wire: the sentinel storage root
/// and code hash are replaced by empty byte strings.
#[derive(RlpEncodable, RlpDecodable)]
struct Slim {
    nonce: u64,
    balance: U256,
    storage_root: Bytes,
    code_hash: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum SlimDecodeError {
    #[error("invalid slim account rlp: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("unexpected {field} length in slim account: expected 0 or 32, got {got}")]
    InvalidHashLength { field: &'static str, got: usize },
}

/// Encode an account in "slim RLP": empty byte strings stand in for the
/// empty storage root and the empty code hash.
pub fn encode_slim_account(account: &StateAccount) -> Vec<u8> {
    let storage_root = if account.storage_root == EMPTY_ROOT_HASH || account.storage_root.is_zero()
    {
        Bytes::new()
    } else {
        Bytes::copy_from_slice(account.storage_root.as_slice())
    };
    let code_hash = if account.code_hash == KECCAK_EMPTY || account.code_hash.is_zero() {
        Bytes::new()
    } else {
        Bytes::copy_from_slice(account.code_hash.as_slice())
    };
    alloy_rlp::encode(Slim {
        nonce: account.nonce,
        balance: account.balance,
        storage_root,
        code_hash,
    })
}

/// Decode a slim-RLP account, normalizing the empty byte strings back to the
/// sentinel hashes.
pub fn decode_slim_account(data: &[u8]) -> Result<StateAccount, SlimDecodeError> {
    let slim = Slim::decode(&mut &*data)?;
    let storage_root = match slim.storage_root.len() {
        0 => EMPTY_ROOT_HASH,
        32 => B256::from_slice(&slim.storage_root),
        got => return Err(SlimDecodeError::InvalidHashLength { field: "storage root", got }),
    };
    let code_hash = match slim.code_hash.len() {
        0 => KECCAK_EMPTY,
        32 => B256::from_slice(&slim.code_hash),
        got => return Err(SlimDecodeError::InvalidHashLength { field: "code hash", got }),
    };
    Ok(StateAccount {
        nonce: slim.nonce,
        balance: slim.balance,
        storage_root,
        code_hash,
    })
}

/// Strip leading zero bytes.
pub fn trim_left_zeroes(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Encode a storage slot value for the write buffers: the RLP of the
/// leading-zero-trimmed big-endian value, or empty bytes for zero (which
/// marks the slot as deleted).
pub fn encode_storage_value(value: U256) -> Bytes {
    if value.is_zero() {
        return Bytes::new();
    }
    alloy_rlp::encode(value).into()
}

/// Decode a storage slot value produced by [`encode_storage_value`]; empty
/// bytes decode to zero.
pub fn decode_storage_value(data: &[u8]) -> Result<U256, alloy_rlp::Error> {
    if data.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::decode(&mut &*data)
}
