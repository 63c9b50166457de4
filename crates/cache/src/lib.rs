//! Caching layer atop a Merkle-Patricia world state.
//!
//! [`StateCache`] buffers every account and storage mutation produced while
//! a block's transactions execute, supports nested savepoints with
//! journal-based revert, finalizes per-transaction state, and commits the
//! aggregated changes to the backing trie database in a single batched,
//! partially concurrent pass.
//!
//! The backing trie, snapshot tree, trie database and disk store are
//! external collaborators reached through the capability traits in
//! [`backend`]; an in-memory implementation suitable for tests lives in
//! [`testutil`].

mod access_list;
pub mod backend;
mod commit;
mod journal;
mod metrics;
mod object;
mod state;
pub mod testutil;
mod transient;

pub use access_list::AccessList;
pub use journal::{Journal, JournalEntry};
pub use object::StateObject;
pub use state::{AccessListItem, Revision, Rules, StateCache};
pub use transient::TransientStorage;

use alloy_primitives::{Address, B256};
use backend::BackendError;

/// Highest permissible memory allocation employed for wiping a single
/// account's storage within one block.
pub const STORAGE_DELETE_LIMIT: usize = 512 * 1024 * 1024;

/// Preferred size of a disk write batch; the code writer flushes whenever a
/// batch grows past this.
pub const IDEAL_BATCH_SIZE: usize = 100 * 1024;

/// Number of diff layers kept in the snapshot tree after a commit.
pub const SNAPSHOT_DIFF_LAYERS: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backing-store read failed earlier in the block. Read errors are
    /// memoized when they occur and surfaced only at commit time.
    #[error("commit aborted due to earlier error: {0}")]
    EarlierError(String),

    #[error("backing store read failed for {context}: {source}")]
    BackingRead { context: String, source: BackendError },

    #[error("trie mutation failed for {context}: {source}")]
    TrieMutation { context: String, source: BackendError },

    #[error("invalid merkle root (remote: {expected}, local: {computed})")]
    RootMismatch { expected: B256, computed: B256 },

    #[error("storage iteration failed for {address}: {source}")]
    StorageIterator { address: Address, source: BackendError },

    #[error("failed to delete storage of {address}: {source}")]
    StorageWipe { address: Address, source: BackendError },

    #[error("snapshot of {address} does not match storage root (expected {expected}, got {got})")]
    WipeRootMismatch { address: Address, expected: B256, got: B256 },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;
