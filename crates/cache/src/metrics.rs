use std::sync::LazyLock;

use prometheus::{IntCounter, Opts};

const NAMESPACE: &str = "block_state";

fn int_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))
        .expect("metric options must be valid");
    prometheus::register(Box::new(counter.clone())).expect("metric name must be unique");
    counter
}

pub(crate) static ACCOUNTS_UPDATED: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter("accounts_updated_total", "Accounts written to the account trie at commit")
});

pub(crate) static ACCOUNTS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter("accounts_deleted_total", "Accounts removed from the account trie at commit")
});

pub(crate) static STORAGE_SLOTS_UPDATED: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter("storage_slots_updated_total", "Storage slots written to storage tries")
});

pub(crate) static STORAGE_SLOTS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter("storage_slots_deleted_total", "Storage slots removed from storage tries")
});

pub(crate) static ACCOUNT_TRIE_NODES_UPDATED: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter("account_trie_nodes_updated_total", "Dirty account-trie nodes produced by commit")
});

pub(crate) static ACCOUNT_TRIE_NODES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter(
        "account_trie_nodes_deleted_total",
        "Account-trie node deletion markers produced by commit",
    )
});

pub(crate) static SLOT_DELETION_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    int_counter(
        "slot_deletion_skipped_total",
        "Storage wipes aborted because they exceeded the size budget",
    )
});
