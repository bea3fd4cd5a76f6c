//! The shared key-value store every tab reads and writes.
//!
//! The store is asynchronous and only eventually consistent across tabs.
//! Callers in this crate treat any error from it as "no data" and carry on.

pub mod keys;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use keys::BlockFlag;
pub use memory::MemoryStore;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Reads a domain's block flag. A failing store reads as `Absent`.
pub async fn read_block_flag(store: &dyn KvStore, domain: &str) -> BlockFlag {
    match store.get(&keys::blocked(domain)).await {
        Ok(raw) => BlockFlag::from_stored(raw.as_ref()),
        Err(err) => {
            log::warn!("failed to read block flag for {domain}: {err:#}");
            BlockFlag::Absent
        }
    }
}

/// Writes a domain's block flag, returning whether the write landed.
pub async fn write_block_flag(store: &dyn KvStore, domain: &str, blocked: bool) -> bool {
    match store.set(&keys::blocked(domain), Value::Bool(blocked)).await {
        Ok(()) => true,
        Err(err) => {
            log::warn!("failed to write block flag for {domain}: {err:#}");
            false
        }
    }
}
