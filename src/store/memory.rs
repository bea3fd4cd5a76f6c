use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::KvStore;

#[derive(Default)]
struct MemoryInner {
    data: RwLock<HashMap<String, Value>>,
    unavailable: AtomicBool,
}

/// In-process store. Clones share the same map, the way tabs share one
/// extension storage area.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_available()?;
        let guard = self
            .inner
            .data
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check_available()?;
        let mut guard = self
            .inner
            .data
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        let mut guard = self
            .inner
            .data
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        guard.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn clones_share_data() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("k", json!(1)).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), Some(json!(1)));
        b.remove("k").await.unwrap();
        assert_eq!(a.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.get("k").await.is_err());
        assert!(store.set("k", json!(true)).await.is_err());
        store.set_unavailable(false);
        assert!(store.get("k").await.unwrap().is_none());
    }
}
