use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use seel_core::{SeelError, SeelResult};
use zeroize::Zeroize;

use crate::store::SecureStore;

/// In-process secure store. Contents are lost when dropped.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SeelResult<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.records
            .lock()
            .map_err(|_| SeelError::local_store("memory store", "lock poisoned"))
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn put(&self, key: &str, record: &[u8]) -> SeelResult<()> {
        if let Some(mut old) = self.lock()?.insert(key.to_string(), record.to_vec()) {
            old.zeroize();
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> SeelResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> SeelResult<()> {
        if let Some(mut old) = self.lock()?.remove(key) {
            old.zeroize();
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Ok(records) = self.records.get_mut() {
            records.values_mut().for_each(|r| r.zeroize());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get("seel/key-pair").await.unwrap(), None);

        store.put("seel/key-pair", b"one").await.unwrap();
        store.put("seel/key-pair", b"two").await.unwrap();
        assert_eq!(store.get("seel/key-pair").await.unwrap(), Some(b"two".to_vec()));

        store.delete("seel/key-pair").await.unwrap();
        store.delete("seel/key-pair").await.unwrap();
        assert_eq!(store.get("seel/key-pair").await.unwrap(), None);
    }
}
