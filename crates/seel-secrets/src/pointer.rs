//! The manifest pointer: this device's view of the latest snapshot

use std::sync::Arc;

use seel_core::{ContentId, SeelError, SeelResult};
use tokio::sync::Mutex;

use crate::keys;
use crate::store::SecureStore;

/// Reads and advances the locally persisted manifest pointer.
///
/// All access goes through one async mutex, so `compare_and_swap` is atomic
/// with respect to every other pointer operation in this process.
pub struct PointerStore {
    store: Arc<dyn SecureStore>,
    lock: Mutex<()>,
}

impl PointerStore {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub async fn get(&self) -> SeelResult<Option<ContentId>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    pub async fn set(&self, cid: &ContentId) -> SeelResult<()> {
        let _guard = self.lock.lock().await;
        self.store
            .put(keys::MANIFEST_POINTER, cid.as_str().as_bytes())
            .await?;
        tracing::debug!(cid = %cid, "pointer set");
        Ok(())
    }

    /// Idempotent.
    pub async fn clear(&self) -> SeelResult<()> {
        let _guard = self.lock.lock().await;
        self.store.delete(keys::MANIFEST_POINTER).await
    }

    /// Advance the pointer to `new` only if it still holds `expected`.
    ///
    /// Returns `false`, leaving the pointer untouched, when it has moved.
    pub async fn compare_and_swap(&self, expected: &ContentId, new: &ContentId) -> SeelResult<bool> {
        let _guard = self.lock.lock().await;
        match self.read().await? {
            Some(current) if &current == expected => {
                self.store
                    .put(keys::MANIFEST_POINTER, new.as_str().as_bytes())
                    .await?;
                tracing::debug!(from = %expected, to = %new, "pointer advanced");
                Ok(true)
            }
            current => {
                tracing::debug!(
                    expected = %expected,
                    found = current.as_ref().map(ContentId::as_str).unwrap_or("<none>"),
                    "pointer moved"
                );
                Ok(false)
            }
        }
    }

    async fn read(&self) -> SeelResult<Option<ContentId>> {
        let Some(record) = self.store.get(keys::MANIFEST_POINTER).await? else {
            return Ok(None);
        };
        let text = String::from_utf8(record).map_err(|_| {
            SeelError::CorruptLocalState("manifest pointer is not valid UTF-8".into())
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SeelError::CorruptLocalState("manifest pointer is empty".into()));
        }
        Ok(Some(ContentId::new(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn pointer() -> PointerStore {
        PointerStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_set_get_clear() {
        let pointer = pointer();
        assert_eq!(pointer.get().await.unwrap(), None);

        pointer.set(&ContentId::new("b3-aaa")).await.unwrap();
        assert_eq!(pointer.get().await.unwrap(), Some(ContentId::new("b3-aaa")));

        pointer.clear().await.unwrap();
        pointer.clear().await.unwrap();
        assert_eq!(pointer.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let pointer = pointer();
        let a = ContentId::new("b3-aaa");
        let b = ContentId::new("b3-bbb");
        let c = ContentId::new("b3-ccc");
        pointer.set(&a).await.unwrap();

        assert!(pointer.compare_and_swap(&a, &b).await.unwrap());
        assert!(!pointer.compare_and_swap(&a, &c).await.unwrap());
        assert_eq!(pointer.get().await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_cas_on_missing_pointer_fails() {
        let pointer = pointer();
        let swapped = pointer
            .compare_and_swap(&ContentId::new("b3-aaa"), &ContentId::new("b3-bbb"))
            .await
            .unwrap();
        assert!(!swapped);
        assert_eq!(pointer.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_pointer_is_corrupt() {
        let store = Arc::new(MemoryStore::new());
        store.put(keys::MANIFEST_POINTER, b"  ").await.unwrap();
        let pointer = PointerStore::new(store);

        let err = pointer.get().await.unwrap_err();
        assert!(matches!(err, SeelError::CorruptLocalState(_)));
    }
}
