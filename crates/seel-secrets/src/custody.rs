//! Key custody: the account key pair on this device
//!
//! Both halves are written as a single record so a reader can never observe
//! one half without the other. On retrieval the public half is re-derived
//! from the private half and compared with what was stored.

use std::sync::Arc;

use seel_core::{SeelError, SeelResult};
use seel_crypto::{KeyPair, PrivateKeyRepr, PublicKeyRepr};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::keys;
use crate::store::SecureStore;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredKeyPair {
    private_key: PrivateKeyRepr,
    public_key: PublicKeyRepr,
}

pub struct KeyCustody {
    store: Arc<dyn SecureStore>,
}

impl KeyCustody {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    /// Fresh key pair. Not persisted until `persist`.
    pub fn generate(&self) -> SeelResult<KeyPair> {
        KeyPair::generate()
    }

    /// Store `pair`, replacing any previous pair.
    pub async fn persist(&self, pair: &KeyPair) -> SeelResult<()> {
        let stored = StoredKeyPair {
            private_key: pair.export_private(),
            public_key: pair.export_public(),
        };
        let mut record = serde_json::to_vec(&stored)
            .map_err(|e| SeelError::local_store("encoding key pair", e))?;
        let result = self.store.put(keys::KEY_PAIR, &record).await;
        record.zeroize();
        result?;

        tracing::info!(user_id = %pair.user_id(), "persisted key pair");
        Ok(())
    }

    /// The persisted key pair, if any.
    pub async fn retrieve(&self) -> SeelResult<Option<KeyPair>> {
        let Some(mut record) = self.store.get(keys::KEY_PAIR).await? else {
            return Ok(None);
        };
        let parsed = serde_json::from_slice::<StoredKeyPair>(&record);
        record.zeroize();

        let stored = parsed.map_err(|e| {
            SeelError::CorruptLocalState(format!("key pair record is unreadable: {e}"))
        })?;
        let pair = KeyPair::from_private(&stored.private_key).map_err(|e| {
            SeelError::CorruptLocalState(format!("stored private key is invalid: {e}"))
        })?;
        if pair.export_public() != stored.public_key {
            return Err(SeelError::CorruptLocalState(
                "stored public key does not match the private key".into(),
            ));
        }
        Ok(Some(pair))
    }

    /// Remove the persisted pair. Idempotent.
    pub async fn clear(&self) -> SeelResult<()> {
        self.store.delete(keys::KEY_PAIR).await?;
        tracing::debug!("cleared key pair");
        Ok(())
    }

    pub fn export_public(pair: &KeyPair) -> PublicKeyRepr {
        pair.export_public()
    }

    pub fn export_private(pair: &KeyPair) -> PrivateKeyRepr {
        pair.export_private()
    }

    /// Rebuild a pair from an exported private key, re-deriving the public half.
    pub fn import_private(repr: &PrivateKeyRepr) -> SeelResult<KeyPair> {
        KeyPair::from_private(repr)
            .map_err(|e| SeelError::InvalidSyncPayload(format!("private key: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn custody() -> (KeyCustody, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (KeyCustody::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_persist_retrieve() {
        let (custody, _) = custody();
        assert!(custody.retrieve().await.unwrap().is_none());

        let pair = custody.generate().unwrap();
        custody.persist(&pair).await.unwrap();

        let loaded = custody.retrieve().await.unwrap().unwrap();
        assert_eq!(loaded.export_public(), pair.export_public());
    }

    #[tokio::test]
    async fn test_persist_overwrites() {
        let (custody, _) = custody();
        let first = custody.generate().unwrap();
        let second = custody.generate().unwrap();
        custody.persist(&first).await.unwrap();
        custody.persist(&second).await.unwrap();

        let loaded = custody.retrieve().await.unwrap().unwrap();
        assert_eq!(loaded.user_id(), second.user_id());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (custody, _) = custody();
        custody.persist(&custody.generate().unwrap()).await.unwrap();

        custody.clear().await.unwrap();
        custody.clear().await.unwrap();
        assert!(custody.retrieve().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mismatched_halves_are_corrupt() {
        let (custody, store) = custody();
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();

        let stored = StoredKeyPair {
            private_key: a.export_private(),
            public_key: b.export_public(),
        };
        store
            .put(keys::KEY_PAIR, &serde_json::to_vec(&stored).unwrap())
            .await
            .unwrap();

        let err = custody.retrieve().await.unwrap_err();
        assert!(matches!(err, SeelError::CorruptLocalState(_)));
    }

    #[tokio::test]
    async fn test_garbage_record_is_corrupt() {
        let (custody, store) = custody();
        store.put(keys::KEY_PAIR, b"{\"half\":").await.unwrap();

        let err = custody.retrieve().await.unwrap_err();
        assert!(matches!(err, SeelError::CorruptLocalState(_)));
    }

    #[test]
    fn test_import_rejects_bad_private_key() {
        let repr: PrivateKeyRepr =
            serde_json::from_str(r#"{"kty":"age-x25519","key":"nope"}"#).unwrap();
        let err = KeyCustody::import_private(&repr).unwrap_err();
        assert!(matches!(err, SeelError::InvalidSyncPayload(_)));
    }
}
