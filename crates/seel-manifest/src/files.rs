//! Encrypted file API for consumers (notes, gallery)
//!
//! Each write encrypts under a fresh content key, stores the ciphertext
//! blob, wraps the key to the account's public key and records the entry
//! through the Manifest Store.

use std::sync::Arc;

use seel_core::{now_millis, SeelError, SeelResult};
use seel_crypto::EnvelopeEngine;
use seel_storage::BlobBackend;
use tracing::{debug, info};

use crate::manifest::ManifestFileEntry;
use crate::session::Session;
use crate::store::ManifestStore;

pub struct FileVault {
    session: Arc<Session>,
    store: Arc<ManifestStore>,
    backend: Arc<dyn BlobBackend>,
    engine: Arc<dyn EnvelopeEngine>,
}

impl FileVault {
    pub fn new(
        session: Arc<Session>,
        store: Arc<ManifestStore>,
        backend: Arc<dyn BlobBackend>,
        engine: Arc<dyn EnvelopeEngine>,
    ) -> Self {
        Self {
            session,
            store,
            backend,
            engine,
        }
    }

    /// Encrypt and store `bytes` at `path`.
    ///
    /// Overwriting keeps the original `ctime`; `mtime` is always now.
    pub async fn write_file(
        &self,
        path: &str,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> SeelResult<ManifestFileEntry> {
        let pair = self.session.require_pair().await?;

        let key = self.engine.generate_content_key()?;
        let sealed = self.engine.encrypt(bytes, &key)?;
        let wrapped_key = self.engine.wrap_key(&key, &pair.public_key())?;
        let cid = self.backend.put(sealed.ciphertext, None).await?;
        debug!(path, cid = %cid.short(), "stored ciphertext");

        let now = now_millis();
        let fresh = ManifestFileEntry {
            cid,
            iv: sealed.iv,
            wrapped_key,
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: Some(bytes.len() as u64),
            ctime: now,
            mtime: now,
        };

        let entry = self
            .store
            .update(&pair, |manifest| {
                let mut entry = fresh.clone();
                if let Some(existing) = manifest.files.get(path) {
                    entry.ctime = existing.ctime;
                }
                manifest.files.insert(path.to_string(), entry.clone());
                entry
            })
            .await?;

        info!(path, size = bytes.len(), "file written");
        Ok(entry)
    }

    /// Decrypted content at `path`, or `None` if the manifest has no such entry.
    pub async fn read_file(&self, path: &str) -> SeelResult<Option<Vec<u8>>> {
        let Some(entry) = self.store.get(path).await? else {
            return Ok(None);
        };
        let pair = self.session.require_pair().await?;

        let ciphertext = self.backend.get(&entry.cid).await.map_err(|e| match e {
            SeelError::IntegrityMismatch { .. } => SeelError::DecryptionFailed,
            other => other,
        })?;
        let key = self.engine.unwrap_key(&entry.wrapped_key, &pair)?;
        let plaintext = self.engine.decrypt(&ciphertext, &key, &entry.iv)?;

        debug!(path, size = plaintext.len(), "file read");
        Ok(Some(plaintext))
    }

    /// Remove `path` from the manifest. Returns whether it existed.
    ///
    /// The ciphertext blob is left on the backend.
    pub async fn remove_file(&self, path: &str) -> SeelResult<bool> {
        let pair = self.session.require_pair().await?;
        let removed = self.store.remove(&pair, path).await?.is_some();
        if removed {
            info!(path, "file removed");
        }
        Ok(removed)
    }

    /// Entries under `prefix`, most recently modified first.
    pub async fn list_files(&self, prefix: &str) -> SeelResult<Vec<(String, ManifestFileEntry)>> {
        self.store.list(prefix).await
    }
}
