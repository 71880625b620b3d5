//! Shared fixtures: in-memory device stores and an instrumented blob backend.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use opendal::Operator;
use seel_core::config::ManifestConfig;
use seel_core::{ContentId, SeelError, SeelResult};
use seel_crypto::{Iv, StandardEnvelope, WrappedKey};
use seel_manifest::{ManifestFileEntry, UserManifest, Vault};
use seel_secrets::{keys, MemoryStore, SecureStore};
use seel_storage::{BlobBackend, OperatorBackend, PinMetadata};

pub fn memory_operator() -> Operator {
    Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish()
}

pub fn memory_backend() -> OperatorBackend {
    OperatorBackend::new(memory_operator(), "test")
}

pub fn vault(device: Arc<MemoryStore>, backend: Arc<dyn BlobBackend>) -> Vault {
    Vault::new(
        device,
        backend,
        Arc::new(StandardEnvelope),
        &ManifestConfig::default(),
    )
}

pub async fn pointer_of(device: &MemoryStore) -> Option<ContentId> {
    device
        .get(keys::MANIFEST_POINTER)
        .await
        .unwrap()
        .map(|raw| ContentId::new(String::from_utf8(raw).unwrap()))
}

/// Replace the bytes stored under `id` without changing the identifier.
pub async fn overwrite_blob(backend: &OperatorBackend, id: &ContentId, bytes: Vec<u8>) {
    let hex = id.as_str().trim_start_matches("b3-");
    backend
        .operator()
        .write(&format!("test/blobs/{hex}"), bytes)
        .await
        .unwrap();
}

pub fn placeholder_entry(name: &str) -> ManifestFileEntry {
    ManifestFileEntry {
        cid: ContentId::new(format!("b3-{}", "0".repeat(64))),
        iv: Iv::from_bytes([0u8; 12]),
        wrapped_key: WrappedKey::from_bytes(vec![0u8; 4]),
        name: name.to_string(),
        mime_type: "text/plain".into(),
        size: Some(0),
        ctime: 1,
        mtime: 1,
    }
}

/// Blob backend that can fail manifest publishes or race them.
///
/// A "manifest publish" is any `put` carrying pin metadata; content blobs
/// are stored without it.
pub struct TestBackend {
    inner: OperatorBackend,
    device: Arc<MemoryStore>,
    fail_manifest_puts: AtomicBool,
    races_left: AtomicU32,
    races_run: AtomicU32,
}

impl TestBackend {
    pub fn new(device: Arc<MemoryStore>) -> Self {
        Self {
            inner: memory_backend(),
            device,
            fail_manifest_puts: AtomicBool::new(false),
            races_left: AtomicU32::new(0),
            races_run: AtomicU32::new(0),
        }
    }

    pub fn fail_manifest_puts(&self, fail: bool) {
        self.fail_manifest_puts.store(fail, Ordering::SeqCst);
    }

    /// Before each of the next `n` manifest publishes, another writer
    /// publishes its own snapshot and moves the pointer.
    pub fn race_next_publishes(&self, n: u32) {
        self.races_left.store(n, Ordering::SeqCst);
    }

    pub fn races_run(&self) -> u32 {
        self.races_run.load(Ordering::SeqCst)
    }

    async fn concurrent_writer(&self) -> SeelResult<()> {
        let base = pointer_of(&self.device)
            .await
            .ok_or(SeelError::PointerMissing)?;
        let mut manifest = UserManifest::from_bytes(&base, &self.inner.get(&base).await?)?;

        let n = self.races_run.fetch_add(1, Ordering::SeqCst);
        let path = format!("notes/concurrent-{n}.md");
        manifest.files.insert(path.clone(), placeholder_entry(&path));
        manifest.previous = Some(base);

        let cid = self
            .inner
            .put(manifest.to_bytes()?, Some(&PinMetadata::named("seel-manifest")))
            .await?;
        self.device
            .put(keys::MANIFEST_POINTER, cid.as_str().as_bytes())
            .await
    }
}

#[async_trait]
impl BlobBackend for TestBackend {
    async fn put(&self, bytes: Vec<u8>, metadata: Option<&PinMetadata>) -> SeelResult<ContentId> {
        if metadata.is_some() {
            if self.fail_manifest_puts.load(Ordering::SeqCst) {
                return Err(SeelError::backend("put manifest", "injected backend outage"));
            }
            let armed = self
                .races_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if armed {
                self.concurrent_writer().await?;
            }
        }
        self.inner.put(bytes, metadata).await
    }

    async fn get(&self, id: &ContentId) -> SeelResult<Vec<u8>> {
        self.inner.get(id).await
    }

    fn describe(&self) -> String {
        "test".into()
    }
}
