//! Manifest Store: the pointer-addressed, copy-on-write file index
//!
//! Every mutation runs the same pipeline:
//!   1. fetch the snapshot the pointer names
//!   2. verify it belongs to the active key pair
//!   3. apply the change to an in-memory copy
//!   4. publish the new snapshot as a blob
//!   5. compare-and-swap the pointer from the fetched id to the new one
//!
//! If step 5 finds the pointer moved, the whole pipeline runs again on the
//! newer snapshot with the same change. Same-path writes are therefore
//! last-write-wins; writes to different paths merge. The pointer is only
//! ever written by a successful step 5.

use std::sync::Arc;

use seel_core::config::ManifestConfig;
use seel_core::{ContentId, SeelError, SeelResult};
use seel_crypto::KeyPair;
use seel_secrets::PointerStore;
use seel_storage::{BlobBackend, PinMetadata};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{EventBus, ManifestEvent};
use crate::manifest::{ManifestFileEntry, UserManifest};

/// A manifest together with the identifier it was fetched or published as.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cid: ContentId,
    pub manifest: UserManifest,
}

const MANIFEST_PIN_NAME: &str = "seel-manifest";

pub struct ManifestStore {
    backend: Arc<dyn BlobBackend>,
    pointer: Arc<PointerStore>,
    events: EventBus,
    max_publish_attempts: u32,
}

impl ManifestStore {
    pub fn new(
        backend: Arc<dyn BlobBackend>,
        pointer: Arc<PointerStore>,
        events: EventBus,
        config: &ManifestConfig,
    ) -> Self {
        Self {
            backend,
            pointer,
            events,
            max_publish_attempts: config.max_publish_attempts.max(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManifestEvent> {
        self.events.subscribe()
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    /// Fetch and parse the snapshot stored as `cid`.
    pub async fn fetch(&self, cid: &ContentId) -> SeelResult<UserManifest> {
        let bytes = self
            .backend
            .get(cid)
            .await
            .map_err(|e| match e {
                SeelError::IntegrityMismatch { actual, .. } => SeelError::ManifestCorrupt {
                    cid: cid.to_string(),
                    reason: format!("stored bytes hash to b3-{actual}"),
                },
                other => SeelError::ManifestUnreachable {
                    cid: cid.to_string(),
                    source: Box::new(other),
                },
            })?;
        UserManifest::from_bytes(cid, &bytes)
    }

    /// The snapshot the pointer currently names.
    pub async fn current(&self) -> SeelResult<Snapshot> {
        let cid = self.pointer.get().await?.ok_or(SeelError::PointerMissing)?;
        let manifest = self.fetch(&cid).await?;
        Ok(Snapshot { cid, manifest })
    }

    /// The current snapshot, checked against `pair`.
    pub async fn current_verified(&self, pair: &KeyPair) -> SeelResult<Snapshot> {
        let snapshot = self.current().await?;
        if !snapshot.manifest.is_owned_by(&pair.export_public()) {
            warn!(cid = %snapshot.cid.short(), "manifest belongs to a different key pair");
            return Err(SeelError::IdentityMismatch);
        }
        Ok(snapshot)
    }

    pub async fn get(&self, path: &str) -> SeelResult<Option<ManifestFileEntry>> {
        Ok(self.current().await?.manifest.get(path).cloned())
    }

    /// Entries under `prefix`, most recently modified first.
    pub async fn list(&self, prefix: &str) -> SeelResult<Vec<(String, ManifestFileEntry)>> {
        let snapshot = self.current().await?;
        Ok(snapshot
            .manifest
            .list(prefix)
            .into_iter()
            .map(|(path, entry)| (path.to_string(), entry.clone()))
            .collect())
    }

    /// Snapshot identifiers from the pointer back through `previous`, newest first.
    pub async fn history(&self, limit: usize) -> SeelResult<Vec<ContentId>> {
        let mut next = Some(self.pointer.get().await?.ok_or(SeelError::PointerMissing)?);
        let mut out = Vec::new();
        while let Some(cid) = next {
            if out.len() >= limit {
                break;
            }
            next = self.fetch(&cid).await?.previous;
            out.push(cid);
        }
        Ok(out)
    }

    // ── Writes ────────────────────────────────────────────────────────────

    /// Publish the empty manifest for a new account. The pointer is left to the caller.
    pub async fn create_initial(&self, pair: &KeyPair) -> SeelResult<ContentId> {
        let cid = self
            .publish(&UserManifest::empty(pair.export_public()))
            .await?;
        info!(cid = %cid.short(), user = %pair.user_id(), "published initial manifest");
        Ok(cid)
    }

    /// Insert or replace the entry at `path`. Returns the entry it replaced.
    pub async fn put(
        &self,
        pair: &KeyPair,
        path: &str,
        entry: ManifestFileEntry,
    ) -> SeelResult<Option<ManifestFileEntry>> {
        self.update(pair, |manifest| {
            manifest.files.insert(path.to_string(), entry.clone())
        })
        .await
    }

    /// Remove the entry at `path`. Returns the removed entry, if there was one.
    pub async fn remove(&self, pair: &KeyPair, path: &str) -> SeelResult<Option<ManifestFileEntry>> {
        self.update(pair, |manifest| manifest.files.remove(path)).await
    }

    /// Apply `mutate` through the fetch/verify/publish/commit pipeline.
    ///
    /// `mutate` may run more than once, each time on a fresh copy of the
    /// latest snapshot. A mutation that leaves the manifest unchanged
    /// publishes nothing.
    pub async fn update<T, F>(&self, pair: &KeyPair, mut mutate: F) -> SeelResult<T>
    where
        F: FnMut(&mut UserManifest) -> T + Send,
        T: Send,
    {
        for attempt in 1..=self.max_publish_attempts {
            let base = self.current_verified(pair).await?;

            let mut next = base.manifest.clone();
            let result = mutate(&mut next);
            if next == base.manifest {
                debug!(cid = %base.cid.short(), "mutation left manifest unchanged");
                return Ok(result);
            }
            next.previous = Some(base.cid.clone());

            let cid = self.publish(&next).await?;
            if self.pointer.compare_and_swap(&base.cid, &cid).await? {
                info!(
                    previous = %base.cid.short(),
                    current = %cid.short(),
                    files = next.files.len(),
                    attempt,
                    "manifest published"
                );
                self.events.emit(ManifestEvent::Published {
                    previous: Some(base.cid),
                    current: cid,
                    attempts: attempt,
                });
                return Ok(result);
            }
            warn!(attempt, "manifest pointer moved during publish, re-applying");
        }

        Err(SeelError::PublishConflict {
            attempts: self.max_publish_attempts,
        })
    }

    async fn publish(&self, manifest: &UserManifest) -> SeelResult<ContentId> {
        let bytes = manifest.to_bytes()?;
        self.backend
            .put(bytes, Some(&PinMetadata::named(MANIFEST_PIN_NAME)))
            .await
    }
}
