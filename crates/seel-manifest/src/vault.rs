//! Wiring: one `Vault` per device session.

use std::sync::Arc;

use seel_core::config::{ManifestConfig, SeelConfig};
use seel_core::SeelResult;
use seel_crypto::{EnvelopeEngine, StandardEnvelope};
use seel_secrets::{KeyCustody, PointerStore, SecureStore};
use seel_storage::{BlobBackend, OperatorBackend};
use tokio::sync::broadcast;

use crate::events::{EventBus, ManifestEvent};
use crate::files::FileVault;
use crate::session::Session;
use crate::store::ManifestStore;

pub struct Vault {
    session: Arc<Session>,
    store: Arc<ManifestStore>,
    files: FileVault,
    events: EventBus,
    secure_store: Arc<dyn SecureStore>,
    backend: Arc<dyn BlobBackend>,
}

impl Vault {
    /// Assemble a vault from explicit collaborators.
    pub fn new(
        secure_store: Arc<dyn SecureStore>,
        backend: Arc<dyn BlobBackend>,
        engine: Arc<dyn EnvelopeEngine>,
        config: &ManifestConfig,
    ) -> Self {
        let events = EventBus::new(config.event_buffer);
        let pointer = Arc::new(PointerStore::new(secure_store.clone()));
        let store = Arc::new(ManifestStore::new(
            backend.clone(),
            pointer.clone(),
            events.clone(),
            config,
        ));
        let session = Arc::new(Session::new(
            KeyCustody::new(secure_store.clone()),
            pointer,
            store.clone(),
            events.clone(),
        ));
        let files = FileVault::new(session.clone(), store.clone(), backend.clone(), engine);

        Self {
            session,
            store,
            files,
            events,
            secure_store,
            backend,
        }
    }

    /// Open the configured secure store and blob backend.
    ///
    /// The session is not loaded; call `session().load()` next.
    pub async fn open(config: &SeelConfig) -> SeelResult<Self> {
        let secure_store = seel_secrets::open_store(&config.secrets).await?;
        let op = seel_storage::connect(&config.storage).await?;
        let backend = Arc::new(OperatorBackend::new(op, &config.storage.prefix));
        tracing::debug!(
            secure_store = %secure_store.describe(),
            backend = %backend.describe(),
            "vault opened"
        );
        Ok(Self::new(
            secure_store,
            backend,
            Arc::new(StandardEnvelope),
            &config.manifest,
        ))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn manifest(&self) -> &ManifestStore {
        &self.store
    }

    pub fn files(&self) -> &FileVault {
        &self.files
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManifestEvent> {
        self.events.subscribe()
    }

    pub fn secure_store(&self) -> &dyn SecureStore {
        self.secure_store.as_ref()
    }

    pub fn backend(&self) -> &dyn BlobBackend {
        self.backend.as_ref()
    }
}
