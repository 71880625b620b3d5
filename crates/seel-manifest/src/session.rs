//! Session lifecycle: load, register, logout
//!
//! A device is in one of two states:
//!   - logged out: no key pair and no pointer
//!   - active: key pair and pointer both present
//!
//! Any other combination found on disk is repaired on load: a stray pointer
//! is dropped, a key pair without a pointer is cleared and reported as
//! `CorruptLocalState`.

use std::sync::Arc;

use seel_core::{ContentId, SeelError, SeelResult};
use seel_crypto::KeyPair;
use seel_secrets::{KeyCustody, PointerStore};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::events::{EventBus, ManifestEvent};
use crate::store::ManifestStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    Active { user_id: String, pointer: ContentId },
}

pub struct Session {
    pub(crate) custody: KeyCustody,
    pub(crate) pointer: Arc<PointerStore>,
    pub(crate) store: Arc<ManifestStore>,
    pub(crate) events: EventBus,
    active: RwLock<Option<Arc<KeyPair>>>,
}

impl Session {
    pub fn new(
        custody: KeyCustody,
        pointer: Arc<PointerStore>,
        store: Arc<ManifestStore>,
        events: EventBus,
    ) -> Self {
        Self {
            custody,
            pointer,
            store,
            events,
            active: RwLock::new(None),
        }
    }

    /// Restore the session from local storage.
    pub async fn load(&self) -> SeelResult<SessionState> {
        let Some(pair) = self.custody.retrieve().await? else {
            if self.pointer.get().await.ok().flatten().is_some() {
                warn!("dropping manifest pointer left without a key pair");
            }
            self.pointer.clear().await?;
            self.deactivate().await;
            return Ok(SessionState::LoggedOut);
        };

        let Some(pointer) = self.pointer.get().await? else {
            warn!(user = %pair.user_id(), "key pair present without a manifest pointer, clearing");
            self.custody.clear().await?;
            self.deactivate().await;
            return Err(SeelError::CorruptLocalState(
                "key pair present without a manifest pointer".into(),
            ));
        };

        Ok(self.activate(pair, pointer).await)
    }

    /// Create an account on this device, or load the existing one.
    pub async fn register(&self) -> SeelResult<SessionState> {
        if self.custody.retrieve().await?.is_some() {
            return self.load().await;
        }

        match self.create_account().await {
            Ok((pair, pointer)) => {
                info!(user = %pair.user_id(), "registered");
                Ok(self.activate(pair, pointer).await)
            }
            Err(e) => {
                warn!("registration failed, clearing local state: {e}");
                self.discard_local_state().await;
                Err(e)
            }
        }
    }

    async fn create_account(&self) -> SeelResult<(KeyPair, ContentId)> {
        let pair = self.custody.generate()?;
        self.custody.persist(&pair).await?;
        let cid = self.store.create_initial(&pair).await?;
        self.pointer.set(&cid).await?;
        self.events.emit(ManifestEvent::Published {
            previous: None,
            current: cid.clone(),
            attempts: 1,
        });
        Ok((pair, cid))
    }

    /// Forget the key pair and pointer. Idempotent.
    pub async fn logout(&self) -> SeelResult<()> {
        self.custody.clear().await?;
        self.pointer.clear().await?;
        self.deactivate().await;
        info!("logged out");
        Ok(())
    }

    /// Current state without touching storage.
    pub async fn state(&self) -> SeelResult<SessionState> {
        let Some(pair) = self.active.read().await.clone() else {
            return Ok(SessionState::LoggedOut);
        };
        let pointer = self.pointer.get().await?.ok_or(SeelError::PointerMissing)?;
        Ok(SessionState::Active {
            user_id: pair.user_id().to_string(),
            pointer,
        })
    }

    /// The active key pair, or `NotLoggedIn`.
    pub async fn require_pair(&self) -> SeelResult<Arc<KeyPair>> {
        self.active
            .read()
            .await
            .clone()
            .ok_or(SeelError::NotLoggedIn)
    }

    pub async fn user_id(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|pair| pair.user_id().to_string())
    }

    pub(crate) async fn activate(&self, pair: KeyPair, pointer: ContentId) -> SessionState {
        let user_id = pair.user_id().to_string();
        *self.active.write().await = Some(Arc::new(pair));
        self.events.emit(ManifestEvent::SessionChanged {
            user_id: user_id.clone(),
        });
        SessionState::Active { user_id, pointer }
    }

    async fn deactivate(&self) {
        let was_active = self.active.write().await.take().is_some();
        if was_active {
            self.events.emit(ManifestEvent::SessionCleared);
        }
    }

    /// Best-effort wipe after a failed register or import.
    pub(crate) async fn discard_local_state(&self) {
        if let Err(e) = self.custody.clear().await {
            warn!("clearing key pair failed: {e}");
        }
        if let Err(e) = self.pointer.clear().await {
            warn!("clearing manifest pointer failed: {e}");
        }
        *self.active.write().await = None;
        self.events.emit(ManifestEvent::SessionCleared);
    }
}
