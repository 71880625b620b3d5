//! Device Sync: moving an account to another device
//!
//! The payload is the private key plus the manifest pointer. It is a
//! complete bearer credential: anyone holding it can read and modify the
//! account. Two encodings are supported:
//!   - JSON: `{"privateKey": {...}, "manifestPointer": "b3-..."}`
//!   - link fragment: `sync=<base64url(JSON)>`, optionally inside a URL (`...#sync=...`)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use seel_core::{ContentId, SeelError, SeelResult};
use seel_crypto::PrivateKeyRepr;
use seel_secrets::KeyCustody;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::session::{Session, SessionState};

const FRAGMENT_KEY: &str = "sync=";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    #[serde(alias = "privateKeyJwk")]
    pub private_key: PrivateKeyRepr,
    #[serde(alias = "manifestCid")]
    pub manifest_pointer: ContentId,
}

impl SyncPayload {
    pub fn to_json(&self) -> SeelResult<String> {
        serde_json::to_string(self)
            .map_err(|e| SeelError::Other(anyhow::anyhow!("encoding sync payload: {e}")))
    }

    pub fn from_json(json: &str) -> SeelResult<Self> {
        let payload: Self =
            serde_json::from_str(json).map_err(|e| SeelError::InvalidSyncPayload(e.to_string()))?;
        payload.check_pointer()?;
        Ok(payload)
    }

    fn check_pointer(&self) -> SeelResult<()> {
        if self.manifest_pointer.as_str().trim().is_empty() {
            return Err(SeelError::InvalidSyncPayload("manifest pointer is empty".into()));
        }
        Ok(())
    }

    /// `sync=<base64url(JSON)>`, ready to append after `#` in a link.
    pub fn to_link_fragment(&self) -> SeelResult<String> {
        let mut json = self.to_json()?;
        let fragment = format!("{FRAGMENT_KEY}{}", URL_SAFE_NO_PAD.encode(json.as_bytes()));
        json.zeroize();
        Ok(fragment)
    }

    /// Accepts `sync=...`, `#sync=...` or a full link containing `#sync=...`.
    pub fn from_link_fragment(input: &str) -> SeelResult<Self> {
        let fragment = input.rsplit_once('#').map_or(input, |(_, f)| f);
        let encoded = fragment
            .split('&')
            .find_map(|part| part.strip_prefix(FRAGMENT_KEY))
            .ok_or_else(|| SeelError::InvalidSyncPayload("no sync= fragment".into()))?;

        let mut decoded = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| SeelError::InvalidSyncPayload(format!("fragment is not base64url: {e}")))?;
        let parsed = std::str::from_utf8(&decoded)
            .map_err(|_| SeelError::InvalidSyncPayload("fragment is not UTF-8".into()))
            .and_then(Self::from_json);
        decoded.zeroize();
        parsed
    }

    /// Decode either encoding.
    pub fn parse(input: &str) -> SeelResult<Self> {
        let input = input.trim();
        if input.starts_with('{') {
            Self::from_json(input)
        } else {
            Self::from_link_fragment(input)
        }
    }
}

impl Session {
    /// Export this device's credentials for another device.
    pub async fn export_credentials(&self) -> SeelResult<SyncPayload> {
        let pair = self
            .custody
            .retrieve()
            .await?
            .ok_or(SeelError::NotLoggedIn)?;
        let manifest_pointer = self.pointer.get().await?.ok_or(SeelError::PointerMissing)?;

        warn!(user = %pair.user_id(), "exporting credentials; the payload grants full account access");
        Ok(SyncPayload {
            private_key: KeyCustody::export_private(&pair),
            manifest_pointer,
        })
    }

    /// Adopt the account in `payload`, replacing whatever this device had.
    ///
    /// A malformed private key or blank pointer is rejected before local
    /// state is touched. After that, any failure (unreachable or foreign
    /// manifest, storage errors) leaves the device logged out.
    pub async fn import_credentials(&self, payload: SyncPayload) -> SeelResult<SessionState> {
        payload.check_pointer()?;
        let pair = KeyCustody::import_private(&payload.private_key)?;

        match self.adopt(&pair, &payload.manifest_pointer).await {
            Ok(()) => {
                info!(user = %pair.user_id(), pointer = %payload.manifest_pointer.short(), "imported credentials");
                Ok(self.activate(pair, payload.manifest_pointer).await)
            }
            Err(e) => {
                warn!("credential import failed, clearing local state: {e}");
                self.discard_local_state().await;
                Err(e)
            }
        }
    }

    async fn adopt(&self, pair: &seel_crypto::KeyPair, pointer: &ContentId) -> SeelResult<()> {
        self.custody.persist(pair).await?;
        self.pointer.set(pointer).await?;
        self.store.current_verified(pair).await?;
        Ok(())
    }
}
