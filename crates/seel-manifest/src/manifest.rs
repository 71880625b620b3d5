//! UserManifest: the per-user index of encrypted files.
//!
//! One snapshot is an immutable JSON document stored as a blob:
//! ```json
//! {
//!   "publicKey": {"kty": "age-x25519", "key": "age1..."},
//!   "files": {
//!     "notes/todo.md": {"cid": "b3-..", "iv": "..", "wrappedKey": "..", "name": "todo.md",
//!                       "mimeType": "text/markdown", "size": 42, "ctime": 1700000000000,
//!                       "mtime": 1700000000000}
//!   },
//!   "previous": "b3-.."
//! }
//! ```
//! Older snapshots used `key` for `wrappedKey` and `type` for `mimeType`;
//! both are accepted on read.

use std::collections::BTreeMap;

use seel_core::{ContentId, SeelError, SeelResult};
use seel_crypto::{Iv, PublicKeyRepr, WrappedKey};
use serde::{Deserialize, Serialize};

/// One logical file's encrypted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFileEntry {
    /// Backend identifier of the ciphertext blob
    pub cid: ContentId,
    pub iv: Iv,
    /// Content key encrypted to the owner's public key
    #[serde(alias = "key")]
    pub wrapped_key: WrappedKey,
    pub name: String,
    #[serde(alias = "type")]
    pub mime_type: String,
    /// Plaintext length in bytes. Absent on legacy entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Milliseconds since the Unix epoch
    pub ctime: u64,
    /// Milliseconds since the Unix epoch
    pub mtime: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserManifest {
    pub public_key: PublicKeyRepr,
    #[serde(default)]
    pub files: BTreeMap<String, ManifestFileEntry>,
    /// Snapshot this one was derived from; absent on the first snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<ContentId>,
}

impl UserManifest {
    /// An empty manifest owned by `public_key`.
    pub fn empty(public_key: PublicKeyRepr) -> Self {
        Self {
            public_key,
            files: BTreeMap::new(),
            previous: None,
        }
    }

    /// Parse a snapshot fetched as `cid`.
    pub fn from_bytes(cid: &ContentId, data: &[u8]) -> SeelResult<Self> {
        serde_json::from_slice(data).map_err(|e| SeelError::ManifestCorrupt {
            cid: cid.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn to_bytes(&self) -> SeelResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| SeelError::Other(anyhow::anyhow!("serializing manifest: {e}")))
    }

    pub fn get(&self, path: &str) -> Option<&ManifestFileEntry> {
        self.files.get(path)
    }

    /// Entries under `prefix`, most recently modified first.
    pub fn list(&self, prefix: &str) -> Vec<(&str, &ManifestFileEntry)> {
        let mut entries: Vec<_> = self
            .files
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, entry)| (path.as_str(), entry))
            .collect();
        entries.sort_by(|a, b| b.1.mtime.cmp(&a.1.mtime).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub fn is_owned_by(&self, public_key: &PublicKeyRepr) -> bool {
        &self.public_key == public_key
    }
}
