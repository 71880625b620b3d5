use async_trait::async_trait;
use opendal::Operator;
use seel_core::{now_millis, ContentId, SeelError, SeelResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const ID_SCHEME: &str = "b3-";

/// Content-addressable blob storage.
///
/// Content is immutable once stored. The backend does not interpret the
/// bytes; callers only ever hand it ciphertext or manifest JSON.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, metadata: Option<&PinMetadata>) -> SeelResult<ContentId>;

    async fn get(&self, id: &ContentId) -> SeelResult<Vec<u8>>;

    /// Short backend name for logs and `status`.
    fn describe(&self) -> String;
}

/// Caller-supplied metadata recorded alongside a pinned blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMetadata {
    pub name: String,
}

impl PinMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The pin sidecar as stored: `<prefix>/pins/<hex>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRecord {
    pub cid: ContentId,
    pub name: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch
    pub pinned_at: u64,
}

/// The identifier `put` would return for `bytes`.
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    ContentId::new(format!("{ID_SCHEME}{}", blake3::hash(bytes).to_hex()))
}

fn hex_of(id: &ContentId) -> SeelResult<&str> {
    id.as_str()
        .strip_prefix(ID_SCHEME)
        .filter(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| {
            SeelError::backend(
                format!("get {id}"),
                "not a b3- content identifier",
            )
        })
}

/// `BlobBackend` over any OpenDAL operator (memory, fs, S3).
#[derive(Clone)]
pub struct OperatorBackend {
    op: Operator,
    prefix: String,
}

impl OperatorBackend {
    pub fn new(op: Operator, prefix: &str) -> Self {
        Self {
            op,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    fn blob_key(&self, hex: &str) -> String {
        format!("{}/blobs/{hex}", self.prefix)
    }

    fn pin_key(&self, hex: &str) -> String {
        format!("{}/pins/{hex}.json", self.prefix)
    }

    /// Pin metadata recorded for `id`, if any.
    pub async fn pin(&self, id: &ContentId) -> SeelResult<Option<PinRecord>> {
        let key = self.pin_key(hex_of(id)?);
        match self.op.read(&key).await {
            Ok(buf) => serde_json::from_slice(&buf.to_vec())
                .map(Some)
                .map_err(|e| SeelError::backend(format!("parsing {key}"), e)),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SeelError::backend(format!("reading {key}"), e)),
        }
    }
}

#[async_trait]
impl BlobBackend for OperatorBackend {
    async fn put(&self, bytes: Vec<u8>, metadata: Option<&PinMetadata>) -> SeelResult<ContentId> {
        let id = content_id_for(&bytes);
        let hex = hex_of(&id)?.to_string();
        let key = self.blob_key(&hex);
        let size = bytes.len() as u64;

        // Same bytes, same key: skip the upload when already present.
        if self.op.exists(&key).await.unwrap_or(false) {
            debug!(cid = %id.short(), "blob already stored");
        } else {
            self.op
                .write(&key, bytes)
                .await
                .map_err(|e| SeelError::backend(format!("uploading {key}"), e))?;
            debug!(cid = %id.short(), size, "blob stored");
        }

        if let Some(meta) = metadata {
            let record = PinRecord {
                cid: id.clone(),
                name: meta.name.clone(),
                size,
                pinned_at: now_millis(),
            };
            let json = serde_json::to_vec(&record)
                .map_err(|e| SeelError::backend("encoding pin metadata", e))?;
            let pin_key = self.pin_key(&hex);
            self.op
                .write(&pin_key, json)
                .await
                .map_err(|e| SeelError::backend(format!("uploading {pin_key}"), e))?;
            info!(cid = %id.short(), name = %meta.name, "pinned");
        }

        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> SeelResult<Vec<u8>> {
        let hex = hex_of(id)?;
        let key = self.blob_key(hex);
        let bytes = self
            .op
            .read(&key)
            .await
            .map_err(|e| SeelError::backend(format!("downloading {key}"), e))?
            .to_vec();

        let actual = blake3::hash(&bytes).to_hex();
        if actual.as_str() != hex {
            warn!(cid = %id.short(), "stored blob does not match its identifier");
            return Err(SeelError::IntegrityMismatch {
                cid: id.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(bytes)
    }

    fn describe(&self) -> String {
        let info = self.op.info();
        format!("{}:{} ({})", info.scheme(), info.name(), self.prefix)
    }
}
