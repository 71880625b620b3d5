use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::OneOrMany;
use crate::{SeelError, SeelResult};

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeelConfig {
    pub storage: StorageConfig,
    pub secrets: SecretsConfig,
    pub manifest: ManifestConfig,
    pub log: LogConfig,
}

impl SeelConfig {
    /// Load from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> SeelResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| SeelError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Which blob backend the OpenDAL adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local, lost on exit
    Memory,
    /// Local directory
    Fs,
    /// S3-compatible endpoint
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Key prefix under which blobs and pin metadata are stored
    pub prefix: String,
    /// S3 endpoint, or a list of endpoints tried in order
    pub endpoint: OneOrMany<String>,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Refuse plaintext HTTP endpoints instead of warning
    pub enforce_tls: bool,
}

/// Where the key pair and manifest pointer are kept on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecureStoreKind {
    Memory,
    File,
    Keychain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub store: SecureStoreKind,
    /// Directory for the file store
    pub store_dir: PathBuf,
    /// Environment variable holding the passphrase that seals file-store records.
    /// Records are stored unsealed (owner-only permissions) when the variable is unset.
    pub passphrase_env: String,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Publish attempts before a mutation gives up on a moving pointer
    pub max_publish_attempts: u32,
    /// Capacity of the change-notification channel
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Fs,
            root: PathBuf::from("~/.local/share/seel/blobs"),
            prefix: "seel".into(),
            endpoint: OneOrMany::One("http://localhost:8333".into()),
            region: "us-east-1".into(),
            bucket: "seel".into(),
            enforce_tls: false,
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            store: SecureStoreKind::File,
            store_dir: PathBuf::from("~/.local/share/seel/device"),
            passphrase_env: "SEEL_STORE_PASSPHRASE".into(),
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            max_publish_attempts: 5,
            event_buffer: 64,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        return PathBuf::from(home).join(rest);
    }
    path.to_path_buf()
}
