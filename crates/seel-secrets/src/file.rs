//! File-backed secure store
//!
//! Layout under the store directory:
//! ```text
//! <dir>/seel.key-pair           record (sealed when a passphrase is set)
//! <dir>/seel.manifest-pointer
//! <dir>/salt                    16-byte Argon2id salt, present only when sealing
//! ```
//!
//! Writes go through a temp file and a rename. On Unix the directory is
//! created 0700 and records are written 0600.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::SecretString;
use seel_core::{SeelError, SeelResult};
use seel_crypto::{
    derive_master_key, generate_salt, open_record, seal_record, KdfParams, MasterKey, SALT_SIZE,
};

use crate::store::SecureStore;

const SALT_FILE: &str = "salt";

pub struct FileStore {
    dir: PathBuf,
    sealing: Option<MasterKey>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// With a passphrase, the sealing key is derived from it and the salt
    /// file, which is created on first use.
    pub async fn open(
        dir: PathBuf,
        passphrase: Option<SecretString>,
        params: &KdfParams,
    ) -> SeelResult<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SeelError::local_store(format!("creating {}", dir.display()), e))?;
        restrict_permissions(&dir, 0o700).await?;

        let sealing = match passphrase {
            Some(passphrase) => {
                let salt = load_or_create_salt(&dir).await?;
                let params = params.clone();
                let key = tokio::task::spawn_blocking(move || {
                    derive_master_key(&passphrase, &salt, &params)
                })
                .await
                .map_err(|e| SeelError::local_store("key derivation task", e))??;
                Some(key)
            }
            None => None,
        };

        tracing::debug!(dir = %dir.display(), sealed = sealing.is_some(), "opened file store");
        Ok(Self { dir, sealing })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_sealed(&self) -> bool {
        self.sealing.is_some()
    }

    fn record_path(&self, key: &str) -> SeelResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_'))
            && !key.split('/').any(|part| part.is_empty());
        if !valid {
            return Err(SeelError::local_store(
                format!("file store key {key:?}"),
                "keys are slash-separated [A-Za-z0-9_-] segments",
            ));
        }
        Ok(self.dir.join(key.replace('/', ".")))
    }
}

#[async_trait]
impl SecureStore for FileStore {
    async fn put(&self, key: &str, record: &[u8]) -> SeelResult<()> {
        let path = self.record_path(key)?;
        let data = match &self.sealing {
            Some(master) => seal_record(master, key, record)?,
            None => record.to_vec(),
        };
        atomic_write(&path, &data).await?;
        tracing::debug!(key, "stored record");
        Ok(())
    }

    async fn get(&self, key: &str) -> SeelResult<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SeelError::local_store(
                    format!("reading {}", path.display()),
                    e,
                ))
            }
        };

        match &self.sealing {
            Some(master) => open_record(master, key, &data).map(Some).map_err(|_| {
                SeelError::CorruptLocalState(format!(
                    "record {key} cannot be opened (wrong passphrase or damaged file)"
                ))
            }),
            None => Ok(Some(data)),
        }
    }

    async fn delete(&self, key: &str) -> SeelResult<()> {
        let path = self.record_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "deleted record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SeelError::local_store(
                format!("removing {}", path.display()),
                e,
            )),
        }
    }

    fn describe(&self) -> String {
        let mode = if self.is_sealed() { "sealed" } else { "plain" };
        format!("file:{} ({mode})", self.dir.display())
    }
}

async fn load_or_create_salt(dir: &Path) -> SeelResult<[u8; SALT_SIZE]> {
    let path = dir.join(SALT_FILE);
    match tokio::fs::read(&path).await {
        Ok(bytes) => bytes.try_into().map_err(|b: Vec<u8>| {
            SeelError::CorruptLocalState(format!(
                "salt file {} is {} bytes (expected {SALT_SIZE})",
                path.display(),
                b.len()
            ))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let salt = generate_salt()?;
            atomic_write(&path, &salt).await?;
            tracing::info!(path = %path.display(), "created store salt");
            Ok(salt)
        }
        Err(e) => Err(SeelError::local_store(
            format!("reading {}", path.display()),
            e,
        )),
    }
}

/// Write `data` to a hidden temp file beside `path`, then rename over it.
async fn atomic_write(path: &Path, data: &[u8]) -> SeelResult<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    tokio::fs::write(&tmp_path, data)
        .await
        .map_err(|e| SeelError::local_store(format!("writing {}", tmp_path.display()), e))?;
    restrict_permissions(&tmp_path, 0o600).await?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SeelError::local_store(format!("replacing {}", path.display()), e))
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path, mode: u32) -> SeelResult<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| SeelError::local_store(format!("chmod {}", path.display()), e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path, _mode: u32) -> SeelResult<()> {
    Ok(())
}
