//! Platform keychain store.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: GNOME Keyring / Secret Service (D-Bus)
//! - Windows: Credential Manager (DPAPI)
//!
//! Keychain entries hold strings, so records are stored base64-encoded.
//! Calls are blocking and run on the blocking thread pool.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use seel_core::{SeelError, SeelResult};
use zeroize::Zeroize;

use crate::store::SecureStore;

const SERVICE_NAME: &str = "seel";

pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different keychain service name (separate accounts on one machine).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Check if the platform keychain is reachable.
    pub fn is_available(&self) -> bool {
        keyring::Entry::new(&self.service, "__seel_probe__").is_ok()
    }

    async fn run<T, F>(&self, key: &str, op: &'static str, f: F) -> SeelResult<T>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service.clone();
        let user = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &user)?;
            f(entry)
        })
        .await
        .map_err(|e| SeelError::local_store(format!("keychain {op} task"), e))?
        .map_err(|e| SeelError::local_store(format!("keychain {op} for '{key}'"), e))
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeychainStore {
    async fn put(&self, key: &str, record: &[u8]) -> SeelResult<()> {
        let mut encoded = STANDARD.encode(record);
        self.run(key, "store", move |entry| {
            let result = entry.set_password(&encoded);
            encoded.zeroize();
            result
        })
        .await?;
        tracing::debug!(key, "stored record in platform keychain");
        Ok(())
    }

    async fn get(&self, key: &str) -> SeelResult<Option<Vec<u8>>> {
        let found = self
            .run(key, "get", |entry| match entry.get_password() {
                Ok(password) => Ok(Some(password)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            })
            .await?;

        let Some(mut encoded) = found else {
            return Ok(None);
        };
        let decoded = STANDARD.decode(encoded.as_bytes());
        encoded.zeroize();
        decoded.map(Some).map_err(|e| {
            SeelError::CorruptLocalState(format!("keychain record {key} is not base64: {e}"))
        })
    }

    async fn delete(&self, key: &str) -> SeelResult<()> {
        self.run(key, "delete", |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await?;
        tracing::debug!(key, "deleted record from platform keychain");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("keychain:{}", self.service)
    }
}
