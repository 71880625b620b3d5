//! seel-secrets: device-local secure storage
//!
//! Two records live on a device, each under a namespaced key:
//!   - `seel/key-pair`: the account key pair (Key Custody)
//!   - `seel/manifest-pointer`: identifier of the latest manifest snapshot
//!
//! Backends (selected by `[secrets] store`):
//!   - `memory`: in-process, for tests and throwaway sessions
//!   - `file`: one file per record, optionally sealed with a passphrase
//!   - `keychain`: the platform keychain

pub mod custody;
pub mod file;
pub mod keychain;
pub mod memory;
pub mod pointer;
pub mod store;

pub use custody::KeyCustody;
pub use file::FileStore;
pub use keychain::KeychainStore;
pub use memory::MemoryStore;
pub use pointer::PointerStore;
pub use store::SecureStore;

use std::sync::Arc;

use secrecy::SecretString;
use seel_core::config::{expand_tilde, SecretsConfig, SecureStoreKind};
use seel_core::SeelResult;
use seel_crypto::KdfParams;

/// Well-known record names
pub mod keys {
    /// The account key pair (private and public halves in one record)
    pub const KEY_PAIR: &str = "seel/key-pair";
    /// Identifier of the latest published manifest snapshot
    pub const MANIFEST_POINTER: &str = "seel/manifest-pointer";
}

/// Open the secure store selected by `config`.
pub async fn open_store(config: &SecretsConfig) -> SeelResult<Arc<dyn SecureStore>> {
    match config.store {
        SecureStoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        SecureStoreKind::Keychain => Ok(Arc::new(KeychainStore::new())),
        SecureStoreKind::File => {
            let dir = expand_tilde(&config.store_dir);
            let passphrase = std::env::var(&config.passphrase_env)
                .ok()
                .filter(|p| !p.is_empty())
                .map(SecretString::from);
            if passphrase.is_none() {
                tracing::warn!(
                    env = %config.passphrase_env,
                    "no store passphrase set; records are protected by file permissions only"
                );
            }
            let store = FileStore::open(dir, passphrase, &KdfParams::from(config)).await?;
            Ok(Arc::new(store))
        }
    }
}
