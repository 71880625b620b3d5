//! seel-manifest: the encrypted manifest vault
//!
//! - `manifest`: UserManifest snapshot format
//! - `store`: pointer-addressed publish with compare-and-swap commit
//! - `session`: register / load / logout
//! - `sync`: device-to-device credential hand-off
//! - `files`: encrypted file read/write on top of the store
//! - `vault`: wires the pieces together from config

pub mod events;
pub mod files;
pub mod manifest;
pub mod session;
pub mod store;
pub mod sync;
pub mod vault;

pub use events::{EventBus, ManifestEvent};
pub use files::FileVault;
pub use manifest::{ManifestFileEntry, UserManifest};
pub use session::{Session, SessionState};
pub use store::{ManifestStore, Snapshot};
pub use sync::SyncPayload;
pub use vault::Vault;
