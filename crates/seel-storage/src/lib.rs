//! seel-storage: content-addressed blob backend over OpenDAL
//!
//! Key layout under the configured prefix:
//! ```text
//! <prefix>/blobs/<blake3 hex>       stored bytes (ciphertext or manifest JSON)
//! <prefix>/pins/<blake3 hex>.json   optional pin metadata
//! ```
//! Identifiers handed out are `b3-<blake3 hex>` of the stored bytes.

pub mod backend;
pub mod health;
pub mod operator;

pub use backend::{content_id_for, BlobBackend, OperatorBackend, PinMetadata, PinRecord};
pub use health::{check_health, is_healthy};
pub use operator::{build_operator, connect, S3Credentials};
