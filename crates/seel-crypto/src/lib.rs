//! seel-crypto: envelope encryption for the seel vault
//!
//! Every file write uses a fresh content key:
//!
//! ```text
//! Key pair (age X25519, one per account)
//!   └── Content Key (per-write, 256-bit random, wrapped to the account recipient)
//!       └── Content AEAD: AES-256-GCM (key=content_key, iv=random_96bit)
//! ```
//!
//! Only wrapped content keys and ciphertext ever leave the device. The
//! private half of the key pair stays in local custody (see `seel-secrets`)
//! and is exported only for device sync.
//!
//! Local records (key pair, manifest pointer) can additionally be sealed at
//! rest with XChaCha20-Poly1305 under an Argon2id passphrase key.

pub mod envelope;
pub mod identity;
pub mod kdf;
pub mod keys;
pub mod seal;

pub use envelope::{decrypt, encrypt, EnvelopeEngine, Iv, Sealed, StandardEnvelope};
pub use identity::{
    unwrap_key, wrap_key, KeyFormatError, KeyPair, PrivateKeyRepr, PublicKey, PublicKeyRepr,
    WrappedKey, KEY_TYPE,
};
pub use kdf::{derive_master_key, generate_salt, KdfParams, MasterKey, SALT_SIZE};
pub use keys::{generate_content_key, ContentKey};
pub use seal::{open_record, seal_record};

/// Size of a content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM initialization vector (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of an AEAD authentication tag (GCM and Poly1305 alike)
pub const TAG_SIZE: usize = 16;

pub(crate) fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

pub(crate) fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.decode(s)
}
