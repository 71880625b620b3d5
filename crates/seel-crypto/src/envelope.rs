//! AES-256-GCM content encryption and the envelope engine seam
//!
//! Encrypted blob format (binary): `[N bytes: ciphertext][16 bytes: GCM tag]`.
//! The 96-bit IV is not part of the blob; it travels in the manifest entry.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use seel_core::{SeelError, SeelResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::{KeyPair, PublicKey, WrappedKey};
use crate::keys::{fill_random, ContentKey};
use crate::{base64_decode, base64_encode, IV_SIZE};

/// Initialization vector for one AES-GCM encryption. Serialized as base64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64_encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, String> {
        let bytes = base64_decode(s).map_err(|e| format!("base64 decode: {e}"))?;
        let arr: [u8; IV_SIZE] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("iv is {} bytes (expected {IV_SIZE})", b.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for Iv {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Iv {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Iv::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Output of `encrypt`: ciphertext (tag included) plus the IV it was made with.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub iv: Iv,
}

/// Encrypt `plaintext` with AES-256-GCM under a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &ContentKey) -> SeelResult<Sealed> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut iv_bytes = [0u8; IV_SIZE];
    fill_random(&mut iv_bytes)?;
    let nonce = Nonce::from_slice(&iv_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| SeelError::CryptoUnavailable(format!("AES-GCM encryption: {e}")))?;

    Ok(Sealed {
        ciphertext,
        iv: Iv(iv_bytes),
    })
}

/// Decrypt AES-256-GCM ciphertext. Any tag mismatch is `DecryptionFailed`.
pub fn decrypt(ciphertext: &[u8], key: &ContentKey, iv: &Iv) -> SeelResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(iv.as_bytes());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SeelError::DecryptionFailed)
}

/// The operations consumers need for hybrid encryption.
///
/// Callers hold an `Arc<dyn EnvelopeEngine>` rather than calling cipher
/// crates directly, so tests and other platforms can substitute their own.
pub trait EnvelopeEngine: Send + Sync {
    fn generate_content_key(&self) -> SeelResult<ContentKey>;
    fn encrypt(&self, plaintext: &[u8], key: &ContentKey) -> SeelResult<Sealed>;
    fn decrypt(&self, ciphertext: &[u8], key: &ContentKey, iv: &Iv) -> SeelResult<Vec<u8>>;
    fn wrap_key(&self, key: &ContentKey, public: &PublicKey) -> SeelResult<WrappedKey>;
    fn unwrap_key(&self, wrapped: &WrappedKey, pair: &KeyPair) -> SeelResult<ContentKey>;
}

/// AES-256-GCM content encryption with age X25519 key wrapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEnvelope;

impl EnvelopeEngine for StandardEnvelope {
    fn generate_content_key(&self) -> SeelResult<ContentKey> {
        crate::keys::generate_content_key()
    }

    fn encrypt(&self, plaintext: &[u8], key: &ContentKey) -> SeelResult<Sealed> {
        encrypt(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &ContentKey, iv: &Iv) -> SeelResult<Vec<u8>> {
        decrypt(ciphertext, key, iv)
    }

    fn wrap_key(&self, key: &ContentKey, public: &PublicKey) -> SeelResult<WrappedKey> {
        crate::identity::wrap_key(key, public)
    }

    fn unwrap_key(&self, wrapped: &WrappedKey, pair: &KeyPair) -> SeelResult<ContentKey> {
        crate::identity::unwrap_key(wrapped, pair)
    }
}
