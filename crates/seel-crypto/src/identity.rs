//! Account key pair (age X25519) and content-key wrapping
//!
//! The key pair never touches file content: it only wraps and unwraps the
//! 32-byte content keys. Wrapped keys use the age binary format with a
//! single X25519 recipient stanza.
//!
//! Canonical representations:
//! ```text
//! public:  {"kty": "age-x25519", "key": "age1..."}
//! private: {"kty": "age-x25519", "key": "AGE-SECRET-KEY-1..."}
//! ```

use std::io::{Read, Write};
use std::str::FromStr;

use age::x25519;
use secrecy::{ExposeSecret, SecretString};
use seel_core::{SeelError, SeelResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::keys::{fill_random, ContentKey};
use crate::{base64_decode, base64_encode};

/// Key type tag carried in both canonical representations.
pub const KEY_TYPE: &str = "age-x25519";

#[derive(Debug, thiserror::Error)]
pub enum KeyFormatError {
    #[error("unsupported key type: {0}")]
    UnsupportedType(String),
    #[error("invalid key encoding: {0}")]
    Invalid(&'static str),
}

/// Serializable public key, embedded in every manifest snapshot.
///
/// Equality is exact string equality of the canonical form, which is what
/// the manifest identity check compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyRepr {
    pub kty: String,
    pub key: String,
}

/// Serializable private key. Only ever produced for device sync.
pub struct PrivateKeyRepr {
    pub kty: String,
    pub key: SecretString,
}

impl std::fmt::Debug for PrivateKeyRepr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyRepr")
            .field("kty", &self.kty)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct PrivateKeyWire {
    kty: String,
    key: String,
}

impl Serialize for PrivateKeyRepr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut wire = PrivateKeyWire {
            kty: self.kty.clone(),
            key: self.key.expose_secret().to_string(),
        };
        let result = wire.serialize(serializer);
        wire.key.zeroize();
        result
    }
}

impl<'de> Deserialize<'de> for PrivateKeyRepr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut wire = PrivateKeyWire::deserialize(deserializer)?;
        let key = SecretString::from(std::mem::take(&mut wire.key));
        Ok(PrivateKeyRepr {
            kty: wire.kty,
            key,
        })
    }
}

/// A validated recipient public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    encoded: String,
}

impl PublicKey {
    pub fn from_repr(repr: &PublicKeyRepr) -> Result<Self, KeyFormatError> {
        if repr.kty != KEY_TYPE {
            return Err(KeyFormatError::UnsupportedType(repr.kty.clone()));
        }
        x25519::Recipient::from_str(&repr.key).map_err(KeyFormatError::Invalid)?;
        Ok(Self {
            encoded: repr.key.clone(),
        })
    }

    pub fn to_repr(&self) -> PublicKeyRepr {
        PublicKeyRepr {
            kty: KEY_TYPE.to_string(),
            key: self.encoded.clone(),
        }
    }

    /// Stable display identifier for the account owning this key.
    pub fn user_id(&self) -> &str {
        &self.encoded
    }

    fn recipient(&self) -> SeelResult<x25519::Recipient> {
        x25519::Recipient::from_str(&self.encoded)
            .map_err(|e| SeelError::CryptoUnavailable(format!("invalid recipient: {e}")))
    }
}

/// The account key pair. The public half is always derived from the private half.
pub struct KeyPair {
    identity: x25519::Identity,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair.
    ///
    /// The OS random source is probed first so a missing CSPRNG surfaces as
    /// `CryptoUnavailable` instead of a panic inside key generation.
    pub fn generate() -> SeelResult<Self> {
        let mut probe = [0u8; 32];
        fill_random(&mut probe)?;
        probe.zeroize();

        let pair = Self::from_identity(x25519::Identity::generate());
        tracing::debug!(recipient = %pair.public.encoded, "generated key pair");
        Ok(pair)
    }

    /// Rebuild a key pair from its private representation.
    pub fn from_private(repr: &PrivateKeyRepr) -> Result<Self, KeyFormatError> {
        if repr.kty != KEY_TYPE {
            return Err(KeyFormatError::UnsupportedType(repr.kty.clone()));
        }
        let identity = x25519::Identity::from_str(repr.key.expose_secret())
            .map_err(KeyFormatError::Invalid)?;
        Ok(Self::from_identity(identity))
    }

    fn from_identity(identity: x25519::Identity) -> Self {
        let public = PublicKey {
            encoded: identity.to_public().to_string(),
        };
        Self { identity, public }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public.clone()
    }

    pub fn export_public(&self) -> PublicKeyRepr {
        self.public.to_repr()
    }

    pub fn export_private(&self) -> PrivateKeyRepr {
        PrivateKeyRepr {
            kty: KEY_TYPE.to_string(),
            key: self.identity.to_string(),
        }
    }

    pub fn user_id(&self) -> &str {
        self.public.user_id()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.encoded)
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// A content key encrypted to a public key. Serialized as base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64_encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, base64::DecodeError> {
        base64_decode(s).map(Self)
    }
}

impl Serialize for WrappedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for WrappedKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        WrappedKey::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Wrap (encrypt) a content key to `public`.
pub fn wrap_key(key: &ContentKey, public: &PublicKey) -> SeelResult<WrappedKey> {
    let recipient = public.recipient()?;
    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(&recipient as &dyn age::Recipient))
            .map_err(|e| SeelError::CryptoUnavailable(format!("age encryptor: {e}")))?;

    let mut out = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut out)
        .map_err(|e| SeelError::CryptoUnavailable(format!("key wrapping: {e}")))?;
    writer
        .write_all(key.as_bytes())
        .and_then(|_| writer.finish().map(|_| ()))
        .map_err(|e| SeelError::CryptoUnavailable(format!("key wrapping: {e}")))?;

    Ok(WrappedKey(out))
}

/// Unwrap (decrypt) a content key with the private half of `pair`.
pub fn unwrap_key(wrapped: &WrappedKey, pair: &KeyPair) -> SeelResult<ContentKey> {
    let decryptor = age::Decryptor::new(wrapped.as_bytes())
        .map_err(|e| SeelError::UnwrapFailed(format!("malformed wrapped key: {e}")))?;

    let mut reader = decryptor
        .decrypt(std::iter::once(&pair.identity as &dyn age::Identity))
        .map_err(|e| SeelError::UnwrapFailed(format!("key pair does not match: {e}")))?;

    let mut plaintext = Vec::new();
    if let Err(e) = reader.read_to_end(&mut plaintext) {
        plaintext.zeroize();
        return Err(SeelError::UnwrapFailed(format!("reading wrapped key: {e}")));
    }

    ContentKey::from_plaintext(plaintext)
}
