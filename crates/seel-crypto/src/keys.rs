//! Per-write content keys

use rand::{rngs::OsRng, RngCore};
use seel_core::{SeelError, SeelResult};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A per-write 256-bit content encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Copy a key out of a decrypted buffer, zeroizing the buffer.
    pub(crate) fn from_plaintext(mut plaintext: Vec<u8>) -> SeelResult<Self> {
        if plaintext.len() != KEY_SIZE {
            let len = plaintext.len();
            plaintext.zeroize();
            return Err(SeelError::UnwrapFailed(format!(
                "unwrapped key has wrong size: {len} bytes (expected {KEY_SIZE})"
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();
        Ok(Self { bytes })
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit content key from the OS CSPRNG.
pub fn generate_content_key() -> SeelResult<ContentKey> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    Ok(ContentKey::from_bytes(bytes))
}

/// Fill `buf` from the OS CSPRNG, reporting an unusable platform RNG.
pub(crate) fn fill_random(buf: &mut [u8]) -> SeelResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| SeelError::CryptoUnavailable(format!("OS random source: {e}")))
}
