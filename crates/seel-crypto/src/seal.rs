//! At-rest sealing of local device records
//!
//! Output: `[24-byte nonce][ciphertext + 16-byte tag]`. The record name is
//! bound as associated data so a sealed key-pair record cannot be swapped
//! in for the pointer record.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use seel_core::{SeelError, SeelResult};

use crate::kdf::MasterKey;
use crate::keys::fill_random;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Seal `plaintext` under `key`, binding it to `record`.
pub fn seal_record(key: &MasterKey, record: &str, plaintext: &[u8]) -> SeelResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: record.as_bytes(),
            },
        )
        .map_err(|e| SeelError::CryptoUnavailable(format!("record sealing failed: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Open a record produced by `seal_record`.
pub fn open_record(key: &MasterKey, record: &str, sealed: &[u8]) -> SeelResult<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(SeelError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(
            XNonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: record.as_bytes(),
            },
        )
        .map_err(|_| SeelError::DecryptionFailed)
}
