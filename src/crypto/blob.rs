//! Authenticated encryption of media and testimony payloads.
//!
//! Whole-blob AEAD: the full plaintext is held in memory for the duration
//! of the call. Oversized video payloads get a warning rather than a
//! failure; the capture pipeline is expected to trim or split first.

use log::warn;
use zeroize::Zeroize;

use crate::crypto::{base64_encode, open, seal, VaultKey};
use crate::error::KernelError;
use crate::types::EncryptedPayload;

pub const DEFAULT_MIME: &str = "application/octet-stream";
const MAX_VIDEO_BYTES: u64 = 250 * 1024 * 1024;

/// Transport shape of an encrypted payload: base64 nonce/ciphertext plus
/// the original mime and plaintext size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub nonce: String,
    pub cipher: String,
    pub mime: String,
    pub size: u64,
}

impl EncryptedBlob {
    pub fn payload(&self) -> EncryptedPayload {
        EncryptedPayload {
            nonce: self.nonce.clone(),
            cipher: self.cipher.clone(),
        }
    }

    pub fn from_payload(payload: &EncryptedPayload, mime: &str, size: u64) -> Self {
        Self {
            nonce: payload.nonce.clone(),
            cipher: payload.cipher.clone(),
            mime: mime.to_string(),
            size,
        }
    }
}

/// Encrypt a payload under the vault key with a fresh nonce. The plaintext
/// buffer is consumed and zeroized after sealing.
pub fn encrypt_blob(
    vault_key: &VaultKey,
    mut plaintext: Vec<u8>,
    mime: Option<&str>,
) -> Result<EncryptedBlob, KernelError> {
    let mime = match mime {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => DEFAULT_MIME.to_string(),
    };
    let size = plaintext.len() as u64;

    if mime.starts_with("video/") && size > MAX_VIDEO_BYTES {
        warn!(
            "video blob is large ({} MiB); consider trimming or splitting before encrypting",
            size / (1024 * 1024)
        );
    }

    let wrapped = seal(vault_key.as_bytes(), &plaintext)?;
    plaintext.zeroize();

    Ok(EncryptedBlob {
        nonce: wrapped.nonce,
        cipher: wrapped.cipher,
        mime,
        size,
    })
}

/// Decrypt a payload. Authentication failure of any kind raises
/// [`KernelError::DecryptionFailed`]; partial
/// or garbage plaintext is never returned.
pub fn decrypt_blob(
    vault_key: &VaultKey,
    encrypted: &EncryptedBlob,
) -> Result<Vec<u8>, KernelError> {
    let wrapped = crate::types::WrappedKey {
        nonce: encrypted.nonce.clone(),
        cipher: encrypted.cipher.clone(),
    };
    open(vault_key.as_bytes(), &wrapped)
}

/// Flip one bit inside a base64 field's decoded bytes and re-encode.
#[cfg(test)]
pub(crate) fn flip_bit_base64(value: &str, bit: usize) -> String {
    let mut bytes = crate::crypto::base64_decode(value).unwrap();
    bytes[bit / 8] ^= 1 << (bit % 8);
    base64_encode(&bytes)
}
