//! Cryptographic primitives: key derivation and wrapping, the authenticated
//! blob cipher, and custody-chain signing.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KernelError;
use crate::types::WrappedKey;

pub mod blob;
pub mod signing;
pub mod vault;

pub const KEY_BYTES: usize = 32;
pub const NONCE_BYTES: usize = 12;

/// 32-byte symmetric vault key. Zeroized on drop; the only copy handed out
/// of `create_vault`/`unlock_vault` is the one inside this wrapper.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_BYTES]);

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.0
    }
}

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub(crate) fn base64_decode(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.decode(value)
}

pub(crate) fn fresh_nonce() -> [u8; NONCE_BYTES] {
    let mut nonce = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with a fresh nonce, producing a
/// transport-encoded wrapper.
pub(crate) fn seal(key: &[u8; KEY_BYTES], plaintext: &[u8]) -> Result<WrappedKey, KernelError> {
    let nonce = fresh_nonce();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| KernelError::DecryptionFailed)?;
    Ok(WrappedKey {
        nonce: base64_encode(&nonce),
        cipher: base64_encode(&ciphertext),
    })
}

/// AEAD-open a wrapper. Any failure, from bad encoding to a wrong key or
/// tampered ciphertext, is the single [`KernelError::DecryptionFailed`].
pub(crate) fn open(key: &[u8; KEY_BYTES], wrapped: &WrappedKey) -> Result<Vec<u8>, KernelError> {
    let nonce = base64_decode(&wrapped.nonce).map_err(|_| KernelError::DecryptionFailed)?;
    let ciphertext = base64_decode(&wrapped.cipher).map_err(|_| KernelError::DecryptionFailed)?;
    if nonce.len() != NONCE_BYTES {
        return Err(KernelError::DecryptionFailed);
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| KernelError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = [7u8; KEY_BYTES];
        let wrapped = seal(&key, b"secret material").unwrap();
        assert_eq!(open(&key, &wrapped).unwrap(), b"secret material");
    }

    #[test]
    fn open_rejects_wrong_key() {
        let wrapped = seal(&[1u8; KEY_BYTES], b"secret").unwrap();
        let err = open(&[2u8; KEY_BYTES], &wrapped).unwrap_err();
        assert!(matches!(err, KernelError::DecryptionFailed));
    }

    #[test]
    fn open_rejects_bad_encoding() {
        let key = [3u8; KEY_BYTES];
        let wrapped = WrappedKey {
            nonce: "not base64 ***".into(),
            cipher: "also not".into(),
        };
        assert!(matches!(
            open(&key, &wrapped).unwrap_err(),
            KernelError::DecryptionFailed
        ));
    }
}
