//! Custody-chain signing under the vault's Ed25519 key.
//!
//! The signing private key lives wrapped under the vault key. It is
//! unwrapped into a zeroizing buffer for the duration of one signing
//! operation and dropped immediately after.

use anyhow::Result;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

use crate::crypto::{base64_decode, base64_encode, open, VaultKey};
use crate::error::KernelError;
use crate::now_ms;
use crate::store::EvidenceStore;

/// Detached signature plus the verification key, transport-encoded.
#[derive(Clone, Debug)]
pub struct SignedHash {
    pub signature: String,
    pub public_key: String,
}

/// Unwrap the signing key under the vault key. The verifying key is taken
/// from the stored metadata when present, otherwise derived from the secret
/// and persisted back so later verifiers can find it.
pub fn load_signing_keys(
    store: &mut dyn EvidenceStore,
    vault_key: &VaultKey,
) -> Result<(SigningKey, VerifyingKey)> {
    let meta = store
        .vault_meta()?
        .ok_or(KernelError::SigningKeyUnavailable)?;
    let wrapped = meta
        .wrapped_signing_key
        .as_ref()
        .ok_or(KernelError::SigningKeyUnavailable)?;

    let secret = Zeroizing::new(open(vault_key.as_bytes(), wrapped)?);
    if secret.len() != ed25519_dalek::SECRET_KEY_LENGTH {
        return Err(KernelError::DecryptionFailed.into());
    }
    let mut seed = Zeroizing::new([0u8; ed25519_dalek::SECRET_KEY_LENGTH]);
    seed.copy_from_slice(&secret);
    let signing_key = SigningKey::from_bytes(&seed);

    let verifying_key = match meta.signing_public_key.as_deref() {
        Some(encoded) => decode_public_key(encoded)?,
        None => {
            let derived = signing_key.verifying_key();
            store.set_signing_public_key(&base64_encode(derived.as_bytes()), now_ms()?)?;
            derived
        }
    };

    Ok((signing_key, verifying_key))
}

/// Produce a detached signature over the UTF-8 bytes of `hash`.
pub fn sign_hash(
    store: &mut dyn EvidenceStore,
    vault_key: &VaultKey,
    hash: &str,
) -> Result<SignedHash> {
    let (signing_key, verifying_key) = load_signing_keys(store, vault_key)?;
    let signature = signing_key.sign(hash.as_bytes());
    // SigningKey zeroizes its seed on drop; nothing else holds the secret.
    drop(signing_key);

    Ok(SignedHash {
        signature: base64_encode(&signature.to_bytes()),
        public_key: base64_encode(verifying_key.as_bytes()),
    })
}

pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey> {
    let bytes = base64_decode(encoded)?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("signing public key must be 32 bytes"))?;
    Ok(VerifyingKey::from_bytes(&bytes)?)
}

/// Check a detached base64 signature over the UTF-8 bytes of `hash`.
pub fn verify_hash_signature(public_key: &str, hash: &str, signature: &str) -> Result<()> {
    let verifying_key = decode_public_key(public_key)?;
    let sig_bytes = base64_decode(signature)?;
    let sig_bytes: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("signature must be 64 bytes"))?;
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(hash.as_bytes(), &signature)
        .map_err(|e| anyhow::anyhow!("signature verification failed: {e}"))
}
