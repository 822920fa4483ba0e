//! Vault creation and unlock.
//!
//! The passphrase never touches disk. It derives a master key (Argon2id)
//! whose only job is to wrap the random vault key; the signing private key
//! is wrapped under the vault key, one indirection below. KDF cost
//! parameters are persisted with the salt; deriving a matching key later
//! depends on the exact parameters used at creation.

use anyhow::Result;
use argon2::{Algorithm, Argon2, Params, Version};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::{base64_decode, base64_encode, open, seal, VaultKey, KEY_BYTES};
use crate::error::KernelError;
use crate::store::EvidenceStore;
use crate::types::{KdfParams, VaultMeta, VaultStatus, PRIMARY_VAULT_ID};
use crate::now_ms;

pub const SALT_BYTES: usize = 16;
pub const KDF_ALG_ARGON2ID: &str = "argon2id";

/// libsodium MODERATE equivalents: 256 MiB, 3 passes, 1 lane.
/// Seconds-scale on commodity hardware, by design.
pub fn default_kdf_params() -> KdfParams {
    KdfParams {
        alg: KDF_ALG_ARGON2ID.to_string(),
        m_cost_kib: 256 * 1024,
        t_cost: 3,
        parallelism: 1,
        salt_bytes: SALT_BYTES as u32,
        key_bytes: KEY_BYTES as u32,
    }
}

pub struct CreatedVault {
    pub meta: VaultMeta,
    pub vault_key: VaultKey,
}

fn derive_master_key(
    passphrase: &str,
    salt: &[u8],
    kdf: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_BYTES]>, KernelError> {
    if kdf.alg != KDF_ALG_ARGON2ID || kdf.key_bytes as usize != KEY_BYTES {
        return Err(KernelError::InvalidPassphrase);
    }
    let params = Params::new(
        kdf.m_cost_kib,
        kdf.t_cost,
        kdf.parallelism,
        Some(KEY_BYTES),
    )
    .map_err(|_| KernelError::InvalidPassphrase)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut master_key = Zeroizing::new([0u8; KEY_BYTES]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut master_key[..])
        .map_err(|_| KernelError::InvalidPassphrase)?;
    Ok(master_key)
}

/// Create the primary vault: derive the master key, generate the vault key
/// and signing keypair, wrap both, persist the metadata unlocked, and hand
/// the vault key back. All intermediate secret buffers zeroize on drop.
pub fn create_vault(
    store: &mut dyn EvidenceStore,
    vault_name: &str,
    passphrase: &str,
) -> Result<CreatedVault> {
    create_vault_with_params(store, vault_name, passphrase, default_kdf_params())
}

pub fn create_vault_with_params(
    store: &mut dyn EvidenceStore,
    vault_name: &str,
    passphrase: &str,
    kdf_params: KdfParams,
) -> Result<CreatedVault> {
    let mut salt = vec![0u8; kdf_params.salt_bytes as usize];
    rand::thread_rng().fill_bytes(&mut salt);

    let master_key = derive_master_key(passphrase, &salt, &kdf_params)?;
    let vault_key = VaultKey::generate();

    let signing_key = SigningKey::generate(&mut OsRng);
    let signing_public = signing_key.verifying_key();
    let signing_secret = Zeroizing::new(signing_key.to_bytes());

    let wrapped_vault_key = seal(&master_key, vault_key.as_bytes())?;
    let wrapped_signing_key = seal(vault_key.as_bytes(), signing_secret.as_ref())?;

    let now = now_ms()?;
    let meta = VaultMeta {
        id: PRIMARY_VAULT_ID.to_string(),
        created_at: now,
        updated_at: now,
        vault_name: vault_name.to_string(),
        status: VaultStatus::Unlocked,
        salt: base64_encode(&salt),
        kdf_params,
        wrapped_vault_key,
        signing_public_key: Some(base64_encode(signing_public.as_bytes())),
        wrapped_signing_key: Some(wrapped_signing_key),
    };
    store.put_vault_meta(&meta)?;

    Ok(CreatedVault { meta, vault_key })
}

/// Re-derive the master key and unwrap the vault key.
///
/// Every failure mode (missing or incomplete metadata, undecodable salt,
/// AEAD rejection) surfaces as the same [`KernelError::InvalidPassphrase`]
/// so the caller cannot be used as a corruption-vs-passphrase oracle. The
/// derived master key zeroizes on every path.
pub fn unlock_vault(
    store: &dyn EvidenceStore,
    passphrase: &str,
) -> Result<(VaultMeta, VaultKey)> {
    let meta = store
        .vault_meta()?
        .ok_or(KernelError::InvalidPassphrase)?;

    let salt = base64_decode(&meta.salt).map_err(|_| KernelError::InvalidPassphrase)?;
    let master_key = derive_master_key(passphrase, &salt, &meta.kdf_params)?;

    let unwrapped = Zeroizing::new(
        open(&master_key, &meta.wrapped_vault_key)
            .map_err(|_| KernelError::InvalidPassphrase)?,
    );
    if unwrapped.len() != KEY_BYTES {
        return Err(KernelError::InvalidPassphrase.into());
    }
    let mut key_bytes = [0u8; KEY_BYTES];
    key_bytes.copy_from_slice(&unwrapped);

    Ok((meta, VaultKey::from_bytes(key_bytes)))
}

#[cfg(test)]
pub(crate) fn test_kdf_params() -> KdfParams {
    KdfParams {
        alg: KDF_ALG_ARGON2ID.to_string(),
        m_cost_kib: 8,
        t_cost: 1,
        parallelism: 1,
        salt_bytes: SALT_BYTES as u32,
        key_bytes: KEY_BYTES as u32,
    }
}
