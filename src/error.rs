use thiserror::Error;

/// Failure taxonomy for the custody kernel.
///
/// Unlock and decryption failures are deliberately undifferentiated: a caller
/// (or an attacker driving the caller) must not be able to tell a wrong
/// passphrase from a corrupted wrapper. Chain verification is *not* here;
/// it is an expected outcome surfaced as a report, not an error.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Unlock failed. Covers wrong passphrase, missing or incomplete vault
    /// metadata, and a corrupted key wrapper alike.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// AEAD authentication failed: wrong key, corrupted ciphertext, or
    /// tampering. Terminal for the operation in progress; never retried.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The vault has no wrapped signing key.
    #[error("signing key unavailable")]
    SigningKeyUnavailable,

    /// Review-mode export requested while the vault is locked.
    #[error("missing vault key for review-mode export")]
    MissingVaultKey,

    /// Two custody events for one item reference the same predecessor.
    /// This is a corruption signal, not a state the chain may extend.
    #[error("custody chain for item {item_id} is forked at {prev_hash}")]
    ChainForked { item_id: String, prev_hash: String },

    /// A custody-log line could not be parsed. Recovered locally during
    /// verification and reported as an itemized issue.
    #[error("malformed custody log entry at line {line}: {reason}")]
    MalformedLogEntry { line: usize, reason: String },
}
