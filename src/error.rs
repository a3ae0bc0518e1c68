//! Decoy Vault - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    /// The secure key backend cannot be read or is corrupted. Fatal for
    /// all vault crypto - there is no degraded fallback for content keys.
    #[error("Keystore unavailable: {0}")]
    KeystoreUnavailable(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Ciphertext or nonce failed GCM tag verification - tampered,
    /// corrupted, or encrypted under a different key.
    #[error("Authentication failed - data corrupted or tampered")]
    AuthenticationFailed,

    // ═══════════════════════════════════════════════════════════════
    // AUTHENTICATION / LOCKOUT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Wrong PIN")]
    WrongPin,

    #[error("Too many failed attempts - locked for {remaining_seconds}s")]
    Locked { remaining_seconds: u64 },

    #[error("Biometric unlock is not enabled")]
    BiometricUnavailable,

    // ═══════════════════════════════════════════════════════════════
    // FILE / FOLDER ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Folder move would create a cycle")]
    FolderCycle,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════
    // FORMAT ERRORS
    // ═══════════════════════════════════════════════════════════════

    /// Decryption succeeded but the payload is not what was expected
    /// (truncated framing, malformed JSON, bad header).
    #[error("Format corruption: {0}")]
    FormatCorruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VaultError {
    /// True for errors that must halt the whole vault subsystem rather
    /// than degrade - the host decides whether the device is supported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VaultError::KeystoreUnavailable(_))
    }

    /// True for errors the record-store layer absorbs into an
    /// empty-collection fallback instead of propagating.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            VaultError::AuthenticationFailed | VaultError::FormatCorruption(_)
        )
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}
