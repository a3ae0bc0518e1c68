//! Decoy Vault - Key Management
//!
//! One long-lived 256-bit AES key under a fixed alias, created lazily on
//! first use and never rotated or exported. On Android the backing store is
//! the hardware keystore; this crate models it behind the [`Keystore`] trait
//! so the host can plug its platform backend in, with [`FileKeystore`] as the
//! default file-backed implementation.

use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, Secret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{VaultError, VaultResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Fixed alias under which the master key lives
pub const KEY_ALIAS: &str = "vault_master_key";

/// Secure key wrapper with automatic zeroization
#[derive(Clone, ZeroizeOnDrop)]
pub struct VaultKey {
    #[zeroize(skip)]
    inner: Secret<[u8; KEY_LEN]>,
}

impl VaultKey {
    /// Create a new vault key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = Self::new(bytes);
        bytes.zeroize();
        key
    }
}

/// Secure key storage backend.
///
/// `load_or_generate` must be idempotent: the first call creates the key,
/// every later call returns the same key without regeneration. A broken
/// backend yields [`VaultError::KeystoreUnavailable`], which is fatal for
/// every vault operation - silently falling back to an unprotected key
/// would break the security contract.
pub trait Keystore: Send + Sync {
    fn load_or_generate(&self) -> VaultResult<VaultKey>;
}

/// File-backed keystore: raw key bytes under the fixed alias inside a
/// directory the host treats as secure storage.
pub struct FileKeystore {
    dir: PathBuf,
}

impl FileKeystore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_ALIAS)
    }
}

impl Keystore for FileKeystore {
    fn load_or_generate(&self) -> VaultResult<VaultKey> {
        let path = self.key_path();

        if path.exists() {
            let bytes = fs::read(&path)
                .map_err(|e| VaultError::KeystoreUnavailable(e.to_string()))?;

            let mut raw: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
                VaultError::KeystoreUnavailable(format!(
                    "key file has {} bytes, expected {}",
                    bytes.len(),
                    KEY_LEN
                ))
            })?;

            let key = VaultKey::new(raw);
            raw.zeroize();
            return Ok(key);
        }

        fs::create_dir_all(&self.dir)
            .map_err(|e| VaultError::KeystoreUnavailable(e.to_string()))?;

        let key = VaultKey::generate();
        fs::write(&path, key.expose())
            .map_err(|e| VaultError::KeystoreUnavailable(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&path, fs::Permissions::from_mode(0o600));
        }

        Ok(key)
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}
