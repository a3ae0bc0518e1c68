//! # Decoy Vault
//!
//! Core security subsystem of a decoy-calculator file vault: an encrypted
//! file store hidden behind a calculator surface, unlocked by entering a
//! PIN as a "calculation", with an optional decoy vault and break-in
//! detection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    DECOY VAULT CORE                      │
//! │  ┌──────────────┐   ┌──────────────┐   ┌─────────────┐   │
//! │  │ AUTH SESSION │   │ FILE VAULT   │   │ RECORD      │   │
//! │  │ PIN + lockout│   │ AES-256-GCM  │   │ STORE       │   │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬──────┘   │
//! │         │                  │                  │          │
//! │  ┌──────┴───────┐   ┌──────┴──────────────────┴──────┐   │
//! │  │ CREDENTIAL   │   │         CRYPTO CODEC           │   │
//! │  │ STORE        │   │  blob + 8 KiB chunked stream   │   │
//! │  └──────────────┘   └──────────────┬─────────────────┘   │
//! │                                    │                     │
//! │                          ┌─────────┴─────────┐           │
//! │                          │     KEYSTORE      │           │
//! │                          │ one 256-bit key,  │           │
//! │                          │ created lazily    │           │
//! │                          └───────────────────┘           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - All file content and metadata encrypted with AES-256-GCM, fresh
//!   random 12-byte nonce per operation, tag verified on every read
//! - One hardware-backed master key, never exported, never rotated
//! - PINs stored as SHA-256 digests only; a PIN maps to at most one
//!   vault, main > fake > custom in deterministic priority
//! - Vaults are partitioned by identifier, not by key: the decoy vault
//!   is an access-control illusion, not a cryptographic boundary
//! - Escalating lockout derived from wall-clock time, surviving restarts

pub mod auth;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod files;
pub mod models;
pub mod records;

pub use auth::{AuthSession, AuthState, BreakInObserver, PIN_LENGTH};
pub use credentials::{CredentialStore, CustomVaultConfig};
pub use crypto::{CancelToken, CryptoCodec, EncryptedBlob, FileKeystore, Keystore, VaultKey};
pub use error::{VaultError, VaultResult};
pub use files::FileVaultManager;
pub use models::{
    FileType, IntruderLogRecord, NoteRecord, VaultFileRecord, VaultFolderRecord, VaultItem,
    FAKE_VAULT, MAIN_VAULT,
};
pub use records::VaultRecordStore;

use std::path::Path;
use std::sync::Arc;

/// Decoy Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wires the whole core together over one storage root: keystore,
/// codec, credential store, record store, file manager, and a fresh
/// authentication session.
pub struct VaultCore {
    pub credentials: Arc<CredentialStore>,
    pub records: Arc<VaultRecordStore>,
    pub files: Arc<FileVaultManager>,
    pub session: AuthSession,
}

impl VaultCore {
    /// Open (or initialize) the vault core under `root` with the default
    /// file-backed keystore
    pub fn open<P: AsRef<Path>>(root: P) -> VaultResult<Self> {
        let root = root.as_ref();
        let keystore = FileKeystore::new(root.join("keystore"));
        Self::open_with_keystore(root, &keystore)
    }

    /// Open with a host-provided keystore backend. Content crypto is
    /// fatal without a key; only the credential store degrades.
    pub fn open_with_keystore<P: AsRef<Path>>(
        root: P,
        keystore: &dyn Keystore,
    ) -> VaultResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;

        let credentials = Arc::new(CredentialStore::open(root, keystore));

        let key = keystore.load_or_generate()?;
        let codec = Arc::new(CryptoCodec::new(key));

        let records = Arc::new(VaultRecordStore::new(root, Arc::clone(&codec))?);
        let files = Arc::new(FileVaultManager::new(root, codec)?);
        let session = AuthSession::new(Arc::clone(&credentials), Arc::clone(&records));

        Ok(Self {
            credentials,
            records,
            files,
            session,
        })
    }

    /// Attach the host's break-in hook to the session
    pub fn with_observer(mut self, observer: Arc<dyn BreakInObserver>) -> Self {
        self.session = self.session.with_observer(observer);
        self
    }
}
