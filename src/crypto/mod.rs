//! Decoy Vault - Cryptographic Core
//!
//! Key management, blob codec, and chunked streaming over AES-256-GCM.

pub mod codec;
pub mod keystore;
pub mod stream;

pub use codec::{CryptoCodec, EncryptedBlob, TAG_LEN};
pub use keystore::{FileKeystore, Keystore, VaultKey, KEY_ALIAS, KEY_LEN, NONCE_LEN};
pub use stream::{CancelToken, CHUNK_SIZE};
