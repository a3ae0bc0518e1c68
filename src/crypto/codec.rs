//! Decoy Vault - AEAD Codec
//!
//! Stateless AES-256-GCM operations over byte buffers. All persisted
//! formats share one framing: the 12-byte nonce is always the first bytes
//! of the encoded stream, ciphertext (with trailing 16-byte tag) follows.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::keystore::{generate_nonce, VaultKey, NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// GCM authentication tag size
pub const TAG_LEN: usize = 16;

/// Encrypted payload with nonce prepended on serialization
pub struct EncryptedBlob {
    /// Fresh random nonce, never reused under the same key
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with trailing authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Serialize to bytes (nonce || ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Deserialize from bytes
    pub fn from_bytes(data: &[u8]) -> VaultResult<Self> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::FormatCorruption("blob too short".into()));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[..NONCE_LEN]);

        Ok(Self {
            nonce,
            ciphertext: data[NONCE_LEN..].to_vec(),
        })
    }
}

/// Stateless authenticated-encryption codec over the single vault key
pub struct CryptoCodec {
    key: VaultKey,
}

impl CryptoCodec {
    pub fn new(key: VaultKey) -> Self {
        Self { key }
    }

    pub(crate) fn cipher(&self) -> VaultResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.key.expose())
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))
    }

    /// Encrypt a byte buffer with a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<EncryptedBlob> {
        let cipher = self.cipher()?;
        let nonce = generate_nonce();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedBlob { nonce, ciphertext })
    }

    /// Decrypt a blob, failing on any tag mismatch - never returns
    /// partial or garbage plaintext
    pub fn decrypt(&self, blob: &EncryptedBlob) -> VaultResult<Vec<u8>> {
        let cipher = self.cipher()?;

        cipher
            .decrypt(Nonce::from_slice(&blob.nonce), blob.ciphertext.as_slice())
            .map_err(|_| VaultError::AuthenticationFailed)
    }

    /// Encrypt a string to base64(nonce || ciphertext), for serialized
    /// metadata payloads
    pub fn encrypt_text(&self, plaintext: &str) -> VaultResult<String> {
        let blob = self.encrypt(plaintext.as_bytes())?;
        Ok(BASE64.encode(blob.to_bytes()))
    }

    /// Reverse of [`encrypt_text`](Self::encrypt_text)
    pub fn decrypt_text(&self, encoded: &str) -> VaultResult<String> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| VaultError::FormatCorruption(e.to_string()))?;

        let blob = EncryptedBlob::from_bytes(&combined)?;
        let plaintext = self.decrypt(&blob)?;

        String::from_utf8(plaintext)
            .map_err(|e| VaultError::FormatCorruption(e.to_string()))
    }
}
