//! Decoy Vault - Streaming Encryption
//!
//! Chunked AES-256-GCM (STREAM, 32-bit BE counter) for large files, so
//! memory stays O(chunk size) rather than O(file size).
//!
//! On-disk framing (canonical, v1 - no compatibility kept with any
//! legacy length-prefixed IV scheme):
//!
//! ```text
//! [NONCE 12B]   random; first 7 bytes seed the STREAM prefix, the
//!               remaining 5 are consumed by the per-chunk counter
//! [CHUNK]*      8 KiB plaintext per chunk -> 8208 bytes ciphertext+tag
//! [LAST CHUNK]  <= 8 KiB, tagged as final; present even for empty input
//! ```

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aead::generic_array::GenericArray;
use aead::stream::{DecryptorBE32, EncryptorBE32};

use super::codec::{CryptoCodec, TAG_LEN};
use super::keystore::{generate_nonce, NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// Plaintext bytes per chunk
pub const CHUNK_SIZE: usize = 8 * 1024;

/// STREAM nonce prefix length (AEAD nonce minus 4-byte counter and
/// 1-byte last-block flag)
const STREAM_PREFIX_LEN: usize = 7;

/// Cooperative cancellation flag shared between the host's background
/// executor and an in-flight stream operation.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Fill `buf` as far as the reader allows; short only at end of input
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl CryptoCodec {
    /// Stream-encrypt `reader` into `writer`, nonce first
    pub fn encrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> VaultResult<u64> {
        self.encrypt_stream_cancellable(reader, writer, &CancelToken::new())
    }

    /// Cancellation-aware variant, checked once per chunk. The caller owns
    /// cleanup of whatever was already written.
    pub fn encrypt_stream_cancellable<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        cancel: &CancelToken,
    ) -> VaultResult<u64> {
        let nonce = generate_nonce();
        writer.write_all(&nonce)?;
        let mut written = NONCE_LEN as u64;

        let mut encryptor = EncryptorBE32::from_aead(
            self.cipher()?,
            GenericArray::from_slice(&nonce[..STREAM_PREFIX_LEN]),
        );

        let mut cur = vec![0u8; CHUNK_SIZE];
        let mut next = vec![0u8; CHUNK_SIZE];
        let mut cur_len = read_full(reader, &mut cur)?;

        loop {
            if cancel.is_cancelled() {
                return Err(VaultError::Cancelled);
            }

            // A short chunk only happens at end of input; a full chunk is
            // last iff nothing follows it.
            let next_len = if cur_len < CHUNK_SIZE {
                0
            } else {
                read_full(reader, &mut next)?
            };

            if cur_len < CHUNK_SIZE || next_len == 0 {
                let ct = encryptor
                    .encrypt_last(&cur[..cur_len])
                    .map_err(|_| VaultError::EncryptionFailed("stream finalize".into()))?;
                writer.write_all(&ct)?;
                written += ct.len() as u64;
                break;
            }

            let ct = encryptor
                .encrypt_next(&cur[..cur_len])
                .map_err(|_| VaultError::EncryptionFailed("stream chunk".into()))?;
            writer.write_all(&ct)?;
            written += ct.len() as u64;

            std::mem::swap(&mut cur, &mut next);
            cur_len = next_len;
        }

        writer.flush()?;
        Ok(written)
    }

    /// Stream-decrypt `reader` into `writer`; fails with
    /// [`VaultError::AuthenticationFailed`] on any tag mismatch
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> VaultResult<u64> {
        let mut nonce = [0u8; NONCE_LEN];
        reader
            .read_exact(&mut nonce)
            .map_err(|_| VaultError::FormatCorruption("missing nonce header".into()))?;

        let mut decryptor = DecryptorBE32::from_aead(
            self.cipher()?,
            GenericArray::from_slice(&nonce[..STREAM_PREFIX_LEN]),
        );

        const CT_CHUNK: usize = CHUNK_SIZE + TAG_LEN;
        let mut cur = vec![0u8; CT_CHUNK];
        let mut next = vec![0u8; CT_CHUNK];
        let mut cur_len = read_full(reader, &mut cur)?;
        let mut written = 0u64;

        loop {
            if cur_len < TAG_LEN {
                return Err(VaultError::FormatCorruption("truncated stream".into()));
            }

            let next_len = if cur_len < CT_CHUNK {
                0
            } else {
                read_full(reader, &mut next)?
            };

            if cur_len < CT_CHUNK || next_len == 0 {
                let pt = decryptor
                    .decrypt_last(&cur[..cur_len])
                    .map_err(|_| VaultError::AuthenticationFailed)?;
                writer.write_all(&pt)?;
                written += pt.len() as u64;
                break;
            }

            let pt = decryptor
                .decrypt_next(&cur[..cur_len])
                .map_err(|_| VaultError::AuthenticationFailed)?;
            writer.write_all(&pt)?;
            written += pt.len() as u64;

            std::mem::swap(&mut cur, &mut next);
            cur_len = next_len;
        }

        writer.flush()?;
        Ok(written)
    }
}
