//! Decoy Vault - File Vault Manager
//!
//! Streams plaintext file content into per-vault-partition storage
//! directories as encrypted blobs, generates encrypted thumbnails for
//! photos, and produces the metadata records the record store persists.
//!
//! Partition layout under the storage root:
//!
//! ```text
//! vault/            main vault blobs (opaque UUID names)
//! fake_vault/       decoy vault blobs
//! vault_<id>/       custom vault blobs
//! thumbnails/       <name>_thumb.enc, JPEG plaintext, same framing
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use image::imageops::FilterType;
use log::{info, warn};
use uuid::Uuid;

use crate::crypto::{CancelToken, CryptoCodec};
use crate::error::{VaultError, VaultResult};
use crate::models::{FileType, VaultFileRecord, FAKE_VAULT, MAIN_VAULT};

/// Default bounding box for generated thumbnails
pub const THUMB_SIZE: u32 = 256;

/// Counts bytes passing through, optionally keeping a copy for
/// thumbnail generation
struct TeeReader<'a, R: Read> {
    inner: &'a mut R,
    count: u64,
    capture: Option<Vec<u8>>,
}

impl<'a, R: Read> TeeReader<'a, R> {
    fn new(inner: &'a mut R, capture: bool) -> Self {
        Self {
            inner,
            count: 0,
            capture: capture.then(Vec::new),
        }
    }
}

impl<R: Read> Read for TeeReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        if let Some(captured) = self.capture.as_mut() {
            captured.extend_from_slice(&buf[..n]);
        }
        Ok(n)
    }
}

/// Orchestrates encryption of actual file content, per vault partition
pub struct FileVaultManager {
    root: PathBuf,
    codec: Arc<CryptoCodec>,
    thumb_size: u32,
}

impl FileVaultManager {
    pub fn new<P: AsRef<Path>>(root: P, codec: Arc<CryptoCodec>) -> VaultResult<Self> {
        let manager = Self {
            root: root.as_ref().to_path_buf(),
            codec,
            thumb_size: THUMB_SIZE,
        };
        fs::create_dir_all(manager.partition_dir(MAIN_VAULT))?;
        fs::create_dir_all(manager.partition_dir(FAKE_VAULT))?;
        fs::create_dir_all(manager.thumbnail_dir())?;
        Ok(manager)
    }

    fn partition_dir(&self, vault_id: &str) -> PathBuf {
        match vault_id {
            MAIN_VAULT => self.root.join("vault"),
            FAKE_VAULT => self.root.join("fake_vault"),
            custom => self.root.join(format!("vault_{}", custom)),
        }
    }

    fn thumbnail_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    // ═══════════════════════════════════════════════════════════════════
    // IMPORT
    // ═══════════════════════════════════════════════════════════════════

    /// Stream `reader` into the vault partition as an encrypted blob and
    /// return the populated metadata record. Nothing visible is left
    /// behind if any step fails: ciphertext goes to a temp path first and
    /// is renamed only after a clean finalize.
    pub fn import_file<R: Read>(
        &self,
        reader: &mut R,
        vault_id: &str,
        original_name: &str,
        mime_type: &str,
    ) -> VaultResult<VaultFileRecord> {
        self.import_file_cancellable(reader, vault_id, original_name, mime_type, &CancelToken::new())
    }

    /// Cancellation-aware import: the token is checked per chunk, and a
    /// cancelled (or failed) import deletes its partial output and
    /// creates no record.
    pub fn import_file_cancellable<R: Read>(
        &self,
        reader: &mut R,
        vault_id: &str,
        original_name: &str,
        mime_type: &str,
        cancel: &CancelToken,
    ) -> VaultResult<VaultFileRecord> {
        let file_type = FileType::from_mime_type(mime_type);
        let encrypted_name = Uuid::new_v4().to_string();

        let partition = self.partition_dir(vault_id);
        fs::create_dir_all(&partition)?;
        let dest = partition.join(&encrypted_name);
        let tmp = partition.join(format!("{}.tmp", encrypted_name));

        // Photos keep a plaintext copy in memory for the thumbnail; the
        // image decoder needs the whole file anyway.
        let mut tee = TeeReader::new(reader, file_type == FileType::Photo);

        let write_result = (|| -> VaultResult<()> {
            let mut out = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)?;
            self.codec
                .encrypt_stream_cancellable(&mut tee, &mut out, cancel)?;
            out.sync_all()?;
            fs::rename(&tmp, &dest)?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        let thumbnail_path = match tee.capture.as_deref() {
            Some(plaintext) => self.generate_thumbnail(plaintext, &encrypted_name),
            None => None,
        };

        Ok(VaultFileRecord {
            id: Utc::now().timestamp_millis(),
            original_name: original_name.to_string(),
            encrypted_name,
            mime_type: mime_type.to_string(),
            file_type,
            size: tee.count,
            encrypted_path: dest.to_string_lossy().into_owned(),
            thumbnail_path,
            date_added: Utc::now().timestamp_millis(),
            vault_id: vault_id.to_string(),
            folder_id: None,
        })
    }

    /// Downscale, JPEG-encode, and encrypt a thumbnail. Failure is
    /// non-fatal: the record simply carries no thumbnail.
    fn generate_thumbnail(&self, plaintext: &[u8], name: &str) -> Option<String> {
        let result = (|| -> VaultResult<PathBuf> {
            let img = image::load_from_memory(plaintext)
                .map_err(|e| VaultError::FormatCorruption(e.to_string()))?;

            let thumb = img.resize(self.thumb_size, self.thumb_size, FilterType::Lanczos3);
            let mut jpeg = Vec::new();
            thumb
                .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
                .map_err(|e| VaultError::FormatCorruption(e.to_string()))?;

            let path = self.thumbnail_dir().join(format!("{}_thumb.enc", name));
            let mut out = File::create(&path)?;
            self.codec.encrypt_stream(&mut Cursor::new(&jpeg), &mut out)?;
            out.sync_all()?;
            Ok(path)
        })();

        match result {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                warn!("thumbnail generation failed for {}: {}", name, e);
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════

    /// Stream-decrypt a record's blob into `writer`. A record whose blob
    /// was deleted out-of-band surfaces as `FileNotFound`, not
    /// corruption.
    pub fn export_file<W: Write>(
        &self,
        record: &VaultFileRecord,
        writer: &mut W,
    ) -> VaultResult<u64> {
        let path = Path::new(&record.encrypted_path);
        if !path.exists() {
            return Err(VaultError::FileNotFound(record.encrypted_path.clone()));
        }

        let mut input = File::open(path)?;
        self.codec.decrypt_stream(&mut input, writer)
    }

    /// Export into a new plaintext file; a failed decrypt leaves no
    /// partial output behind
    pub fn export_to_path<P: AsRef<Path>>(
        &self,
        record: &VaultFileRecord,
        dest: P,
    ) -> VaultResult<u64> {
        let dest = dest.as_ref();
        let mut out = File::create(dest)?;

        match self.export_file(record, &mut out) {
            Ok(written) => {
                out.sync_all()?;
                Ok(written)
            }
            Err(e) => {
                drop(out);
                let _ = fs::remove_file(dest);
                Err(e)
            }
        }
    }

    /// Decrypt a record's thumbnail to JPEG bytes
    pub fn decrypt_thumbnail(&self, record: &VaultFileRecord) -> VaultResult<Vec<u8>> {
        let path = record
            .thumbnail_path
            .as_deref()
            .ok_or_else(|| VaultError::FileNotFound("no thumbnail".into()))?;

        if !Path::new(path).exists() {
            return Err(VaultError::FileNotFound(path.to_string()));
        }

        let mut input = File::open(path)?;
        let mut jpeg = Vec::new();
        self.codec.decrypt_stream(&mut input, &mut jpeg)?;
        Ok(jpeg)
    }

    // ═══════════════════════════════════════════════════════════════════
    // DELETE / WIPE / SIZE
    // ═══════════════════════════════════════════════════════════════════

    /// Remove the encrypted blob and its thumbnail. Idempotent: already
    /// missing files count as deleted.
    pub fn delete_file(&self, record: &VaultFileRecord) -> bool {
        let mut ok = true;

        let blob = Path::new(&record.encrypted_path);
        if blob.exists() && fs::remove_file(blob).is_err() {
            ok = false;
        }

        if let Some(thumb) = record.thumbnail_path.as_deref() {
            let thumb = Path::new(thumb);
            if thumb.exists() && fs::remove_file(thumb).is_err() {
                ok = false;
            }
        }

        ok
    }

    /// On-disk bytes of all encrypted blobs in one partition
    pub fn vault_size_bytes(&self, vault_id: &str) -> VaultResult<u64> {
        let dir = self.partition_dir(vault_id);
        let mut size = 0u64;

        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if entry.path().is_file() {
                    size += entry.metadata()?.len();
                }
            }
        }

        Ok(size)
    }

    /// Delete and recreate a partition's storage directories. Wiping the
    /// main vault clears the shared thumbnail directory with it.
    pub fn wipe_vault(&self, vault_id: &str) -> VaultResult<()> {
        info!("wiping vault partition {}", vault_id);

        let dir = self.partition_dir(vault_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        if vault_id == MAIN_VAULT {
            let thumbs = self.thumbnail_dir();
            if thumbs.exists() {
                fs::remove_dir_all(&thumbs)?;
            }
            fs::create_dir_all(&thumbs)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::VaultKey;
    use tempfile::tempdir;

    fn manager(root: &Path) -> FileVaultManager {
        let codec = Arc::new(CryptoCodec::new(VaultKey::generate()));
        FileVaultManager::new(root, codec).unwrap()
    }

    fn sample_jpeg() -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(640, 480);
        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();
        jpeg
    }

    #[test]
    fn test_import_export_roundtrip() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());

        let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 256) as u8).collect();
        let record = m
            .import_file(
                &mut Cursor::new(&payload),
                MAIN_VAULT,
                "report.pdf",
                "application/pdf",
            )
            .unwrap();

        assert_eq!(record.file_type, FileType::Document);
        assert_eq!(record.size, 50_000);
        assert!(record.thumbnail_path.is_none());
        assert!(Path::new(&record.encrypted_path).exists());
        // Ciphertext on disk differs from plaintext
        let on_disk = fs::read(&record.encrypted_path).unwrap();
        assert_ne!(on_disk, payload);

        let mut exported = Vec::new();
        m.export_file(&record, &mut exported).unwrap();
        assert_eq!(exported, payload);
    }

    #[test]
    fn test_import_photo_creates_thumbnail() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());
        let jpeg = sample_jpeg();

        let record = m
            .import_file(
                &mut Cursor::new(&jpeg),
                MAIN_VAULT,
                "holiday.jpg",
                "image/jpeg",
            )
            .unwrap();

        assert_eq!(record.file_type, FileType::Photo);
        assert_eq!(record.size, jpeg.len() as u64);

        let thumb_path = record.thumbnail_path.as_deref().unwrap();
        assert!(Path::new(thumb_path).exists());

        let thumb_jpeg = m.decrypt_thumbnail(&record).unwrap();
        let thumb = image::load_from_memory(&thumb_jpeg).unwrap();
        let (w, h) = image::GenericImageView::dimensions(&thumb);
        assert!(w <= THUMB_SIZE && h <= THUMB_SIZE);
    }

    #[test]
    fn test_unreadable_photo_still_imports_without_thumbnail() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());

        // Declared as an image but not decodable
        let record = m
            .import_file(
                &mut Cursor::new(b"not really a jpeg".as_slice()),
                MAIN_VAULT,
                "broken.jpg",
                "image/jpeg",
            )
            .unwrap();

        assert_eq!(record.file_type, FileType::Photo);
        assert!(record.thumbnail_path.is_none());

        let mut exported = Vec::new();
        m.export_file(&record, &mut exported).unwrap();
        assert_eq!(exported, b"not really a jpeg");
    }

    #[test]
    fn test_cancelled_import_leaves_nothing() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());

        let token = CancelToken::new();
        token.cancel();

        let payload = vec![7u8; 100_000];
        let result = m.import_file_cancellable(
            &mut Cursor::new(&payload),
            MAIN_VAULT,
            "cancelled.bin",
            "application/octet-stream",
            &token,
        );

        assert!(matches!(result, Err(VaultError::Cancelled)));
        assert_eq!(m.vault_size_bytes(MAIN_VAULT).unwrap(), 0);
        // No temp file left behind either
        let leftovers = fs::read_dir(m.partition_dir(MAIN_VAULT)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());
        let jpeg = sample_jpeg();

        let record = m
            .import_file(&mut Cursor::new(&jpeg), MAIN_VAULT, "x.jpg", "image/jpeg")
            .unwrap();

        assert!(m.delete_file(&record));
        assert!(!Path::new(&record.encrypted_path).exists());
        assert!(!Path::new(record.thumbnail_path.as_deref().unwrap()).exists());

        // Second delete of missing files still succeeds
        assert!(m.delete_file(&record));
    }

    #[test]
    fn test_export_missing_blob_is_not_found() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());

        let record = m
            .import_file(
                &mut Cursor::new(b"bytes".as_slice()),
                MAIN_VAULT,
                "gone.bin",
                "application/octet-stream",
            )
            .unwrap();
        fs::remove_file(&record.encrypted_path).unwrap();

        let mut out = Vec::new();
        assert!(matches!(
            m.export_file(&record, &mut out),
            Err(VaultError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_vault_size_and_wipe_are_partitioned() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());

        m.import_file(
            &mut Cursor::new(vec![1u8; 10_000]),
            MAIN_VAULT,
            "a.bin",
            "application/octet-stream",
        )
        .unwrap();
        m.import_file(
            &mut Cursor::new(vec![2u8; 5_000]),
            FAKE_VAULT,
            "b.bin",
            "application/octet-stream",
        )
        .unwrap();

        assert!(m.vault_size_bytes(MAIN_VAULT).unwrap() > 10_000);
        let fake_size = m.vault_size_bytes(FAKE_VAULT).unwrap();
        assert!(fake_size > 5_000);

        m.wipe_vault(MAIN_VAULT).unwrap();
        assert_eq!(m.vault_size_bytes(MAIN_VAULT).unwrap(), 0);
        // The decoy partition is untouched
        assert_eq!(m.vault_size_bytes(FAKE_VAULT).unwrap(), fake_size);
    }

    #[test]
    fn test_custom_vault_partition() {
        let dir = tempdir().unwrap();
        let m = manager(dir.path());

        let record = m
            .import_file(
                &mut Cursor::new(b"custom".as_slice()),
                "3f2c9a10-aaaa-bbbb-cccc-000000000001",
                "c.bin",
                "application/octet-stream",
            )
            .unwrap();

        assert!(record
            .encrypted_path
            .contains("vault_3f2c9a10-aaaa-bbbb-cccc-000000000001"));
    }
}
