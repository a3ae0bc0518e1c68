//! Decoy Vault - Record Store
//!
//! Four independent encrypted collections - files, folders, intruder logs,
//! notes - each persisted whole as one encrypted JSON array
//! (`nonce(12) || ciphertext+tag`, no base64) and rewritten atomically on
//! every mutation. Vault file counts are small (hundreds, not millions),
//! so whole-collection rewrite is a deliberate simplicity-over-scale
//! trade-off. Read-path corruption of any kind degrades to an empty
//! collection, never a crash.
//!
//! Caches are explicit fields owned by the store and refreshed on every
//! mutating call. Single-process only: concurrent external writers to the
//! same files are not supported.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::crypto::{CryptoCodec, EncryptedBlob};
use crate::error::{VaultError, VaultResult};
use crate::models::{
    FileType, IntruderLogRecord, NoteRecord, VaultFileRecord, VaultFolderRecord, VaultItem,
};

const FILES_FILE: &str = "vault_files.enc";
const FOLDERS_FILE: &str = "vault_folders.enc";
const INTRUDER_FILE: &str = "intruder_logs.enc";
const NOTES_FILE: &str = "notes.enc";

/// Encrypted metadata store, partitioned by vault identifier
pub struct VaultRecordStore {
    root: PathBuf,
    codec: Arc<CryptoCodec>,
    files: Mutex<Option<Vec<VaultFileRecord>>>,
    folders: Mutex<Option<Vec<VaultFolderRecord>>>,
    intruder_logs: Mutex<Option<Vec<IntruderLogRecord>>>,
    notes: Mutex<Option<Vec<NoteRecord>>>,
}

impl VaultRecordStore {
    pub fn new<P: AsRef<Path>>(root: P, codec: Arc<CryptoCodec>) -> VaultResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            codec,
            files: Mutex::new(None),
            folders: Mutex::new(None),
            intruder_logs: Mutex::new(None),
            notes: Mutex::new(None),
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // PERSISTENCE PRIMITIVES
    // ═══════════════════════════════════════════════════════════════════

    fn load_collection<T: DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let path = self.root.join(file);
        if !path.exists() {
            return Vec::new();
        }

        let parse = || -> VaultResult<Vec<T>> {
            let raw = fs::read(&path)?;
            let json = self.codec.decrypt(&EncryptedBlob::from_bytes(&raw)?)?;
            Ok(serde_json::from_slice(&json)?)
        };

        match parse() {
            Ok(list) => list,
            Err(e) => {
                // Corruption degrades to data loss, not crash
                warn!("collection {} unreadable, treating as empty: {}", file, e);
                Vec::new()
            }
        }
    }

    fn save_collection<T: Serialize>(&self, file: &str, list: &[T]) -> VaultResult<()> {
        let json = serde_json::to_vec(list)?;
        let bytes = self.codec.encrypt(&json)?.to_bytes();

        let path = self.root.join(file);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn with_cache<T, R>(
        cache: &Mutex<Option<Vec<T>>>,
        load: impl FnOnce() -> Vec<T>,
        f: impl FnOnce(&Vec<T>) -> R,
    ) -> R {
        let mut guard = cache.lock();
        let list = guard.get_or_insert_with(load);
        f(list)
    }

    fn mutate_cache<T: Serialize>(
        &self,
        cache: &Mutex<Option<Vec<T>>>,
        file: &str,
        load: impl FnOnce() -> Vec<T>,
        f: impl FnOnce(&mut Vec<T>),
    ) -> VaultResult<()> {
        let mut guard = cache.lock();
        let list = guard.get_or_insert_with(load);
        f(list);

        if let Err(e) = self.save_collection(file, list) {
            // Cache no longer matches disk; drop it so the next read reloads
            *guard = None;
            return Err(e);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // FILES
    // ═══════════════════════════════════════════════════════════════════

    /// All files of one vault, newest first
    pub fn files(&self, vault_id: &str) -> Vec<VaultFileRecord> {
        Self::with_cache(
            &self.files,
            || self.load_collection(FILES_FILE),
            |list| {
                let mut out: Vec<_> = list
                    .iter()
                    .filter(|f| f.vault_id == vault_id)
                    .cloned()
                    .collect();
                out.sort_by_key(|f| std::cmp::Reverse(f.date_added));
                out
            },
        )
    }

    pub fn files_by_type(&self, vault_id: &str, file_type: FileType) -> Vec<VaultFileRecord> {
        self.files(vault_id)
            .into_iter()
            .filter(|f| f.file_type == file_type)
            .collect()
    }

    /// Files directly inside a folder; `None` lists the vault root
    pub fn files_in_folder(
        &self,
        vault_id: &str,
        folder_id: Option<&str>,
    ) -> Vec<VaultFileRecord> {
        self.files(vault_id)
            .into_iter()
            .filter(|f| f.folder_id.as_deref() == folder_id)
            .collect()
    }

    pub fn add_file(&self, record: VaultFileRecord) -> VaultResult<()> {
        self.mutate_cache(
            &self.files,
            FILES_FILE,
            || self.load_collection(FILES_FILE),
            |list| list.push(record),
        )
    }

    pub fn remove_file(&self, record: &VaultFileRecord) -> VaultResult<()> {
        let id = record.id;
        self.mutate_cache(
            &self.files,
            FILES_FILE,
            || self.load_collection(FILES_FILE),
            |list| list.retain(|f| f.id != id),
        )
    }

    pub fn clear_files(&self, vault_id: &str) -> VaultResult<()> {
        self.mutate_cache(
            &self.files,
            FILES_FILE,
            || self.load_collection(FILES_FILE),
            |list| list.retain(|f| f.vault_id != vault_id),
        )
    }

    pub fn file_count(&self, vault_id: &str) -> usize {
        self.files(vault_id).len()
    }

    /// Sum of plaintext sizes recorded for one vault
    pub fn total_size(&self, vault_id: &str) -> u64 {
        self.files(vault_id).iter().map(|f| f.size).sum()
    }

    // ═══════════════════════════════════════════════════════════════════
    // FOLDERS
    // ═══════════════════════════════════════════════════════════════════

    /// Child folders of `parent` in one vault, newest first
    pub fn folders(&self, vault_id: &str, parent: Option<&str>) -> Vec<VaultFolderRecord> {
        Self::with_cache(
            &self.folders,
            || self.load_collection(FOLDERS_FILE),
            |list| {
                let mut out: Vec<_> = list
                    .iter()
                    .filter(|f| f.vault_id == vault_id && f.parent_folder_id.as_deref() == parent)
                    .cloned()
                    .collect();
                out.sort_by_key(|f| std::cmp::Reverse(f.date_created));
                out
            },
        )
    }

    pub fn all_folders(&self, vault_id: &str) -> Vec<VaultFolderRecord> {
        Self::with_cache(
            &self.folders,
            || self.load_collection(FOLDERS_FILE),
            |list| {
                list.iter()
                    .filter(|f| f.vault_id == vault_id)
                    .cloned()
                    .collect()
            },
        )
    }

    fn folder_exists(list: &[VaultFolderRecord], vault_id: &str, id: &str) -> bool {
        list.iter().any(|f| f.vault_id == vault_id && f.id == id)
    }

    /// Walk the parent chain from `start`; true if `target` appears.
    /// Bounded by the list length, so a pre-existing corrupt cycle cannot
    /// spin forever.
    fn chain_contains(
        list: &[VaultFolderRecord],
        vault_id: &str,
        start: Option<&str>,
        target: &str,
    ) -> bool {
        let mut current = start.map(str::to_owned);
        for _ in 0..=list.len() {
            match current {
                None => return false,
                Some(id) if id == target => return true,
                Some(id) => {
                    current = list
                        .iter()
                        .find(|f| f.vault_id == vault_id && f.id == id)
                        .and_then(|f| f.parent_folder_id.clone());
                }
            }
        }
        false
    }

    /// Add a folder. A declared parent must exist in the same vault, so
    /// the hierarchy stays a forest.
    pub fn add_folder(&self, record: VaultFolderRecord) -> VaultResult<()> {
        let mut guard = self.folders.lock();
        let list = guard.get_or_insert_with(|| self.load_collection(FOLDERS_FILE));

        if let Some(parent) = record.parent_folder_id.as_deref() {
            if !Self::folder_exists(list, &record.vault_id, parent) {
                return Err(VaultError::FolderNotFound(parent.to_string()));
            }
        }

        list.push(record);
        if let Err(e) = self.save_collection(FOLDERS_FILE, list) {
            *guard = None;
            return Err(e);
        }
        Ok(())
    }

    /// Reparent a folder, refusing moves that would make it its own
    /// ancestor
    pub fn move_folder(
        &self,
        vault_id: &str,
        folder_id: &str,
        new_parent: Option<&str>,
    ) -> VaultResult<()> {
        let mut guard = self.folders.lock();
        let list = guard.get_or_insert_with(|| self.load_collection(FOLDERS_FILE));

        if !Self::folder_exists(list, vault_id, folder_id) {
            return Err(VaultError::FolderNotFound(folder_id.to_string()));
        }

        if let Some(parent) = new_parent {
            if !Self::folder_exists(list, vault_id, parent) {
                return Err(VaultError::FolderNotFound(parent.to_string()));
            }
            if parent == folder_id
                || Self::chain_contains(list, vault_id, Some(parent), folder_id)
            {
                return Err(VaultError::FolderCycle);
            }
        }

        for folder in list.iter_mut() {
            if folder.vault_id == vault_id && folder.id == folder_id {
                folder.parent_folder_id = new_parent.map(str::to_owned);
            }
        }

        if let Err(e) = self.save_collection(FOLDERS_FILE, list) {
            *guard = None;
            return Err(e);
        }
        Ok(())
    }

    /// Delete a folder. Contained files are orphaned to the vault root
    /// (folder_id cleared), not deleted; child folders are reparented to
    /// the deleted folder's own parent. Files are persisted first: if the
    /// folder write then fails, some files sit at the root early, but no
    /// file ever references a folder that no longer exists.
    pub fn remove_folder(&self, record: &VaultFolderRecord) -> VaultResult<()> {
        let parent = record.parent_folder_id.clone();

        self.mutate_cache(
            &self.files,
            FILES_FILE,
            || self.load_collection(FILES_FILE),
            |list| {
                for file in list.iter_mut() {
                    if file.folder_id.as_deref() == Some(record.id.as_str()) {
                        file.folder_id = None;
                    }
                }
            },
        )?;

        self.mutate_cache(
            &self.folders,
            FOLDERS_FILE,
            || self.load_collection(FOLDERS_FILE),
            |list| {
                list.retain(|f| f.id != record.id);
                for folder in list.iter_mut() {
                    if folder.parent_folder_id.as_deref() == Some(record.id.as_str()) {
                        folder.parent_folder_id = parent.clone();
                    }
                }
            },
        )
    }

    /// One browsable listing: folders first, then files
    pub fn items(&self, vault_id: &str, parent: Option<&str>) -> Vec<VaultItem> {
        let mut items: Vec<VaultItem> = self
            .folders(vault_id, parent)
            .into_iter()
            .map(VaultItem::Folder)
            .collect();
        items.extend(
            self.files_in_folder(vault_id, parent)
                .into_iter()
                .map(VaultItem::File),
        );
        items
    }

    // ═══════════════════════════════════════════════════════════════════
    // INTRUDER LOGS
    // ═══════════════════════════════════════════════════════════════════

    /// All break-in records, newest first
    pub fn intruder_logs(&self) -> Vec<IntruderLogRecord> {
        Self::with_cache(
            &self.intruder_logs,
            || self.load_collection(INTRUDER_FILE),
            |list| {
                let mut out = list.clone();
                out.sort_by_key(|l| std::cmp::Reverse(l.timestamp));
                out
            },
        )
    }

    pub fn add_intruder_log(&self, record: IntruderLogRecord) -> VaultResult<()> {
        self.mutate_cache(
            &self.intruder_logs,
            INTRUDER_FILE,
            || self.load_collection(INTRUDER_FILE),
            |list| list.push(record),
        )
    }

    pub fn remove_intruder_log(&self, id: i64) -> VaultResult<()> {
        self.mutate_cache(
            &self.intruder_logs,
            INTRUDER_FILE,
            || self.load_collection(INTRUDER_FILE),
            |list| list.retain(|l| l.id != id),
        )
    }

    pub fn clear_intruder_logs(&self) -> VaultResult<()> {
        *self.intruder_logs.lock() = Some(Vec::new());
        let path = self.root.join(INTRUDER_FILE);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // NOTES
    // ═══════════════════════════════════════════════════════════════════

    /// Notes of one vault, most recently modified first
    pub fn notes(&self, vault_id: &str) -> Vec<NoteRecord> {
        Self::with_cache(
            &self.notes,
            || self.load_collection(NOTES_FILE),
            |list| {
                let mut out: Vec<_> = list
                    .iter()
                    .filter(|n| n.vault_id == vault_id)
                    .cloned()
                    .collect();
                out.sort_by_key(|n| std::cmp::Reverse(n.date_modified));
                out
            },
        )
    }

    /// Insert or replace by note id
    pub fn save_note(&self, note: NoteRecord) -> VaultResult<()> {
        self.mutate_cache(
            &self.notes,
            NOTES_FILE,
            || self.load_collection(NOTES_FILE),
            |list| {
                if let Some(existing) = list.iter_mut().find(|n| n.id == note.id) {
                    *existing = note;
                } else {
                    list.push(note);
                }
            },
        )
    }

    pub fn delete_note(&self, note_id: &str) -> VaultResult<()> {
        self.mutate_cache(
            &self.notes,
            NOTES_FILE,
            || self.load_collection(NOTES_FILE),
            |list| list.retain(|n| n.id != note_id),
        )
    }
}
