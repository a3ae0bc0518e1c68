//! Decoy Vault - Record Types
//!
//! Metadata records persisted (encrypted) by the record store. Every record
//! carries a vault identifier - the flat string namespace ("main", "fake",
//! or a generated id for a custom vault) that partitions all stored data.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Vault identifier of the primary vault
pub const MAIN_VAULT: &str = "main";

/// Vault identifier of the decoy vault
pub const FAKE_VAULT: &str = "fake";

/// Broad file classification derived from the declared MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Photo,
    Video,
    Document,
    Audio,
    Other,
}

impl FileType {
    pub fn from_mime_type(mime: &str) -> Self {
        if mime.starts_with("image/") {
            FileType::Photo
        } else if mime.starts_with("video/") {
            FileType::Video
        } else if mime.starts_with("audio/") {
            FileType::Audio
        } else if mime.starts_with("application/pdf")
            || mime.starts_with("application/msword")
            || mime.starts_with("application/vnd")
            || mime.starts_with("text/")
        {
            FileType::Document
        } else {
            FileType::Other
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FileType::Photo => "Photo",
            FileType::Video => "Video",
            FileType::Document => "Document",
            FileType::Audio => "Audio",
            FileType::Other => "Other",
        }
    }
}

/// One stored file: identity, classification, and where its encrypted
/// blob (and optional thumbnail blob) lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFileRecord {
    /// Epoch-millis id, unique within a single device
    pub id: i64,
    pub original_name: String,
    /// Opaque storage name of the encrypted blob
    pub encrypted_name: String,
    pub mime_type: String,
    pub file_type: FileType,
    /// Plaintext size in bytes
    pub size: u64,
    pub encrypted_path: String,
    pub thumbnail_path: Option<String>,
    /// Epoch millis
    pub date_added: i64,
    pub vault_id: String,
    pub folder_id: Option<String>,
}

impl VaultFileRecord {
    pub fn extension(&self) -> &str {
        self.original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("")
    }

    pub fn formatted_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;
        const GB: u64 = 1024 * MB;
        match self.size {
            s if s < KB => format!("{} B", s),
            s if s < MB => format!("{} KB", s / KB),
            s if s < GB => format!("{} MB", s / MB),
            s => format!("{} GB", s / GB),
        }
    }
}

/// A folder in the vault's browse hierarchy. Folders form a forest:
/// `parent_folder_id = None` means root, and the record store rejects
/// parent chains that would cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFolderRecord {
    pub id: String,
    pub name: String,
    /// Epoch millis
    pub date_created: i64,
    pub vault_id: String,
    pub parent_folder_id: Option<String>,
}

impl VaultFolderRecord {
    pub fn new(name: impl Into<String>, vault_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            date_created: Utc::now().timestamp_millis(),
            vault_id: vault_id.into(),
            parent_folder_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_folder_id = Some(parent_id.into());
        self
    }
}

/// Append-only break-in record, written on repeated failed PIN attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntruderLogRecord {
    pub id: i64,
    /// Epoch millis
    pub timestamp: i64,
    /// Host-captured photo, if the camera was available
    pub photo_path: Option<String>,
    /// Failed-attempt counter at capture time
    pub attempt_count: u32,
}

impl IntruderLogRecord {
    pub fn new(attempt_count: u32, photo_path: Option<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: now,
            timestamp: now,
            photo_path,
            attempt_count,
        }
    }
}

/// Secure note, stored alongside files in the same vault partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Epoch millis
    pub date_modified: i64,
    pub vault_id: String,
}

impl NoteRecord {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        vault_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            date_modified: Utc::now().timestamp_millis(),
            vault_id: vault_id.into(),
        }
    }
}

/// One entry of a browsable vault listing - files and folders in a
/// single list, as a tagged union rather than trait objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VaultItem {
    Folder(VaultFolderRecord),
    File(VaultFileRecord),
}
