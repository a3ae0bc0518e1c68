//! End-to-end scenarios across the whole core: authentication, import,
//! export, deletion, and vault partitioning.

use std::io::Cursor;
use std::path::Path;

use decoy_vault::{
    AuthState, FileType, VaultCore, VaultError, FAKE_VAULT, MAIN_VAULT,
};

fn enter_pin(core: &VaultCore, pin: &str) -> Result<AuthState, VaultError> {
    let mut last = Ok(core.session.state());
    for c in pin.chars() {
        last = core.session.push_digit(c as u8 - b'0');
    }
    last
}

fn sample_jpeg() -> Vec<u8> {
    let mut img = image::RgbImage::new(400, 300);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
    }
    let mut jpeg = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();
    jpeg
}

#[test]
fn import_export_delete_photo_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let core = VaultCore::open(dir.path()).unwrap();
    core.credentials.set_pin("1234").unwrap();

    let state = enter_pin(&core, "1234").unwrap();
    assert_eq!(
        state,
        AuthState::Authenticated {
            vault_id: MAIN_VAULT.into()
        }
    );

    // Import
    let jpeg = sample_jpeg();
    let record = core
        .files
        .import_file(&mut Cursor::new(&jpeg), MAIN_VAULT, "beach.jpg", "image/jpeg")
        .unwrap();
    core.records.add_file(record.clone()).unwrap();

    assert_eq!(record.file_type, FileType::Photo);
    assert_eq!(record.size, jpeg.len() as u64);
    assert!(Path::new(&record.encrypted_path).exists());
    assert!(Path::new(record.thumbnail_path.as_deref().unwrap()).exists());
    assert_eq!(core.records.files(MAIN_VAULT).len(), 1);

    // Export recovers the byte-identical JPEG
    let out_path = dir.path().join("exported.jpg");
    core.files.export_to_path(&record, &out_path).unwrap();
    assert_eq!(std::fs::read(&out_path).unwrap(), jpeg);

    // Delete removes both blobs and the record
    assert!(core.files.delete_file(&record));
    core.records.remove_file(&record).unwrap();

    assert!(!Path::new(&record.encrypted_path).exists());
    assert!(!Path::new(record.thumbnail_path.as_deref().unwrap()).exists());
    assert!(core.records.files(MAIN_VAULT).is_empty());
}

#[test]
fn main_fake_and_unknown_pin_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let core = VaultCore::open(dir.path()).unwrap();

    core.credentials.set_pin("1234").unwrap();
    core.credentials.set_fake_pin("4321").unwrap();
    core.credentials.set_fake_vault_enabled(true).unwrap();

    assert_eq!(
        core.credentials.verify_pin("1234").as_deref(),
        Some(MAIN_VAULT)
    );
    assert_eq!(
        core.credentials.verify_pin("4321").as_deref(),
        Some(FAKE_VAULT)
    );
    assert_eq!(core.credentials.verify_pin("9999"), None);
}

#[test]
fn decoy_vault_sees_only_its_own_files() {
    let dir = tempfile::tempdir().unwrap();
    let core = VaultCore::open(dir.path()).unwrap();
    core.credentials.set_pin("1234").unwrap();
    core.credentials.set_fake_pin("4321").unwrap();
    core.credentials.set_fake_vault_enabled(true).unwrap();

    let real = core
        .files
        .import_file(
            &mut Cursor::new(b"real secret".as_slice()),
            MAIN_VAULT,
            "real.txt",
            "text/plain",
        )
        .unwrap();
    core.records.add_file(real).unwrap();

    let decoy = core
        .files
        .import_file(
            &mut Cursor::new(b"harmless".as_slice()),
            FAKE_VAULT,
            "harmless.txt",
            "text/plain",
        )
        .unwrap();
    core.records.add_file(decoy).unwrap();

    let state = enter_pin(&core, "4321").unwrap();
    let AuthState::Authenticated { vault_id } = state else {
        panic!("expected authentication");
    };
    assert_eq!(vault_id, FAKE_VAULT);

    let visible = core.records.files(&vault_id);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].original_name, "harmless.txt");
}

#[test]
fn third_failure_locks_and_further_entry_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let core = VaultCore::open(dir.path()).unwrap();
    core.credentials.set_pin("1234").unwrap();

    // First two failures: plain wrong-PIN
    for _ in 0..2 {
        assert!(matches!(
            enter_pin(&core, "0000"),
            Err(VaultError::WrongPin)
        ));
    }

    // Third failure engages the lockout ladder
    assert!(matches!(
        enter_pin(&core, "0000"),
        Err(VaultError::Locked { .. })
    ));
    assert!(core.credentials.is_locked());

    // Subsequent digit entry is rejected outright, even the correct PIN,
    // and the failure counter does not advance
    let attempts_before = core.credentials.failed_attempts();
    assert!(matches!(
        core.session.push_digit(1),
        Err(VaultError::Locked { .. })
    ));
    assert_eq!(core.credentials.failed_attempts(), attempts_before);

    let remaining = core.credentials.lock_remaining_seconds();
    assert!(remaining > 0 && remaining <= 30);
}

#[test]
fn records_survive_reopen_with_same_keystore() {
    let dir = tempfile::tempdir().unwrap();

    let record = {
        let core = VaultCore::open(dir.path()).unwrap();
        core.credentials.set_pin("1234").unwrap();

        let record = core
            .files
            .import_file(
                &mut Cursor::new(b"persistent".as_slice()),
                MAIN_VAULT,
                "keep.bin",
                "application/octet-stream",
            )
            .unwrap();
        core.records.add_file(record.clone()).unwrap();
        record
    };

    let core = VaultCore::open(dir.path()).unwrap();
    assert_eq!(core.credentials.verify_pin("1234").as_deref(), Some(MAIN_VAULT));

    let files = core.records.files(MAIN_VAULT);
    assert_eq!(files.len(), 1);

    let mut exported = Vec::new();
    core.files.export_file(&files[0], &mut exported).unwrap();
    assert_eq!(exported, b"persistent");
    assert_eq!(files[0].id, record.id);
}
