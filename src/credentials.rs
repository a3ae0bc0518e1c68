//! Decoy Vault - Credential Store
//!
//! Durable storage for PIN hashes, per-vault identifiers, feature flags,
//! and the failed-attempt lockout state. The whole credential set is one
//! JSON document encrypted with the vault key; if the keystore backend is
//! broken on this device the store degrades to a plaintext fallback file
//! rather than crash - an explicit availability-over-confidentiality
//! trade-off for settings only (vault content is encrypted separately and
//! never degrades).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::crypto::{CryptoCodec, EncryptedBlob, Keystore};
use crate::error::VaultResult;
use crate::models::{FAKE_VAULT, MAIN_VAULT};

const ENCRYPTED_FILE: &str = "credentials.enc";
const FALLBACK_FILE: &str = "credentials.json";

/// A user-defined vault beyond the built-in main and fake pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomVaultConfig {
    pub id: String,
    pub pin_hash: String,
    pub name: String,
}

/// The persisted credential set. PIN hashes are one-way SHA-256 hex
/// digests - the raw PIN is never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialSet {
    pin_hash: Option<String>,
    fake_pin_hash: Option<String>,
    #[serde(default)]
    custom_vaults: Vec<CustomVaultConfig>,
    #[serde(default)]
    biometric_enabled: bool,
    #[serde(default)]
    intruder_detection_enabled: bool,
    #[serde(default)]
    fake_vault_enabled: bool,
    #[serde(default)]
    first_setup_complete: bool,
    #[serde(default)]
    failed_attempts: u32,
    #[serde(default)]
    last_failed_at_ms: i64,
}

enum Backend {
    Encrypted(CryptoCodec),
    Plaintext,
}

/// Credential store with an in-memory copy of the set, rewritten whole
/// on every mutation
pub struct CredentialStore {
    path: PathBuf,
    backend: Backend,
    state: Mutex<CredentialSet>,
}

fn hash_pin(pin: &str) -> String {
    hex::encode(Sha256::digest(pin.as_bytes()))
}

/// Lockout escalation table, a pure function of the failure count
pub fn lock_duration_for(failed_attempts: u32) -> u64 {
    match failed_attempts {
        n if n >= 5 => 30_000,
        4 => 15_000,
        3 => 5_000,
        _ => 0,
    }
}

impl CredentialStore {
    /// Open the store under `root`. A healthy keystore gives the encrypted
    /// backend; an unavailable one falls back to plaintext settings.
    pub fn open<P: AsRef<Path>>(root: P, keystore: &dyn Keystore) -> Self {
        let root = root.as_ref();

        let (backend, path) = match keystore.load_or_generate() {
            Ok(key) => (
                Backend::Encrypted(CryptoCodec::new(key)),
                root.join(ENCRYPTED_FILE),
            ),
            Err(e) => {
                warn!("keystore unavailable, settings degrade to plaintext: {}", e);
                (Backend::Plaintext, root.join(FALLBACK_FILE))
            }
        };

        let store = Self {
            path,
            backend,
            state: Mutex::new(CredentialSet::default()),
        };

        *store.state.lock() = store.load();
        store
    }

    fn load(&self) -> CredentialSet {
        if !self.path.exists() {
            return CredentialSet::default();
        }

        let parse = || -> VaultResult<CredentialSet> {
            let raw = fs::read(&self.path)?;
            let json = match &self.backend {
                Backend::Encrypted(codec) => codec.decrypt(&EncryptedBlob::from_bytes(&raw)?)?,
                Backend::Plaintext => raw,
            };
            Ok(serde_json::from_slice(&json)?)
        };

        match parse() {
            Ok(set) => set,
            Err(e) => {
                warn!("credential store unreadable, starting empty: {}", e);
                CredentialSet::default()
            }
        }
    }

    fn persist(&self, set: &CredentialSet) -> VaultResult<()> {
        let json = serde_json::to_vec(set)?;
        let bytes = match &self.backend {
            Backend::Encrypted(codec) => codec.encrypt(&json)?.to_bytes(),
            Backend::Plaintext => json,
        };

        // Atomic replace so a mid-write crash cannot leave a torn set
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate<F: FnOnce(&mut CredentialSet)>(&self, f: F) -> VaultResult<()> {
        let mut state = self.state.lock();
        f(&mut state);
        self.persist(&state)
    }

    /// True when settings are actually encrypted (keystore healthy)
    pub fn is_encrypted(&self) -> bool {
        matches!(self.backend, Backend::Encrypted(_))
    }

    // ═══════════════════════════════════════════════════════════════════
    // PIN MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════

    pub fn set_pin(&self, pin: &str) -> VaultResult<()> {
        self.mutate(|s| s.pin_hash = Some(hash_pin(pin)))
    }

    pub fn set_fake_pin(&self, pin: &str) -> VaultResult<()> {
        self.mutate(|s| s.fake_pin_hash = Some(hash_pin(pin)))
    }

    pub fn has_pin(&self) -> bool {
        self.state.lock().pin_hash.is_some()
    }

    /// Map an entered PIN to a vault identifier. One hash, compared in
    /// fixed priority: main wins over fake, fake over custom vaults, and
    /// custom vaults match in registration order - so a PIN colliding
    /// across vaults resolves deterministically.
    pub fn verify_pin(&self, pin: &str) -> Option<String> {
        let hash = hash_pin(pin);
        let state = self.state.lock();

        if state.pin_hash.as_deref() == Some(hash.as_str()) {
            return Some(MAIN_VAULT.to_string());
        }

        if state.fake_vault_enabled && state.fake_pin_hash.as_deref() == Some(hash.as_str()) {
            return Some(FAKE_VAULT.to_string());
        }

        state
            .custom_vaults
            .iter()
            .find(|v| v.pin_hash == hash)
            .map(|v| v.id.clone())
    }

    // ═══════════════════════════════════════════════════════════════════
    // CUSTOM VAULTS
    // ═══════════════════════════════════════════════════════════════════

    pub fn custom_vaults(&self) -> Vec<CustomVaultConfig> {
        self.state.lock().custom_vaults.clone()
    }

    /// Register a new custom vault, returning its generated identifier.
    /// Files of a deleted vault remain on disk but become unreachable
    /// unless a vault is recreated with an identical PIN.
    pub fn add_custom_vault(&self, name: &str, pin: &str) -> VaultResult<String> {
        let id = Uuid::new_v4().to_string();
        let config = CustomVaultConfig {
            id: id.clone(),
            pin_hash: hash_pin(pin),
            name: name.to_string(),
        };
        self.mutate(|s| s.custom_vaults.push(config))?;
        Ok(id)
    }

    pub fn delete_custom_vault(&self, id: &str) -> VaultResult<()> {
        self.mutate(|s| s.custom_vaults.retain(|v| v.id != id))
    }

    // ═══════════════════════════════════════════════════════════════════
    // FEATURE FLAGS
    // ═══════════════════════════════════════════════════════════════════

    pub fn biometric_enabled(&self) -> bool {
        self.state.lock().biometric_enabled
    }

    pub fn set_biometric_enabled(&self, enabled: bool) -> VaultResult<()> {
        self.mutate(|s| s.biometric_enabled = enabled)
    }

    pub fn intruder_detection_enabled(&self) -> bool {
        self.state.lock().intruder_detection_enabled
    }

    pub fn set_intruder_detection_enabled(&self, enabled: bool) -> VaultResult<()> {
        self.mutate(|s| s.intruder_detection_enabled = enabled)
    }

    pub fn fake_vault_enabled(&self) -> bool {
        self.state.lock().fake_vault_enabled
    }

    pub fn set_fake_vault_enabled(&self, enabled: bool) -> VaultResult<()> {
        self.mutate(|s| s.fake_vault_enabled = enabled)
    }

    pub fn first_setup_complete(&self) -> bool {
        self.state.lock().first_setup_complete
    }

    pub fn set_first_setup_complete(&self, complete: bool) -> VaultResult<()> {
        self.mutate(|s| s.first_setup_complete = complete)
    }

    // ═══════════════════════════════════════════════════════════════════
    // FAILED ATTEMPTS / LOCKOUT
    // ═══════════════════════════════════════════════════════════════════

    pub fn failed_attempts(&self) -> u32 {
        self.state.lock().failed_attempts
    }

    pub fn record_failed_attempt(&self) -> VaultResult<()> {
        self.mutate(|s| {
            s.failed_attempts += 1;
            s.last_failed_at_ms = Utc::now().timestamp_millis();
        })
    }

    pub fn reset_failed_attempts(&self) -> VaultResult<()> {
        self.mutate(|s| s.failed_attempts = 0)
    }

    /// Current lockout duration in milliseconds (0 when not escalated)
    pub fn lock_duration_ms(&self) -> u64 {
        lock_duration_for(self.state.lock().failed_attempts)
    }

    /// Lockout is a pure function of wall-clock time elapsed since the
    /// last failure - no timers, so it survives process restarts.
    pub fn is_locked_at(&self, now_ms: i64) -> bool {
        let state = self.state.lock();
        let duration = lock_duration_for(state.failed_attempts);
        duration > 0 && (now_ms - state.last_failed_at_ms) < duration as i64
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Utc::now().timestamp_millis())
    }

    pub fn lock_remaining_seconds_at(&self, now_ms: i64) -> u64 {
        let state = self.state.lock();
        let duration = lock_duration_for(state.failed_attempts) as i64;
        let elapsed = now_ms - state.last_failed_at_ms;
        ((duration - elapsed).max(0) / 1000) as u64
    }

    pub fn lock_remaining_seconds(&self) -> u64 {
        self.lock_remaining_seconds_at(Utc::now().timestamp_millis())
    }

    #[cfg(test)]
    pub(crate) fn force_lock_state(&self, failed_attempts: u32, last_failed_at_ms: i64) {
        let mut state = self.state.lock();
        state.failed_attempts = failed_attempts;
        state.last_failed_at_ms = last_failed_at_ms;
    }
}
