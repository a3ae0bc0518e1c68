//! Decoy Vault - Authentication Policy
//!
//! The PIN entry state machine sitting between the calculator surface and
//! the credential store. Digits accumulate until the fixed PIN length is
//! reached, then verification maps the PIN to a vault identifier or
//! drives the escalating lockout. Lockout is recomputed from wall-clock
//! time on every attempt - no timers, so it holds across process
//! restarts. A rejection never reveals which vault almost matched.

use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

use crate::credentials::CredentialStore;
use crate::error::{VaultError, VaultResult};
use crate::models::{IntruderLogRecord, MAIN_VAULT};
use crate::records::VaultRecordStore;

/// Fixed PIN length that triggers verification
pub const PIN_LENGTH: usize = 4;

/// Failed attempts at which break-in capture engages
const BREAK_IN_THRESHOLD: u32 = 3;

/// Host-side break-in hook: camera capture and the high-priority
/// notification live behind this seam. Returns the path of a captured
/// intruder photo, if the host managed to take one.
pub trait BreakInObserver: Send + Sync {
    fn on_break_in(&self, attempt_count: u32) -> Option<String>;
}

/// Where the session currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Locked { remaining_seconds: u64 },
    AwaitingPin { entered: usize },
    Authenticated { vault_id: String },
}

/// One interactive authentication session
pub struct AuthSession {
    credentials: Arc<CredentialStore>,
    records: Arc<VaultRecordStore>,
    observer: Option<Arc<dyn BreakInObserver>>,
    digits: Mutex<String>,
    authenticated: Mutex<Option<String>>,
}

impl AuthSession {
    pub fn new(credentials: Arc<CredentialStore>, records: Arc<VaultRecordStore>) -> Self {
        Self {
            credentials,
            records,
            observer: None,
            digits: Mutex::new(String::new()),
            authenticated: Mutex::new(None),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BreakInObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> AuthState {
        if let Some(vault_id) = self.authenticated.lock().clone() {
            return AuthState::Authenticated { vault_id };
        }
        if self.credentials.is_locked() {
            return AuthState::Locked {
                remaining_seconds: self.credentials.lock_remaining_seconds(),
            };
        }
        AuthState::AwaitingPin {
            entered: self.digits.lock().len(),
        }
    }

    pub fn current_vault(&self) -> Option<String> {
        self.authenticated.lock().clone()
    }

    /// Drop back to the entry state, forgetting any partial digits
    pub fn reset(&self) {
        self.digits.lock().clear();
        *self.authenticated.lock() = None;
    }

    /// Feed one digit. While locked, entry is rejected outright with the
    /// remaining time - stored hashes are never consulted. Reaching the
    /// PIN length submits automatically.
    pub fn push_digit(&self, digit: u8) -> VaultResult<AuthState> {
        if digit > 9 {
            return Err(VaultError::FormatCorruption(format!(
                "not a digit: {}",
                digit
            )));
        }

        if self.credentials.is_locked() {
            self.digits.lock().clear();
            return Err(VaultError::Locked {
                remaining_seconds: self.credentials.lock_remaining_seconds(),
            });
        }

        let pin = {
            let mut digits = self.digits.lock();
            digits.push((b'0' + digit) as char);
            if digits.len() < PIN_LENGTH {
                return Ok(AuthState::AwaitingPin {
                    entered: digits.len(),
                });
            }
            std::mem::take(&mut *digits)
        };

        self.verify(&pin)
    }

    fn verify(&self, pin: &str) -> VaultResult<AuthState> {
        match self.credentials.verify_pin(pin) {
            Some(vault_id) => {
                self.credentials.reset_failed_attempts()?;
                *self.authenticated.lock() = Some(vault_id.clone());
                Ok(AuthState::Authenticated { vault_id })
            }
            None => {
                self.credentials.record_failed_attempt()?;
                let attempts = self.credentials.failed_attempts();

                if self.credentials.intruder_detection_enabled()
                    && attempts >= BREAK_IN_THRESHOLD
                {
                    self.capture_break_in(attempts);
                }

                if self.credentials.is_locked() {
                    return Err(VaultError::Locked {
                        remaining_seconds: self.credentials.lock_remaining_seconds(),
                    });
                }
                Err(VaultError::WrongPin)
            }
        }
    }

    fn capture_break_in(&self, attempt_count: u32) {
        let photo_path = self
            .observer
            .as_ref()
            .and_then(|o| o.on_break_in(attempt_count));

        let log = IntruderLogRecord::new(attempt_count, photo_path);
        if let Err(e) = self.records.add_intruder_log(log) {
            warn!("failed to persist intruder log: {}", e);
        }
    }

    /// Alternate path straight into the main vault, independent of any
    /// partial digit state. Still refused while locked.
    pub fn biometric_unlock(&self) -> VaultResult<AuthState> {
        if !self.credentials.biometric_enabled() {
            return Err(VaultError::BiometricUnavailable);
        }

        if self.credentials.is_locked() {
            return Err(VaultError::Locked {
                remaining_seconds: self.credentials.lock_remaining_seconds(),
            });
        }

        self.credentials.reset_failed_attempts()?;
        self.digits.lock().clear();
        *self.authenticated.lock() = Some(MAIN_VAULT.to_string());
        Ok(AuthState::Authenticated {
            vault_id: MAIN_VAULT.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CryptoCodec, FileKeystore, VaultKey};
    use crate::models::FAKE_VAULT;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    fn session(root: &Path) -> AuthSession {
        let credentials = Arc::new(CredentialStore::open(root, &FileKeystore::new(root)));
        let codec = Arc::new(CryptoCodec::new(VaultKey::generate()));
        let records = Arc::new(VaultRecordStore::new(root, codec).unwrap());
        AuthSession::new(credentials, records)
    }

    fn enter(session: &AuthSession, pin: &str) -> VaultResult<AuthState> {
        let mut last = Ok(session.state());
        for c in pin.chars() {
            last = session.push_digit(c as u8 - b'0');
        }
        last
    }

    #[test]
    fn test_pin_accumulates_then_authenticates() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.credentials.set_pin("1234").unwrap();

        assert_eq!(
            s.push_digit(1).unwrap(),
            AuthState::AwaitingPin { entered: 1 }
        );
        assert_eq!(
            s.push_digit(2).unwrap(),
            AuthState::AwaitingPin { entered: 2 }
        );
        assert_eq!(
            s.push_digit(3).unwrap(),
            AuthState::AwaitingPin { entered: 3 }
        );
        assert_eq!(
            s.push_digit(4).unwrap(),
            AuthState::Authenticated {
                vault_id: MAIN_VAULT.into()
            }
        );
        assert_eq!(s.current_vault().as_deref(), Some(MAIN_VAULT));
    }

    #[test]
    fn test_main_fake_and_unknown_pins() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.credentials.set_pin("1234").unwrap();
        s.credentials.set_fake_pin("4321").unwrap();
        s.credentials.set_fake_vault_enabled(true).unwrap();

        assert_eq!(
            enter(&s, "1234").unwrap(),
            AuthState::Authenticated {
                vault_id: MAIN_VAULT.into()
            }
        );

        s.reset();
        assert_eq!(
            enter(&s, "4321").unwrap(),
            AuthState::Authenticated {
                vault_id: FAKE_VAULT.into()
            }
        );

        s.reset();
        assert!(matches!(enter(&s, "9999"), Err(VaultError::WrongPin)));
    }

    #[test]
    fn test_success_resets_failure_counter() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.credentials.set_pin("1234").unwrap();

        enter(&s, "0000").unwrap_err();
        enter(&s, "0000").unwrap_err();
        assert_eq!(s.credentials.failed_attempts(), 2);

        enter(&s, "1234").unwrap();
        assert_eq!(s.credentials.failed_attempts(), 0);
    }

    #[test]
    fn test_lockout_after_repeated_failures() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.credentials.set_pin("1234").unwrap();

        // Three misses engage the 5s tier
        enter(&s, "0000").unwrap_err();
        enter(&s, "0000").unwrap_err();
        let third = enter(&s, "0000");
        assert!(matches!(third, Err(VaultError::Locked { .. })));

        // While locked, digit entry is rejected before any hash check -
        // even digits of the correct PIN
        let rejected = s.push_digit(1);
        assert!(matches!(rejected, Err(VaultError::Locked { .. })));
        assert_eq!(s.credentials.failed_attempts(), 3);
    }

    #[test]
    fn test_locked_state_reports_remaining() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.credentials.set_pin("1234").unwrap();

        for _ in 0..5 {
            s.credentials.record_failed_attempt().unwrap();
        }

        match s.state() {
            AuthState::Locked { remaining_seconds } => {
                assert!(remaining_seconds <= 30);
                assert!(remaining_seconds >= 28);
            }
            other => panic!("expected Locked, got {:?}", other),
        }
    }

    struct CountingObserver {
        calls: AtomicU32,
    }

    impl BreakInObserver for CountingObserver {
        fn on_break_in(&self, _attempt_count: u32) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some("/captures/intruder.jpg".into())
        }
    }

    #[test]
    fn test_break_in_capture_at_threshold() {
        let dir = tempdir().unwrap();
        let observer = Arc::new(CountingObserver {
            calls: AtomicU32::new(0),
        });
        let s = session(dir.path()).with_observer(observer.clone());
        s.credentials.set_pin("1234").unwrap();
        s.credentials.set_intruder_detection_enabled(true).unwrap();

        enter(&s, "0000").unwrap_err();
        enter(&s, "0000").unwrap_err();
        assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
        assert!(s.records.intruder_logs().is_empty());

        // Third failure crosses the threshold
        enter(&s, "0000").unwrap_err();
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);

        let logs = s.records.intruder_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].attempt_count, 3);
        assert_eq!(logs[0].photo_path.as_deref(), Some("/captures/intruder.jpg"));
    }

    #[test]
    fn test_no_capture_when_detection_disabled() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.credentials.set_pin("1234").unwrap();

        for _ in 0..3 {
            enter(&s, "0000").unwrap_err();
        }
        assert!(s.records.intruder_logs().is_empty());
    }

    #[test]
    fn test_biometric_path() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.credentials.set_pin("1234").unwrap();

        assert!(matches!(
            s.biometric_unlock(),
            Err(VaultError::BiometricUnavailable)
        ));

        s.credentials.set_biometric_enabled(true).unwrap();
        enter(&s, "0000").unwrap_err();
        assert_eq!(s.credentials.failed_attempts(), 1);

        let state = s.biometric_unlock().unwrap();
        assert_eq!(
            state,
            AuthState::Authenticated {
                vault_id: MAIN_VAULT.into()
            }
        );
        assert_eq!(s.credentials.failed_attempts(), 0);
    }

    #[test]
    fn test_non_digit_rejected() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        assert!(s.push_digit(10).is_err());
    }
}
