//! Session key management.
//!
//! A [`KeySession`] holds the two passphrases for the lifetime of a login and
//! derives the master and data keys from them on demand. Passphrases are
//! zeroized when the session is cleared or dropped.

use tracing::{debug, warn};

use twinkey_common::{Error, Passphrase, Result};
use twinkey_crypto::{decrypt, derive_session_key, encrypt, SymmetricKey};

/// Plaintext round-tripped by [`KeySession::test_encryption`].
const PROBE_PLAINTEXT: &[u8] = b"twinkey key probe";

/// State of the key session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Both passphrases are held and keys can be derived.
    Active,
    /// No passphrases are held.
    Locked,
}

struct Passphrases {
    master: Passphrase,
    data: Passphrase,
}

/// Holder of the master and data passphrases.
///
/// The master key protects the vault container as a whole; the data key
/// protects individual record fields. Both are derived with a single SHA-256
/// pass over their passphrase, so the same passphrases always yield the same
/// keys without any persisted salt.
#[derive(Default)]
pub struct KeySession {
    passphrases: Option<Passphrases>,
}

impl KeySession {
    /// Create a locked session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store both passphrases for this session.
    ///
    /// # Preconditions
    /// - Neither passphrase is empty
    ///
    /// # Postconditions
    /// - Any previously held passphrases are replaced and zeroized
    /// - Session state is Active
    ///
    /// # Errors
    /// - `InvalidInput` if either passphrase is empty; the session is left
    ///   unchanged
    pub fn set_keys(
        &mut self,
        master: impl Into<Passphrase>,
        data: impl Into<Passphrase>,
    ) -> Result<()> {
        let master = master.into();
        let data = data.into();

        if master.is_empty() {
            return Err(Error::InvalidInput("Master passphrase is empty".to_string()));
        }
        if data.is_empty() {
            return Err(Error::InvalidInput("Data passphrase is empty".to_string()));
        }

        self.passphrases = Some(Passphrases { master, data });
        debug!("Session keys set");
        Ok(())
    }

    /// Derive the key protecting the vault container.
    ///
    /// # Errors
    /// - `UninitializedKeys` if [`set_keys`](Self::set_keys) has not been called
    pub fn master_key(&self) -> Result<SymmetricKey> {
        self.passphrases
            .as_ref()
            .map(|p| derive_session_key(p.master.as_bytes()))
            .ok_or(Error::UninitializedKeys)
    }

    /// Derive the key protecting individual record fields.
    ///
    /// # Errors
    /// - `UninitializedKeys` if [`set_keys`](Self::set_keys) has not been called
    pub fn data_key(&self) -> Result<SymmetricKey> {
        self.passphrases
            .as_ref()
            .map(|p| derive_session_key(p.data.as_bytes()))
            .ok_or(Error::UninitializedKeys)
    }

    /// Drop both passphrases from memory.
    ///
    /// # Postconditions
    /// - Passphrases are zeroized
    /// - Session state is Locked
    pub fn clear_keys(&mut self) {
        if self.passphrases.take().is_some() {
            debug!("Session keys cleared");
        }
    }

    /// Whether both passphrases are held.
    pub fn has_keys(&self) -> bool {
        self.passphrases.is_some()
    }

    /// Get the current session state.
    pub fn state(&self) -> SessionState {
        if self.has_keys() {
            SessionState::Active
        } else {
            SessionState::Locked
        }
    }

    /// Round-trip a fixed plaintext through both derived keys.
    ///
    /// Returns `false` instead of an error when keys are missing or the
    /// cipher fails.
    pub fn test_encryption(&self) -> bool {
        let probe = |key: Result<SymmetricKey>| -> Result<bool> {
            let key = key?;
            let blob = encrypt(key.as_bytes(), PROBE_PLAINTEXT)?;
            Ok(decrypt(key.as_bytes(), &blob)? == PROBE_PLAINTEXT)
        };

        match (probe(self.master_key()), probe(self.data_key())) {
            (Ok(true), Ok(true)) => true,
            (master, data) => {
                warn!(
                    master_ok = matches!(master, Ok(true)),
                    data_ok = matches!(data, Ok(true)),
                    "Key self-test failed"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for KeySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySession")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinkey_common::ErrorKind;

    fn active_session() -> KeySession {
        let mut session = KeySession::new();
        session.set_keys("master-pass", "data-pass").unwrap();
        session
    }

    #[test]
    fn test_keys_before_set_fail() {
        let session = KeySession::new();

        assert_eq!(session.state(), SessionState::Locked);
        assert_eq!(session.master_key().unwrap_err().kind(), ErrorKind::UninitializedKeys);
        assert_eq!(session.data_key().unwrap_err().kind(), ErrorKind::UninitializedKeys);
    }

    #[test]
    fn test_keys_are_deterministic() {
        let a = active_session();
        let b = active_session();

        assert_eq!(a.master_key().unwrap().as_bytes(), b.master_key().unwrap().as_bytes());
        assert_eq!(a.data_key().unwrap().as_bytes(), b.data_key().unwrap().as_bytes());
        assert_ne!(a.master_key().unwrap().as_bytes(), a.data_key().unwrap().as_bytes());
    }

    #[test]
    fn test_master_key_is_sha256_of_passphrase() {
        let mut session = KeySession::new();
        session.set_keys("abc", "other").unwrap();

        let expected = derive_session_key(b"abc");
        assert_eq!(session.master_key().unwrap().as_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_set_keys_rejects_empty() {
        let mut session = active_session();
        let before = *session.master_key().unwrap().as_bytes();

        let err = session.set_keys("", "data").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(session.set_keys("master", "").is_err());

        // Previous passphrases survive a rejected call
        assert_eq!(*session.master_key().unwrap().as_bytes(), before);
    }

    #[test]
    fn test_clear_keys() {
        let mut session = active_session();
        assert!(session.has_keys());

        session.clear_keys();

        assert!(!session.has_keys());
        assert_eq!(session.state(), SessionState::Locked);
        assert!(session.data_key().is_err());
    }

    #[test]
    fn test_encryption_probe() {
        assert!(active_session().test_encryption());
        assert!(!KeySession::new().test_encryption());
    }

    #[test]
    fn test_debug_is_redacted() {
        let debug = format!("{:?}", active_session());
        assert!(!debug.contains("master-pass"));
        assert!(debug.contains("Active"));
    }
}
