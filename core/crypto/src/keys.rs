//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of KDF salts in bytes.
pub const SALT_LENGTH: usize = 16;

/// 256-bit symmetric key.
///
/// Used for both the master key (container) and the data key (fields).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_LENGTH],
}

impl SymmetricKey {
    /// Create a key from raw bytes.
    ///
    /// # Postconditions
    /// - Returns a SymmetricKey that will zeroize on drop
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}
