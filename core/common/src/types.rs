//! Common types used throughout Twinkey.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Unique identifier for a record within a vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a RecordId from an existing string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::Validation("id".to_string()));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User-supplied passphrase that zeroizes on drop.
///
/// Never serialized; `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a passphrase.
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(passphrase.into())
    }

    /// Get the UTF-8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Get the text.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Passphrase {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_generate_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_record_id_empty_fails() {
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("   ").is_err());
        assert_eq!(RecordId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_record_id_serializes_as_plain_string() {
        let id = RecordId::new("0f8c").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"0f8c\"");
    }

    #[test]
    fn test_passphrase_debug_redacted() {
        let passphrase = Passphrase::from("hunter2");
        let debug = format!("{:?}", passphrase);
        assert!(!debug.contains("hunter2"));
        assert_eq!(passphrase.expose(), "hunter2");
    }
}
