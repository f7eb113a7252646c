//! Vault options and container layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::record::StoredRecord;
use crate::timestamp;
use twinkey_common::{Error, Result};

/// Description given to new vaults when none is configured.
pub const DEFAULT_DESCRIPTION: &str = "Encrypted password vault";

/// Vault format version for migration support.
///
/// Stored as a `"major.minor"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultVersion {
    pub major: u32,
    pub minor: u32,
}

impl VaultVersion {
    /// Current vault format version.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Check if this version is compatible with the current version.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

impl Default for VaultVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for VaultVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for VaultVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Serialization(format!("Invalid vault version: {:?}", s));
        let (major, minor) = s.split_once('.').unwrap_or((s, "0"));
        Ok(Self {
            major: major.trim().parse().map_err(|_| invalid())?,
            minor: minor.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for VaultVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VaultVersion> for String {
    fn from(version: VaultVersion) -> Self {
        version.to_string()
    }
}

/// Caller-supplied tuning for a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultOptions {
    /// Free-text description written into new containers.
    pub description: String,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

/// Container header, stored in the clear inside the encrypted blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub version: VaultVersion,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

/// The single persisted unit: metadata plus the ordered record list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultContainer {
    pub metadata: VaultMetadata,
    #[serde(rename = "passwords", default)]
    pub records: Vec<StoredRecord>,
}

impl VaultContainer {
    /// Create an empty container stamped with the current time.
    pub fn new(options: &VaultOptions) -> Self {
        let now = timestamp::now();
        Self {
            metadata: VaultMetadata {
                version: VaultVersion::CURRENT,
                created_at: now,
                updated_at: now,
                description: options.description.clone(),
            },
            records: Vec::new(),
        }
    }

    /// Position of the record with `id`, if present.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id.as_str() == id)
    }

    /// Serialize to the plaintext JSON payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a decrypted payload.
    ///
    /// # Errors
    /// - `Decryption` if the payload is not a container document. A wrong
    ///   master key occasionally yields valid padding over garbage, so a
    ///   malformed payload is reported the same way as a failed decrypt.
    /// - `UnsupportedVersion` if the major version differs from ours.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let container: Self = serde_json::from_slice(bytes)
            .map_err(|e| Error::Decryption(format!("Malformed vault payload: {}", e)))?;

        if !container.metadata.version.is_compatible() {
            return Err(Error::UnsupportedVersion(
                container.metadata.version.to_string(),
            ));
        }
        Ok(container)
    }
}

/// Read-only overview of an opened vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSummary {
    pub metadata: VaultMetadata,
    pub record_count: usize,
    /// Where the container is persisted.
    pub location: String,
}
