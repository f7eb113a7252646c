//! Storage provider trait definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use twinkey_common::Result;

/// Metadata for the stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Backend holding one encrypted vault blob.
///
/// All operations are synchronous and run to completion on the caller's
/// thread.
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Human-readable location of the blob, for diagnostics.
    fn location(&self) -> String;

    /// Check whether a non-empty blob is stored.
    fn exists(&self) -> Result<bool>;

    /// Read the complete blob.
    ///
    /// # Errors
    /// - `VaultNotFound` if no blob is stored
    /// - I/O errors
    fn read(&self) -> Result<Vec<u8>>;

    /// Replace the blob.
    ///
    /// # Postconditions
    /// - Either the new content is fully stored or the previous content is
    ///   left untouched
    /// - Returns metadata of the stored blob
    ///
    /// # Errors
    /// - `Persistence` on any write failure
    fn write(&self, data: &[u8]) -> Result<Metadata>;

    /// Metadata of the stored blob, if any.
    fn metadata(&self) -> Result<Option<Metadata>>;
}
