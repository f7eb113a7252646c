//! In-memory storage provider for testing.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::provider::{Metadata, StorageProvider};
use twinkey_common::{Error, Result};

/// In-memory storage provider.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Writes can be made to fail to exercise error paths.
#[derive(Default)]
pub struct MemoryProvider {
    blob: RwLock<Option<(Vec<u8>, Metadata)>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider already holding `data`.
    pub fn with_blob(data: Vec<u8>) -> Self {
        let provider = Self::new();
        provider.store(data);
        provider
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of the stored blob.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.read_guard().as_ref().map(|(data, _)| data.clone())
    }

    fn store(&self, data: Vec<u8>) -> Metadata {
        let metadata = Metadata {
            size: data.len() as u64,
            modified: Utc::now(),
        };
        let mut guard = match self.blob.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some((data, metadata.clone()));
        metadata
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, Option<(Vec<u8>, Metadata)>> {
        match self.blob.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn location(&self) -> String {
        "memory://vault".to_string()
    }

    fn exists(&self) -> Result<bool> {
        Ok(self
            .read_guard()
            .as_ref()
            .is_some_and(|(data, _)| !data.is_empty()))
    }

    fn read(&self) -> Result<Vec<u8>> {
        match self.read_guard().as_ref() {
            Some((data, _)) if !data.is_empty() => Ok(data.clone()),
            _ => Err(Error::VaultNotFound(self.location())),
        }
    }

    fn write(&self, data: &[u8]) -> Result<Metadata> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Persistence(format!(
                "{} is read-only",
                self.location()
            )));
        }
        let metadata = self.store(data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(metadata)
    }

    fn metadata(&self) -> Result<Option<Metadata>> {
        Ok(self.read_guard().as_ref().map(|(_, meta)| meta.clone()))
    }
}
