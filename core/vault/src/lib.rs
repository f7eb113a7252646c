//! Vault engine for Twinkey.
//!
//! This module provides:
//! - Session key handling for the master and data passphrases
//! - Loading, decrypting and atomically persisting the vault container
//! - Field-level encryption of credential records
//! - A validating record manager with search
//!
//! # Architecture
//! The vault sits between the caller (CLI or GUI) and a storage provider.
//! The whole container is encrypted with the master key; every sensitive
//! record field is encrypted again with the data key.

pub mod config;
pub mod manager;
pub mod record;
pub mod session;
pub mod store;
pub mod strength;
pub mod timestamp;

pub use config::{VaultContainer, VaultMetadata, VaultOptions, VaultSummary, VaultVersion};
pub use manager::{RecordManager, SearchCache};
pub use record::{Field, FieldValue, Record, RecordFields, StoredRecord, UNDECRYPTABLE_MARKER};
pub use session::{KeySession, SessionState};
pub use store::VaultStore;
pub use strength::{PasswordStrength, StrengthHint, StrengthLevel};
