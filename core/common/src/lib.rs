//! Common utilities and types shared across Twinkey modules.
//!
//! This module provides foundational types that are used throughout the codebase,
//! ensuring consistency and type safety.

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result, ResultExt};
pub use types::{Passphrase, RecordId};
