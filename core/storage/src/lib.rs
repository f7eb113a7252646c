//! Storage provider abstraction for Twinkey.
//!
//! A vault is a single opaque blob. Providers store and retrieve that blob
//! without ever seeing plaintext.
//!
//! # Design Principles
//! - Provider isolation: No provider-specific logic in vault or crypto modules
//! - Atomic replacement: a reader never observes a partially written blob
//! - Unified error semantics: Consistent error types across providers

pub mod local;
pub mod memory;
pub mod provider;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{Metadata, StorageProvider};
