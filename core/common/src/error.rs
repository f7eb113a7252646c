//! Common error types for Twinkey.

use thiserror::Error;

/// Top-level error type for Twinkey operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Keys were used before `set_keys` was called.
    #[error("Encryption keys have not been set")]
    UninitializedKeys,

    /// Load attempted on an absent vault file.
    #[error("Vault not found: {0}")]
    VaultNotFound(String),

    /// Ciphertext could not be decrypted (wrong key or corrupted data).
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// A record is missing a required field.
    #[error("Missing required field: {0}")]
    Validation(String),

    /// No record carries the requested identifier.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// The vault could not be written.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The vault was written by an incompatible format version.
    #[error("Unsupported vault version: {0}")]
    UnsupportedVersion(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wraps a lower-level error with a human-readable description.
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

/// Discriminant of [`Error`], with context layers stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UninitializedKeys,
    VaultNotFound,
    Decryption,
    Validation,
    RecordNotFound,
    Persistence,
    Crypto,
    Io,
    Serialization,
    UnsupportedVersion,
    InvalidInput,
}

impl Error {
    /// Wrap this error with a contextual message.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context layers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Kind of the root error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Context { source, .. } => source.kind(),
            Self::UninitializedKeys => ErrorKind::UninitializedKeys,
            Self::VaultNotFound(_) => ErrorKind::VaultNotFound,
            Self::Decryption(_) => ErrorKind::Decryption,
            Self::Validation(_) => ErrorKind::Validation,
            Self::RecordNotFound(_) => ErrorKind::RecordNotFound,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach context to a failing [`Result`].
pub trait ResultExt<T> {
    /// Wrap the error, if any, with `message`.
    fn context(self, message: &str) -> Result<T>;

    /// Wrap the error, if any, with a lazily built message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: &str) -> Result<T> {
        self.map_err(|e| e.context(message))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
