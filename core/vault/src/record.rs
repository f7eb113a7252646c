//! Credential records, in plaintext and stored form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timestamp;
use twinkey_common::RecordId;

/// Text shown in place of a field that could not be decrypted.
pub const UNDECRYPTABLE_MARKER: &str = "[undecryptable]";

/// The four sensitive fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Service,
    Username,
    Password,
    Comment,
}

impl Field {
    /// Every field, in storage order.
    pub const ALL: [Field; 4] = [
        Field::Username,
        Field::Service,
        Field::Password,
        Field::Comment,
    ];

    /// Key used for this field in the vault document.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Username => "username",
            Self::Password => "password",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Plaintext field values supplied by a caller.
///
/// `None` means "not set". Empty strings are treated the same way when
/// records are encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFields {
    pub service: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub comment: Option<String>,
}

impl RecordFields {
    /// Fields for a typical credential without a comment.
    pub fn new(
        service: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            service: Some(service.into()),
            username: Some(username.into()),
            password: Some(password.into()),
            comment: None,
        }
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Value of `field`, if set and non-empty.
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Service => &self.service,
            Field::Username => &self.username,
            Field::Password => &self.password,
            Field::Comment => &self.comment,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// A record as persisted inside the container.
///
/// Sensitive fields hold `base64(IV || ciphertext)` under the data key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl StoredRecord {
    /// Create an empty record with a fresh identifier.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::generate(),
            created_at: now,
            updated_at: now,
            username: None,
            service: None,
            password: None,
            comment: None,
        }
    }

    /// Encoded ciphertext of `field`, if present and non-empty.
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Service => &self.service,
            Field::Username => &self.username,
            Field::Password => &self.password,
            Field::Comment => &self.comment,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Store encoded ciphertext for `field`.
    pub fn set(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::Service => &mut self.service,
            Field::Username => &mut self.username,
            Field::Password => &mut self.password,
            Field::Comment => &mut self.comment,
        };
        *slot = value;
    }
}

/// Outcome of decrypting a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Decrypted(String),
    /// Wrong data key or corrupted ciphertext.
    Undecryptable,
}

impl FieldValue {
    /// The plaintext, if decryption succeeded.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Decrypted(value) => Some(value),
            Self::Undecryptable => None,
        }
    }

    pub fn is_undecryptable(&self) -> bool {
        matches!(self, Self::Undecryptable)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decrypted(value) => f.pad(value),
            Self::Undecryptable => f.pad(UNDECRYPTABLE_MARKER),
        }
    }
}

/// A decrypted record handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub service: Option<FieldValue>,
    pub username: Option<FieldValue>,
    pub password: Option<FieldValue>,
    pub comment: Option<FieldValue>,
}

impl Record {
    /// Decrypted value (or failure marker) of `field`.
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        match field {
            Field::Service => self.service.as_ref(),
            Field::Username => self.username.as_ref(),
            Field::Password => self.password.as_ref(),
            Field::Comment => self.comment.as_ref(),
        }
    }

    /// Plaintext of `field`, if set and decrypted.
    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// Whether any present field failed to decrypt.
    pub fn has_undecryptable(&self) -> bool {
        Field::ALL
            .iter()
            .any(|f| self.get(*f).is_some_and(FieldValue::is_undecryptable))
    }

    /// Successfully decrypted fields. Undecryptable ones are left unset.
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            service: self.text(Field::Service).map(str::to_string),
            username: self.text(Field::Username).map(str::to_string),
            password: self.text(Field::Password).map(str::to_string),
            comment: self.text(Field::Comment).map(str::to_string),
        }
    }

    /// Case-insensitive substring match on username, service and comment.
    ///
    /// `needle` must already be lowercase. Undecryptable fields never match.
    pub fn matches(&self, needle: &str) -> bool {
        [Field::Username, Field::Service, Field::Comment]
            .iter()
            .filter_map(|f| self.text(*f))
            .any(|value| value.to_lowercase().contains(needle))
    }
}
