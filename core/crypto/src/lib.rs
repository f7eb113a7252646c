//! Cryptographic primitives for Twinkey.
//!
//! This module provides:
//! - AES-256-CBC encryption with a random IV per call
//! - Key derivation using PBKDF2-HMAC-SHA256 and single-pass SHA-256
//! - Key types with automatic zeroization
//! - A configurable password generator
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time comparison when verifying password hashes
//!
//! # Limitations
//! CBC provides confidentiality only. Padding validity is the sole integrity
//! signal, so a wrong key may decrypt to garbage instead of failing.

pub mod cipher;
pub mod generator;
pub mod kdf;
pub mod keys;

pub use cipher::{decrypt, decrypt_from_b64, encrypt, encrypt_to_b64};
pub use generator::{PasswordGenerator, StrengthRating};
pub use kdf::{derive_key, derive_session_key, hash_password, verify_password, KdfParams};
pub use keys::{Salt, SymmetricKey};
