//! Key derivation.
//!
//! Two derivations live here:
//! - PBKDF2-HMAC-SHA256, salted and iterated, for general-purpose
//!   passphrase hashing
//! - a single SHA-256 pass over the passphrase, which is what vault
//!   sessions use to key the container and field ciphers

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::keys::{Salt, SymmetricKey, KEY_LENGTH};
use twinkey_common::{Error, Result};

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Parameters for deriving encryption keys.
    pub fn vault() -> Self {
        Self {
            iterations: 1_000_000,
        }
    }

    /// Parameters for stored password hashes.
    pub fn password_hash() -> Self {
        Self {
            iterations: 100_000,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::vault()
    }
}

/// Derive a 256-bit key from a passphrase using PBKDF2-HMAC-SHA256.
///
/// # Preconditions
/// - `passphrase` must not be empty
/// - `params.iterations` must be non-zero
///
/// # Postconditions
/// - Returns the derived key and the salt used
/// - When `salt` is `None` a fresh random salt is generated
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if passphrase is empty
/// - Returns error if the iteration count is zero
pub fn derive_key(
    passphrase: &[u8],
    salt: Option<&Salt>,
    params: &KdfParams,
) -> Result<(SymmetricKey, Salt)> {
    if passphrase.is_empty() {
        return Err(Error::Crypto("Passphrase cannot be empty".to_string()));
    }
    if params.iterations == 0 {
        return Err(Error::Crypto(
            "Iteration count must be non-zero".to_string(),
        ));
    }

    let salt = salt.cloned().unwrap_or_else(Salt::generate);

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(passphrase, salt.as_bytes(), params.iterations, &mut key_bytes);

    Ok((SymmetricKey::from_bytes(key_bytes), salt))
}

/// Derive a key with a single unsalted SHA-256 pass.
///
/// The same passphrase always yields the same key. This is the derivation
/// vault sessions use for both the master and the data key.
pub fn derive_session_key(passphrase: &[u8]) -> SymmetricKey {
    let digest = Sha256::digest(passphrase);
    let mut key_bytes = [0u8; KEY_LENGTH];
    key_bytes.copy_from_slice(&digest);
    SymmetricKey::from_bytes(key_bytes)
}

/// Hash a passphrase for later verification.
///
/// Uses [`KdfParams::password_hash`]. Returns the hash and its salt.
pub fn hash_password(passphrase: &[u8], salt: Option<&Salt>) -> Result<(SymmetricKey, Salt)> {
    derive_key(passphrase, salt, &KdfParams::password_hash())
}

/// Verify that a passphrase produces the expected hash.
///
/// This performs constant-time comparison to prevent timing attacks.
pub fn verify_password(passphrase: &[u8], expected: &SymmetricKey, salt: &Salt) -> Result<bool> {
    let (derived, _) = hash_password(passphrase, Some(salt))?;
    Ok(derived.as_bytes().ct_eq(expected.as_bytes()).into())
}
