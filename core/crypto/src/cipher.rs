//! AES-256-CBC encryption with PKCS#7 padding.
//!
//! Every blob produced here is `IV || ciphertext`, with a fresh random
//! 16-byte IV per call.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::keys::KEY_LENGTH;
use twinkey_common::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Initialization vector size (16 bytes).
pub const IV_SIZE: usize = 16;

/// AES block size (16 bytes).
pub const BLOCK_SIZE: usize = 16;

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(())
}

/// Encrypt plaintext using AES-256-CBC.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
/// - `plaintext` can be any size
///
/// # Postconditions
/// - Returns IV || ciphertext
/// - The IV is randomly generated for every call
/// - The ciphertext is the padded plaintext length, a multiple of BLOCK_SIZE
///
/// # Errors
/// - Returns error if key length is incorrect
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut result = Vec::with_capacity(IV_SIZE + ciphertext.len());
    result.extend_from_slice(&iv);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt an `IV || ciphertext` blob using AES-256-CBC.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
///
/// # Errors
/// - Returns `Crypto` if key length is incorrect
/// - Returns `Decryption` if the blob is shorter than IV + one block,
///   is not block aligned, or carries invalid padding
///
/// # Security
/// There is no authentication tag. A wrong key that happens to produce
/// valid padding returns garbage rather than an error.
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;

    if blob.len() < IV_SIZE + BLOCK_SIZE {
        return Err(Error::Decryption("Ciphertext too short".to_string()));
    }

    let (iv, ciphertext) = blob.split_at(IV_SIZE);
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decryption(
            "Ciphertext is not a multiple of the block size".to_string(),
        ));
    }

    Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| Error::Crypto(format!("Decryption failed: {}", e)))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption("Invalid padding".to_string()))
}

/// Encrypt and encode the blob as standard base64.
pub fn encrypt_to_b64(key: &[u8], plaintext: &[u8]) -> Result<String> {
    let blob = encrypt(key, plaintext)?;
    Ok(STANDARD.encode(blob))
}

/// Decode a standard base64 blob and decrypt it.
///
/// # Errors
/// - Returns `Decryption` if the input is not valid base64
pub fn decrypt_from_b64(key: &[u8], encoded: &str) -> Result<Vec<u8>> {
    let blob = STANDARD
        .decode(encoded)
        .map_err(|e| Error::Decryption(format!("Invalid base64: {}", e)))?;
    decrypt(key, &blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use twinkey_common::ErrorKind;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Hello, World!";

        let ciphertext = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = [42u8; KEY_LENGTH];

        // 12 bytes pad to one block, 16 bytes pad to two
        assert_eq!(encrypt(&key, b"Test message").unwrap().len(), IV_SIZE + 16);
        assert_eq!(encrypt(&key, &[0u8; 16]).unwrap().len(), IV_SIZE + 32);
    }

    #[test]
    fn test_different_iv_each_time() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Same plaintext";

        let ct1 = encrypt(&key, plaintext).unwrap();
        let ct2 = encrypt(&key, plaintext).unwrap();

        assert_ne!(&ct1[..IV_SIZE], &ct2[..IV_SIZE]);
        assert_ne!(ct1, ct2);
        assert_eq!(decrypt(&key, &ct1).unwrap(), plaintext);
        assert_eq!(decrypt(&key, &ct2).unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_key_never_silently_correct() {
        let key1 = [1u8; KEY_LENGTH];
        let key2 = [2u8; KEY_LENGTH];
        let plaintext = b"Secret data";

        let ciphertext = encrypt(&key1, plaintext).unwrap();
        match decrypt(&key2, &ciphertext) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::Decryption),
            Ok(garbage) => assert_ne!(garbage, plaintext),
        }
    }

    #[test]
    fn test_short_blob_fails() {
        let key = [42u8; KEY_LENGTH];

        let err = decrypt(&key, &[0u8; IV_SIZE]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decryption);

        let err = decrypt(&key, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decryption);
    }

    #[test]
    fn test_unaligned_blob_fails() {
        let key = [42u8; KEY_LENGTH];
        let mut blob = encrypt(&key, b"aligned").unwrap();
        blob.push(0);

        let err = decrypt(&key, &blob).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decryption);
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = [0u8; 16];

        let err = encrypt(&short_key, b"data").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Crypto);
        let err = decrypt(&short_key, &[0u8; 32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Crypto);
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [42u8; KEY_LENGTH];

        let ciphertext = encrypt(&key, b"").unwrap();
        assert_eq!(ciphertext.len(), IV_SIZE + BLOCK_SIZE);
        assert!(decrypt(&key, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn test_b64_roundtrip() {
        let key = [9u8; KEY_LENGTH];

        let encoded = encrypt_to_b64(&key, "contraseña".as_bytes()).unwrap();
        let decoded = decrypt_from_b64(&key, &encoded).unwrap();

        assert_eq!(String::from_utf8(decoded).unwrap(), "contraseña");
    }

    #[test]
    fn test_b64_invalid_input() {
        let key = [9u8; KEY_LENGTH];

        let err = decrypt_from_b64(&key, "not base64!!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decryption);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            key in proptest::array::uniform32(any::<u8>()),
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let blob = encrypt(&key, &plaintext).unwrap();
            prop_assert_eq!(blob.len() % BLOCK_SIZE, 0);
            prop_assert_eq!(decrypt(&key, &blob).unwrap(), plaintext);
        }
    }
}
