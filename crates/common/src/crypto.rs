//! Credential hashing helpers: salted SHA-256, hex-encoded `salt$digest`.
//!
//! The stored format is `hex(salt) + "$" + hex(sha256(salt || password))`.
//! Verification recomputes the digest and compares; the generic
//! `InvalidCredentials` error is produced by the caller, never here.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("malformed credential hash")]
    Malformed,

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), hex::encode(digest(&salt, password)))
}

/// Verify `password` against a stored `salt$digest` hash.
pub fn verify_password(stored: &str, password: &str) -> Result<bool, CredentialError> {
    let (salt_hex, digest_hex) = stored.split_once('$').ok_or(CredentialError::Malformed)?;
    let salt = hex::decode(salt_hex)?;
    let expected = hex::decode(digest_hex)?;
    if salt.len() != SALT_LEN || expected.len() != 32 {
        return Err(CredentialError::Malformed);
    }
    Ok(digest(&salt, password).as_slice() == expected.as_slice())
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}
