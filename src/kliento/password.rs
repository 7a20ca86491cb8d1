//! Salted password hashing for customer credentials.
//!
//! The salt is stored in its own column, so the codec works on raw argon2
//! output rather than PHC strings: `derive` is deterministic for a fixed
//! `(plaintext, salt)` pair and `verify` recomputes the digest and compares
//! in constant time.

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use base64ct::{Base64Unpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

/// Produce a fresh random salt, base64-encoded.
#[must_use]
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    Base64Unpadded::encode_string(&salt)
}

/// Derive the stored digest for a plaintext password and a salt produced by
/// [`generate_salt`]. Same inputs always yield the same output.
///
/// # Errors
/// Returns an error if the salt is not valid base64 or is rejected by argon2.
pub fn derive(plaintext: &str, salt: &str) -> Result<String> {
    let salt = Base64Unpadded::decode_vec(salt)
        .map_err(|err| anyhow!("invalid salt encoding: {err}"))?;

    let mut digest = [0u8; DIGEST_LEN];
    Argon2::default()
        .hash_password_into(plaintext.as_bytes(), &salt, &mut digest)
        .map_err(|err| anyhow!("failed to derive password digest: {err}"))?;

    Ok(Base64Unpadded::encode_string(&digest))
}

/// Check a plaintext password against a stored digest and its salt.
///
/// The comparison is constant-time over the recomputed digest.
///
/// # Errors
/// Returns an error if the salt or the stored digest cannot be decoded.
pub fn verify(plaintext: &str, salt: &str, stored: &str) -> Result<bool> {
    let stored = Base64Unpadded::decode_vec(stored)
        .map_err(|err| anyhow!("invalid digest encoding: {err}"))?;

    let candidate = derive(plaintext, salt).context("failed to recompute digest")?;
    let candidate = Base64Unpadded::decode_vec(&candidate)
        .map_err(|err| anyhow!("invalid digest encoding: {err}"))?;

    Ok(candidate.ct_eq(&stored).into())
}
