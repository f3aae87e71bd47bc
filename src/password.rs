//! Password hashing and verification (Argon2id).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted password length in bytes. Bounds the hashing cost.
pub const MAX_PASSWORD_LENGTH: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password must be at least 8 characters")]
    TooShort,
    #[error("password must be at most 256 bytes")]
    TooLong,
    #[error("failed to hash password: {0}")]
    Hash(password_hash::Error),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(password_hash::Error),
}

/// Hash a plaintext password into a PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if plain.len() > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(PasswordError::Hash)?
        .to_string();
    Ok(hash)
}

/// Check a plaintext password against a stored hash.
///
/// A mismatch is `Ok(false)`. Only an unparseable stored hash is an error.
pub fn verify_password(plain: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored_hash).map_err(PasswordError::MalformedHash)?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::MalformedHash(e)),
    }
}
