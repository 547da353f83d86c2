// src/utils/hash.rs

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AppError;

/// Hashes a shared secret with Argon2 and a random salt.
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Checks a presented secret against a stored Argon2 hash.
///
/// A malformed stored hash is a server fault; a mismatch is simply `false`.
pub fn verify_secret(secret: &str, secret_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(secret_hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_secret_only() {
        let hash = hash_secret("open-sesame").unwrap();
        assert!(verify_secret("open-sesame", &hash).unwrap());
        assert!(!verify_secret("open-sesame!", &hash).unwrap());
    }

    #[test]
    fn rejects_malformed_hash() {
        assert!(verify_secret("anything", "not-a-phc-string").is_err());
    }
}
