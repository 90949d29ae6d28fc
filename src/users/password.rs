use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::core::errors::ApiError;

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(ApiError::internal)
}

/// Checks `password` against an argon2 PHC string or a bcrypt hash.
/// Malformed hashes never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    if stored_hash.starts_with("$2") {
        return bcrypt::verify(password, stored_hash).unwrap_or(false);
    }

    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_round_trip() {
        let hash = hash_password("hrpass123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hrpass123", &hash));
        assert!(!verify_password("hrpass124", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn legacy_bcrypt_hashes_verify() {
        let hash = bcrypt::hash("securepass", 4).unwrap();
        assert!(verify_password("securepass", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "plaintext-password"));
        assert!(!verify_password("", ""));
    }
}
