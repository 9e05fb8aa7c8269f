//! Room password hashing.
//!
//! Argon2id via the `argon2` crate's recommended defaults.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use super::error::RoomError;

/// Hash a room password for storage.
pub fn hash(password: &str) -> Result<String, RoomError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| RoomError::PasswordHash)
}

/// Verify a supplied password against a stored hash.
///
/// An unparseable stored hash counts as a mismatch.
#[must_use]
pub fn verify(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hashed = hash("hunter2").expect("hashing failed");
        assert!(verify("hunter2", &hashed));
        assert!(!verify("hunter3", &hashed));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify("hunter2", "not-a-phc-string"));
    }
}
