//! Argon2 password hashing

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};

use crate::error::{AuthError, AuthResult};

/// Hash a password with a fresh random salt (PHC string format)
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a password against a stored PHC hash
pub fn verify_password(password: &str, stored_hash: &str) -> AuthResult<bool> {
    let parsed_hash =
        PasswordHash::new(stored_hash).map_err(|e| AuthError::Hashing(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(
            hash_password("password1").unwrap(),
            hash_password("password1").unwrap()
        );
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("whatever", "plain-text"),
            Err(AuthError::Hashing(_))
        ));
    }
}
