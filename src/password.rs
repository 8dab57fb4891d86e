use argon2::password_hash::rand_core::OsRng;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};

use std::sync::OnceLock;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

// Well-formed PHC string with the default Argon2id parameters. No password verifies
// against it, but checking one costs the same as checking a real hash.
const FALLBACK_DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$Y0ea1poJCyWCd+yPum+ZQQ$F7JojJydQ3znyKkcbXBdEn6GiEXrVIfDVTA8PpwK/X4";

/// Hash a password with Argon2 and a random salt. The result is a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash in constant time.
///
/// An unparsable stored hash counts as a mismatch rather than an error so that login
/// never reveals anything beyond "incorrect email or password".
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        tracing::warn!("stored password hash could not be parsed");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hash verified against when a login names an unknown email, so both failure paths do
/// the same amount of work.
pub fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        hash_password("dummy-password-0").unwrap_or_else(|e| {
            tracing::error!(error = %e, "dummy hash generation failed, using the built-in one");
            FALLBACK_DUMMY_HASH.to_string()
        })
    })
}

/// At least eight characters with one letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_number = password.chars().any(char::is_numeric);

    if password.chars().count() < MIN_PASSWORD_LEN || !has_letter || !has_number {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters and contain a letter and a digit"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_password() {
        let hash = hash_password("pw123456").unwrap();

        assert!(verify_password("pw123456", &hash));
        assert!(!verify_password("wrong_password1", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let hash1 = hash_password("test_password123").unwrap();
        let hash2 = hash_password("test_password123").unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("test_password123", &hash1));
        assert!(verify_password("test_password123", &hash2));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("pw123456", "not-a-phc-string"));
    }

    #[test]
    fn dummy_hashes_are_parsable_and_never_match() {
        assert!(PasswordHash::new(FALLBACK_DUMMY_HASH).is_ok());
        assert!(!verify_password("dummy-password-0", FALLBACK_DUMMY_HASH));

        let dummy = dummy_hash();
        assert!(PasswordHash::new(dummy).is_ok());
        assert!(!verify_password("pw123456", dummy));
        assert!(std::ptr::eq(dummy, dummy_hash()));
    }

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("pw123456").is_ok());
        assert!(validate_password_strength("TestPass123").is_ok());

        // Too short
        assert!(validate_password_strength("pw1").is_err());
        // No digit
        assert!(validate_password_strength("password").is_err());
        // No letter
        assert!(validate_password_strength("12345678").is_err());
    }
}
