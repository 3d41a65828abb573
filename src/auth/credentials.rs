//! Checks and hashing applied to an issue request before it reaches the key
//! manager.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::task;

use super::error::AuthError;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static SPECIAL_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@_!#$%^&*()<>?/\\|}{~:]").unwrap());

const MIN_PASSWORD_LEN: usize = 9;

/// Returns the normalized (trimmed, lowercased) address.
pub fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if EMAIL.is_match(&email) {
        Ok(email)
    } else {
        Err(AuthError::UnprocessableInput(
            "The email address is not valid.".to_string(),
        ))
    }
}

pub fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::UnprocessableInput("The username must not be empty.".to_string()));
    }
    Ok(username.to_string())
}

/// More than 8 characters with at least one digit, one uppercase letter and
/// one special character.
pub fn check_password_strength(password: &str) -> Result<(), AuthError> {
    let strong = password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && SPECIAL_CHAR.is_match(password);

    if strong {
        Ok(())
    } else {
        Err(AuthError::UnprocessableInput(
            "The password must be longer than 8 characters and contain an uppercase letter, \
             a digit and a special character."
                .to_string(),
        ))
    }
}

/// Argon2id with a fresh salt, run on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
    })
    .await
    .map_err(|e| AuthError::Internal(format!("Password hashing task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("  A@X.com ").unwrap(), "a@x.com");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@nodot").is_err());
        assert!(validate_email("a b@x.com").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username(" alice ").unwrap(), "alice");
        assert!(matches!(validate_username("   "), Err(AuthError::UnprocessableInput(_))));
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("Str0ng!Pass").is_ok());
        assert!(check_password_strength("Sh0rt!").is_err());
        assert!(check_password_strength("12345678!").is_err());
        assert!(check_password_strength("NoDigits!!").is_err());
        assert!(check_password_strength("nouppercase1!").is_err());
        assert!(check_password_strength("NoSpecial123").is_err());
        assert!(check_password_strength("Été1234!x").is_err());
        // exactly 8 characters is not enough
        assert!(check_password_strength("Abcde1!x").is_err());
    }

    #[tokio::test]
    async fn test_hash_password_is_salted_and_verifiable() {
        let first = hash_password("Str0ng!Pass".to_string()).await.unwrap();
        let second = hash_password("Str0ng!Pass".to_string()).await.unwrap();

        assert_ne!(first, second);
        assert!(!first.contains("Str0ng!Pass"));

        let parsed = PasswordHash::new(&first).unwrap();
        assert!(Argon2::default().verify_password(b"Str0ng!Pass", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
