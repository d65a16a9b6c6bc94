//! Credential rules and password hashing.

use crate::error::AuthError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

const MIN_LOGIN_LEN: usize = 8;
const MIN_PASSWORD_LEN: usize = 8;

/// Logins are at least eight ASCII letters or digits.
pub fn validate_login(login: &str) -> Result<(), AuthError> {
    if login.len() >= MIN_LOGIN_LEN && login.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(AuthError::InvalidLogin)
    }
}

/// Passwords need eight characters with an upper and lower case letter, a digit and a symbol.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidPassword);
    }
    let (mut upper, mut lower, mut digit, mut other) = (false, false, false, false);
    for c in password.chars() {
        match c {
            'A'..='Z' => upper = true,
            'a'..='z' => lower = true,
            '0'..='9' => digit = true,
            _ => other = true,
        }
    }
    if upper && lower && digit && other {
        Ok(())
    } else {
        Err(AuthError::InvalidPassword)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// False for a wrong password and for an unparseable stored hash.
pub fn verify_password(stored: &str, password: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
