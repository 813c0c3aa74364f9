// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Password hashing and the registration strength policy.
//!
//! Hashes are Argon2id in PHC string format; verification parses whatever
//! parameters the stored hash carries, so parameter upgrades do not
//! invalidate existing credentials.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Constant-time verification against a stored PHC hash.
///
/// A malformed stored hash verifies as false rather than erroring; the
/// caller cannot do anything better with a corrupt credential row.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Registration password policy.
///
/// Enforces: at least 8 characters, an uppercase letter, a lowercase
/// letter, a digit, and a special character. Returns all violations so the
/// caller can report them field-scoped in one response.
pub fn validate_password_strength(password: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if password.len() < 8 {
        errors.push("Password must be at least 8 characters long.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must include an uppercase letter.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must include a lowercase letter.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must include a number.".to_string());
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        errors.push("Password must include a special character.".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_roundtrip() {
        let hash = hash_password("Str0ng.Pass!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Str0ng.Pass!", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn corrupt_hash_verifies_false() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn strength_policy_accumulates_violations() {
        assert!(validate_password_strength("Str0ng.Pass!").is_ok());

        let errors = validate_password_strength("abc").unwrap_err();
        // Too short, no uppercase, no digit, no special.
        assert_eq!(errors.len(), 4);

        let errors = validate_password_strength("alllowercase1!").unwrap_err();
        assert_eq!(errors, vec!["Password must include an uppercase letter.".to_string()]);
    }
}
