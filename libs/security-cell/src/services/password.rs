use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::instrument;

use crate::models::{PasswordStrength, PasswordStrengthResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

const GUESSABLE_FRAGMENTS: &[&str] = &[
    "password", "123456", "qwerty", "letmein", "welcome", "admin", "hospital", "abc123", "111111",
];

pub struct PasswordSecurityService;

impl PasswordSecurityService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(hash)?;
        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Scores a candidate password. Anything shorter than
    /// `MIN_PASSWORD_LENGTH` is weak regardless of its score.
    pub fn validate_password_strength(password: &str) -> PasswordStrengthResult {
        let length = password.chars().count();
        let mut issues = Vec::new();

        let mut score: u8 = match length {
            n if n >= 12 => 30,
            n if n >= MIN_PASSWORD_LENGTH => 15,
            _ => {
                issues.push(format!("Password must be at least {} characters long", MIN_PASSWORD_LENGTH));
                0
            }
        };

        let classes: [(fn(&char) -> bool, &str); 4] = [
            (char::is_ascii_lowercase, "a lowercase letter"),
            (char::is_ascii_uppercase, "an uppercase letter"),
            (char::is_ascii_digit, "a digit"),
            (|c: &char| !c.is_alphanumeric(), "a symbol"),
        ];
        for (check, name) in classes {
            if password.chars().any(|c| check(&c)) {
                score += 15;
            } else {
                issues.push(format!("Password needs {}", name));
            }
        }

        let lowered = password.to_lowercase();
        if GUESSABLE_FRAGMENTS.iter().any(|fragment| lowered.contains(fragment)) {
            score = score.saturating_sub(50);
            issues.push("Password contains an easily guessed word or sequence".to_string());
        }

        let strength = match score {
            _ if length < MIN_PASSWORD_LENGTH => PasswordStrength::Weak,
            0..=25 => PasswordStrength::Weak,
            26..=50 => PasswordStrength::Fair,
            51..=75 => PasswordStrength::Good,
            _ => PasswordStrength::Strong,
        };

        PasswordStrengthResult {
            strength,
            score,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = PasswordSecurityService::hash_password("Correct-Horse-9").unwrap();

        assert_ne!(hash, "Correct-Horse-9");
        assert!(PasswordSecurityService::verify_password("Correct-Horse-9", &hash).unwrap());
        assert!(!PasswordSecurityService::verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_verify_against_garbage_hash_is_an_error() {
        assert!(PasswordSecurityService::verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_short_passwords_are_weak() {
        let result = PasswordSecurityService::validate_password_strength("Ab1!");
        assert_eq!(result.strength, PasswordStrength::Weak);
        assert!(!result.is_acceptable());
    }

    #[test]
    fn test_common_passwords_are_weak() {
        let result = PasswordSecurityService::validate_password_strength("password");
        assert_eq!(result.strength, PasswordStrength::Weak);
    }

    #[test]
    fn test_varied_password_is_acceptable() {
        let result = PasswordSecurityService::validate_password_strength("Rounds-At-0800");
        assert!(result.is_acceptable());
        assert_eq!(result.strength, PasswordStrength::Strong);
    }
}
