// =====================================================================================
// VALIDATION SERVICE - REQUEST FIELD VALIDATION
// =====================================================================================

use std::sync::OnceLock;

use regex::Regex;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();
static PHONE_PATTERN: OnceLock<Regex> = OnceLock::new();

pub struct ValidationService;

impl ValidationService {
    pub fn validate_email(email: &str) -> bool {
        let email_regex = EMAIL_PATTERN.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .expect("email pattern is valid")
        });

        email.len() <= 254 && email_regex.is_match(email)
    }

    pub fn validate_phone(phone: &str) -> bool {
        let phone_regex = PHONE_PATTERN.get_or_init(|| {
            Regex::new(r"^\+?[0-9][0-9\s\-\.\(\)]{5,19}$").expect("phone pattern is valid")
        });

        phone_regex.is_match(phone.trim())
    }

    /// Collects a message for every required field that is blank.
    pub fn missing_fields(fields: &[(&str, &str)]) -> Vec<String> {
        fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| format!("{} is required", name))
            .collect()
    }

    /// `Err` with all missing-field messages joined, for handler use.
    pub fn require(fields: &[(&str, &str)]) -> Result<(), String> {
        let missing = Self::missing_fields(fields);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(ValidationService::validate_email("dr.hadi@hospital.co.id"));
        assert!(!ValidationService::validate_email("not-an-email"));
        assert!(!ValidationService::validate_email("a@b"));
    }

    #[test]
    fn test_validate_phone() {
        assert!(ValidationService::validate_phone("+62 812-3456-7890"));
        assert!(ValidationService::validate_phone("0812345678"));
        assert!(!ValidationService::validate_phone("call me"));
        assert!(!ValidationService::validate_phone("12"));
    }

    #[test]
    fn test_require_lists_every_blank_field() {
        assert!(ValidationService::require(&[("name", "Budi"), ("phone", "0812")]).is_ok());

        let err = ValidationService::require(&[("name", " "), ("phone", "0812"), ("address", "")]).unwrap_err();
        assert_eq!(err, "name is required, address is required");
    }
}
