//! Validation utilities for the security incident dashboard
//!
//! Plain checks return `Result<(), &'static str>`; the `*_rule` wrappers adapt
//! them for `#[validate(custom = "...")]` on request types.

use std::borrow::Cow;

use validator::ValidationError;

// ============================================================================
// Account Validations
// ============================================================================

/// Validate username: 3-30 characters of ASCII letters, digits, `_` or `.`
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 3 || username.len() > 30 {
        return Err("Username must be between 3 and 30 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err("Username may only contain letters, digits, '_' and '.'");
    }
    Ok(())
}

/// Validate a role key: lowercase snake case, 2-40 characters
pub fn validate_role_key(key: &str) -> Result<(), &'static str> {
    if key.len() < 2 || key.len() > 40 {
        return Err("Role key must be between 2 and 40 characters");
    }
    if !key.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err("Role key must start with a lowercase letter");
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err("Role key may only contain lowercase letters, digits and '_'");
    }
    Ok(())
}

// ============================================================================
// Regional Validations
// ============================================================================

/// Replace Arabic-Indic (٠-٩) and Eastern Arabic-Indic (۰-۹) digits with ASCII
pub fn normalize_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            other => other,
        })
        .collect()
}

/// Validate a phone number.
/// Accepts local or international numbers with 7-15 digits, written with
/// ASCII or Arabic-Indic digits, optionally separated by spaces or dashes.
pub fn validate_phone_number(phone: &str) -> Result<(), &'static str> {
    let normalized = normalize_digits(phone.trim());
    let body = normalized.strip_prefix('+').unwrap_or(&normalized);

    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
    {
        return Err("Phone number may only contain digits, spaces and dashes");
    }

    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err("Phone number must have between 7 and 15 digits");
    }
    Ok(())
}

/// Validate a work permit number, e.g. `WP-2024-0153`
pub fn validate_permit_number(number: &str) -> Result<(), &'static str> {
    if number.len() < 3 || number.len() > 30 {
        return Err("Permit number must be between 3 and 30 characters");
    }
    if !number
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '/')
    {
        return Err("Permit number may only contain uppercase letters, digits, '-' and '/'");
    }
    Ok(())
}

// ============================================================================
// Validator Rules
// ============================================================================

fn rule(code: &'static str, check: Result<(), &'static str>) -> Result<(), ValidationError> {
    check.map_err(|message| {
        let mut error = ValidationError::new(code);
        error.message = Some(Cow::Borrowed(message));
        error
    })
}

pub fn username_rule(value: &str) -> Result<(), ValidationError> {
    rule("username", validate_username(value))
}

pub fn phone_rule(value: &str) -> Result<(), ValidationError> {
    rule("phone", validate_phone_number(value))
}

pub fn role_key_rule(value: &str) -> Result<(), ValidationError> {
    rule("role_key", validate_role_key(value))
}

pub fn permit_number_rule(value: &str) -> Result<(), ValidationError> {
    rule("permit_number", validate_permit_number(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("bob123").is_ok());
        assert!(validate_username("ahmed.ali_2").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bob smith").is_err());
        assert!(validate_username("أحمد").is_err());
    }

    #[test]
    fn test_validate_role_key() {
        assert!(validate_role_key("camera_operator").is_ok());
        assert!(validate_role_key("shift2_lead").is_ok());
        assert!(validate_role_key("Admin").is_err());
        assert!(validate_role_key("2nd_shift").is_err());
        assert!(validate_role_key("مدير").is_err());
    }

    #[test]
    fn test_normalize_digits() {
        assert_eq!(normalize_digits("٠٥٠١٢٣٤٥٦٧"), "0501234567");
        assert_eq!(normalize_digits("۱۲۳"), "123");
        assert_eq!(normalize_digits("abc-9"), "abc-9");
    }

    #[test]
    fn test_validate_phone_number_valid() {
        assert!(validate_phone_number("0501234567").is_ok());
        assert!(validate_phone_number("+966 50 123 4567").is_ok());
        assert!(validate_phone_number("050-123-4567").is_ok());
        assert!(validate_phone_number("٠٥٠١٢٣٤٥٦٧").is_ok());
    }

    #[test]
    fn test_validate_phone_number_invalid() {
        assert!(validate_phone_number("12345").is_err());
        assert!(validate_phone_number("05O1234567").is_err());
        assert!(validate_phone_number("+1234567890123456").is_err());
    }

    #[test]
    fn test_validate_permit_number() {
        assert!(validate_permit_number("WP-2024-0153").is_ok());
        assert!(validate_permit_number("HOT/77").is_ok());
        assert!(validate_permit_number("wp-1").is_err());
        assert!(validate_permit_number("W").is_err());
    }

    #[test]
    fn test_rule_carries_message() {
        let err = username_rule("x").unwrap_err();
        assert_eq!(err.code, "username");
        assert!(err.message.is_some());
        assert!(phone_rule("0501234567").is_ok());
    }
}
