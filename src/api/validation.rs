//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an ApiError,
//! use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_COMMENT_LENGTH: usize = 2000;

lazy_static! {
    /// Regex for validating email addresses (local@domain.tld)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$"
    ).unwrap();

    /// Regex for database short codes (lower-case alphanumeric with dashes or underscores)
    static ref SHORT_CODE_REGEX: Regex = Regex::new(
        r"^[a-z0-9]([a-z0-9_-]*[a-z0-9])?$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > MAX_NAME_LENGTH {
        return Err(format!("Email is too long (max {} characters)", MAX_NAME_LENGTH));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Validate password strength: at least 8 characters with a letter and a digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    Ok(())
}

/// Validate a display name (non-empty, max 255 characters)
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("Name is too long (max {} characters)", MAX_NAME_LENGTH));
    }
    Ok(())
}

/// Validate a database short code
pub fn validate_short_code(code: &str) -> Result<(), String> {
    let code = code.trim().to_lowercase();
    if code.is_empty() {
        return Err("Short code is required".to_string());
    }
    if code.len() > 32 {
        return Err("Short code is too long (max 32 characters)".to_string());
    }
    if !SHORT_CODE_REGEX.is_match(&code) {
        return Err(
            "Short code must contain only letters, digits, dashes and underscores".to_string(),
        );
    }
    Ok(())
}

/// Validate an optional free-text field against a maximum length
pub fn validate_text_len(value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("Must be at most {} characters", max))
        }
        _ => Ok(()),
    }
}
