// Common validation types and traits

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

pub trait Validator<T> {
    fn validate(&self, data: &T) -> ValidationResult;
}

/// Minimum accepted password length for credential accounts
pub const MIN_PASSWORD_LENGTH: usize = 6;

// Same address shape the signup form accepts in the browser. The local part may
// not end in '.' or '\''; leading and doubled dots are checked separately.
fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
            .expect("email regex is valid")
    })
}

/// Checks that a string looks like an email address
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && email_regex().is_match(email)
}

/// Validates an email + password pair
pub fn validate_credentials(email: &str, password: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_valid_email(email) {
        result.add_error("email", "Email must be a valid address");
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        result.add_error("password", "Password must be at least 6 characters");
    }

    result
}
