//! Credential checks run before anything is sent to the auth service.
//!
//! Both validators return an empty string for empty input, so an untouched
//! form field shows no message.

use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid digit pattern"));
static SPECIAL: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("valid special pattern"));
static UPPERCASE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"[A-Z]").expect("valid uppercase pattern"));

/// Every rule `password` breaks, joined with `". "`.
pub fn validate_password(password: &str) -> String {
  if password.is_empty() {
    return String::new();
  }

  let mut errors = Vec::new();
  if password.chars().count() < MIN_PASSWORD_LEN {
    errors.push(format!(
      "Password must be at least {} characters",
      MIN_PASSWORD_LEN
    ));
  }
  if !DIGIT.is_match(password) {
    errors.push("Password must contain at least one number".to_string());
  }
  if !SPECIAL.is_match(password) {
    errors.push("Password must contain at least one special character".to_string());
  }
  if !UPPERCASE.is_match(password) {
    errors.push("Password must contain at least one uppercase letter".to_string());
  }
  errors.join(". ")
}

pub fn validate_email(email: &str) -> String {
  if email.is_empty() || EMAIL.is_match(email) {
    String::new()
  } else {
    "Please enter a valid email address".to_string()
  }
}
