use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactParseError {
    #[error("contact value is empty")]
    Empty,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("'{0}' is not a valid phone number")]
    InvalidPhone(String),
}

/// An email address or a phone number, the two ways a person can be reached.
///
/// Phone numbers are stored normalised: separators (spaces, dashes, dots,
/// parentheses) are removed, a leading `+` is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContactIdentity {
    Email(String),
    Phone(String),
}

impl ContactIdentity {
    /// Parses either form; anything containing `@` is treated as an email.
    pub fn parse(raw: &str) -> Result<Self, ContactParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContactParseError::Empty);
        }
        if trimmed.contains('@') {
            Self::parse_email(trimmed)
        } else {
            Self::parse_phone(trimmed)
        }
    }

    pub fn parse_email(raw: &str) -> Result<Self, ContactParseError> {
        let email = raw.trim().to_ascii_lowercase();
        if email.is_empty() {
            return Err(ContactParseError::Empty);
        }
        if !EMAIL_RE.is_match(&email) {
            return Err(ContactParseError::InvalidEmail(raw.trim().to_string()));
        }
        Ok(ContactIdentity::Email(email))
    }

    pub fn parse_phone(raw: &str) -> Result<Self, ContactParseError> {
        let digits: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();
        if digits.is_empty() {
            return Err(ContactParseError::Empty);
        }
        if !PHONE_RE.is_match(&digits) {
            return Err(ContactParseError::InvalidPhone(raw.trim().to_string()));
        }
        Ok(ContactIdentity::Phone(digits))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContactIdentity::Email(value) | ContactIdentity::Phone(value) => value,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            ContactIdentity::Phone(number) => Some(number),
            ContactIdentity::Email(_) => None,
        }
    }
}

impl FromStr for ContactIdentity {
    type Err = ContactParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
