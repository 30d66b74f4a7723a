//! Validated identity fields shared by users, patients and vendors

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use super::ValidationError;

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 100;
const MIN_PHONE_LEN: usize = 7;
const MAX_PHONE_LEN: usize = 20;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// local@domain.tld, no whitespace
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]+$").expect("invalid phone regex"));

/// Email address, stored lowercased so uniqueness is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// # Example
    /// ```
    /// use carectl_core::models::Email;
    ///
    /// assert_eq!(Email::new(" Nurse@Ward.org ").unwrap().as_str(), "nurse@ward.org");
    /// assert!(Email::new("not-an-email").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }
        if s.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }
        if !EMAIL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must look like name@example.org",
            });
        }
        Ok(Self(s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Display name of a person (staff member, patient, vendor contact).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName(String);

impl PersonName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        super::validation::required_text(s, "name", MAX_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Phone number: digits with optional leading `+`, spaces, dashes, parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phone(String);

impl Phone {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "phone" });
        }
        if s.len() < MIN_PHONE_LEN {
            return Err(ValidationError::TooShort {
                field: "phone",
                min: MIN_PHONE_LEN,
            });
        }
        if s.len() > MAX_PHONE_LEN {
            return Err(ValidationError::TooLong {
                field: "phone",
                max: MAX_PHONE_LEN,
            });
        }
        if !PHONE_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "phone",
                reason: "only digits, spaces, '+', '-', '(' and ')' are allowed",
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Parse an optional phone; blank input is treated as absent.
    pub fn optional(s: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match s.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => Self::new(v).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plaintext password as received from a client. Never serialized.
pub struct Password(String);

impl Password {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let len = s.chars().count();
        if len < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if len > MAX_PASSWORD_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN,
            });
        }
        let has_letter = s.chars().any(|c| c.is_alphabetic());
        let has_digit = s.chars().any(|c| c.is_ascii_digit());
        if !(has_letter && has_digit) {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                reason: "must contain at least one letter and one digit",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

macro_rules! serialize_as_str {
    ($($ty:ty),*) => {
        $(impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        })*
    };
}

serialize_as_str!(Email, PersonName, Phone);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased() {
        let email = Email::new("Dr.House@Hospital.ORG").unwrap();
        assert_eq!(email.as_str(), "dr.house@hospital.org");
    }

    #[test]
    fn email_rejects_garbage() {
        assert!(matches!(Email::new(""), Err(ValidationError::Empty { .. })));
        assert!(matches!(
            Email::new("two@@at.org"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            Email::new("no spaces@x.org"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn name_bounds() {
        assert_eq!(PersonName::new(" Ada ").unwrap().as_str(), "Ada");
        assert!(PersonName::new(&"x".repeat(101)).is_err());
    }

    #[test]
    fn phone_formats() {
        assert!(Phone::new("+1 (555) 123-4567").is_ok());
        assert!(matches!(Phone::new("12345"), Err(ValidationError::TooShort { .. })));
        assert!(matches!(
            Phone::new("555-CALL-NOW"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(Phone::optional(Some("  ")).unwrap().is_none());
    }

    #[test]
    fn password_rules() {
        assert!(Password::new("s3cretpass").is_ok());
        assert!(matches!(
            Password::new("short1"),
            Err(ValidationError::TooShort { .. })
        ));
        assert!(matches!(
            Password::new("lettersonly"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert_eq!(
            format!("{:?}", Password::new("s3cretpass").unwrap()),
            "Password(<redacted>)"
        );
    }
}
