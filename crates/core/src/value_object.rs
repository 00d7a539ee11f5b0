//! Value object trait: equality by value, not identity.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two e-mail
/// addresses with the same text are the same address.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A syntactically plausible e-mail address.
///
/// The domain part is lower-cased on construction; the local part is kept
/// as given since mail servers may treat it case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let raw = raw.as_ref().trim();
        let (local, domain) = raw
            .rsplit_once('@')
            .ok_or_else(|| DomainError::validation("email address must contain '@'"))?;

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::validation(
                "email address needs a local part and a domain",
            ));
        }
        if raw.chars().any(char::is_whitespace) || local.contains('@') {
            return Err(DomainError::validation(format!(
                "malformed email address: {raw}"
            )));
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for EmailAddress {}

impl core::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EmailAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_normalized() {
        let email = EmailAddress::parse("Jane.Doe@Example.COM").unwrap();
        assert_eq!(email.as_str(), "Jane.Doe@example.com");
    }

    #[test]
    fn rejects_missing_parts() {
        assert!(EmailAddress::parse("nobody").is_err());
        assert!(EmailAddress::parse("@example.com").is_err());
        assert!(EmailAddress::parse("someone@").is_err());
        assert!(EmailAddress::parse("a b@example.com").is_err());
        assert!(EmailAddress::parse("a@b@example.com").is_err());
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: EmailAddress = serde_json::from_str("\"x@y.com\"").unwrap();
        assert_eq!(ok.as_str(), "x@y.com");
        assert!(serde_json::from_str::<EmailAddress>("\"broken\"").is_err());
    }
}
