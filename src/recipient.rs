//! Batch recipient.

use serde::{Deserialize, Serialize};

use crate::address::{Address, ToAddress};
use crate::error::MailError;

/// One row of a batch: who to send to and the fields available to
/// personalization.
///
/// `email` is the natural key used by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Email address (natural key)
    pub email: String,
    /// Display name, substituted for `{{name}}`
    #[serde(default)]
    pub name: String,
    /// Substituted for `{{company}}`
    #[serde(default)]
    pub company: String,
    /// Substituted for `{{city}}`
    #[serde(default)]
    pub city: String,
}

impl Recipient {
    /// Recipient with only an email address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the company.
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    /// Set the city.
    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    /// The validated delivery address, carrying the name when there is one.
    pub fn address(&self) -> Result<Address, MailError> {
        let address = Address::parse(self.email.trim())?;
        Ok(if self.name.is_empty() {
            address
        } else {
            address.name(self.name.as_str())
        })
    }
}

impl ToAddress for Recipient {
    fn to_address(&self) -> Address {
        if self.name.is_empty() {
            Address::new(self.email.as_str())
        } else {
            Address::with_name(self.name.as_str(), self.email.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_optional_fields() {
        let r: Recipient = serde_json::from_str(r#"{"email":"a@b.com","name":"Ann"}"#).unwrap();
        assert_eq!(r, Recipient::new("a@b.com").name("Ann"));
        assert!(r.company.is_empty());
        assert!(r.city.is_empty());
    }

    #[test]
    fn test_to_address() {
        assert_eq!(
            Recipient::new("a@b.com").name("Ann").to_address().formatted(),
            "Ann <a@b.com>"
        );
        assert_eq!(Recipient::new("a@b.com").to_address().name, None);
    }

    #[test]
    fn test_address_validates() {
        let address = Recipient::new(" ada@example.com ").name("Ada").address().unwrap();
        assert_eq!(address.formatted(), "Ada <ada@example.com>");

        let err = Recipient::new("ada at example").address().unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
        assert!(Recipient::new("").address().is_err());
    }
}
