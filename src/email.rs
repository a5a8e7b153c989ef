//! Email struct with builder pattern.

use serde::{Deserialize, Serialize};

use crate::address::{Address, ToAddress};

/// A single outbound email message.
///
/// ```
/// use mailshot::Email;
///
/// let email = Email::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello!")
///     .html_body("<h1>Hi</h1>");
/// assert!(email.is_valid());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Email {
    /// Sender address. Providers that mint a fresh identity per message fill
    /// this in themselves.
    pub from: Option<Address>,
    /// Primary recipients
    pub to: Vec<Address>,
    /// Email subject line
    pub subject: String,
    /// HTML body
    pub html_body: Option<String>,
}

impl Email {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    pub fn from(mut self, addr: impl ToAddress) -> Self {
        self.from = Some(addr.to_address());
        self
    }

    /// Set or clear the sender address.
    pub fn put_from(mut self, addr: Option<Address>) -> Self {
        self.from = addr;
        self
    }

    /// Add a recipient.
    pub fn to(mut self, addr: impl ToAddress) -> Self {
        self.to.push(addr.to_address());
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the HTML body.
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Check that the email has a sender and at least one recipient.
    pub fn is_valid(&self) -> bool {
        self.from.is_some() && !self.to.is_empty()
    }

    /// Recipient addresses, for logging.
    pub fn recipient_emails(&self) -> Vec<&str> {
        self.to.iter().map(|a| a.email.as_str()).collect()
    }
}
