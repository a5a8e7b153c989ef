//! Mailgun API provider.
//!
//! For reference: [Mailgun API docs](https://documentation.mailgun.com/en/latest/api-sending.html#sending)
//!
//! Every message goes out from a freshly minted sender address on the
//! configured domain (see [`IdentityMinter`]), so there is no batch-wide
//! sender to record.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailshot::providers::MailgunMailer;
//!
//! let mailer = MailgunMailer::new("your-api-key", "mg.yourdomain.com");
//! ```
//!
//! ## Configuration
//!
//! * `api_key` - Your Mailgun API key
//! * `domain` - Your sending domain (e.g., "mg.yourdomain.com" or sandbox domain)
//!
//! For EU domains, use `.base_url("https://api.eu.mailgun.net/v3")`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{multipart::Form, Client};
use serde::Deserialize;

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;
use crate::identity::{IdentityMinter, DEFAULT_DISPLAY_NAME};
use crate::mailer::{DeliveryResult, Mailer};

/// Default API endpoint.
pub const MAILGUN_BASE_URL: &str = "https://api.mailgun.net/v3";

/// Mailgun API email provider.
pub struct MailgunMailer {
    api_key: String,
    domain: String,
    base_url: String,
    display_name: String,
    minter: Arc<IdentityMinter>,
    client: Client,
}

impl MailgunMailer {
    /// Create a new Mailgun mailer with the given API key and domain.
    pub fn new(api_key: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::with_client(api_key, domain, Client::new())
    }

    /// Create with a custom reqwest client.
    pub fn with_client(
        api_key: impl Into<String>,
        domain: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            domain: domain.into(),
            base_url: MAILGUN_BASE_URL.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            minter: Arc::new(IdentityMinter::from_entropy()),
            client,
        }
    }

    /// Set a custom base URL (e.g., for EU: "https://api.eu.mailgun.net/v3").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Display name shown next to every minted address.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Share an identity minter (e.g. a seeded one for reproducible runs).
    pub fn minter(mut self, minter: Arc<IdentityMinter>) -> Self {
        self.minter = minter;
        self
    }

    /// Sending domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn auth_header(&self) -> String {
        let credentials = format!("api:{}", self.api_key);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        format!("Basic {}", encoded)
    }

    fn build_form(&self, email: &Email) -> Result<Form, MailError> {
        let from = email
            .from
            .as_ref()
            .ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut form = Form::new()
            .text("from", from.formatted())
            .text(
                "to",
                email
                    .to
                    .iter()
                    .map(|a| a.formatted())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
            .text("subject", email.subject.clone());

        if let Some(ref html) = email.html_body {
            form = form.text("html", html.clone());
        }

        Ok(form)
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let form = self.build_form(email)?;
        let url = format!("{}/{}/messages", self.base_url, self.domain);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("User-Agent", format!("mailshot/{}", crate::VERSION))
            .multipart(form)
            .send()
            .await
            .map_err(|e| MailError::provider("mailgun", e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let result: MailgunResponse = response
                .json()
                .await
                .map_err(|e| MailError::provider("mailgun", e.to_string()))?;
            Ok(DeliveryResult::with_response(
                result.id,
                serde_json::json!({
                    "provider": "mailgun",
                    "message": result.message,
                }),
            ))
        } else {
            let error_body = response.text().await.unwrap_or_default();
            let error_msg = serde_json::from_str::<MailgunError>(&error_body)
                .map(|e| e.message)
                .unwrap_or(error_body);

            Err(MailError::provider_with_status(
                "mailgun",
                error_msg,
                status.as_u16(),
            ))
        }
    }

    fn provider_name(&self) -> &'static str {
        "mailgun"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.domain.is_empty() {
            return Err(MailError::Configuration("MAILGUN_DOMAIN not set".into()));
        }
        if self.api_key.is_empty() {
            return Err(MailError::Configuration("MAILGUN_API_KEY not set".into()));
        }
        Ok(())
    }

    fn stamp_sender(&self, email: Email) -> Email {
        let address = self.minter.mint(&self.domain);
        email.put_from(Some(Address::with_name(self.display_name.as_str(), address)))
    }
}

// ============================================================================
// Mailgun API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MailgunError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header() {
        let mailer = MailgunMailer::new("key-123", "mg.example.com");
        // base64("api:key-123")
        assert_eq!(mailer.auth_header(), "Basic YXBpOmtleS0xMjM=");
    }

    #[test]
    fn test_validate_config() {
        assert!(MailgunMailer::new("key", "mg.example.com")
            .validate_config()
            .is_ok());
        assert!(MailgunMailer::new("", "mg.example.com")
            .validate_config()
            .unwrap_err()
            .is_configuration());
        assert!(MailgunMailer::new("key", "")
            .validate_config()
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn test_no_batch_sender() {
        let mailer = MailgunMailer::new("key", "mg.example.com");
        assert!(mailer.batch_sender(Some("Anyone")).is_none());
    }

    #[test]
    fn test_stamp_sender_mints_fresh_identity() {
        let mailer = MailgunMailer::new("key", "mg.example.com")
            .minter(Arc::new(IdentityMinter::from_seed(9)));

        let first = mailer.stamp_sender(Email::new().to("a@example.com"));
        let second = mailer.stamp_sender(Email::new().to("a@example.com"));

        let first = first.from.unwrap();
        let second = second.from.unwrap();
        assert_ne!(first.email, second.email);
        assert_eq!(first.domain(), Some("mg.example.com"));
        assert_eq!(first.name.as_deref(), Some(DEFAULT_DISPLAY_NAME));
    }

    #[test]
    fn test_custom_display_name() {
        let mailer = MailgunMailer::new("key", "mg.example.com").display_name("Valentine");
        let from = mailer.stamp_sender(Email::new()).from.unwrap();
        assert_eq!(from.name.as_deref(), Some("Valentine"));
    }
}
