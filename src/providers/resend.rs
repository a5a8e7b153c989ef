//! Resend API provider.
//!
//! The sender address is derived per batch from the batch display name and
//! the domain of the configured default sender: a display name of
//! `"Acme Support"` with a default sender of `hello@acme.dev` sends from
//! `Acme Support <acme-support@acme.dev>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailshot::providers::ResendMailer;
//!
//! let mailer = ResendMailer::new("re_xxxxx", "hello@acme.dev");
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;
use crate::identity::address_slug;
use crate::mailer::{DeliveryResult, Mailer};

/// Default API endpoint.
pub const RESEND_API_URL: &str = "https://api.resend.com";

/// Resend API email provider.
pub struct ResendMailer {
    api_key: String,
    default_from: String,
    client: Client,
    base_url: String,
}

impl ResendMailer {
    /// Create a new Resend mailer with the given API key and default sender.
    pub fn new(api_key: impl Into<String>, default_from: impl Into<String>) -> Self {
        Self::with_client(api_key, default_from, Client::new())
    }

    /// Create with a custom reqwest client.
    pub fn with_client(
        api_key: impl Into<String>,
        default_from: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            default_from: default_from.into(),
            client,
            base_url: RESEND_API_URL.to_string(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn sending_domain(&self) -> Option<&str> {
        self.default_from
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }

    fn build_request(&self, email: &Email) -> Result<ResendRequest, MailError> {
        let from = email.from.as_ref().ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        Ok(ResendRequest {
            from: from.formatted(),
            to: email.to.iter().map(|a| a.formatted()).collect(),
            subject: email.subject.clone(),
            html: email.html_body.clone(),
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let request = self.build_request(email)?;

        let url = format!("{}/emails", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("mailshot/{}", crate::VERSION))
            .json(&request)
            .send()
            .await
            .map_err(|e| MailError::provider("resend", e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let result: ResendResponse = response
                .json()
                .await
                .map_err(|e| MailError::provider("resend", e.to_string()))?;
            Ok(DeliveryResult::with_response(
                result.id,
                serde_json::json!({ "provider": "resend" }),
            ))
        } else {
            let error: ResendError = response.json().await.unwrap_or(ResendError {
                message: "Unknown error".to_string(),
                name: None,
            });
            Err(MailError::provider_with_status(
                "resend",
                error.message,
                status.as_u16(),
            ))
        }
    }

    fn provider_name(&self) -> &'static str {
        "resend"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.api_key.is_empty() {
            return Err(MailError::Configuration("RESEND_API_KEY not set".into()));
        }
        if self.sending_domain().is_none() {
            return Err(MailError::Configuration(
                "RESEND_FROM_EMAIL must be an address with a domain".into(),
            ));
        }
        Ok(())
    }

    fn batch_sender(&self, display_name: Option<&str>) -> Option<Address> {
        let domain = self.sending_domain()?;
        let display_name = display_name.map(str::trim).unwrap_or("");
        let email = format!("{}@{}", address_slug(display_name), domain);

        Some(if display_name.is_empty() {
            Address::new(email)
        } else {
            Address::with_name(display_name, email)
        })
    }
}

// ============================================================================
// Resend API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendError {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    name: Option<String>,
}
