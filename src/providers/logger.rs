//! Logger mailer that only logs emails.
//!
//! Handy for dry runs of a batch: every message is accepted, nothing leaves
//! the process, and the personalized output shows up in the trace.

use async_trait::async_trait;

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};
use crate::providers::LOCAL_SENDER;

/// Logger mailer that emits tracing events for emails.
pub struct LoggerMailer {
    /// If true, log full email details. If false, just log recipient summary.
    log_full: bool,
}

impl LoggerMailer {
    /// Create a logger mailer with brief output (just recipients).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger mailer with full email details.
    pub fn full() -> Self {
        Self { log_full: true }
    }

    /// Set whether to log full email details.
    pub fn log_full(mut self, full: bool) -> Self {
        self.log_full = full;
        self
    }
}

impl Default for LoggerMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for LoggerMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let message_id = uuid::Uuid::new_v4().to_string();

        if self.log_full {
            tracing::info!(
                message_id = %message_id,
                from = ?email.from.as_ref().map(|a| a.formatted()),
                to = ?email.to.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                subject = %email.subject,
                has_html = email.html_body.is_some(),
                "Email logged (full)"
            );

            if let Some(ref html) = email.html_body {
                tracing::debug!(body = %html, "HTML body");
            }
        } else {
            tracing::info!(
                message_id = %message_id,
                to = ?email.recipient_emails(),
                subject = %email.subject,
                "Email logged"
            );
        }

        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }

    fn batch_sender(&self, display_name: Option<&str>) -> Option<Address> {
        Some(match display_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => Address::with_name(name, LOCAL_SENDER),
            None => Address::new(LOCAL_SENDER),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logger_brief() {
        let mailer = LoggerMailer::new();

        let email = Email::new()
            .from(Address::new("sender@example.com"))
            .to(Address::new("recipient@example.com"))
            .subject("Test Subject")
            .html_body("<p>Hello, World!</p>");

        let delivery = mailer.deliver(&email).await.unwrap();
        assert!(!delivery.message_id.is_empty());
    }

    #[tokio::test]
    async fn test_logger_full_via_send() {
        let mailer = LoggerMailer::full();

        let email = Email::new()
            .from(Address::with_name("Alice", "alice@example.com"))
            .to(Address::new("bob@example.com"))
            .subject("Test Subject")
            .html_body("<p>HTML</p>");

        let outcome = mailer.send(email).await;
        assert!(outcome.is_sent());
        assert_eq!(outcome.from.unwrap().email, "alice@example.com");
    }

    #[test]
    fn test_fixed_identity() {
        let mailer = LoggerMailer::new();
        assert_eq!(mailer.batch_sender(None).unwrap().email, LOCAL_SENDER);
        assert_eq!(
            mailer.batch_sender(Some("Ops")).unwrap().formatted(),
            "Ops <noreply@localhost>"
        );
    }

    #[test]
    fn test_builder() {
        assert!(LoggerMailer::new().log_full(true).log_full);
        assert!(!LoggerMailer::default().log_full);
        assert_eq!(LoggerMailer::new().provider_name(), "logger");
    }
}
