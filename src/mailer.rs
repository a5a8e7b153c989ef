//! Mailer trait and delivery result types.
//!
//! The dispatcher holds providers as `Arc<dyn Mailer>` so the provider can be
//! chosen per batch at runtime, hence `#[async_trait]` rather than native
//! async trait methods (which are not object-safe).
//!
//! Providers implement [`Mailer::deliver`], the raw transport call. The
//! dispatcher calls [`Mailer::send`], which wraps `deliver` with the
//! configuration check, sender identity assignment and the per-call timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;

/// Timeout applied to every provider transport call.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful email delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Message ID assigned by the provider
    pub message_id: String,
    /// Optional provider-specific response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

impl DeliveryResult {
    /// Create a new delivery result with just a message ID.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: None,
        }
    }

    /// Create a delivery result with provider response.
    pub fn with_response(message_id: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: Some(response),
        }
    }
}

/// What happened to one [`Mailer::send`] call.
///
/// `from` is the identity the message went out as. It is present even when
/// delivery failed, so a freshly minted identity can still be recorded.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Sender identity used for the attempt.
    pub from: Option<Address>,
    /// Provider result.
    pub result: Result<DeliveryResult, MailError>,
}

impl SendOutcome {
    /// Whether the provider accepted the message.
    pub fn is_sent(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&MailError> {
        self.result.as_ref().err()
    }
}

/// Trait for email delivery providers.
///
/// # Sender identity
///
/// Providers fall in two groups:
///
/// - **Fixed identity** - one address for the whole batch. Return it from
///   [`batch_sender`](Mailer::batch_sender); the dispatcher stamps it on
///   every email before calling `send`.
/// - **Per-message identity** - return `None` from `batch_sender` and set
///   `from` in [`stamp_sender`](Mailer::stamp_sender), which runs once per
///   `send` call.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Perform the transport call for a single, fully addressed email.
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError>;

    /// Get the provider name (for logging and metrics).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }

    /// Check required configuration without touching the network.
    fn validate_config(&self) -> Result<(), MailError> {
        Ok(())
    }

    /// The identity reused by every send in a batch, or `None` when this
    /// provider mints one per message.
    fn batch_sender(&self, _display_name: Option<&str>) -> Option<Address> {
        None
    }

    /// Assign a per-message sender identity. Called after `validate_config`
    /// succeeds and before `deliver`.
    fn stamp_sender(&self, email: Email) -> Email {
        email
    }

    /// Upper bound for a single `deliver` call.
    fn send_timeout(&self) -> Duration {
        DEFAULT_SEND_TIMEOUT
    }

    /// Validate, stamp the sender, and deliver under the send timeout.
    ///
    /// A timeout is reported as [`MailError::ProviderError`].
    async fn send(&self, email: Email) -> SendOutcome {
        if let Err(e) = self.validate_config() {
            return SendOutcome {
                from: email.from,
                result: Err(e),
            };
        }

        let email = self.stamp_sender(email);
        let from = email.from.clone();
        let provider = self.provider_name();
        let limit = self.send_timeout();

        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let result = match tokio::time::timeout(limit, self.deliver(&email)).await {
            Ok(result) => result,
            Err(_) => Err(MailError::provider(
                provider,
                format!("request timed out after {}s", limit.as_secs_f64()),
            )),
        };

        #[cfg(feature = "metrics")]
        {
            let duration = start.elapsed().as_secs_f64();
            let status = if result.is_ok() { "success" } else { "error" };
            metrics::counter!("mailshot_emails_total", "provider" => provider, "status" => status)
                .increment(1);
            metrics::histogram!("mailshot_delivery_duration_seconds", "provider" => provider)
                .record(duration);
        }

        match &result {
            Ok(r) => tracing::debug!(
                provider,
                message_id = %r.message_id,
                to = ?email.recipient_emails(),
                "Email delivered"
            ),
            Err(e) => tracing::warn!(
                provider,
                error = %e,
                to = ?email.recipient_emails(),
                "Email delivery failed"
            ),
        }

        SendOutcome { from, result }
    }
}
