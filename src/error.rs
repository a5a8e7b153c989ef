//! Error types for mailshot.
//!
//! Three layers, three enums:
//!
//! - [`MailError`] - provider adapters (configuration and delivery failures)
//! - [`StoreError`] - the repository
//! - [`DispatchError`] - batch-level aborts raised by the dispatcher
//!
//! Per-recipient failures never surface as `Err` to the batch caller; they are
//! recorded in the send record instead.

use thiserror::Error;

use crate::providers::ProviderKind;

/// Errors that can occur when sending a single email.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Missing or invalid provider configuration. Raised before any network I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Error building the email message.
    #[error("Build error: {0}")]
    BuildError(String),

    /// Transport or API failure, including timeouts.
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        provider: &'static str,
        message: String,
        /// Optional HTTP status code
        status: Option<u16>,
    },
}

impl MailError {
    /// Create a provider-specific error.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
            status: None,
        }
    }

    /// Create a provider error with HTTP status.
    pub fn provider_with_status(
        provider: &'static str,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Whether this is a configuration problem rather than a delivery failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// HTTP status returned by the provider, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ProviderError { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::BuildError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::provider("smtp", err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

#[cfg(feature = "_http")]
impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::provider_with_status("http", err.to_string(), status.as_u16()),
            None => Self::provider("http", err.to_string()),
        }
    }
}

/// Repository failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store could not be reached or is closed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A read or write failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// A uniqueness or reference constraint was violated.
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(msg.unwrap_or_else(|| e.to_string()))
            }
            other => Self::Query(other.to_string()),
        }
    }
}

/// Errors that abort a whole batch before any recipient is processed.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The batch named a provider this crate does not know.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// The provider is known but no mailer was registered for it.
    #[error("No mailer registered for provider {0}")]
    ProviderNotRegistered(ProviderKind),

    /// The template could not be persisted.
    #[error("Failed to persist template: {0}")]
    Template(#[source] StoreError),

    /// The batch-wide sender identity could not be persisted.
    #[error("Failed to persist sender identity: {0}")]
    Sender(#[source] StoreError),

    /// The batch task itself died.
    #[error("Batch task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = MailError::provider_with_status("mailgun", "Forbidden", 403);
        assert_eq!(err.to_string(), "Provider error (mailgun): Forbidden");
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_error() {
        let err = MailError::Configuration("MAILGUN_API_KEY not set".into());
        assert!(err.is_configuration());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_dispatch_error_wraps_store_error() {
        let err = DispatchError::Template(StoreError::Unavailable("disk full".into()));
        assert_eq!(
            err.to_string(),
            "Failed to persist template: Store unavailable: disk full"
        );
    }
}
