//! Persistence for templates, identities, recipients and the send audit log.
//!
//! The dispatcher only ever talks to the [`Store`] trait. Two backends ship
//! with the crate:
//!
//! - [`MemoryStore`] - always available, with failure injection for tests
//! - `SqliteStore` - feature `sqlite`, one file (or `:memory:`) database
//!
//! Natural-key upserts (`upsert_sender`, `upsert_recipient`) are
//! insert-or-get: an existing row is returned untouched, never rewritten.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::recipient::Recipient;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

pub type TemplateId = i64;
pub type SenderId = i64;
pub type RecipientId = i64;
pub type SendId = i64;

/// Outcome recorded for one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Failed,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Sent => "sent",
            SendStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(SendStatus::Sent),
            "failed" => Ok(SendStatus::Failed),
            other => Err(StoreError::Query(format!("unknown send status: {}", other))),
        }
    }
}

/// A send record about to be appended.
///
/// `sender_id` and `recipient_id` are `None` when the unit failed before
/// that row could be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSend {
    pub template_id: TemplateId,
    pub sender_id: Option<SenderId>,
    pub recipient_id: Option<RecipientId>,
    pub status: SendStatus,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NewSend {
    /// A successful send, timestamped now.
    pub fn sent(
        template_id: TemplateId,
        sender_id: Option<SenderId>,
        recipient_id: Option<RecipientId>,
    ) -> Self {
        Self {
            template_id,
            sender_id,
            recipient_id,
            status: SendStatus::Sent,
            error: None,
            sent_at: Utc::now(),
        }
    }

    /// A failed send, timestamped now.
    pub fn failed(
        template_id: TemplateId,
        sender_id: Option<SenderId>,
        recipient_id: Option<RecipientId>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            template_id,
            sender_id,
            recipient_id,
            status: SendStatus::Failed,
            error: Some(error.into()),
            sent_at: Utc::now(),
        }
    }
}

/// A persisted send record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRecord {
    pub id: SendId,
    #[serde(flatten)]
    pub send: NewSend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTemplate {
    pub id: TemplateId,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSender {
    pub id: SenderId,
    pub address: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecipient {
    pub id: RecipientId,
    pub email: String,
    pub name: String,
    pub company: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the joined send history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendHistoryEntry {
    pub id: SendId,
    pub subject: String,
    pub sender_address: Option<String>,
    pub sender_name: Option<String>,
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
    pub status: SendStatus,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_sends: u64,
    pub sent: u64,
    pub failed: u64,
    pub total_recipients: u64,
    pub total_senders: u64,
}

/// Backend-agnostic repository used by the dispatcher and the reporting
/// routes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append a template.
    async fn insert_template(&self, subject: &str, body: &str) -> Result<TemplateId, StoreError>;

    /// Insert-or-get a sender identity by address.
    async fn upsert_sender(&self, address: &str, display_name: &str)
        -> Result<SenderId, StoreError>;

    /// Insert-or-get a recipient by email.
    async fn upsert_recipient(&self, recipient: &Recipient) -> Result<RecipientId, StoreError>;

    /// Append a send record.
    async fn append_send(&self, send: NewSend) -> Result<SendId, StoreError>;

    // ── Reporting ───────────────────────────────────────────────────

    /// Joined send history, newest first.
    async fn history(&self) -> Result<Vec<SendHistoryEntry>, StoreError>;

    async fn stats(&self) -> Result<Stats, StoreError>;

    /// All recipients, newest first.
    async fn recipients(&self) -> Result<Vec<StoredRecipient>, StoreError>;

    /// Recipients whose email contains `fragment` (ASCII case-insensitive).
    async fn search_recipients(&self, fragment: &str) -> Result<Vec<StoredRecipient>, StoreError>;

    /// Delete send records older than `older_than`. Returns how many went.
    async fn prune_sends(&self, older_than: chrono::Duration) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_status_round_trip() {
        for status in [SendStatus::Sent, SendStatus::Failed] {
            assert_eq!(status.as_str().parse::<SendStatus>().unwrap(), status);
        }
        assert!("bounced".parse::<SendStatus>().is_err());
    }

    #[test]
    fn test_new_send_constructors() {
        let ok = NewSend::sent(1, Some(2), Some(3));
        assert_eq!(ok.status, SendStatus::Sent);
        assert!(ok.error.is_none());

        let failed = NewSend::failed(1, None, None, "boom");
        assert_eq!(failed.status, SendStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
