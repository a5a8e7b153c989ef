//! In-memory capture of delivered emails for the local mailer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::email::Email;

/// An email captured by [`LocalMailer`](crate::providers::LocalMailer).
#[derive(Debug, Clone)]
pub struct CapturedEmail {
    /// Unique identifier, also returned as the delivery message id.
    pub id: String,
    /// The email as it was delivered, sender stamped.
    pub email: Email,
    /// When the email was captured.
    pub sent_at: DateTime<Utc>,
}

/// Thread-safe, insertion-ordered store of captured emails.
#[derive(Debug, Default)]
pub struct Outbox {
    emails: RwLock<Vec<CapturedEmail>>,
}

impl Outbox {
    /// Create a new empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an outbox wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Capture an email and return its id.
    pub fn push(&self, email: Email) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.emails.write().push(CapturedEmail {
            id: id.clone(),
            email,
            sent_at: Utc::now(),
        });
        id
    }

    /// Get a captured email by id.
    pub fn get(&self, id: &str) -> Option<CapturedEmail> {
        self.emails.read().iter().find(|c| c.id == id).cloned()
    }

    /// All captured emails, newest first.
    pub fn all(&self) -> Vec<CapturedEmail> {
        self.emails.read().iter().rev().cloned().collect()
    }

    /// Number of captured emails.
    pub fn count(&self) -> usize {
        self.emails.read().len()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.emails.write().clear();
    }

    /// Remove and return everything, newest first.
    pub fn flush(&self) -> Vec<CapturedEmail> {
        let mut drained = std::mem::take(&mut *self.emails.write());
        drained.reverse();
        drained
    }
}
