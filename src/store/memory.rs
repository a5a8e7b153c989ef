//! In-memory [`Store`] backend.
//!
//! All state sits behind one mutex, so an upsert's lookup and insert are a
//! single critical section. Faults can be injected per operation to drive
//! the dispatcher's failure paths in tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{
    NewSend, RecipientId, SendHistoryEntry, SendId, SendRecord, SendStatus, SenderId, Stats,
    Store, StoredRecipient, StoredSender, StoredTemplate, TemplateId,
};
use crate::error::StoreError;
use crate::recipient::Recipient;

#[derive(Default)]
struct Faults {
    templates: bool,
    senders: bool,
    sends: bool,
    recipients: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    templates: Vec<StoredTemplate>,
    senders: Vec<StoredSender>,
    sender_index: HashMap<String, SenderId>,
    recipients: Vec<StoredRecipient>,
    recipient_index: HashMap<String, RecipientId>,
    sends: Vec<SendRecord>,
    // Last send id handed out. Pruning never rewinds it.
    last_send_id: SendId,
    faults: Faults,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Fault injection (for testing)
    // =========================================================================

    /// Make `insert_template` fail.
    pub fn fail_templates(&self) {
        self.inner.lock().faults.templates = true;
    }

    /// Make `upsert_sender` fail.
    pub fn fail_senders(&self) {
        self.inner.lock().faults.senders = true;
    }

    /// Make `append_send` fail.
    pub fn fail_sends(&self) {
        self.inner.lock().faults.sends = true;
    }

    /// Make `upsert_recipient` fail for this email.
    pub fn fail_recipient(&self, email: impl Into<String>) {
        self.inner.lock().faults.recipients.insert(email.into());
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.inner.lock().faults = Faults::default();
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn templates(&self) -> Vec<StoredTemplate> {
        self.inner.lock().templates.clone()
    }

    pub fn senders(&self) -> Vec<StoredSender> {
        self.inner.lock().senders.clone()
    }

    /// Send records in append order.
    pub fn sends(&self) -> Vec<SendRecord> {
        self.inner.lock().sends.clone()
    }

    /// Send records referencing `template_id`.
    pub fn sends_for(&self, template_id: TemplateId) -> Vec<SendRecord> {
        self.inner
            .lock()
            .sends
            .iter()
            .filter(|r| r.send.template_id == template_id)
            .cloned()
            .collect()
    }
}

fn next_id(len: usize) -> i64 {
    len as i64 + 1
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {} failure", what))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_template(&self, subject: &str, body: &str) -> Result<TemplateId, StoreError> {
        let mut inner = self.inner.lock();
        if inner.faults.templates {
            return Err(injected("template"));
        }
        let id = next_id(inner.templates.len());
        inner.templates.push(StoredTemplate {
            id,
            subject: subject.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn upsert_sender(
        &self,
        address: &str,
        display_name: &str,
    ) -> Result<SenderId, StoreError> {
        let mut inner = self.inner.lock();
        if inner.faults.senders {
            return Err(injected("sender"));
        }
        if let Some(id) = inner.sender_index.get(address) {
            return Ok(*id);
        }
        let id = next_id(inner.senders.len());
        inner.senders.push(StoredSender {
            id,
            address: address.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        });
        inner.sender_index.insert(address.to_string(), id);
        Ok(id)
    }

    async fn upsert_recipient(&self, recipient: &Recipient) -> Result<RecipientId, StoreError> {
        let mut inner = self.inner.lock();
        if inner.faults.recipients.contains(&recipient.email) {
            return Err(injected("recipient"));
        }
        if let Some(id) = inner.recipient_index.get(&recipient.email) {
            return Ok(*id);
        }
        let id = next_id(inner.recipients.len());
        inner.recipients.push(StoredRecipient {
            id,
            email: recipient.email.clone(),
            name: recipient.name.clone(),
            company: recipient.company.clone(),
            city: recipient.city.clone(),
            created_at: Utc::now(),
        });
        inner.recipient_index.insert(recipient.email.clone(), id);
        Ok(id)
    }

    async fn append_send(&self, send: NewSend) -> Result<SendId, StoreError> {
        let mut inner = self.inner.lock();
        if inner.faults.sends {
            return Err(injected("send record"));
        }
        if !inner.templates.iter().any(|t| t.id == send.template_id) {
            return Err(StoreError::Constraint(format!(
                "template {} does not exist",
                send.template_id
            )));
        }
        inner.last_send_id += 1;
        let id = inner.last_send_id;
        inner.sends.push(SendRecord { id, send });
        Ok(id)
    }

    async fn history(&self) -> Result<Vec<SendHistoryEntry>, StoreError> {
        let inner = self.inner.lock();
        let lookup_sender = |id: SenderId| inner.senders.iter().find(|s| s.id == id);
        let lookup_recipient = |id: RecipientId| inner.recipients.iter().find(|r| r.id == id);

        let mut entries: Vec<SendHistoryEntry> = inner
            .sends
            .iter()
            .map(|record| {
                let send = &record.send;
                let sender = send.sender_id.and_then(lookup_sender);
                let recipient = send.recipient_id.and_then(lookup_recipient);
                SendHistoryEntry {
                    id: record.id,
                    subject: inner
                        .templates
                        .iter()
                        .find(|t| t.id == send.template_id)
                        .map(|t| t.subject.clone())
                        .unwrap_or_default(),
                    sender_address: sender.map(|s| s.address.clone()),
                    sender_name: sender.map(|s| s.display_name.clone()),
                    recipient_email: recipient.map(|r| r.email.clone()),
                    recipient_name: recipient.map(|r| r.name.clone()),
                    status: send.status,
                    error: send.error.clone(),
                    sent_at: send.sent_at,
                }
            })
            .collect();

        entries.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn stats(&self) -> Result<Stats, StoreError> {
        let inner = self.inner.lock();
        let sent = inner
            .sends
            .iter()
            .filter(|r| r.send.status == SendStatus::Sent)
            .count() as u64;
        let total_sends = inner.sends.len() as u64;
        Ok(Stats {
            total_sends,
            sent,
            failed: total_sends - sent,
            total_recipients: inner.recipients.len() as u64,
            total_senders: inner.senders.len() as u64,
        })
    }

    async fn recipients(&self) -> Result<Vec<StoredRecipient>, StoreError> {
        Ok(self.inner.lock().recipients.iter().rev().cloned().collect())
    }

    async fn search_recipients(&self, fragment: &str) -> Result<Vec<StoredRecipient>, StoreError> {
        let needle = fragment.to_ascii_lowercase();
        Ok(self
            .inner
            .lock()
            .recipients
            .iter()
            .rev()
            .filter(|r| r.email.to_ascii_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn prune_sends(&self, older_than: chrono::Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - older_than;
        let mut inner = self.inner.lock();
        let before = inner.sends.len();
        inner.sends.retain(|r| r.send.sent_at >= cutoff);
        Ok((before - inner.sends.len()) as u64)
    }
}
