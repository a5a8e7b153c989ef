//! Batch dispatch.
//!
//! A [`Dispatcher`] takes a [`BatchRequest`], persists the template, and
//! sends one personalized email per recipient through the chosen provider.
//! Units run concurrently up to the provider's [`DispatchPolicy`] ceiling.
//! Each unit records exactly one send record and publishes one progress
//! event, whatever happens to it.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mailshot::{BatchRequest, Broadcaster, Dispatcher, MemoryStore, Recipient};
//!
//! let dispatcher = Arc::new(Dispatcher::new(store, registry, PolicyTable::new()));
//! let broadcaster = Broadcaster::new();
//!
//! let batch = BatchRequest::new("Hello", "<p>Hi {{name}}</p>")
//!     .recipient(Recipient::new("alice@example.com").name("Alice"));
//! let handle = dispatcher.spawn(batch, Arc::new(broadcaster.clone()));
//! let report = handle.wait().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;
use uuid::Uuid;

use crate::address::Address;
use crate::email::Email;
use crate::error::DispatchError;
use crate::mailer::Mailer;
use crate::progress::{Notification, ProgressEvent, ProgressSink};
use crate::providers::ProviderKind;
use crate::recipient::Recipient;
use crate::store::{NewSend, SenderId, Store, TemplateId};
use crate::template::personalize;

pub mod policy;
pub use policy::{DispatchPolicy, PolicyTable};

// ============================================================================
// Requests and reports
// ============================================================================

/// A batch as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(alias = "emails")]
    pub recipients: Vec<Recipient>,
    pub subject: String,
    /// HTML body with `{{name}}`, `{{company}}`, `{{city}}`, `{{email}}`
    /// placeholders.
    pub body: String,
    /// Provider name; the registry default when absent or blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Display name for fixed-identity providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_display_name: Option<String>,
}

impl BatchRequest {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn recipients(mut self, recipients: impl IntoIterator<Item = Recipient>) -> Self {
        self.recipients.extend(recipients);
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn sender_display_name(mut self, name: impl Into<String>) -> Self {
        self.sender_display_name = Some(name.into());
        self
    }
}

/// Final counts for a drained batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub provider: ProviderKind,
    pub template_id: TemplateId,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

impl BatchReport {
    /// Whether every recipient was sent.
    pub fn all_sent(&self) -> bool {
        self.sent == self.total
    }
}

/// A batch running in the background.
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: Uuid,
    handle: JoinHandle<Result<BatchReport, DispatchError>>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the batch to drain.
    pub async fn wait(self) -> Result<BatchReport, DispatchError> {
        self.handle
            .await
            .map_err(|e| DispatchError::Join(e.to_string()))?
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The mailers a dispatcher can route to, plus the default choice.
#[derive(Clone)]
pub struct MailerRegistry {
    mailers: HashMap<ProviderKind, Arc<dyn Mailer>>,
    default: ProviderKind,
}

impl MailerRegistry {
    pub fn new(default: ProviderKind) -> Self {
        Self {
            mailers: HashMap::new(),
            default,
        }
    }

    /// Register (or replace) the mailer for `kind`.
    pub fn register(mut self, kind: ProviderKind, mailer: Arc<dyn Mailer>) -> Self {
        self.insert(kind, mailer);
        self
    }

    pub fn insert(&mut self, kind: ProviderKind, mailer: Arc<dyn Mailer>) {
        self.mailers.insert(kind, mailer);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn Mailer>> {
        self.mailers.get(&kind).cloned()
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default
    }

    /// Registered kinds, in [`ProviderKind::ALL`] order.
    pub fn providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.mailers.contains_key(kind))
            .collect()
    }
}

impl std::fmt::Debug for MailerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerRegistry")
            .field("providers", &self.providers())
            .field("default", &self.default)
            .finish()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Runs batches against a store and a set of mailers.
pub struct Dispatcher {
    store: Arc<dyn Store>,
    mailers: MailerRegistry,
    policies: PolicyTable,
}

/// Identity reused by every unit of a fixed-identity batch.
#[derive(Clone)]
struct BatchSender {
    address: Address,
    id: SenderId,
}

struct Prepared {
    kind: ProviderKind,
    mailer: Arc<dyn Mailer>,
    template_id: TemplateId,
    sender: Option<BatchSender>,
}

#[derive(Default)]
struct Tally {
    sent: usize,
    failed: usize,
}

/// Everything a unit needs, shared by all units of a batch.
struct UnitContext {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    sink: Arc<dyn ProgressSink>,
    template_id: TemplateId,
    subject: String,
    body: String,
    sender: Option<BatchSender>,
    policy: DispatchPolicy,
    total: usize,
    tally: Mutex<Tally>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, mailers: MailerRegistry, policies: PolicyTable) -> Self {
        Self {
            store,
            mailers,
            policies,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn mailers(&self) -> &MailerRegistry {
        &self.mailers
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Run a batch to completion.
    ///
    /// Per-recipient failures are recorded and counted, never returned. An
    /// `Err` means the batch was aborted before any recipient was processed.
    pub async fn process_batch(
        &self,
        batch: BatchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<BatchReport, DispatchError> {
        self.run(Uuid::new_v4(), batch, sink).await
    }

    /// Start a batch on a background task and return at once.
    pub fn spawn(self: &Arc<Self>, batch: BatchRequest, sink: Arc<dyn ProgressSink>) -> BatchHandle {
        let batch_id = Uuid::new_v4();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run(batch_id, batch, sink).await });
        tracing::info!(%batch_id, "Batch accepted");
        BatchHandle { batch_id, handle }
    }

    async fn run(
        &self,
        batch_id: Uuid,
        batch: BatchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<BatchReport, DispatchError> {
        let span = tracing::info_span!(
            "mailshot.batch",
            %batch_id,
            provider = tracing::field::Empty,
            total = batch.recipients.len()
        );

        async move {
            let prepared = match self.prepare(&batch).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    tracing::error!(error = %e, "Batch aborted");
                    #[cfg(feature = "metrics")]
                    metrics::counter!("mailshot_batch_total", "provider" => "unresolved", "status" => "aborted")
                        .increment(1);
                    sink.publish(Notification::BatchFailed {
                        batch_id,
                        reason: e.to_string(),
                    })
                    .await;
                    return Err(e);
                }
            };
            tracing::Span::current().record("provider", prepared.kind.as_str());

            let report = self.execute(batch_id, batch, prepared, Arc::clone(&sink)).await;

            tracing::info!(
                sent = report.sent,
                failed = report.failed,
                template_id = report.template_id,
                "Batch complete"
            );
            #[cfg(feature = "metrics")]
            {
                let provider = report.provider.as_str();
                metrics::counter!("mailshot_batch_total", "provider" => provider, "status" => "completed")
                    .increment(1);
                metrics::histogram!("mailshot_batch_size", "provider" => provider)
                    .record(report.total as f64);
            }

            sink.publish(Notification::BatchCompleted(report.clone())).await;
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Everything that must succeed before the first unit starts.
    async fn prepare(&self, batch: &BatchRequest) -> Result<Prepared, DispatchError> {
        let requested = batch
            .provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let kind = match requested {
            Some(name) => name
                .parse::<ProviderKind>()
                .map_err(|_| DispatchError::UnknownProvider(name.to_string()))?,
            None => self.mailers.default_provider(),
        };
        let mailer = self
            .mailers
            .get(kind)
            .ok_or(DispatchError::ProviderNotRegistered(kind))?;

        let template_id = self
            .store
            .insert_template(&batch.subject, &batch.body)
            .await
            .map_err(DispatchError::Template)?;

        let sender = match mailer.batch_sender(batch.sender_display_name.as_deref()) {
            Some(address) => match mailer.validate_config() {
                Ok(()) => {
                    let id = self
                        .store
                        .upsert_sender(&address.email, address.display_name())
                        .await
                        .map_err(DispatchError::Sender)?;
                    Some(BatchSender { address, id })
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Provider not configured, every send will fail");
                    None
                }
            },
            None => None,
        };

        Ok(Prepared {
            kind,
            mailer,
            template_id,
            sender,
        })
    }

    async fn execute(
        &self,
        batch_id: Uuid,
        batch: BatchRequest,
        prepared: Prepared,
        sink: Arc<dyn ProgressSink>,
    ) -> BatchReport {
        let policy = self.policies.get(prepared.kind);
        let total = batch.recipients.len();
        tracing::debug!(
            concurrency = policy.concurrency,
            delay_ms = policy.delay.as_millis() as u64,
            "Dispatching"
        );

        let ctx = Arc::new(UnitContext {
            store: Arc::clone(&self.store),
            mailer: prepared.mailer,
            sink,
            template_id: prepared.template_id,
            subject: batch.subject,
            body: batch.body,
            sender: prepared.sender,
            policy,
            total,
            tally: Mutex::new(Tally::default()),
        });

        let gate = Arc::new(Semaphore::new(policy.concurrency));
        let mut units = JoinSet::new();

        for recipient in batch.recipients {
            let permit = match Arc::clone(&gate).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    // The gate is never closed; record the unit rather than lose it.
                    ctx.resolve(NewSend::failed(
                        ctx.template_id,
                        ctx.sender_id(),
                        None,
                        "concurrency gate closed",
                    ))
                    .await;
                    continue;
                }
            };

            let unit_span = tracing::debug_span!("mailshot.unit", recipient = %recipient.email);
            let ctx = Arc::clone(&ctx);
            units.spawn(
                async move {
                    let record = ctx.attempt(&recipient).await;
                    ctx.resolve(record).await;
                    if !ctx.policy.delay.is_zero() {
                        tokio::time::sleep(ctx.policy.delay).await;
                    }
                    drop(permit);
                }
                .instrument(unit_span),
            );
        }

        while let Some(joined) = units.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Dispatch unit died");
                ctx.resolve(NewSend::failed(
                    ctx.template_id,
                    ctx.sender_id(),
                    None,
                    format!("unit aborted: {}", e),
                ))
                .await;
            }
        }

        let tally = ctx.tally.lock();
        BatchReport {
            batch_id,
            provider: prepared.kind,
            template_id: ctx.template_id,
            total,
            sent: tally.sent,
            failed: tally.failed,
        }
    }
}

impl UnitContext {
    fn sender_id(&self) -> Option<SenderId> {
        self.sender.as_ref().map(|s| s.id)
    }

    /// Upsert, validate, personalize, send and record the sender. Never
    /// fails: the returned record says what happened.
    async fn attempt(&self, recipient: &Recipient) -> NewSend {
        let recipient_id = match self.store.upsert_recipient(recipient).await {
            Ok(id) => id,
            Err(e) => {
                return NewSend::failed(
                    self.template_id,
                    self.sender_id(),
                    None,
                    format!("recipient not recorded: {}", e),
                )
            }
        };

        let to = match recipient.address() {
            Ok(address) => address,
            Err(e) => {
                return NewSend::failed(
                    self.template_id,
                    self.sender_id(),
                    Some(recipient_id),
                    e.to_string(),
                )
            }
        };

        let email = Email::new()
            .put_from(self.sender.as_ref().map(|s| s.address.clone()))
            .to(to)
            .subject(self.subject.as_str())
            .html_body(personalize(&self.body, recipient));

        let outcome = self.mailer.send(email).await;

        let sender_id = match (&self.sender, &outcome.from) {
            (Some(fixed), _) => Some(fixed.id),
            (None, Some(minted)) => {
                match self
                    .store
                    .upsert_sender(&minted.email, minted.display_name())
                    .await
                {
                    Ok(id) => Some(id),
                    Err(e) => {
                        return NewSend::failed(
                            self.template_id,
                            None,
                            Some(recipient_id),
                            format!("sender identity not recorded: {}", e),
                        )
                    }
                }
            }
            (None, None) => None,
        };

        match outcome.result {
            Ok(_) => NewSend::sent(self.template_id, sender_id, Some(recipient_id)),
            Err(e) => NewSend::failed(self.template_id, sender_id, Some(recipient_id), e.to_string()),
        }
    }

    /// Append the record, count it and tell the sink.
    async fn resolve(&self, record: NewSend) {
        let sent = record.error.is_none();
        match &record.error {
            None => tracing::debug!("Unit sent"),
            Some(error) => tracing::warn!(error = %error, "Unit failed"),
        }

        if let Err(e) = self.store.append_send(record).await {
            tracing::error!(error = %e, "Send record not persisted");
        }

        let event = {
            let mut tally = self.tally.lock();
            if sent {
                tally.sent += 1;
            } else {
                tally.failed += 1;
            }
            ProgressEvent::new(tally.sent, tally.failed, self.total)
        };
        self.sink.publish(Notification::Progress(event)).await;
    }
}
