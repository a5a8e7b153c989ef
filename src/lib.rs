//! # Mailshot
//!
//! Personalized bulk email with pluggable providers, live progress and an
//! audit trail.
//!
//! ## Quick Start
//!
//! Set environment variables:
//! ```bash
//! EMAIL_PROVIDER=mailgun
//! MAILGUN_DOMAIN=mg.example.com
//! MAILGUN_API_KEY=key-xxxxx
//! ```
//!
//! Wire a dispatcher and run a batch:
//! ```rust,ignore
//! use std::sync::Arc;
//! use mailshot::{BatchRequest, Config, Dispatcher, MemoryStore, Recipient};
//!
//! let config = Config::from_env()?;
//! let broadcaster = config.broadcaster();
//! let dispatcher = Arc::new(Dispatcher::new(
//!     Arc::new(MemoryStore::new()),
//!     config.build_registry(),
//!     config.policies.clone(),
//! ));
//!
//! let batch = BatchRequest::new("Hello", "<p>Hi {{name}} from {{city}}</p>")
//!     .recipient(Recipient::new("alice@example.com").name("Alice").city("Oslo"));
//!
//! let report = dispatcher
//!     .spawn(batch, Arc::new(broadcaster.clone()))
//!     .wait()
//!     .await?;
//! println!("{} sent, {} failed", report.sent, report.failed);
//! ```
//!
//! ## Providers
//!
//! | Provider | Feature | Sender identity |
//! |----------|---------|-----------------|
//! | `smtp` (alias `gmail`) | `smtp` | the configured account |
//! | `mailgun` | `mailgun` | a freshly minted address per message |
//! | `resend` | `resend` | derived from the batch display name |
//! | `local` | `local` | in-memory capture |
//! | `logger` | (none) | logs and succeeds |
//!
//! ## Feature Flags
//!
//! - `smtp` - SMTP relay via lettre
//! - `mailgun` - Mailgun API provider
//! - `resend` - Resend API provider
//! - `local` - LocalMailer and the [`testing`] assertions
//! - `sqlite` - [`SqliteStore`]
//! - `server` - HTTP + WebSocket routes via axum
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mailshot_emails_total` | Counter | provider, status | Provider calls |
//! | `mailshot_delivery_duration_seconds` | Histogram | provider | Provider call duration |
//! | `mailshot_batch_total` | Counter | provider, status | Batches completed or aborted |
//! | `mailshot_batch_size` | Histogram | provider | Recipients per batch |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the mailshot crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod email;
mod error;
mod mailer;
mod recipient;
mod template;

pub mod config;
pub mod dispatch;
pub mod identity;
pub mod progress;
pub mod providers;
pub mod store;

#[cfg(feature = "local")]
mod outbox;

#[cfg(feature = "local")]
pub mod testing;

#[cfg(feature = "server")]
pub mod server;

// Re-exports
pub use address::{Address, ToAddress};
pub use config::Config;
pub use dispatch::{
    BatchHandle, BatchReport, BatchRequest, DispatchPolicy, Dispatcher, MailerRegistry,
    PolicyTable,
};
pub use email::Email;
pub use error::{DispatchError, MailError, StoreError};
pub use identity::IdentityMinter;
pub use mailer::{DeliveryResult, Mailer, SendOutcome, DEFAULT_SEND_TIMEOUT};
pub use progress::{Broadcaster, Notification, NullSink, ProgressEvent, ProgressSink, Subscription};
pub use providers::ProviderKind;
pub use recipient::Recipient;
pub use store::{MemoryStore, Store};
pub use template::personalize;

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;

#[cfg(feature = "local")]
pub use outbox::{CapturedEmail, Outbox};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Address, BatchReport, BatchRequest, Broadcaster, Config, Dispatcher, Email, MailError,
        Mailer, MailerRegistry, Notification, PolicyTable, ProgressSink, ProviderKind, Recipient,
        Store, ToAddress,
    };
}
