//! Local mailer for development and testing.
//!
//! Captures emails in memory instead of sending them, and can simulate the
//! failure modes and latency of a real provider so the dispatch pipeline
//! can be exercised end to end without a network.
//!
//! # Testing Usage
//!
//! ```rust,ignore
//! use mailshot::providers::LocalMailer;
//! use mailshot::testing::*;
//!
//! #[tokio::test]
//! async fn test_campaign() {
//!     let mailer = LocalMailer::new();
//!     mailer.fail_for("bounce@example.com");
//!
//!     // Code under test dispatches a batch through `mailer`
//!
//!     assert_email_to(&mailer, "alice@example.com");
//!     refute_email_to(&mailer, "bounce@example.com");
//! }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};
use crate::outbox::{CapturedEmail, Outbox};
use crate::providers::LOCAL_SENDER;

#[derive(Default)]
struct Simulation {
    /// If set, every delivery fails with this message.
    fail_with: Option<String>,
    /// Deliveries to these addresses fail.
    fail_for: HashSet<String>,
    latency: Option<Duration>,
    config_error: Option<String>,
}

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlightGuard<'a>(&'a InFlight);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a InFlight) -> Self {
        let now = counter.current.fetch_add(1, Ordering::SeqCst) + 1;
        counter.peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Local mailer that captures emails in memory.
///
/// Clones share the outbox, the failure simulation and the in-flight
/// counters.
#[derive(Clone)]
pub struct LocalMailer {
    outbox: Arc<Outbox>,
    simulation: Arc<RwLock<Simulation>>,
    in_flight: Arc<InFlight>,
}

impl LocalMailer {
    /// Create a new local mailer with a fresh outbox.
    pub fn new() -> Self {
        Self::with_outbox(Outbox::shared())
    }

    /// Create a local mailer writing to an existing outbox.
    pub fn with_outbox(outbox: Arc<Outbox>) -> Self {
        Self {
            outbox,
            simulation: Arc::new(RwLock::new(Simulation::default())),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Get a reference to the underlying outbox.
    pub fn outbox(&self) -> Arc<Outbox> {
        Arc::clone(&self.outbox)
    }

    // =========================================================================
    // Failure Simulation (for testing)
    // =========================================================================

    /// Make every delivery fail with `message`.
    pub fn set_failure(&self, message: impl Into<String>) {
        self.simulation.write().fail_with = Some(message.into());
    }

    /// Make deliveries to `email` fail. Matching ignores ASCII case.
    pub fn fail_for(&self, email: impl Into<String>) {
        self.simulation
            .write()
            .fail_for
            .insert(email.into().to_ascii_lowercase());
    }

    /// Delay every delivery by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.simulation.write().latency = Some(latency);
    }

    /// Report a configuration problem from `validate_config`.
    pub fn set_config_error(&self, message: impl Into<String>) {
        self.simulation.write().config_error = Some(message.into());
    }

    /// Clear every simulated failure and latency.
    pub fn clear_failure(&self) {
        *self.simulation.write() = Simulation::default();
    }

    /// Highest number of deliveries that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Email Access (for testing assertions)
    // =========================================================================

    /// Get all captured emails (newest first).
    pub fn emails(&self) -> Vec<CapturedEmail> {
        self.outbox.all()
    }

    /// Get the most recently sent email.
    pub fn last_email(&self) -> Option<CapturedEmail> {
        self.outbox.all().into_iter().next()
    }

    /// Get the count of sent emails.
    pub fn email_count(&self) -> usize {
        self.outbox.count()
    }

    /// Clear all captured emails.
    pub fn clear(&self) {
        self.outbox.clear();
    }

    /// Remove and return all captured emails.
    pub fn flush(&self) -> Vec<CapturedEmail> {
        self.outbox.flush()
    }

    /// Check if any email was sent.
    pub fn has_emails(&self) -> bool {
        self.outbox.count() > 0
    }

    // =========================================================================
    // Query Helpers (for testing)
    // =========================================================================

    /// Check if an email was sent to a specific address.
    pub fn sent_to(&self, email: &str) -> bool {
        self.outbox.all().iter().any(|captured| {
            captured
                .email
                .to
                .iter()
                .any(|addr| addr.email.eq_ignore_ascii_case(email))
        })
    }

    /// Check if an email with matching subject was sent.
    pub fn sent_with_subject(&self, subject: &str) -> bool {
        self.outbox
            .all()
            .iter()
            .any(|captured| captured.email.subject == subject)
    }

    /// Find emails matching a predicate.
    pub fn find_emails<F>(&self, predicate: F) -> Vec<CapturedEmail>
    where
        F: Fn(&Email) -> bool,
    {
        self.outbox
            .all()
            .into_iter()
            .filter(|captured| predicate(&captured.email))
            .collect()
    }
}

impl Default for LocalMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for LocalMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let _guard = InFlightGuard::enter(&self.in_flight);

        let (fail_with, latency, rejected) = {
            let sim = self.simulation.read();
            let rejected = email
                .to
                .iter()
                .find(|addr| sim.fail_for.contains(&addr.email.to_ascii_lowercase()))
                .map(|addr| addr.email.clone());
            (sim.fail_with.clone(), sim.latency, rejected)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(message) = fail_with {
            return Err(MailError::provider("local", message));
        }
        if let Some(address) = rejected {
            return Err(MailError::provider(
                "local",
                format!("simulated rejection for {}", address),
            ));
        }

        let message_id = self.outbox.push(email.clone());
        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        match &self.simulation.read().config_error {
            Some(message) => Err(MailError::Configuration(message.clone())),
            None => Ok(()),
        }
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

    fn email_to(to: &str) -> Email {
        Email::new()
            .from(LOCAL_SENDER)
            .to(to)
            .subject("Test Subject")
            .html_body("<p>Hello!</p>")
    }

    #[tokio::test]
    async fn test_captures_emails() {
        let mailer = LocalMailer::new();

        let result = mailer.deliver(&email_to("recipient@example.com")).await.unwrap();

        assert!(mailer.has_emails());
        assert_eq!(mailer.email_count(), 1);
        assert!(mailer.sent_to("RECIPIENT@example.com"));
        assert!(mailer.sent_with_subject("Test Subject"));
        assert_eq!(
            mailer.outbox().get(&result.message_id).unwrap().email.subject,
            "Test Subject"
        );
    }

    #[tokio::test]
    async fn test_can_fail() {
        let mailer = LocalMailer::new();
        mailer.set_failure("Simulated failure");

        let err = mailer.deliver(&email_to("a@example.com")).await.unwrap_err();
        assert!(err.to_string().contains("Simulated failure"));
        assert_eq!(mailer.email_count(), 0);

        mailer.clear_failure();
        assert!(mailer.deliver(&email_to("a@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_for_single_recipient() {
        let mailer = LocalMailer::new();
        mailer.fail_for("Bounce@Example.com");

        assert!(mailer.deliver(&email_to("bounce@example.com")).await.is_err());
        assert!(mailer.deliver(&email_to("fine@example.com")).await.is_ok());
        assert!(!mailer.sent_to("bounce@example.com"));
    }

    #[tokio::test]
    async fn test_config_error_blocks_send() {
        let mailer = LocalMailer::new();
        mailer.set_config_error("LOCAL_DISABLED");

        let outcome = mailer.send(email_to("a@example.com")).await;
        assert!(outcome.error().unwrap().is_configuration());
        assert!(!mailer.has_emails());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peak_in_flight() {
        let mailer = LocalMailer::new();
        mailer.set_latency(Duration::from_millis(50));

        let a = email_to("a@example.com");
        let b = email_to("b@example.com");
        let (ra, rb) = tokio::join!(mailer.deliver(&a), mailer.deliver(&b));
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(mailer.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_find_and_flush() {
        let mailer = LocalMailer::new();
        mailer.deliver(&email_to("a@example.com").subject("Welcome")).await.unwrap();
        mailer.deliver(&email_to("b@example.com").subject("Goodbye")).await.unwrap();

        let welcome = mailer.find_emails(|e| e.subject.contains("Welcome"));
        assert_eq!(welcome.len(), 1);
        assert_eq!(welcome[0].email.to[0].email, "a@example.com");

        let cloned = mailer.clone();
        assert_eq!(cloned.flush().len(), 2);
        assert_eq!(mailer.email_count(), 0);
    }
}
