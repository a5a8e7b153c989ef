//! Local adapter tests.

use std::time::Duration;

use mailshot::providers::LocalMailer;
use mailshot::{Email, Mailer, Outbox};

fn campaign_email(to: &str) -> Email {
    Email::new()
        .from("noreply@localhost")
        .to(to)
        .subject("Spring launch")
        .html_body("<p>Hello!</p>")
}

// ============================================================================
// Capture
// ============================================================================

#[tokio::test]
async fn deliver_returns_ok() {
    let mailer = LocalMailer::new();

    let result = mailer.deliver(&campaign_email("ada@example.com")).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn captures_sent_emails() {
    let mailer = LocalMailer::new();

    mailer.deliver(&campaign_email("ada@example.com")).await.unwrap();
    mailer.deliver(&campaign_email("grace@example.com")).await.unwrap();

    assert_eq!(mailer.email_count(), 2);
    assert!(mailer.sent_to("ada@example.com"));
    assert!(mailer.sent_to("grace@example.com"));
    assert!(mailer.sent_with_subject("Spring launch"));

    // Newest first
    let last = mailer.last_email().unwrap();
    assert_eq!(last.email.to[0].email, "grace@example.com");
}

#[tokio::test]
async fn message_id_finds_captured_email() {
    let mailer = LocalMailer::new();

    let delivery = mailer.deliver(&campaign_email("ada@example.com")).await.unwrap();

    let captured = mailer.outbox().get(&delivery.message_id).unwrap();
    assert_eq!(captured.id, delivery.message_id);
    assert_eq!(captured.email.subject, "Spring launch");
}

#[tokio::test]
async fn shared_outbox_between_mailers() {
    let outbox = Outbox::shared();
    let first = LocalMailer::with_outbox(outbox.clone());
    let second = LocalMailer::with_outbox(outbox.clone());

    first.deliver(&campaign_email("ada@example.com")).await.unwrap();
    second.deliver(&campaign_email("grace@example.com")).await.unwrap();

    assert_eq!(outbox.count(), 2);
    assert_eq!(first.email_count(), 2);
}

#[tokio::test]
async fn flush_empties_outbox() {
    let mailer = LocalMailer::new();
    mailer.deliver(&campaign_email("ada@example.com")).await.unwrap();

    let flushed = mailer.flush();
    assert_eq!(flushed.len(), 1);
    assert!(!mailer.has_emails());
}

// ============================================================================
// Failure simulation
// ============================================================================

#[tokio::test]
async fn fail_for_rejects_only_that_recipient() {
    let mailer = LocalMailer::new();
    mailer.fail_for("Bounce@Example.com");

    let err = mailer
        .deliver(&campaign_email("bounce@example.com"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bounce@example.com"));
    assert!(mailer.deliver(&campaign_email("ada@example.com")).await.is_ok());

    assert_eq!(mailer.email_count(), 1);
}

#[tokio::test]
async fn config_error_stops_send_before_capture() {
    let mailer = LocalMailer::new();
    mailer.set_config_error("local outbox disabled");

    let outcome = mailer.send(campaign_email("ada@example.com")).await;

    assert!(outcome.error().unwrap().is_configuration());
    assert!(!mailer.has_emails());

    mailer.clear_failure();
    assert!(mailer.send(campaign_email("ada@example.com")).await.is_sent());
}

#[tokio::test(start_paused = true)]
async fn latency_is_applied_and_tracked() {
    let mailer = LocalMailer::new();
    mailer.set_latency(Duration::from_millis(200));

    let a = mailer.clone();
    let b = mailer.clone();
    let (first, second) = tokio::join!(
        async move { a.deliver(&campaign_email("ada@example.com")).await },
        async move { b.deliver(&campaign_email("grace@example.com")).await },
    );

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(mailer.peak_in_flight(), 2);
}
