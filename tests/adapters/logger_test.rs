//! Logger adapter tests.

use mailshot::providers::{LoggerMailer, LOCAL_SENDER};
use mailshot::{Email, Mailer};

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn deliver_returns_ok() {
    let mailer = LoggerMailer::new();

    let email = Email::new()
        .from("campaigns@example.com")
        .to("ada@example.com")
        .subject("Spring launch")
        .html_body("<p>Hello Ada</p>");

    let delivery = mailer.deliver(&email).await.unwrap();
    assert!(!delivery.message_id.is_empty());
}

#[tokio::test]
async fn deliver_with_full_logging_returns_ok() {
    let mailer = LoggerMailer::full();

    let email = Email::new()
        .from(("Campaigns", "campaigns@example.com"))
        .to(("Ada Lovelace", "ada@example.com"))
        .subject("Spring launch")
        .html_body("<h1>Hello</h1>");

    assert!(mailer.deliver(&email).await.is_ok());
}

#[tokio::test]
async fn deliver_empty_email_returns_ok() {
    let mailer = LoggerMailer::new().log_full(true);

    // Logger doesn't validate, it just logs
    let email = Email::new().subject("Empty email");

    assert!(mailer.deliver(&email).await.is_ok());
}

#[tokio::test]
async fn message_ids_are_unique() {
    let mailer = LoggerMailer::default();
    let email = Email::new().from("a@b.com").to("c@d.com").subject("Test");

    let first = mailer.deliver(&email).await.unwrap();
    let second = mailer.deliver(&email).await.unwrap();
    assert_ne!(first.message_id, second.message_id);
}

// ============================================================================
// Sender identity
// ============================================================================

#[test]
fn provider_name_returns_logger() {
    assert_eq!(LoggerMailer::new().provider_name(), "logger");
}

#[test]
fn batch_sender_is_local_with_display_name() {
    let mailer = LoggerMailer::new();

    let named = mailer.batch_sender(Some("Acme News")).unwrap();
    assert_eq!(named.email, LOCAL_SENDER);
    assert_eq!(named.display_name(), "Acme News");

    let blank = mailer.batch_sender(Some("  ")).unwrap();
    assert_eq!(blank.email, LOCAL_SENDER);
    assert!(blank.name.is_none());
}

#[tokio::test]
async fn send_keeps_stamped_sender() {
    let mailer = LoggerMailer::new();
    let from = mailer.batch_sender(None).unwrap();

    let outcome = mailer
        .send(Email::new().from(from.clone()).to("ada@example.com"))
        .await;

    assert!(outcome.is_sent());
    assert_eq!(outcome.from, Some(from));
}
