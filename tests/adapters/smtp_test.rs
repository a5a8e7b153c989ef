//! SMTP adapter tests.
//!
//! These never open a connection: everything checked here is decided before
//! the transport is touched.

use std::time::Duration;

use mailshot::providers::{SmtpMailer, TlsMode, IMPLICIT_TLS_PORT};
use mailshot::{Address, Email, Mailer};

fn configured() -> SmtpMailer {
    SmtpMailer::new("smtp.example.com", IMPLICIT_TLS_PORT)
        .credentials("campaigns@example.com", "app-password")
        .sender(("Campaigns", "campaigns@example.com"))
        .build()
}

#[test]
fn provider_name_returns_smtp() {
    assert_eq!(configured().provider_name(), "smtp");
}

#[test]
fn tls_mode_is_what_the_transport_was_built_with() {
    assert!(configured().implicit_tls());

    let starttls = SmtpMailer::new("smtp.example.com", 587).build();
    assert_eq!(starttls.tls_mode(), TlsMode::StartTls);
    assert_eq!(starttls.port(), 587);
    assert_eq!(starttls.host(), "smtp.example.com");

    let forced = SmtpMailer::new("relay.internal", 8465)
        .tls(TlsMode::Implicit)
        .build();
    assert!(forced.implicit_tls());
}

#[test]
fn validate_config_reports_missing_settings() {
    assert!(configured().validate_config().is_ok());

    let no_sender = SmtpMailer::new("smtp.example.com", 465)
        .credentials("campaigns@example.com", "app-password")
        .build();
    let err = no_sender.validate_config().unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("SENDER_EMAIL"));

    let no_password = SmtpMailer::new("smtp.example.com", 465)
        .credentials("campaigns@example.com", "")
        .sender("campaigns@example.com")
        .build();
    let err = no_password.validate_config().unwrap_err();
    assert!(err.to_string().contains("SENDER_PASSWORD"));

    let no_host = SmtpMailer::new("", 465)
        .credentials("campaigns@example.com", "app-password")
        .sender("campaigns@example.com")
        .build();
    assert!(no_host.validate_config().unwrap_err().is_configuration());
}

#[test]
fn batch_sender_is_configured_account() {
    let sender = configured().batch_sender(Some("Ignored")).unwrap();
    assert_eq!(
        sender,
        Address::with_name("Campaigns", "campaigns@example.com")
    );
}

#[tokio::test]
async fn unconfigured_send_fails_without_connecting() {
    let mailer = SmtpMailer::new("smtp.example.com", 465)
        .timeout(Duration::from_millis(10))
        .build();

    let outcome = mailer
        .send(Email::new().to("ada@example.com").subject("Hi"))
        .await;

    assert!(outcome.error().unwrap().is_configuration());
}
