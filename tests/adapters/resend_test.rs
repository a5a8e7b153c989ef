//! Resend adapter tests.

use mailshot::providers::ResendMailer;
use mailshot::{Address, Email, MailError, Mailer};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn mailer(server: &MockServer) -> ResendMailer {
    ResendMailer::new("re_123456789", "campaigns@news.example.com").base_url(server.uri())
}

fn stamped(mailer: &ResendMailer, display_name: Option<&str>) -> Email {
    Email::new()
        .put_from(mailer.batch_sender(display_name))
        .to("ada@example.com")
        .subject("Spring launch")
        .html_body("<p>Hello Ada</p>")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "49a3999c-0ce1-4ea6-ab68-afcd6dc2e794"
    }))
}

// ============================================================================
// Sender derivation
// ============================================================================

#[test]
fn batch_sender_derives_from_display_name() {
    let mailer = ResendMailer::new("re_123", "campaigns@news.example.com");

    assert_eq!(
        mailer.batch_sender(Some("Acme Spring Team")),
        Some(Address::with_name(
            "Acme Spring Team",
            "acme-spring-team@news.example.com"
        ))
    );
    assert_eq!(
        mailer.batch_sender(None),
        Some(Address::new("noreply@news.example.com"))
    );
    assert_eq!(
        mailer.batch_sender(Some("   ")),
        Some(Address::new("noreply@news.example.com"))
    );
}

#[test]
fn batch_sender_needs_a_domain() {
    let mailer = ResendMailer::new("re_123", "not-an-address");
    assert!(mailer.batch_sender(Some("Acme")).is_none());
    assert!(mailer.validate_config().unwrap_err().is_configuration());
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn successful_send_posts_json() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer re_123456789"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "from": "Acme <acme@news.example.com>",
            "to": ["ada@example.com"],
            "subject": "Spring launch",
            "html": "<p>Hello Ada</p>"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mailer.send(stamped(&mailer, Some("Acme"))).await;

    assert_eq!(
        outcome.result.unwrap().message_id,
        "49a3999c-0ce1-4ea6-ab68-afcd6dc2e794"
    );
    assert_eq!(outcome.from.unwrap().email, "acme@news.example.com");
}

#[tokio::test]
async fn error_message_and_status_are_reported() {
    let server = MockServer::start().await;
    let mailer = mailer(&server);

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "validation_error",
            "message": "The `from` domain is not verified"
        })))
        .expect(1)
        .mount(&server)
        .await;

    match mailer.send(stamped(&mailer, None)).await.result {
        Err(MailError::ProviderError {
            provider,
            message,
            status,
        }) => {
            assert_eq!(provider, "resend");
            assert!(message.contains("not verified"));
            assert_eq!(status, Some(422));
        }
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_api_key_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let mailer = ResendMailer::new("", "campaigns@news.example.com").base_url(server.uri());
    let outcome = mailer.send(stamped(&mailer, None)).await;

    assert!(outcome.error().unwrap().is_configuration());
}
