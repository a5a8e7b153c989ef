//! Mailgun adapter tests.

use std::sync::Arc;

use mailshot::identity::IdentityMinter;
use mailshot::providers::MailgunMailer;
use mailshot::{Email, MailError, Mailer};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn campaign_email() -> Email {
    Email::new()
        .to(("Ada Lovelace", "ada@example.com"))
        .subject("Spring launch")
        .html_body("<h1>Hello Ada</h1>")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "message": "Queued. Thank you.",
        "id": "<20240314174239.25659.5817@mg.example.com>"
    }))
}

fn mailer(server: &MockServer) -> MailgunMailer {
    MailgunMailer::new("fake-api-key", "mg.example.com")
        .base_url(server.uri())
        .minter(Arc::new(IdentityMinter::from_seed(42)))
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn successful_send_returns_message_id() {
    let server = MockServer::start().await;

    // Mailgun uses Basic auth with "api:key" format
    let expected_auth = format!(
        "Basic {}",
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            "api:fake-api-key"
        )
    );

    Mock::given(method("POST"))
        .and(path("/mg.example.com/messages"))
        .and(header("Authorization", expected_auth.as_str()))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mailer(&server).send(campaign_email()).await;

    let delivery = outcome.result.unwrap();
    assert_eq!(
        delivery.message_id,
        "<20240314174239.25659.5817@mg.example.com>"
    );
}

#[tokio::test]
async fn form_carries_minted_sender_and_personalized_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mg.example.com/messages"))
        .and(body_string_contains("Secret Admirer <"))
        .and(body_string_contains("@mg.example.com>"))
        .and(body_string_contains("Ada Lovelace <ada@example.com>"))
        .and(body_string_contains("Spring launch"))
        .and(body_string_contains("<h1>Hello Ada</h1>"))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mailer(&server).send(campaign_email()).await;

    assert!(outcome.is_sent());
    let from = outcome.from.unwrap();
    assert_eq!(from.display_name(), "Secret Admirer");
    assert_eq!(from.domain(), Some("mg.example.com"));
}

#[tokio::test]
async fn personalized_body_goes_out_as_html() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("name=\"html\""))
        .and(body_string_contains("<h1>Hello Ada</h1>"))
        .and(body_string_contains("Spring launch"))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer(&server).send(campaign_email()).await.is_sent());
}

#[tokio::test]
async fn each_send_uses_a_fresh_identity() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(3)
        .mount(&server)
        .await;

    let mailer = mailer(&server);
    let mut seen = std::collections::HashSet::new();
    for _ in 0..3 {
        let outcome = mailer.send(campaign_email()).await;
        assert!(outcome.is_sent());
        assert!(seen.insert(outcome.from.unwrap().email));
    }
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Invalid private key"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mailer(&server).send(campaign_email()).await;

    // The minted identity is kept even though delivery failed
    assert!(outcome.from.is_some());
    match outcome.result {
        Err(MailError::ProviderError {
            provider,
            message,
            status,
        }) => {
            assert_eq!(provider, "mailgun");
            assert_eq!(message, "Invalid private key");
            assert_eq!(status, Some(401));
        }
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn plain_text_error_body_is_kept() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = mailer(&server).send(campaign_email()).await.result.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("upstream exploded"));
}

#[tokio::test]
async fn missing_config_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let mailer = MailgunMailer::new("", "mg.example.com").base_url(server.uri());
    let outcome = mailer.send(campaign_email()).await;

    assert!(outcome.error().unwrap().is_configuration());
    assert!(outcome.from.is_none());
}
