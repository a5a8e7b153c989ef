//! Message composition tests: recipients, placeholders and addresses.

use mailshot::{personalize, Address, Email, Recipient, ToAddress};

fn ada() -> Recipient {
    Recipient::new("ada@example.com")
        .name("Ada Lovelace")
        .company("Analytical Engines")
        .city("London")
}

// ============================================================================
// Placeholders
// ============================================================================

#[test]
fn every_placeholder_is_substituted() {
    let body = "{{name}} / {{company}} / {{city}} / {{email}}";
    assert_eq!(
        personalize(body, &ada()),
        "Ada Lovelace / Analytical Engines / London / ada@example.com"
    );
}

#[test]
fn repeated_placeholders_are_all_substituted() {
    assert_eq!(
        personalize("{{name}}, yes you, {{name}}!", &ada()),
        "Ada Lovelace, yes you, Ada Lovelace!"
    );
}

#[test]
fn missing_fields_become_empty() {
    let bare = Recipient::new("bare@example.com");
    assert_eq!(
        personalize("Hi {{name}} at {{company}}.", &bare),
        "Hi  at ."
    );
}

#[test]
fn unknown_and_malformed_placeholders_are_left_alone() {
    let body = "{{ name }} {{Name}} {{phone}} {{name} {{name}}";
    assert_eq!(
        personalize(body, &ada()),
        "{{ name }} {{Name}} {{phone}} {{name} Ada Lovelace"
    );
}

#[test]
fn substituted_values_are_not_rescanned() {
    let tricky = Recipient::new("x@example.com").name("{{city}}").city("Paris");
    assert_eq!(personalize("{{name}} in {{city}}", &tricky), "{{city}} in Paris");
}

#[test]
fn body_without_placeholders_is_unchanged() {
    let body = "<p>Plain body with {braces} and }} stray closers</p>";
    assert_eq!(personalize(body, &ada()), body);
}

#[test]
fn non_ascii_text_survives() {
    let zoe = Recipient::new("zoe@example.com").name("Zoë").city("Zürich");
    assert_eq!(
        personalize("¡Hola {{name}}! 👋 {{city}}", &zoe),
        "¡Hola Zoë! 👋 Zürich"
    );
}

// ============================================================================
// Recipients and addresses
// ============================================================================

#[test]
fn recipient_becomes_named_address() {
    let address = ada().to_address();
    assert_eq!(address.email, "ada@example.com");
    assert_eq!(address.formatted(), "Ada Lovelace <ada@example.com>");

    let bare = Recipient::new("bare@example.com").to_address();
    assert_eq!(bare.formatted(), "bare@example.com");
}

#[test]
fn recipient_wire_shape_defaults_missing_fields() {
    let recipient: Recipient =
        serde_json::from_str(r#"{"email": "ada@example.com", "city": "London"}"#).unwrap();
    assert_eq!(recipient, Recipient::new("ada@example.com").city("London"));
}

#[test]
fn address_domain_and_parse() {
    let address = Address::parse("secret.admirer.k3x9@mg.example.com").unwrap();
    assert_eq!(address.domain(), Some("mg.example.com"));
    assert!(Address::parse("not an address").is_err());
    assert_eq!(Address::new("no-domain").domain(), None);
}

#[test]
fn composed_email_matches_dispatch_shape() {
    let recipient = ada();
    let email = Email::new()
        .from(("Acme", "acme@news.example.com"))
        .to(recipient.to_address())
        .subject("Launch")
        .html_body(personalize("<p>Hi {{name}}</p>", &recipient));

    assert!(email.is_valid());
    assert_eq!(email.recipient_emails(), vec!["ada@example.com"]);
    assert_eq!(email.html_body.as_deref(), Some("<p>Hi Ada Lovelace</p>"));
}
