//! Testing utilities and assertion helpers.
//!
//! Assertions over what a [`LocalMailer`] captured and what a
//! [`MemoryStore`] recorded, for testing code that dispatches batches.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailshot::providers::LocalMailer;
//! use mailshot::testing::*;
//!
//! #[tokio::test]
//! async fn test_campaign() {
//!     let mailer = LocalMailer::new();
//!     let store = MemoryStore::new();
//!
//!     // ... dispatch a batch ...
//!
//!     assert_email_to(&mailer, "alice@example.com");
//!     assert_email_html_to_contains(&mailer, "alice@example.com", "Hi Alice");
//!     refute_email_to(&mailer, "bounce@example.com");
//!
//!     let template_id = assert_single_template(&store);
//!     assert_send_counts(&store, template_id, 2, 1);
//! }
//! ```

use std::collections::HashSet;

use regex::Regex;

use crate::email::Email;
use crate::outbox::CapturedEmail;
use crate::providers::LocalMailer;
use crate::store::{MemoryStore, SendStatus, TemplateId};

// ============================================================================
// Helper Functions
// ============================================================================

/// Format a list of emails for error messages.
fn format_email_summary(emails: &[CapturedEmail]) -> String {
    if emails.is_empty() {
        return "  (no emails sent)".to_string();
    }

    emails
        .iter()
        .enumerate()
        .map(|(i, captured)| {
            let e = &captured.email;
            let from = e
                .from
                .as_ref()
                .map(|a| a.formatted())
                .unwrap_or_else(|| "<none>".to_string());
            format!(
                "  {}. To: [{}], From: {}, Subject: \"{}\"",
                i + 1,
                e.recipient_emails().join(", "),
                from,
                e.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn addressed_to(email: &Email, address: &str) -> bool {
    email.to.iter().any(|a| a.email.eq_ignore_ascii_case(address))
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(500);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

// ============================================================================
// Mailer Assertions
// ============================================================================

/// Assert that at least one email was sent.
///
/// # Panics
///
/// Panics if no emails were sent.
pub fn assert_email_sent(mailer: &LocalMailer) {
    assert!(
        mailer.has_emails(),
        "Expected at least one email to be sent, but none were sent"
    );
}

/// Assert that no emails were sent.
///
/// # Panics
///
/// Panics if any email was sent.
pub fn assert_no_emails_sent(mailer: &LocalMailer) {
    let emails = mailer.emails();
    assert!(
        emails.is_empty(),
        "Expected no emails to be sent, but {} were sent.\n\nEmails sent:\n{}",
        emails.len(),
        format_email_summary(&emails)
    );
}

/// Assert that exactly N emails were sent.
///
/// # Panics
///
/// Panics if the count doesn't match.
pub fn assert_email_count(mailer: &LocalMailer, expected: usize) {
    let actual = mailer.email_count();
    assert!(
        actual == expected,
        "Expected {} email(s) to be sent, but {} were sent.\n\nEmails sent:\n{}",
        expected,
        actual,
        format_email_summary(&mailer.emails())
    );
}

/// Assert that an email was sent to a specific address.
///
/// # Panics
///
/// Panics if no email was sent to the address.
pub fn assert_email_to(mailer: &LocalMailer, email: &str) {
    let emails = mailer.emails();
    assert!(
        emails.iter().any(|c| addressed_to(&c.email, email)),
        "Expected an email to be sent to '{}'.\n\nEmails sent:\n{}",
        email,
        format_email_summary(&emails)
    );
}

/// Refute that an email was sent to a specific address.
///
/// # Panics
///
/// Panics if an email was sent to the address.
pub fn refute_email_to(mailer: &LocalMailer, email: &str) {
    let emails = mailer.emails();
    if let Some(found) = emails.iter().find(|c| addressed_to(&c.email, email)) {
        panic!(
            "Expected no email to be sent to '{}', but found one.\n\nMatching email:\n  Subject: \"{}\"\n\nAll emails:\n{}",
            email,
            found.email.subject,
            format_email_summary(&emails)
        );
    }
}

/// Assert that an email with the exact subject was sent.
///
/// # Panics
///
/// Panics if no email with the subject was found.
pub fn assert_email_subject(mailer: &LocalMailer, subject: &str) {
    let emails = mailer.emails();
    assert!(
        emails.iter().any(|c| c.email.subject == subject),
        "Expected an email with subject '{}'.\n\nEmails sent:\n{}",
        subject,
        format_email_summary(&emails)
    );
}

/// Assert that every captured email was sent from `domain`.
///
/// # Panics
///
/// Panics if nothing was sent or any sender is on another domain.
pub fn assert_email_from_domain(mailer: &LocalMailer, domain: &str) {
    let emails = mailer.emails();
    assert!(
        !emails.is_empty(),
        "Expected at least one email to check 'from', but none were sent"
    );
    for captured in &emails {
        let actual = captured.email.from.as_ref().and_then(|a| a.domain());
        assert!(
            actual.is_some_and(|d| d.eq_ignore_ascii_case(domain)),
            "Expected every email from '@{}', but one was from {:?}.\n\nEmails sent:\n{}",
            domain,
            captured.email.from.as_ref().map(|a| a.email.as_str()),
            format_email_summary(&emails)
        );
    }
}

/// Assert that no two captured emails share a sender address.
///
/// # Panics
///
/// Panics on the first reused sender.
pub fn assert_distinct_senders(mailer: &LocalMailer) {
    let emails = mailer.emails();
    let mut seen = HashSet::new();
    for captured in &emails {
        let from = captured
            .email
            .from
            .as_ref()
            .map(|a| a.email.to_ascii_lowercase())
            .unwrap_or_default();
        assert!(
            seen.insert(from.clone()),
            "Expected every email to use a fresh sender, but '{}' was reused.\n\nEmails sent:\n{}",
            from,
            format_email_summary(&emails)
        );
    }
}

/// Assert the email sent to `to` has an HTML body containing `text`.
///
/// # Panics
///
/// Panics if nothing was sent to `to` or the body doesn't contain `text`.
pub fn assert_email_html_to_contains(mailer: &LocalMailer, to: &str, text: &str) {
    let emails = mailer.emails();
    let Some(captured) = emails.iter().find(|c| addressed_to(&c.email, to)) else {
        panic!(
            "Expected an email to be sent to '{}'.\n\nEmails sent:\n{}",
            to,
            format_email_summary(&emails)
        );
    };
    let html = captured.email.html_body.as_deref().unwrap_or("");

    assert!(
        html.contains(text),
        "Expected HTML body for '{}' to contain '{}', but it didn't.\n\nHTML body (first 500 chars):\n{}",
        to,
        text,
        preview(html)
    );
}

/// Assert the last email has HTML body containing text.
///
/// # Panics
///
/// Panics if no email was sent or HTML body doesn't contain text.
pub fn assert_email_html_contains(mailer: &LocalMailer, text: &str) {
    let last = get_last_email(mailer);
    let html = last.email.html_body.as_deref().unwrap_or("");

    assert!(
        html.contains(text),
        "Expected HTML body to contain '{}', but it didn't.\n\nLast email:\n{}\n\nHTML body (first 500 chars):\n{}",
        text,
        format_email_summary(std::slice::from_ref(&last)),
        preview(html)
    );
}

/// Assert the last email HTML body matches a regex pattern.
///
/// # Panics
///
/// Panics if no email was sent, the pattern is invalid, or the body doesn't
/// match.
pub fn assert_email_html_matches(mailer: &LocalMailer, pattern: &str) {
    let last = get_last_email(mailer);
    let html = last.email.html_body.as_deref().unwrap_or("");
    let re = Regex::new(pattern).expect("Invalid regex pattern");

    assert!(
        re.is_match(html),
        "Expected HTML body to match pattern '{}', but it didn't.\n\nLast email:\n{}\n\nHTML body (first 500 chars):\n{}",
        pattern,
        format_email_summary(std::slice::from_ref(&last)),
        preview(html)
    );
}

/// Get the last email sent, or panic if none.
///
/// # Panics
///
/// Panics if no emails were sent.
pub fn get_last_email(mailer: &LocalMailer) -> CapturedEmail {
    mailer
        .last_email()
        .expect("Expected at least one email to be sent, but none were sent")
}

/// Get all emails sent to a specific address.
pub fn get_emails_to(mailer: &LocalMailer, email: &str) -> Vec<CapturedEmail> {
    mailer.find_emails(|e| addressed_to(e, email))
}

/// Flush and return all emails from the mailer.
pub fn flush_emails(mailer: &LocalMailer) -> Vec<CapturedEmail> {
    mailer.flush()
}

// ============================================================================
// Store Assertions
// ============================================================================

/// Assert exactly one template was stored and return its id.
///
/// # Panics
///
/// Panics if zero or several templates were stored.
pub fn assert_single_template(store: &MemoryStore) -> TemplateId {
    let templates = store.templates();
    assert!(
        templates.len() == 1,
        "Expected exactly one stored template, found {}: {:?}",
        templates.len(),
        templates.iter().map(|t| &t.subject).collect::<Vec<_>>()
    );
    templates[0].id
}

/// Assert the send records for `template_id` split into `sent` and
/// `failed` as expected.
///
/// # Panics
///
/// Panics if either count differs.
pub fn assert_send_counts(store: &MemoryStore, template_id: TemplateId, sent: usize, failed: usize) {
    let records = store.sends_for(template_id);
    let actual_sent = records
        .iter()
        .filter(|r| r.send.status == SendStatus::Sent)
        .count();
    let actual_failed = records.len() - actual_sent;
    let errors: Vec<_> = records
        .iter()
        .filter_map(|r| r.send.error.as_deref())
        .collect();

    assert!(
        actual_sent == sent && actual_failed == failed,
        "Expected {} sent / {} failed records for template {}, found {} / {}.\n\nErrors: {:?}",
        sent,
        failed,
        template_id,
        actual_sent,
        actual_failed,
        errors
    );
}
