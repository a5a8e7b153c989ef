//! Placeholder substitution for batch bodies.
//!
//! Only four literal placeholders are recognised: `{{name}}`, `{{company}}`,
//! `{{city}}` and `{{email}}`. Anything else between braces is left alone.
//!
//! ```
//! use mailshot::{personalize, Recipient};
//!
//! let alice = Recipient::new("alice@example.com").name("Alice").city("Lyon");
//! assert_eq!(
//!     personalize("Hi {{name}} from {{city}} ({{unknown}})", &alice),
//!     "Hi Alice from Lyon ({{unknown}})"
//! );
//! ```

use crate::recipient::Recipient;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Substitute the recipient's fields into `body`.
///
/// Runs as a single left-to-right pass: substituted values are copied
/// verbatim and never scanned for further placeholders.
pub fn personalize(body: &str, recipient: &Recipient) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];

        let replacement = after
            .find(CLOSE)
            .and_then(|end| field(recipient, &after[..end]).map(|value| (end, value)));

        match replacement {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + CLOSE.len()..];
            }
            None => {
                out.push_str(OPEN);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn field<'a>(recipient: &'a Recipient, key: &str) -> Option<&'a str> {
    match key {
        "name" => Some(&recipient.name),
        "company" => Some(&recipient.company),
        "city" => Some(&recipient.city),
        "email" => Some(&recipient.email),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> Recipient {
        Recipient::new("bob@example.com")
            .name("Bob")
            .company("Initech")
            .city("Austin")
    }

    #[test]
    fn test_all_fields() {
        assert_eq!(
            personalize("{{name}}|{{company}}|{{city}}|{{email}}", &bob()),
            "Bob|Initech|Austin|bob@example.com"
        );
    }

    #[test]
    fn test_no_placeholders_is_identity() {
        let body = "<p>Plain body with { braces } and }} stray closers</p>";
        assert_eq!(personalize(body, &bob()), body);
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let r = Recipient::new("a@b.com");
        assert_eq!(personalize("{{email}} {{email}}", &r), "a@b.com a@b.com");
    }

    #[test]
    fn test_empty_field_substitutes_empty_string() {
        let r = Recipient::new("a@b.com");
        assert_eq!(personalize("Hello {{name}}!", &r), "Hello !");
    }

    #[test]
    fn test_unknown_and_unclosed_placeholders_untouched() {
        assert_eq!(
            personalize("{{Name}} {{ name }} {{phone}} {{name", &bob()),
            "{{Name}} {{ name }} {{phone}} {{name"
        );
    }

    #[test]
    fn test_nested_open_braces() {
        assert_eq!(personalize("{{x {{name}}", &bob()), "{{x Bob");
        assert_eq!(personalize("{{{{name}}}}", &bob()), "{{Bob}}");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let sneaky = Recipient::new("e@x.com").name("{{email}}");
        assert_eq!(personalize("{{name}}", &sneaky), "{{email}}");
    }

    #[test]
    fn test_concurrent_use_on_shared_body() {
        let body = std::sync::Arc::new(String::from("Dear {{name}}"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let body = body.clone();
                std::thread::spawn(move || {
                    personalize(&body, &Recipient::new("x@y.z").name(format!("n{}", i)))
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), format!("Dear n{}", i));
        }
    }
}
