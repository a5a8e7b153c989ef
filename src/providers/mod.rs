//! Email provider implementations.
//!
//! Each provider implements the [`Mailer`](crate::Mailer) trait.
//!
//! ## Available Providers
//!
//! | Provider | Feature Flag | Sender identity |
//! |----------|-------------|-----------------|
//! | [`SmtpMailer`] | `smtp` | fixed, configured address |
//! | [`MailgunMailer`] | `mailgun` | fresh minted address per message |
//! | [`ResendMailer`] | `resend` | fixed per batch, derived from the display name |
//! | [`LocalMailer`] | `local` | fixed, in-memory capture for dev/testing |
//! | [`LoggerMailer`] | (none) | fixed, logs and succeeds |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpBuilder, SmtpMailer, TlsMode, IMPLICIT_TLS_PORT};

#[cfg(feature = "mailgun")]
mod mailgun;
#[cfg(feature = "mailgun")]
pub use mailgun::MailgunMailer;

#[cfg(feature = "resend")]
mod resend;
#[cfg(feature = "resend")]
pub use resend::ResendMailer;

#[cfg(feature = "local")]
mod local;
#[cfg(feature = "local")]
pub use local::LocalMailer;

mod logger;
pub use logger::LoggerMailer;

/// Sender used by providers that do not need a real identity.
pub const LOCAL_SENDER: &str = "noreply@localhost";

/// The backends a batch can be dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// SMTP relay with a single configured identity.
    #[serde(alias = "gmail")]
    Smtp,
    /// Mailgun API, fresh identity per message.
    Mailgun,
    /// Resend API, identity derived per batch.
    Resend,
    /// In-memory capture.
    Local,
    /// Log-only.
    Logger,
}

impl ProviderKind {
    /// All kinds, in a stable order.
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Smtp,
        ProviderKind::Mailgun,
        ProviderKind::Resend,
        ProviderKind::Local,
        ProviderKind::Logger,
    ];

    /// Lowercase name, matching [`Mailer::provider_name`](crate::Mailer::provider_name).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Smtp => "smtp",
            ProviderKind::Mailgun => "mailgun",
            ProviderKind::Resend => "resend",
            ProviderKind::Local => "local",
            ProviderKind::Logger => "logger",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smtp" | "gmail" => Ok(ProviderKind::Smtp),
            "mailgun" => Ok(ProviderKind::Mailgun),
            "resend" => Ok(ProviderKind::Resend),
            "local" => Ok(ProviderKind::Local),
            "logger" => Ok(ProviderKind::Logger),
            other => Err(format!(
                "Unknown provider: {}. Valid providers are: smtp, mailgun, resend, local, logger",
                other
            )),
        }
    }
}
