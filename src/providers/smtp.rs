//! SMTP relay provider using lettre.
//!
//! Every message goes out from the single configured sender. Port 465 uses
//! implicit TLS; any other port starts in plaintext and upgrades with
//! STARTTLS when the server offers it. [`SmtpBuilder::tls`] overrides the
//! port's default. Certificate verification is relaxed
//! so self-signed or misconfigured relays still work.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailshot::providers::SmtpMailer;
//!
//! let mailer = SmtpMailer::new("smtp.gmail.com", 465)
//!     .credentials("me@gmail.com", "app-password")
//!     .sender(("Newsletter", "me@gmail.com"))
//!     .build();
//! ```

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::address::{Address, ToAddress};
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer, DEFAULT_SEND_TIMEOUT};

/// Port on which the relay expects TLS from the first byte.
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// How the relay connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS).
    Implicit,
    /// Plaintext, upgraded with STARTTLS when offered.
    StartTls,
}

impl TlsMode {
    /// The conventional mode for `port`.
    pub fn for_port(port: u16) -> Self {
        if port == IMPLICIT_TLS_PORT {
            TlsMode::Implicit
        } else {
            TlsMode::StartTls
        }
    }
}

/// SMTP relay provider.
pub struct SmtpMailer {
    host: String,
    port: u16,
    sender: Option<Address>,
    has_credentials: bool,
    timeout: Duration,
    tls: TlsMode,
    transport: Result<AsyncSmtpTransport<Tokio1Executor>, MailError>,
}

impl SmtpMailer {
    /// Start building a relay mailer for `host:port`.
    pub fn new(host: &str, port: u16) -> SmtpBuilder {
        SmtpBuilder {
            host: host.to_string(),
            port,
            credentials: None,
            sender: None,
            timeout: DEFAULT_SEND_TIMEOUT,
            tls: None,
        }
    }

    /// Relay host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Relay port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The TLS mode the transport was built with.
    pub fn tls_mode(&self) -> TlsMode {
        self.tls
    }

    /// Whether the connection uses implicit TLS.
    pub fn implicit_tls(&self) -> bool {
        self.tls == TlsMode::Implicit
    }

    fn build_message(&self, email: &Email) -> Result<Message, MailError> {
        let from = email
            .from
            .as_ref()
            .ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut builder = Message::builder()
            .from(address_to_mailbox(from)?)
            .subject(&email.subject);

        for to in &email.to {
            builder = builder.to(address_to_mailbox(to)?);
        }

        let html = email.html_body.clone().unwrap_or_default();
        Ok(builder.header(ContentType::TEXT_HTML).body(html)?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let transport = self.transport.as_ref().map_err(Clone::clone)?;
        let message = self.build_message(email)?;

        let response = transport
            .send(message)
            .await
            .map_err(|e| MailError::provider("smtp", e.to_string()))?;

        // Extract message ID from SMTP response, or generate one
        let message_id = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.host.is_empty() {
            return Err(MailError::Configuration("SMTP_SERVER not set".into()));
        }
        if self.sender.as_ref().map_or(true, |s| s.email.is_empty()) {
            return Err(MailError::Configuration("SENDER_EMAIL not set".into()));
        }
        if !self.has_credentials {
            return Err(MailError::Configuration("SENDER_PASSWORD not set".into()));
        }
        self.transport.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    fn batch_sender(&self, _display_name: Option<&str>) -> Option<Address> {
        self.sender.clone()
    }

    fn send_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for [`SmtpMailer`].
pub struct SmtpBuilder {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    sender: Option<Address>,
    timeout: Duration,
    tls: Option<TlsMode>,
}

impl SmtpBuilder {
    /// Set SMTP credentials. Empty values leave the mailer unconfigured.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        if !username.is_empty() && !password.is_empty() {
            self.credentials = Some((username.to_string(), password.to_string()));
        }
        self
    }

    /// Set the identity every message is sent from.
    pub fn sender(mut self, sender: impl ToAddress) -> Self {
        self.sender = Some(sender.to_address());
        self
    }

    /// Override the per-call timeout (also used as the SMTP socket timeout).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Force a TLS mode instead of the port's default.
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = Some(mode);
        self
    }

    /// Build the SmtpMailer.
    ///
    /// Never fails: a TLS setup error is kept and reported by
    /// `validate_config`, so every send in a batch fails the same way.
    pub fn build(self) -> SmtpMailer {
        let has_credentials = self.credentials.is_some();
        let tls = self.tls.unwrap_or_else(|| TlsMode::for_port(self.port));
        let transport = build_transport(&self.host, self.port, tls, self.credentials, self.timeout);

        SmtpMailer {
            host: self.host,
            port: self.port,
            sender: self.sender,
            has_credentials,
            timeout: self.timeout,
            tls,
            transport,
        }
    }
}

fn build_transport(
    host: &str,
    port: u16,
    mode: TlsMode,
    credentials: Option<(String, String)>,
    timeout: Duration,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let params = TlsParameters::builder(host.to_string())
        .dangerous_accept_invalid_certs(true)
        .build_rustls()
        .map_err(|e| MailError::Configuration(format!("SMTP TLS setup failed: {}", e)))?;

    let tls = match mode {
        TlsMode::Implicit => Tls::Wrapper(params),
        TlsMode::StartTls => Tls::Opportunistic(params),
    };

    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        .port(port)
        .tls(tls)
        .timeout(Some(timeout));
    if let Some((username, password)) = credentials {
        builder = builder.credentials(Credentials::new(username, password));
    }

    Ok(builder.build())
}

/// Convert our Address to lettre's Mailbox.
fn address_to_mailbox(addr: &Address) -> Result<Mailbox, MailError> {
    let email = addr
        .email
        .parse()
        .map_err(|e: lettre::address::AddressError| MailError::InvalidAddress(e.to_string()))?;

    Ok(Mailbox::new(addr.name.clone(), email))
}
