//! Environment-driven configuration.
//!
//! Nothing in the crate reads the environment on its own. Build a
//! [`Config`] once at startup and hand it to whatever needs it:
//!
//! ```bash
//! EMAIL_PROVIDER=mailgun
//! MAILGUN_DOMAIN=mg.example.com
//! MAILGUN_API_KEY=key-xxx
//! MAILGUN_CONCURRENCY=20
//! ```
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let dispatcher = Dispatcher::new(store, config.build_registry(), config.policies.clone());
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `EMAIL_PROVIDER` | `smtp` (`gmail` is accepted as an alias) |
//! | `SMTP_SERVER` / `SMTP_PORT` | `smtp.gmail.com` / `465` |
//! | `SENDER_EMAIL` / `SENDER_NAME` / `SENDER_PASSWORD` | unset |
//! | `MAILGUN_DOMAIN` / `MAILGUN_API_KEY` / `MAILGUN_BASE_URL` | unset / unset / US endpoint |
//! | `RESEND_API_KEY` / `RESEND_FROM_EMAIL` / `RESEND_BASE_URL` | unset / unset / public endpoint |
//! | `{PROVIDER}_CONCURRENCY` / `{PROVIDER}_SEND_DELAY_MS` | per-provider policy |
//! | `MAILSHOT_BROADCAST_CAPACITY` | `100` |
//! | `MAILSHOT_IDENTITY_SEED` | OS entropy |
//!
//! Empty values count as unset.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::{DispatchPolicy, MailerRegistry, PolicyTable};
use crate::error::MailError;
use crate::identity::IdentityMinter;
use crate::progress::{Broadcaster, DEFAULT_INBOX_CAPACITY, DEFAULT_OBSERVER_CAPACITY};
use crate::providers::{LoggerMailer, ProviderKind};

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub address: String,
    pub display_name: Option<String>,
    pub password: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_SERVER.to_string(),
            port: DEFAULT_SMTP_PORT,
            address: String::new(),
            display_name: None,
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailgunConfig {
    pub domain: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResendConfig {
    pub api_key: String,
    pub from_email: String,
    pub base_url: Option<String>,
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_provider: ProviderKind,
    pub smtp: SmtpConfig,
    pub mailgun: MailgunConfig,
    pub resend: ResendConfig,
    pub policies: PolicyTable,
    pub broadcast_capacity: usize,
    /// Fixed seed for identity minting. `None` draws from OS entropy.
    pub identity_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Smtp,
            smtp: SmtpConfig::default(),
            mailgun: MailgunConfig::default(),
            resend: ResendConfig::default(),
            policies: PolicyTable::new(),
            broadcast_capacity: DEFAULT_INBOX_CAPACITY,
            identity_seed: None,
        }
    }
}

impl Config {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let default_provider = match get("EMAIL_PROVIDER") {
            Some(name) => ProviderKind::from_str(&name).map_err(MailError::Configuration)?,
            None => defaults.default_provider,
        };
        ensure_enabled(default_provider)?;

        let smtp = SmtpConfig {
            host: get("SMTP_SERVER").unwrap_or(defaults.smtp.host),
            port: parse_var(&get, "SMTP_PORT")?.unwrap_or(defaults.smtp.port),
            address: get("SENDER_EMAIL").unwrap_or_default(),
            display_name: get("SENDER_NAME"),
            password: get("SENDER_PASSWORD").unwrap_or_default(),
        };

        let mailgun = MailgunConfig {
            domain: get("MAILGUN_DOMAIN").unwrap_or_default(),
            api_key: get("MAILGUN_API_KEY").unwrap_or_default(),
            base_url: get("MAILGUN_BASE_URL"),
        };

        let resend = ResendConfig {
            api_key: get("RESEND_API_KEY").unwrap_or_default(),
            from_email: get("RESEND_FROM_EMAIL").unwrap_or_default(),
            base_url: get("RESEND_BASE_URL"),
        };

        let mut policies = PolicyTable::new();
        for kind in ProviderKind::ALL {
            let prefix = kind.as_str().to_uppercase();
            let concurrency: Option<usize> = parse_var(&get, &format!("{}_CONCURRENCY", prefix))?;
            let delay_ms: Option<u64> = parse_var(&get, &format!("{}_SEND_DELAY_MS", prefix))?;
            if concurrency.is_none() && delay_ms.is_none() {
                continue;
            }
            let base = DispatchPolicy::default_for(kind);
            policies.insert(
                kind,
                DispatchPolicy::new(
                    concurrency.unwrap_or(base.concurrency),
                    delay_ms.map(Duration::from_millis).unwrap_or(base.delay),
                ),
            );
        }

        let config = Config {
            default_provider,
            smtp,
            mailgun,
            resend,
            policies,
            broadcast_capacity: parse_var(&get, "MAILSHOT_BROADCAST_CAPACITY")?
                .unwrap_or(defaults.broadcast_capacity),
            identity_seed: parse_var(&get, "MAILSHOT_IDENTITY_SEED")?,
        };

        tracing::debug!(
            provider = %config.default_provider,
            seeded = config.identity_seed.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// The identity minter described by this config.
    pub fn minter(&self) -> Arc<IdentityMinter> {
        Arc::new(match self.identity_seed {
            Some(seed) => IdentityMinter::from_seed(seed),
            None => IdentityMinter::from_entropy(),
        })
    }

    /// Start a broadcaster with the configured inbox capacity.
    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster::with_capacity(self.broadcast_capacity, DEFAULT_OBSERVER_CAPACITY)
    }

    /// Construct every provider compiled into this build.
    ///
    /// Providers with missing credentials are still registered; their sends
    /// fail with a configuration error.
    pub fn build_registry(&self) -> MailerRegistry {
        let mut registry = MailerRegistry::new(self.default_provider);

        #[cfg(feature = "smtp")]
        {
            let mut builder = crate::providers::SmtpMailer::new(&self.smtp.host, self.smtp.port)
                .credentials(&self.smtp.address, &self.smtp.password);
            if !self.smtp.address.is_empty() {
                builder = builder.sender(match &self.smtp.display_name {
                    Some(name) => crate::Address::with_name(name.as_str(), self.smtp.address.as_str()),
                    None => crate::Address::new(self.smtp.address.as_str()),
                });
            }
            registry.insert(ProviderKind::Smtp, Arc::new(builder.build()));
        }

        #[cfg(feature = "mailgun")]
        {
            let mut mailer =
                crate::providers::MailgunMailer::new(&self.mailgun.api_key, &self.mailgun.domain)
                    .minter(self.minter());
            if let Some(url) = &self.mailgun.base_url {
                mailer = mailer.base_url(url);
            }
            registry.insert(ProviderKind::Mailgun, Arc::new(mailer));
        }

        #[cfg(feature = "resend")]
        {
            let mut mailer =
                crate::providers::ResendMailer::new(&self.resend.api_key, &self.resend.from_email);
            if let Some(url) = &self.resend.base_url {
                mailer = mailer.base_url(url);
            }
            registry.insert(ProviderKind::Resend, Arc::new(mailer));
        }

        #[cfg(feature = "local")]
        registry.insert(
            ProviderKind::Local,
            Arc::new(crate::providers::LocalMailer::new()),
        );

        registry.insert(ProviderKind::Logger, Arc::new(LoggerMailer::new()));

        tracing::info!(
            default = %self.default_provider,
            providers = ?registry.providers(),
            "Mailer registry built"
        );
        registry
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>, MailError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MailError::Configuration(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(None),
    }
}

fn ensure_enabled(kind: ProviderKind) -> Result<(), MailError> {
    let enabled = match kind {
        ProviderKind::Smtp => cfg!(feature = "smtp"),
        ProviderKind::Mailgun => cfg!(feature = "mailgun"),
        ProviderKind::Resend => cfg!(feature = "resend"),
        ProviderKind::Local => cfg!(feature = "local"),
        ProviderKind::Logger => true,
    };
    if enabled {
        Ok(())
    } else {
        Err(MailError::Configuration(format!(
            "EMAIL_PROVIDER={} but '{}' feature is not enabled. \
             Add it to your Cargo.toml features.",
            kind, kind
        )))
    }
}
