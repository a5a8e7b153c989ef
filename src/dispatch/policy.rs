//! Per-provider concurrency ceilings and inter-send delays.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderKind;

/// How hard the dispatcher may push one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPolicy {
    /// Maximum number of units in flight at once. Never below 1.
    pub concurrency: usize,
    /// Pause each unit takes after its send, before releasing its slot.
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl DispatchPolicy {
    pub fn new(concurrency: usize, delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            delay,
        }
    }

    /// Built-in policy for a provider.
    pub fn default_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Mailgun => Self::new(50, Duration::from_millis(100)),
            ProviderKind::Smtp => Self::new(10, Duration::from_millis(500)),
            ProviderKind::Resend => Self::new(2, Duration::from_millis(1000)),
            ProviderKind::Local | ProviderKind::Logger => Self::new(50, Duration::ZERO),
        }
    }
}

/// Policies for every provider, defaults unless overridden.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    overrides: HashMap<ProviderKind, DispatchPolicy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the policy for one provider.
    pub fn set(mut self, kind: ProviderKind, policy: DispatchPolicy) -> Self {
        self.insert(kind, policy);
        self
    }

    pub fn insert(&mut self, kind: ProviderKind, policy: DispatchPolicy) {
        self.overrides.insert(
            kind,
            DispatchPolicy::new(policy.concurrency, policy.delay),
        );
    }

    /// Effective policy for `kind`.
    pub fn get(&self, kind: ProviderKind) -> DispatchPolicy {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| DispatchPolicy::default_for(kind))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
