//! Sender identity generation.
//!
//! [`IdentityMinter`] produces disposable from-addresses of the form
//! `{phrase}.{token}@{domain}` for providers that send every message from a
//! fresh identity. One minter is created per process and shared through an
//! `Arc`; seed it with [`IdentityMinter::from_seed`] for reproducible output.
//!
//! The minter remembers a bounded window of recent addresses and never hands
//! one of them out twice. Older addresses are forgotten; a repeat beyond the
//! window needs the same six-character token and phrase to come up again,
//! and still resolves to the existing sender row through the store's natural
//! key.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Local-part phrases used when no custom pool is configured.
pub const DEFAULT_PHRASES: &[&str] = &[
    "secret.admirer",
    "mystery.lover",
    "anonymous.heart",
    "secret.love",
    "hidden.romance",
    "unknown.angel",
    "mystery.angel",
    "secret.angel",
];

/// Display name attached to minted identities.
pub const DEFAULT_DISPLAY_NAME: &str = "Secret Admirer";

/// Local part used by [`address_slug`] for an empty display name.
pub const FALLBACK_SLUG: &str = "noreply";

const TOKEN_LEN: usize = 6;
const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Recent addresses remembered by default.
pub const DEFAULT_MEMORY: usize = 100_000;

struct MinterState {
    rng: StdRng,
    recent: HashSet<String>,
    order: VecDeque<String>,
    issued: u64,
}

impl MinterState {
    /// Remember `address`, evicting the oldest beyond `memory`. False if it
    /// is still in the window.
    fn remember(&mut self, address: &str, memory: usize) -> bool {
        if self.recent.contains(address) {
            return false;
        }
        self.recent.insert(address.to_string());
        self.order.push_back(address.to_string());
        while self.order.len() > memory {
            if let Some(oldest) = self.order.pop_front() {
                self.recent.remove(&oldest);
            }
        }
        self.issued += 1;
        true
    }
}

/// Mints never-reused sender addresses.
pub struct IdentityMinter {
    state: Mutex<MinterState>,
    phrases: Vec<String>,
    memory: usize,
}

impl IdentityMinter {
    /// Minter seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Minter with a fixed seed. Two minters with the same seed and phrase
    /// pool produce the same sequence.
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(MinterState {
                rng,
                recent: HashSet::new(),
                order: VecDeque::new(),
                issued: 0,
            }),
            phrases: DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect(),
            memory: DEFAULT_MEMORY,
        }
    }

    /// How many recent addresses to guard against repeats. At least one.
    pub fn memory(mut self, memory: usize) -> Self {
        self.memory = memory.max(1);
        self
    }

    /// Replace the phrase pool. An empty pool keeps the current one.
    pub fn phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let phrases: Vec<String> = phrases.into_iter().map(Into::into).collect();
        if !phrases.is_empty() {
            self.phrases = phrases;
        }
        self
    }

    /// Mint a fresh address at `domain`.
    ///
    /// None of the last [`memory`](Self::memory) addresses is returned again.
    pub fn mint(&self, domain: &str) -> String {
        let mut state = self.state.lock();
        loop {
            let token: String = (0..TOKEN_LEN)
                .map(|_| {
                    let idx = state.rng.gen_range(0..TOKEN_CHARSET.len());
                    TOKEN_CHARSET[idx] as char
                })
                .collect();
            let phrase = self
                .phrases
                .choose(&mut state.rng)
                .map(String::as_str)
                .unwrap_or(FALLBACK_SLUG);

            let candidate = format!("{}.{}@{}", phrase, token, domain);
            if state.remember(&candidate, self.memory) {
                return candidate;
            }
            tracing::trace!(address = %candidate, "Minted identity collided, drawing again");
        }
    }

    /// Number of addresses minted so far.
    pub fn issued_count(&self) -> u64 {
        self.state.lock().issued
    }

    /// Number of addresses currently held in the repeat window.
    pub fn remembered(&self) -> usize {
        self.state.lock().order.len()
    }
}

impl Default for IdentityMinter {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl std::fmt::Debug for IdentityMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMinter")
            .field("phrases", &self.phrases)
            .field("issued", &self.issued_count())
            .field("memory", &self.memory)
            .finish()
    }
}

/// Turn a display name into an address local part.
///
/// Lower-cases the name and joins whitespace-separated words with `-`.
/// Empty or blank names give [`FALLBACK_SLUG`].
///
/// ```
/// use mailshot::identity::address_slug;
///
/// assert_eq!(address_slug("Acme  Support Team"), "acme-support-team");
/// assert_eq!(address_slug("   "), "noreply");
/// ```
pub fn address_slug(display_name: &str) -> String {
    let slug = display_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}
