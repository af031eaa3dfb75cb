//! Client-side coordination layer for proxy-based chat translation.
//! Decides per message whether to call the remote translation proxy,
//! deduplicates concurrent fetches for the same message, caches results,
//! and gates everything behind user settings.
//!
//! The host application owns the composition root: it constructs a
//! [`SettingsStore`], a [`TranslationCache`], a [`ProxyClient`] (or any
//! other [`TranslationProxy`] implementation), a [`ContextProvider`], and
//! wires them into a [`TranslationService`]. Nothing here is a global.

pub mod cache;
pub mod context;
pub mod proxy;
pub mod service;
pub mod settings;

use serde::{Deserialize, Serialize};

pub use cache::{CacheKey, TranslationCache};
pub use context::{ContextProvider, EmptyContextProvider};
pub use proxy::{
    normalize_base_url, ProxyClient, TranslateRequest, TranslateResponse, TranslationProxy,
};
pub use service::{DisplayResult, TranslationService};
pub use settings::{ContextMode, SettingsStore, TranslationSettings};

/// Whether a message is being displayed (incoming) or composed (outgoing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn is_incoming(self) -> bool {
        matches!(self, Direction::Incoming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prior conversation turn sent alongside the text in context mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: String,
    pub text: String,
}

impl ContextMessage {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}
