//! Conversation context supplier seam.
//! The host's message store implements [`ContextProvider`] to feed recent
//! turns into context-mode translation; the crate ships only a placeholder.

use crate::ContextMessage;

/// Supplies recent conversation turns for a chat, newest-last.
/// Implementations may legitimately return an empty sequence, e.g. when
/// the host has not wired a real message store.
pub trait ContextProvider: Send + Sync {
    fn recent_context(&self, chat_id: &str, limit: usize) -> Vec<ContextMessage>;
}

/// Placeholder provider: always returns no context.
pub struct EmptyContextProvider;

impl ContextProvider for EmptyContextProvider {
    fn recent_context(&self, _chat_id: &str, _limit: usize) -> Vec<ContextMessage> {
        Vec::new()
    }
}
