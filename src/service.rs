//! Translation coordination service.
//! Orchestrates per-message decisions: settings gate → cache lookup →
//! in-flight dedup → proxy call → cache write. No operation here ever
//! errors; every failure resolves to the untranslated original text.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::cache::{CacheKey, TranslationCache};
use crate::context::ContextProvider;
use crate::proxy::{TranslateRequest, TranslationProxy};
use crate::settings::{ContextMode, SettingsStore, TranslationSettings};
use crate::{ContextMessage, Direction};

/// What the message UI should display for an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayResult {
    pub text: String,
    pub was_translated: bool,
    pub original_text: String,
}

impl DisplayResult {
    fn untranslated(text: &str) -> Self {
        Self {
            text: text.to_string(),
            was_translated: false,
            original_text: text.to_string(),
        }
    }

    fn from_translation(translated: String, original: &str) -> Self {
        Self {
            was_translated: translated != original,
            text: translated,
            original_text: original.to_string(),
        }
    }
}

type InFlightMap = Arc<Mutex<HashMap<CacheKey, broadcast::Sender<String>>>>;

/// Clears the in-flight marker for a key no matter how the fetch ends.
/// `complete` broadcasts the result to deduplicated waiters; if the fetch
/// future is dropped instead, `Drop` still removes the marker and waiters
/// observe a closed channel.
struct InFlightGuard {
    in_flight: InFlightMap,
    key: Option<CacheKey>,
}

impl InFlightGuard {
    fn new(in_flight: InFlightMap, key: CacheKey) -> Self {
        Self {
            in_flight,
            key: Some(key),
        }
    }

    fn complete(mut self, translated: &str) {
        if let Some(key) = self.key.take() {
            if let Some(tx) = self.in_flight.lock().remove(&key) {
                // Waiters may all have gone away; a send error is fine.
                let _ = tx.send(translated.to_string());
            }
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.in_flight.lock().remove(&key);
        }
    }
}

/// Coordination layer between the message pipeline, the settings store,
/// the result cache, and the translation proxy. All collaborators are
/// injected; the host holds one instance per process.
pub struct TranslationService {
    settings: Arc<SettingsStore>,
    proxy: Arc<dyn TranslationProxy>,
    cache: Arc<TranslationCache>,
    context_provider: Arc<dyn ContextProvider>,
    in_flight: InFlightMap,
}

impl TranslationService {
    pub fn new(
        settings: Arc<SettingsStore>,
        proxy: Arc<dyn TranslationProxy>,
        cache: Arc<TranslationCache>,
        context_provider: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            settings,
            proxy,
            cache,
            context_provider,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self, chat_id: Option<&str>, direction: Direction) -> bool {
        self.settings.is_enabled(chat_id, direction)
    }

    /// Translate user-composed text before sending. Always synchronous to
    /// the caller and never cached: outgoing text changes with every edit.
    /// Disabled settings or empty text return the original unchanged, as
    /// does any proxy failure (the passthrough contract).
    pub async fn translate_outgoing(&self, text: &str, chat_id: Option<&str>) -> String {
        if text.is_empty() {
            return text.to_string();
        }
        let settings = self.settings.load();
        if !settings.is_enabled_for(chat_id, Direction::Outgoing) {
            return text.to_string();
        }

        let context = self.build_context(&settings, chat_id);
        let request = TranslateRequest::new(text, Direction::Outgoing, chat_id, context);
        let response = self.proxy.translate(&settings.proxy_base_url, &request).await;
        response.translated_text
    }

    /// Resolve the display text for an incoming message.
    ///
    /// Cache hits return synchronously. On a miss, at most one proxy fetch
    /// per cache key is in flight at a time: concurrent callers for the
    /// same key join the existing fetch and receive its eventual result
    /// instead of issuing a duplicate call.
    pub async fn translate_incoming_display_text(
        &self,
        text: &str,
        chat_id: Option<&str>,
        message_key: &str,
    ) -> DisplayResult {
        if text.is_empty() {
            return DisplayResult::untranslated(text);
        }
        let settings = self.settings.load();
        if !settings.is_enabled_for(chat_id, Direction::Incoming) {
            return DisplayResult::untranslated(text);
        }

        let key = CacheKey::incoming(message_key, text);
        if let Some(cached) = self.cache.get(&key) {
            debug!(message_key, "incoming translation served from cache");
            return DisplayResult::from_translation(cached, text);
        }

        // Join an in-flight fetch for this key, or become the fetcher.
        let waiter = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key) {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    in_flight.insert(key.clone(), tx);
                    None
                }
            }
        };

        if let Some(mut rx) = waiter {
            debug!(message_key, "joining in-flight incoming fetch");
            return match rx.recv().await {
                Ok(translated) => DisplayResult::from_translation(translated, text),
                // Fetcher went away without completing.
                Err(_) => DisplayResult::untranslated(text),
            };
        }

        let guard = InFlightGuard::new(Arc::clone(&self.in_flight), key.clone());
        // Incoming requests never carry context.
        let request = TranslateRequest::new(text, Direction::Incoming, chat_id, Vec::new());
        let response = self.proxy.translate(&settings.proxy_base_url, &request).await;

        // Cache before clearing the in-flight marker: a caller arriving in
        // between either hits the cache or joins this fetch, never both
        // missing and starting a second call.
        self.cache.insert(key, response.translated_text.clone());
        guard.complete(&response.translated_text);

        DisplayResult::from_translation(response.translated_text, text)
    }

    /// Synchronous cache peek for UI layers. Never triggers network
    /// activity and ignores settings: a cached value is always shown.
    pub fn cached_incoming_display_translation(
        &self,
        text: &str,
        message_key: &str,
    ) -> Option<DisplayResult> {
        if text.is_empty() {
            return None;
        }
        let key = CacheKey::incoming(message_key, text);
        self.cache
            .get(&key)
            .map(|cached| DisplayResult::from_translation(cached, text))
    }

    /// Probe the configured proxy's `/health` endpoint.
    pub async fn test_connection(&self) -> bool {
        let settings = self.settings.load();
        self.proxy.check_health(&settings.proxy_base_url).await
    }

    /// Drop all cached incoming translations.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn build_context(
        &self,
        settings: &TranslationSettings,
        chat_id: Option<&str>,
    ) -> Vec<ContextMessage> {
        if settings.context_mode != ContextMode::ConversationContext {
            return Vec::new();
        }
        let Some(chat_id) = chat_id else {
            return Vec::new();
        };
        if settings.context_message_count < 2 {
            return Vec::new();
        }
        self.context_provider
            .recent_context(chat_id, settings.clamped_context_count() as usize)
    }
}
