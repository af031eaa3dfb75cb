//! User settings: persistence and the enable/disable decision logic.
//! Settings live in a single versioned JSON blob on disk. Load never fails
//! (missing or corrupt blob yields defaults) and save is best-effort, so
//! callers get a usable value on every path.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Direction;

/// Namespace key for the persisted settings blob.
pub const SETTINGS_KEY: &str = "ai_translation.settings.v1";

/// Context mode: translate each message alone, or attach recent turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextMode {
    SingleMessage,
    ConversationContext,
}

/// Translation settings, persisted as a camelCase JSON blob.
///
/// `per_chat_enabled` holds only `false` overrides: re-enabling a chat
/// removes its key rather than storing `true`, keeping the representation
/// canonical (absence means "use global default").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationSettings {
    pub global_enabled: bool,
    pub translate_incoming_enabled: bool,
    pub translate_outgoing_enabled: bool,
    pub proxy_base_url: String,
    pub show_raw_api_responses: bool,
    pub context_mode: ContextMode,
    pub context_message_count: u32,
    pub per_chat_enabled: HashMap<String, bool>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            global_enabled: false,
            translate_incoming_enabled: true,
            translate_outgoing_enabled: true,
            proxy_base_url: String::new(),
            show_raw_api_responses: false,
            context_mode: ContextMode::SingleMessage,
            context_message_count: 20,
            per_chat_enabled: HashMap::new(),
        }
    }
}

impl TranslationSettings {
    /// Decide whether translation applies for a chat and direction.
    /// Global switch first, then the direction toggle, then the per-chat
    /// override (absent means enabled). A `None` chat id is a global-scope
    /// query and only consults the first two.
    pub fn is_enabled_for(&self, chat_id: Option<&str>, direction: Direction) -> bool {
        if !self.global_enabled {
            return false;
        }
        let direction_enabled = match direction {
            Direction::Incoming => self.translate_incoming_enabled,
            Direction::Outgoing => self.translate_outgoing_enabled,
        };
        if !direction_enabled {
            return false;
        }
        match chat_id {
            Some(id) => self.per_chat_enabled.get(id).copied().unwrap_or(true),
            None => true,
        }
    }

    /// Context turn count clamped to the range the proxy accepts.
    /// Applied at every read path that feeds a network call, even when a
    /// stale out-of-range value was persisted.
    pub fn clamped_context_count(&self) -> u32 {
        self.context_message_count.clamp(2, 100)
    }
}

/// Persistent settings store with serialized access.
///
/// A single mutex guards every load/save so a concurrent `update` cannot
/// interleave with another writer and lose a mutation.
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    /// Store the settings blob under `storage_dir`.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: storage_dir.into().join(format!("{SETTINGS_KEY}.json")),
            lock: Mutex::new(()),
        }
    }

    /// Load settings, falling back to defaults when the blob is missing or
    /// does not parse. Never errors.
    pub fn load(&self) -> TranslationSettings {
        let _guard = self.lock.lock();
        self.read_blob()
    }

    /// Persist settings. Best-effort: serialization or I/O failure is
    /// logged and swallowed.
    pub fn save(&self, settings: &TranslationSettings) {
        let _guard = self.lock.lock();
        self.write_blob(settings);
    }

    /// Load, mutate, save as one atomic unit. Returns the stored result.
    pub fn update<F>(&self, mutate: F) -> TranslationSettings
    where
        F: FnOnce(&mut TranslationSettings),
    {
        let _guard = self.lock.lock();
        let mut settings = self.read_blob();
        mutate(&mut settings);
        self.write_blob(&settings);
        settings
    }

    /// Convenience predicate over a fresh snapshot.
    pub fn is_enabled(&self, chat_id: Option<&str>, direction: Direction) -> bool {
        self.load().is_enabled_for(chat_id, direction)
    }

    /// Raw per-chat override, if one is stored. `Some(false)` is the only
    /// value ever persisted; `None` means "use global default".
    pub fn per_chat_override(&self, chat_id: Option<&str>) -> Option<bool> {
        let id = chat_id?;
        self.load().per_chat_enabled.get(id).copied()
    }

    /// Enable or disable translation for one chat. Enabling removes the
    /// stored override instead of writing `true`. Returns `enabled`.
    pub fn set_per_chat_enabled(&self, chat_id: Option<&str>, enabled: bool) -> bool {
        let Some(id) = chat_id else {
            return enabled;
        };
        self.update(|settings| {
            if enabled {
                settings.per_chat_enabled.remove(id);
            } else {
                settings.per_chat_enabled.insert(id.to_string(), false);
            }
        });
        enabled
    }

    /// Flip the effective per-chat value (absent counts as enabled).
    /// Returns the new effective value.
    pub fn toggle_per_chat_enabled(&self, chat_id: Option<&str>) -> bool {
        let Some(id) = chat_id else {
            return true;
        };
        let current = self
            .load()
            .per_chat_enabled
            .get(id)
            .copied()
            .unwrap_or(true);
        self.set_per_chat_enabled(Some(id), !current)
    }

    fn read_blob(&self) -> TranslationSettings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return TranslationSettings::default(),
        };
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "settings blob failed to parse, using defaults");
                TranslationSettings::default()
            }
        }
    }

    fn write_blob(&self, settings: &TranslationSettings) {
        let blob = match serde_json::to_vec_pretty(settings) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "settings serialization failed, not persisting");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, blob) {
            warn!(error = %e, path = %self.path.display(), "settings write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn load_returns_defaults_when_nothing_persisted() {
        let (_dir, store) = store();
        assert_eq!(store.load(), TranslationSettings::default());
    }

    #[test]
    fn load_returns_defaults_on_corrupt_blob() {
        let (dir, store) = store();
        let path = dir.path().join(format!("{SETTINGS_KEY}.json"));
        std::fs::write(&path, b"{ not json").expect("write");
        assert_eq!(store.load(), TranslationSettings::default());
    }

    #[test]
    fn update_persists_across_loads() {
        let (_dir, store) = store();
        store.update(|s| {
            s.global_enabled = true;
            s.proxy_base_url = "https://proxy.example".to_string();
            s.context_mode = ContextMode::ConversationContext;
        });
        let loaded = store.load();
        assert!(loaded.global_enabled);
        assert_eq!(loaded.proxy_base_url, "https://proxy.example");
        assert_eq!(loaded.context_mode, ContextMode::ConversationContext);
    }

    #[test]
    fn blob_uses_camel_case_field_names() {
        let json = serde_json::to_string(&TranslationSettings::default()).expect("serialize");
        assert!(json.contains("\"globalEnabled\""));
        assert!(json.contains("\"translateIncomingEnabled\""));
        assert!(json.contains("\"contextMode\""));
        assert!(json.contains("\"singleMessage\""));
        assert!(json.contains("\"perChatEnabled\""));
    }

    #[test]
    fn partial_blob_fills_missing_fields_with_defaults() {
        let (dir, store) = store();
        let path = dir.path().join(format!("{SETTINGS_KEY}.json"));
        std::fs::write(&path, br#"{"globalEnabled": true}"#).expect("write");
        let loaded = store.load();
        assert!(loaded.global_enabled);
        assert!(loaded.translate_incoming_enabled);
        assert_eq!(loaded.context_message_count, 20);
    }

    #[test]
    fn global_disabled_wins_over_everything() {
        let settings = TranslationSettings {
            global_enabled: false,
            ..Default::default()
        };
        assert!(!settings.is_enabled_for(None, Direction::Incoming));
        assert!(!settings.is_enabled_for(None, Direction::Outgoing));
        assert!(!settings.is_enabled_for(Some("42"), Direction::Incoming));
    }

    #[test]
    fn direction_toggle_gates_only_its_direction() {
        let settings = TranslationSettings {
            global_enabled: true,
            translate_incoming_enabled: false,
            ..Default::default()
        };
        assert!(!settings.is_enabled_for(Some("42"), Direction::Incoming));
        assert!(settings.is_enabled_for(Some("42"), Direction::Outgoing));
    }

    #[test]
    fn chat_without_override_defaults_to_enabled() {
        let settings = TranslationSettings {
            global_enabled: true,
            ..Default::default()
        };
        assert!(settings.is_enabled_for(Some("42"), Direction::Incoming));
        assert!(settings.is_enabled_for(None, Direction::Outgoing));
    }

    #[test]
    fn per_chat_false_override_disables_that_chat_only() {
        let (_dir, store) = store();
        store.update(|s| s.global_enabled = true);
        store.set_per_chat_enabled(Some("42"), false);
        assert!(!store.is_enabled(Some("42"), Direction::Incoming));
        assert!(store.is_enabled(Some("99"), Direction::Incoming));
    }

    #[test]
    fn enabling_a_chat_removes_the_override_instead_of_storing_true() {
        let (_dir, store) = store();
        store.set_per_chat_enabled(Some("42"), false);
        assert_eq!(store.per_chat_override(Some("42")), Some(false));

        store.set_per_chat_enabled(Some("42"), true);
        assert_eq!(store.per_chat_override(Some("42")), None);
        assert!(store.load().per_chat_enabled.is_empty());
    }

    #[test]
    fn toggle_flips_effective_value() {
        let (_dir, store) = store();
        // Absent counts as enabled, so first toggle disables.
        assert!(!store.toggle_per_chat_enabled(Some("42")));
        assert_eq!(store.per_chat_override(Some("42")), Some(false));
        // Second toggle re-enables and drops the key.
        assert!(store.toggle_per_chat_enabled(Some("42")));
        assert_eq!(store.per_chat_override(Some("42")), None);
    }

    #[test]
    fn toggle_without_chat_id_is_a_no_op() {
        let (_dir, store) = store();
        assert!(store.toggle_per_chat_enabled(None));
        assert!(store.load().per_chat_enabled.is_empty());
    }

    #[test]
    fn context_count_is_clamped_at_read_time() {
        let mut settings = TranslationSettings::default();
        settings.context_message_count = 0;
        assert_eq!(settings.clamped_context_count(), 2);
        settings.context_message_count = 1000;
        assert_eq!(settings.clamped_context_count(), 100);
        settings.context_message_count = 20;
        assert_eq!(settings.clamped_context_count(), 20);
    }

    #[test]
    fn concurrent_updates_do_not_lose_writes() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let chat_id = format!("chat-{i}");
                store.set_per_chat_enabled(Some(&chat_id), false);
            }));
        }
        for handle in handles {
            handle.join().expect("thread");
        }
        assert_eq!(store.load().per_chat_enabled.len(), 8);
    }
}
