// Per-session conversation memory
// Process-local, never persisted, never evicted: unbounded growth over the
// process lifetime is an accepted limitation of this store.


use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::chat::ChatMessage;

pub const DEFAULT_MEMORY_ID: &str = "default";

/// Session-keyed message logs. Sessions are created lazily on first
/// reference and seeded with the configured system prompt exactly once.
///
/// Appends for different sessions are independent; concurrent appends to the
/// same session land in whatever order the scheduler produces.
#[derive(Debug, Default)]
pub struct MemoryStore {
    system_prompt: Option<String>,
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryStore {
    #[inline]
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot the session's log, creating and seeding it on first use.
    /// A missing id resolves to [`DEFAULT_MEMORY_ID`].
    #[inline]
    pub fn history(&self, memory_id: Option<&str>) -> Vec<ChatMessage> {
        let key = memory_id.unwrap_or(DEFAULT_MEMORY_ID);
        let mut sessions = self.lock_sessions();
        sessions
            .entry(key.to_string())
            .or_insert_with(|| self.seed())
            .clone()
    }

    /// Append to the end of the session's log, creating it if this is the
    /// first reference. Writes are best effort and cannot fail.
    #[inline]
    pub fn append(&self, memory_id: Option<&str>, message: ChatMessage) {
        let key = memory_id.unwrap_or(DEFAULT_MEMORY_ID);
        let mut sessions = self.lock_sessions();
        sessions
            .entry(key.to_string())
            .or_insert_with(|| self.seed())
            .push(message);
    }

    /// Number of live sessions, for diagnostics.
    #[inline]
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    fn seed(&self) -> Vec<ChatMessage> {
        self.system_prompt
            .as_deref()
            .map(|prompt| vec![ChatMessage::system(prompt)])
            .unwrap_or_default()
    }

    fn lock_sessions(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Vec<ChatMessage>>> {
        // A poisoned lock only means another thread panicked mid-append;
        // the map itself is still usable.
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
