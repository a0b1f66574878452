use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};
use tracing::warn;

use crate::domain::entities::chat_message::ChatMessage;

type Threads = HashMap<String, Vec<ChatMessage>>;

/// Keeps the messages of each conversation thread, for the lifetime of the process
///
/// A client can then only send its new message for each turn.
/// Threads are never evicted: the map grows with every new thread id until the process stops.
#[derive(Default)]
pub struct ConversationMemory {
    threads: Mutex<Threads>,
}

impl ConversationMemory {
    /// Messages of the thread, empty for an unknown thread
    pub fn load(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.threads().get(thread_id).cloned().unwrap_or_default()
    }

    /// Replaces the messages of the thread. The last save wins.
    pub fn save(&self, thread_id: &str, messages: &[ChatMessage]) {
        self.threads().insert(thread_id.to_string(), messages.to_vec());
    }

    /// A save is a single insert: the map stays consistent even if a holder of the lock panicked
    fn threads(&self) -> MutexGuard<'_, Threads> {
        self.threads.lock().unwrap_or_else(|poisoned| {
            warn!("Conversation memory lock was poisoned, recovering its content");
            poisoned.into_inner()
        })
    }
}
