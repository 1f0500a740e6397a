//! In-memory conversation state store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use aqchat_core::error::Result;
use aqchat_core::session::{ChatSession, ChatStore, ConversationContext, StoredMessage};

/// A process-local [`ChatStore`] over `RwLock`-guarded maps.
///
/// Suitable for tests and for embedders that do not bring their own
/// relational backend. Read-then-write semantics are scoped per session
/// id; concurrent turns on the same session resolve last-write-wins, as
/// the orchestration contract accepts.
#[derive(Default, Clone)]
pub struct InMemoryChatStore {
    sessions: Arc<RwLock<HashMap<String, ChatSession>>>,
    contexts: Arc<RwLock<HashMap<String, ConversationContext>>>,
    messages: Arc<RwLock<Vec<StoredMessage>>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, for assertions in tests.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save_session(&self, session: &ChatSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn find_context(&self, session_id: &str) -> Result<Option<ConversationContext>> {
        Ok(self.contexts.read().await.get(session_id).cloned())
    }

    async fn save_context(&self, context: &ConversationContext) -> Result<()> {
        self.contexts
            .write()
            .await
            .insert(context.session_id.clone(), context.clone());
        Ok(())
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn messages_for_session(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let mut messages: Vec<StoredMessage> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqchat_core::intent::IntentKind;
    use chrono::Utc;

    #[tokio::test]
    async fn save_and_find_session_roundtrip() {
        let store = InMemoryChatStore::new();
        let session = ChatSession::new("s-1", Utc::now());
        store.save_session(&session).await.unwrap();

        let found = store.find_session("s-1").await.unwrap().unwrap();
        assert_eq!(found.session_id, "s-1");
        assert!(store.find_session("s-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn messages_are_returned_in_timestamp_order() {
        let store = InMemoryChatStore::new();
        let now = Utc::now();
        let later = now + chrono::Duration::seconds(5);

        store
            .append_message(&StoredMessage::assistant("s-1", "ikinci", IntentKind::Unknown, later))
            .await
            .unwrap();
        store
            .append_message(&StoredMessage::user("s-1", "birinci", IntentKind::Unknown, now))
            .await
            .unwrap();
        store
            .append_message(&StoredMessage::user("s-2", "başka", IntentKind::Unknown, now))
            .await
            .unwrap();

        let messages = store.messages_for_session("s-1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "birinci");
        assert_eq!(messages[1].content, "ikinci");
    }
}
