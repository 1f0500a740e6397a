//! Conversation state store trait.

use async_trait::async_trait;

use super::context::ConversationContext;
use super::message::StoredMessage;
use super::model::ChatSession;
use crate::error::Result;

/// An abstract store for sessions, contexts, and message records.
///
/// Decouples the orchestration logic from the backing storage. All
/// operations are keyed by the opaque session id; implementations own
/// their consistency (this core relies on read-then-write semantics scoped
/// to a single session id and accepts last-write-wins races across
/// concurrent turns on the same session).
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Finds a session by id.
    async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>>;

    /// Creates or replaces a session record.
    async fn save_session(&self, session: &ChatSession) -> Result<()>;

    /// Finds the conversation context for a session.
    async fn find_context(&self, session_id: &str) -> Result<Option<ConversationContext>>;

    /// Creates or replaces a conversation context.
    async fn save_context(&self, context: &ConversationContext) -> Result<()>;

    /// Appends one message record; records are immutable once written.
    async fn append_message(&self, message: &StoredMessage) -> Result<()>;

    /// Returns a session's messages in timestamp-ascending order.
    async fn messages_for_session(&self, session_id: &str) -> Result<Vec<StoredMessage>>;
}
