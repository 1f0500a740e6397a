//! Session domain module.
//!
//! Conversation state loaded/created/updated on every turn:
//!
//! - `model`: the session record (`ChatSession`)
//! - `context`: sticky carry-over slots (`ConversationContext`)
//! - `message`: per-turn records (`MessageRole`, `StoredMessage`)
//! - `store`: the persistence trait (`ChatStore`)

mod context;
mod message;
mod model;
mod store;

pub use context::ConversationContext;
pub use message::{MessageRole, StoredMessage};
pub use model::ChatSession;
pub use store::ChatStore;
