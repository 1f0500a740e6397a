//! Per-turn message records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::IntentKind;

/// Originator of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    User,
    Assistant,
}

/// One side of one turn, immutable once written.
///
/// Ordering is timestamp-ascending and append-only; both the user and the
/// assistant record of a turn carry the same classified intent label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub intent: IntentKind,
    /// Captured failure detail; only downstream failures set this.
    pub error_detail: Option<String>,
    /// Serialized extracted parameters for the turn.
    pub parameters: Option<serde_json::Value>,
    /// Serialized response metadata (error envelopes and the like).
    pub response_metadata: Option<serde_json::Value>,
}

impl StoredMessage {
    /// A user-side record with the given content and intent.
    pub fn user(
        session_id: impl Into<String>,
        content: impl Into<String>,
        intent: IntentKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            role: MessageRole::User,
            content: content.into(),
            timestamp,
            intent,
            error_detail: None,
            parameters: None,
            response_metadata: None,
        }
    }

    /// An assistant-side record with the given content and intent.
    pub fn assistant(
        session_id: impl Into<String>,
        content: impl Into<String>,
        intent: IntentKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp,
            intent,
            error_detail: None,
            parameters: None,
            response_metadata: None,
        }
    }
}
