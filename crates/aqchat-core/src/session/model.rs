//! Chat session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat session keyed by an opaque caller-supplied (or generated) token.
///
/// Sessions are created on the first message carrying a given id and
/// updated every turn; this core never deletes them (retention is an
/// external concern).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Opaque session token.
    pub session_id: String,
    /// Originating domain, when the embedding site supplies one.
    pub domain: Option<String>,
    /// Resolved tenant identifier; absent until a turn resolves one.
    pub tenant_slug: Option<String>,
    /// Client address metadata.
    pub ip_address: Option<String>,
    /// Client user-agent metadata.
    pub user_agent: Option<String>,
    /// When the session was first seen.
    pub created_at: DateTime<Utc>,
    /// Bumped on every turn regardless of outcome.
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Active flag; never cleared by this core.
    pub is_active: bool,
}

impl ChatSession {
    /// Creates a fresh session for the given id at `now`.
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            domain: None,
            tenant_slug: None,
            ip_address: None,
            user_agent: None,
            created_at: now,
            last_activity_at: Some(now),
            is_active: true,
        }
    }
}
