//! Sticky conversation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::IntentKind;

/// Carry-over slot set, one-to-one with a session.
///
/// Slots are sticky: once filled they persist across turns until a
/// higher-priority source overwrites them. They are never the sole source
/// of truth; they provide defaults when the current turn lacks a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    /// Intent label of the most recent classified turn.
    pub current_intent: Option<IntentKind>,
    pub domain: Option<String>,
    pub tenant_slug: Option<String>,
    pub pollutant: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub month1: Option<String>,
    pub month2: Option<String>,
    /// Free-form collected parameters accumulated across turns.
    pub collected_parameters: serde_json::Map<String, serde_json::Value>,
    /// How many turns in a row ended in a tenant-clarification prompt.
    pub tenant_invalid_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationContext {
    /// Fresh context for a session, inheriting its domain and tenant.
    pub fn new(
        session_id: impl Into<String>,
        domain: Option<String>,
        tenant_slug: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            current_intent: None,
            domain,
            tenant_slug,
            pollutant: None,
            start_date: None,
            end_date: None,
            month1: None,
            month2: None,
            collected_parameters: serde_json::Map::new(),
            tenant_invalid_attempts: 0,
            created_at: now,
            last_activity: now,
        }
    }
}
