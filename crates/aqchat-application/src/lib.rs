//! Orchestration layer for the AqChat conversational query router.
//!
//! [`ChatOrchestrator`] is the single boundary surface this workspace
//! exposes: one `handle_message` call per turn, driving session state,
//! tenant resolution, intent classification, dispatch, best-effort
//! enrichment, reply post-processing, and persistence over the
//! collaborator traits defined in `aqchat-core`.

pub mod orchestrator;
pub mod reply;

pub use orchestrator::{ChatOrchestrator, ChatRequest, ChatResponse};
