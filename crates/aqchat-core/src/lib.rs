//! Core domain for the AqChat conversational query router.
//!
//! Given free-text messages about air-quality measurements, the crates in
//! this workspace classify intent, extract structured parameters, keep
//! multi-turn conversational state per session, and dispatch to downstream
//! analysis collaborators. This crate holds the pure domain pieces: text
//! normalization, slot extractors, intent classification, tenant
//! resolution, conversation state models, collaborator contracts, and the
//! response safety filter. Orchestration lives in `aqchat-application`.

pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod intent;
pub mod safety;
pub mod session;
pub mod tenant;
pub mod text;

// Re-export the shared error type
pub use error::{ChatError, Result};
