//! Causality tracking for published program events

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ProgramAddress;

/// What set a chain of program events in motion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextOrigin {
    /// Engine-internal activity: lifecycle transitions, tick scheduling
    #[default]
    Engine,

    /// A user action (enable, disable, manual run)
    User(String),

    /// A program's own evaluation or body run
    Program(ProgramAddress),
}

/// Causality context of one published event
///
/// Every event the engine publishes carries a context identifying what set
/// it in motion; follow-up events chain back to the original cause through
/// their parent id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,

    /// What set this chain of events in motion
    #[serde(default)]
    pub origin: ContextOrigin,

    /// Identifier of the causing context, for follow-up events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    /// A fresh engine-originated context
    pub fn new() -> Self {
        Self::with_origin(ContextOrigin::Engine)
    }

    /// A fresh context with the given origin
    pub fn with_origin(origin: ContextOrigin) -> Self {
        Self {
            id: Ulid::new().to_string(),
            origin,
            parent_id: None,
        }
    }

    /// A context for events about a program's own activity
    pub fn for_program(address: ProgramAddress) -> Self {
        Self::with_origin(ContextOrigin::Program(address))
    }

    /// A context for a user-initiated action
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::with_origin(ContextOrigin::User(user_id.into()))
    }

    /// A follow-up context caused by this one
    ///
    /// Keeps the origin and records this context as the parent.
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            origin: self.origin.clone(),
            parent_id: Some(self.id.clone()),
        }
    }

    /// Whether this chain of events was set in motion by the given program
    pub fn originates_from(&self, address: ProgramAddress) -> bool {
        matches!(self.origin, ContextOrigin::Program(a) if a == address)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
