//! Scripting host boundary for Hearth automation programs
//!
//! A program pairs a boolean trigger condition with an action body, both
//! written in some supported scripting form. This crate defines the contract
//! the program engine consumes from language hosts:
//!
//! - [`ScriptHost`] - compile sources, evaluate conditions, run bodies
//! - [`ProgramError`] - a compile or runtime diagnostic tied to a code block
//! - [`ScriptFault`] - a runtime fault classified as benign or user-caused
//!
//! Only user faults flow into the engine's auto-disable pipeline; benign
//! faults (reflective dispatch wrappers with no user-visible meaning) are
//! swallowed at this boundary.

pub mod error;
pub mod host;

pub use error::{CodeBlock, FaultKind, ProgramError, ScriptFault};
pub use host::{
    CompileOutcome, ConditionOutcome, NullScriptHost, ProgramSource, RunOutcome, ScriptFuture,
    ScriptHandle, ScriptHost,
};
