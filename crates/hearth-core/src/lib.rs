//! Core types for the Hearth automation hub
//!
//! This crate provides the shared vocabulary used by the program engine and
//! its collaborators: program addresses, module and parameter types,
//! property-change events, and the published program events that other hub
//! components observe.

pub mod address;
pub mod context;
pub mod event;
pub mod module;

pub use address::{ProgramAddress, USER_SPACE_BASE};
pub use context::{Context, ContextOrigin};
pub use event::{ProgramEvent, ProgramStatus, EVENT_SOURCE, PROP_PROGRAM_STATUS, PROP_RUNTIME_ERROR};
pub use module::{ChangeSource, Module, ModuleParameter, PropertyChange};
