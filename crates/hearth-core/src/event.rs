//! Published program events
//!
//! Whenever the program engine changes an observable program property
//! (status, runtime errors, enablement) it publishes a [`ProgramEvent`].
//! Hub components subscribe to these to mirror the values onto the
//! program's module and to surface them in UIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, ProgramAddress};

/// Source string attached to every event the program engine publishes
pub const EVENT_SOURCE: &str = "Automation Program";

/// Property name for program status publications
pub const PROP_PROGRAM_STATUS: &str = "ProgramStatus";

/// Property name for runtime error publications
pub const PROP_RUNTIME_ERROR: &str = "RuntimeError";

/// Observable status of a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramStatus {
    /// No body execution in progress
    Idle,
    /// A body execution is in progress
    Running,
    /// A body execution was force-terminated
    Interrupted,
    /// The program was enabled
    Enabled,
    /// The program was disabled
    Disabled,
}

impl ProgramStatus {
    /// The published string form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Interrupted => "Interrupted",
            Self::Enabled => "Enabled",
            Self::Disabled => "Disabled",
        }
    }
}

impl std::fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event published by the program engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramEvent {
    /// Address of the program the event is about
    pub address: ProgramAddress,

    /// Domain of the program
    pub domain: String,

    /// Source of the event (always [`EVENT_SOURCE`] for engine publications)
    pub source: String,

    /// Property being published (e.g. [`PROP_PROGRAM_STATUS`])
    pub property: String,

    /// Published value
    pub value: String,

    /// When the event was published
    pub time_fired: DateTime<Utc>,

    /// Context tracking the origin and causality
    pub context: Context,
}

impl ProgramEvent {
    /// Create an event with the current timestamp
    pub fn new(
        address: ProgramAddress,
        domain: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
        context: Context,
    ) -> Self {
        Self {
            address,
            domain: domain.into(),
            source: EVENT_SOURCE.to_string(),
            property: property.into(),
            value: value.into(),
            time_fired: Utc::now(),
            context,
        }
    }
}
