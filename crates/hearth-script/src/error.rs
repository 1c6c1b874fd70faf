//! Script diagnostics and fault classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which code block of a program a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeBlock {
    /// The trigger condition
    #[serde(rename = "TC")]
    Condition,
    /// The action body
    #[serde(rename = "CR")]
    Body,
}

impl CodeBlock {
    /// The published prefix for runtime errors in this block
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Condition => "TC",
            Self::Body => "CR",
        }
    }
}

/// A compile-time or runtime diagnostic for one program code block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramError {
    /// Source line the diagnostic refers to
    pub line: u32,

    /// Source column the diagnostic refers to
    pub column: u32,

    /// Diagnostic message
    pub message: String,

    /// Host-specific error number (e.g. a compiler error code)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub number: String,

    /// Code block the diagnostic belongs to
    #[serde(rename = "codeBlock")]
    pub code_block: CodeBlock,
}

/// Classification of a runtime fault raised by a script host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A reflective-dispatch wrapper with no user-visible meaning; ignored
    Benign,
    /// A fault in user code; flows into the auto-disable pipeline
    Runtime,
}

/// A runtime fault raised while evaluating a condition or running a body
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ScriptFault {
    /// Fault classification
    pub kind: FaultKind,

    /// Fault message as reported by the host
    pub message: String,

    /// Source line, when the host can attribute one
    pub line: u32,

    /// Source column, when the host can attribute one
    pub column: u32,
}

impl ScriptFault {
    /// A user-code fault at an unknown location
    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Runtime,
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    /// A benign fault the engine must ignore
    pub fn benign(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Benign,
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    /// Attach a source location
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Whether this fault must be ignored by the engine
    pub fn is_benign(&self) -> bool {
        self.kind == FaultKind::Benign
    }

    /// The fault message with newlines and carriage returns replaced by spaces
    pub fn sanitized_message(&self) -> String {
        self.message.replace(['\r', '\n'], " ")
    }

    /// Convert into a diagnostic record for the given code block
    pub fn to_program_error(&self, code_block: CodeBlock) -> ProgramError {
        ProgramError {
            line: self.line,
            column: self.column,
            message: self.message.clone(),
            number: String::new(),
            code_block,
        }
    }
}
