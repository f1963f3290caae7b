//! Error types for the compiler and the machine

use std::path::PathBuf;
use thiserror::Error;

use crate::lexer::Span;

/// Source location information for error messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLocation {
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn at(line: u32, column: u32) -> Self {
        SourceLocation {
            file: None,
            line,
            column,
        }
    }
}

impl From<Span> for SourceLocation {
    fn from(span: Span) -> Self {
        SourceLocation::at(span.line, span.column)
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:{}:{}", file.display(), self.line, self.column)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Errors produced while turning source text into units
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("SyntaxError: {message} at {location}")]
    Syntax {
        message: String,
        location: SourceLocation,
    },

    /// A node kind or operator combination the lowering engine does not model
    #[error("UnsupportedConstruct: {construct} at {location}")]
    UnsupportedConstruct {
        construct: String,
        location: SourceLocation,
    },

    #[error("InvariantViolation: {message} at {location}")]
    InvariantViolation {
        message: String,
        location: SourceLocation,
    },

    #[error("UnresolvedReference: {name} is not defined at {location}")]
    UnresolvedReference {
        name: String,
        location: SourceLocation,
    },
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        CompileError::Syntax {
            message: message.into(),
            location: span.into(),
        }
    }

    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        CompileError::UnsupportedConstruct {
            construct: construct.into(),
            location: span.into(),
        }
    }

    pub fn invariant(message: impl Into<String>, span: Span) -> Self {
        CompileError::InvariantViolation {
            message: message.into(),
            location: span.into(),
        }
    }

    pub fn unresolved(name: impl Into<String>, span: Span) -> Self {
        CompileError::UnresolvedReference {
            name: name.into(),
            location: span.into(),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            CompileError::Syntax { location, .. }
            | CompileError::UnsupportedConstruct { location, .. }
            | CompileError::InvariantViolation { location, .. }
            | CompileError::UnresolvedReference { location, .. } => location,
        }
    }

    /// Attach a file name to the location (used by the CLI)
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        match &mut self {
            CompileError::Syntax { location, .. }
            | CompileError::UnsupportedConstruct { location, .. }
            | CompileError::InvariantViolation { location, .. }
            | CompileError::UnresolvedReference { location, .. } => {
                location.file = Some(path.into());
            }
        }
        self
    }
}

/// Errors collected across a whole compilation, one per failed top-level statement
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{} compile error(s):\n{}", .errors.len(), format_errors(.errors))]
pub struct Diagnostics {
    pub errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }
}

fn format_errors(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors raised by the simulator while executing units
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MachineError {
    #[error("unknown function {0}")]
    UnknownUnit(String),

    #[error("maximum call depth {0} exceeded")]
    DepthExceeded(usize),

    #[error("malformed storage at {address}: {message}")]
    Storage { address: String, message: String },
}

impl MachineError {
    pub fn storage(address: impl Into<String>, message: impl Into<String>) -> Self {
        MachineError::Storage {
            address: address.into(),
            message: message.into(),
        }
    }
}
