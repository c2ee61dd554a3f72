//! Compiler error types.
//!
//! One enum covers the whole pipeline so every stage can propagate with `?`.
//! The first error aborts the compilation; no recovery is attempted.

use crate::ast::Location;

/// Error raised by any stage of the compilation pipeline.
#[derive(Debug)]
pub enum CompileError {
    /// Unrecognized character in the source text.
    Lex { location: Location, message: String },
    /// Unexpected token, missing semicolon, duplicate parameter, ...
    Parse { location: Location, message: String },
    /// Undefined name, type mismatch, bad assignment target, ...
    Type { location: Location, message: String },
    /// `break`/`continue` outside a loop, or an internal invariant violation.
    Compile { location: Location, message: String },
    /// `as`/`ld`/`cc` failed or could not be run.
    Toolchain(String),
    /// Filesystem error while driving the toolchain.
    Io(std::io::Error),
}

impl CompileError {
    pub fn lex(location: Location, message: impl Into<String>) -> Self {
        CompileError::Lex {
            location,
            message: message.into(),
        }
    }

    pub fn parse(location: Location, message: impl Into<String>) -> Self {
        CompileError::Parse {
            location,
            message: message.into(),
        }
    }

    pub fn type_error(location: Location, message: impl Into<String>) -> Self {
        CompileError::Type {
            location,
            message: message.into(),
        }
    }

    pub fn compile(location: Location, message: impl Into<String>) -> Self {
        CompileError::Compile {
            location,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lex { location, message } => {
                write!(f, "{}: lex error: {}", location, message)
            }
            CompileError::Parse { location, message } => {
                write!(f, "{}: parse error: {}", location, message)
            }
            CompileError::Type { location, message } => {
                write!(f, "{}: type error: {}", location, message)
            }
            CompileError::Compile { location, message } => {
                write!(f, "{}: compile error: {}", location, message)
            }
            CompileError::Toolchain(message) => write!(f, "toolchain error: {}", message),
            CompileError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e)
    }
}
