//! Shared error-formatting helpers.
//!
//! The pack carries no `thiserror`/`anyhow` dependency anywhere, so errors
//! here are plain enums/structs with a hand-written `core::fmt::Display`
//! impl, the way the host kernel does it for `StorageError`, `HttpsError`,
//! and friends.

use core::fmt;

/// A source-line-anchored error, shared shape for assembler diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line: usize,
    pub message: alloc::string::String,
}

impl LineError {
    pub fn new(line: usize, message: impl Into<alloc::string::String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}
