// crates/mirrordb-core/src/sql/mod.rs
// ============================================================================
// Module: SQL Front End
// Description: Lexer, parser, AST, traversal, and script splitting.
// Purpose: Provide the typed syntax layer used by statement classification.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The SQL front end covers the SQLite statement shapes that mirrordb
//! classifies. It is intentionally narrow: anything it cannot parse is a
//! [`ParseError`], which aborts the whole script before execution.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod split;
pub mod visit;

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ast::SqlStatement;
pub use parser::Parser;
pub use parser::parse_statement;
pub use split::RawStatement;
pub use split::split_script;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Malformed or unsupported SQL.
///
/// # Invariants
/// - `offset` is a byte offset into the text that was being parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at byte {offset}: {message}")]
pub struct ParseError {
    /// Human-readable failure description.
    pub message: String,
    /// Byte offset of the offending token.
    pub offset: usize,
}

impl ParseError {
    /// Creates a parse error at the given byte offset.
    #[must_use]
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    /// Returns the same error shifted by `base` bytes.
    #[must_use]
    pub fn offset_by(mut self, base: usize) -> Self {
        self.offset += base;
        self
    }
}
