// crates/mirrordb-core/src/sql/split.rs
// ============================================================================
// Module: Script Splitter
// Description: Split a multi-statement script at top-level semicolons.
// Purpose: Produce statement slices with their placeholder counts.
// Dependencies: crate::sql::lexer
// ============================================================================

//! ## Overview
//! Splitting runs on lexer tokens, so semicolons inside string literals,
//! quoted identifiers, and comments never split. `CREATE TRIGGER` bodies are
//! tracked by `BEGIN`/`CASE` ... `END` depth so their inner statements stay
//! attached to the trigger. Fragments holding only whitespace or comments
//! are dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::sql::ParseError;
use crate::sql::lexer::Keyword;
use crate::sql::lexer::Lexer;
use crate::sql::lexer::Spanned;
use crate::sql::lexer::Symbol;
use crate::sql::lexer::Token;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One statement slice of a script.
///
/// # Invariants
/// - `text` is trimmed and includes the terminating `;` when one was present.
/// - `start`/`end` index the original script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// Statement text.
    pub text: String,
    /// Start byte offset within the script.
    pub start: usize,
    /// End byte offset within the script (exclusive).
    pub end: usize,
    /// Number of `?` placeholders in the statement.
    pub placeholders: usize,
}

// ============================================================================
// SECTION: Splitting
// ============================================================================

/// Splits `script` into statements at top-level semicolons.
///
/// # Errors
///
/// Returns [`ParseError`] when the script cannot be tokenized.
pub fn split_script(script: &str) -> Result<Vec<RawStatement>, ParseError> {
    let tokens = Lexer::new(script).tokenize()?;
    let mut statements = Vec::new();
    let mut current: Vec<&Spanned> = Vec::new();
    let mut depth = 0usize;
    for spanned in &tokens {
        let is_terminator = spanned.token.is_symbol(Symbol::Semicolon);
        if is_terminator && depth == 0 {
            if let Some(first) = current.first() {
                statements.push(build(script, &current, first.start, spanned.end));
            }
            current.clear();
            continue;
        }
        if is_trigger_header(&current) {
            match spanned.token.keyword() {
                Some(Keyword::Begin | Keyword::Case) => depth += 1,
                Some(Keyword::End) => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        current.push(spanned);
    }
    if let (Some(first), Some(last)) = (current.first(), current.last()) {
        statements.push(build(script, &current, first.start, last.end));
    }
    Ok(statements)
}

/// Returns true when the pending tokens open a `CREATE [TEMP] TRIGGER`.
fn is_trigger_header(tokens: &[&Spanned]) -> bool {
    let mut keywords = tokens.iter().map(|s| s.token.keyword());
    if keywords.next() != Some(Some(Keyword::Create)) {
        return false;
    }
    match keywords.next() {
        Some(Some(Keyword::Trigger)) => true,
        Some(Some(Keyword::Temp | Keyword::Temporary)) => {
            keywords.next() == Some(Some(Keyword::Trigger))
        }
        _ => false,
    }
}

/// Builds a statement slice from its tokens and byte range.
fn build(script: &str, tokens: &[&Spanned], start: usize, end: usize) -> RawStatement {
    let placeholders = tokens.iter().filter(|s| s.token == Token::Placeholder).count();
    RawStatement {
        text: script[start .. end].trim().to_string(),
        start,
        end,
        placeholders,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn splits_on_top_level_semicolons_only() {
        let parts = split_script("INSERT INTO t VALUES ('a;b'); SELECT \"x;y\" FROM t").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text, "INSERT INTO t VALUES ('a;b');");
        assert_eq!(parts[1].text, "SELECT \"x;y\" FROM t");
    }

    #[test]
    fn drops_comment_only_fragments() {
        let parts = split_script("-- leading\n;SELECT 1; /* trailing */ ;").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text, "SELECT 1;");
    }

    #[test]
    fn keeps_trigger_bodies_whole() {
        let script = "CREATE TRIGGER tr AFTER INSERT ON t BEGIN \
                      UPDATE c SET n = CASE WHEN n IS NULL THEN 1 ELSE n + 1 END; \
                      DELETE FROM d; END; SELECT 1;";
        let parts = split_script(script).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].text.ends_with("END;"));
        assert_eq!(parts[1].text, "SELECT 1;");
    }

    #[test]
    fn counts_placeholders_per_statement() {
        let parts = split_script("INSERT INTO t VALUES (?, ?); SELECT '?' , ?;").unwrap();
        assert_eq!(parts[0].placeholders, 2);
        assert_eq!(parts[1].placeholders, 1);
    }
}
