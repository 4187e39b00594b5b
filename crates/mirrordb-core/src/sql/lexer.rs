// crates/mirrordb-core/src/sql/lexer.rs
// ============================================================================
// Module: SQL Lexer
// Description: Tokenizer for the SQLite statement shapes mirrordb accepts.
// Purpose: Turn statement text into spanned tokens for the parser and splitter.
// Dependencies: crate::sql::ParseError
// ============================================================================

//! ## Overview
//! The lexer converts SQL text into [`Spanned`] tokens. Comments and
//! whitespace are skipped; every token records its byte range so callers can
//! slice the original text back out. Bare words carry an optional
//! [`Keyword`] so the parser can accept non-reserved keywords as identifiers.
//!
//! Only anonymous `?` placeholders are accepted. Numbered and named
//! placeholders are rejected because parameters are matched positionally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::sql::ParseError;

// ============================================================================
// SECTION: Keywords
// ============================================================================

/// Declares the keyword table together with its spelling lookup.
macro_rules! keywords {
    ($($variant:ident => $text:literal),+ $(,)?) => {
        /// SQL keywords recognized by the parser.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $(
                #[doc = concat!("`", $text, "`")]
                $variant,
            )+
        }

        impl Keyword {
            /// Looks up a keyword from an upper-cased word.
            #[must_use]
            pub fn from_upper(word: &str) -> Option<Self> {
                match word {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Returns the canonical spelling.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }
    };
}

keywords! {
    Abort => "ABORT",
    Add => "ADD",
    After => "AFTER",
    All => "ALL",
    Alter => "ALTER",
    Always => "ALWAYS",
    Analyze => "ANALYZE",
    And => "AND",
    As => "AS",
    Asc => "ASC",
    AutoIncrementMysql => "AUTO_INCREMENT",
    Autoincrement => "AUTOINCREMENT",
    Before => "BEFORE",
    Begin => "BEGIN",
    Between => "BETWEEN",
    By => "BY",
    Case => "CASE",
    Cast => "CAST",
    Check => "CHECK",
    Collate => "COLLATE",
    Column => "COLUMN",
    Commit => "COMMIT",
    Conflict => "CONFLICT",
    Constraint => "CONSTRAINT",
    Create => "CREATE",
    Cross => "CROSS",
    Default => "DEFAULT",
    Deferrable => "DEFERRABLE",
    Deferred => "DEFERRED",
    Delete => "DELETE",
    Desc => "DESC",
    Distinct => "DISTINCT",
    Do => "DO",
    Drop => "DROP",
    Each => "EACH",
    Else => "ELSE",
    End => "END",
    Escape => "ESCAPE",
    Except => "EXCEPT",
    Exclusive => "EXCLUSIVE",
    Exists => "EXISTS",
    Explain => "EXPLAIN",
    Fail => "FAIL",
    Filter => "FILTER",
    First => "FIRST",
    For => "FOR",
    Foreign => "FOREIGN",
    From => "FROM",
    Full => "FULL",
    Generated => "GENERATED",
    Glob => "GLOB",
    Group => "GROUP",
    Having => "HAVING",
    If => "IF",
    Ignore => "IGNORE",
    Immediate => "IMMEDIATE",
    In => "IN",
    Index => "INDEX",
    Indexed => "INDEXED",
    Inner => "INNER",
    Insert => "INSERT",
    Instead => "INSTEAD",
    Intersect => "INTERSECT",
    Into => "INTO",
    Is => "IS",
    Isnull => "ISNULL",
    Join => "JOIN",
    Key => "KEY",
    Last => "LAST",
    Left => "LEFT",
    Like => "LIKE",
    Limit => "LIMIT",
    Match => "MATCH",
    Materialized => "MATERIALIZED",
    Natural => "NATURAL",
    Not => "NOT",
    Nothing => "NOTHING",
    Notnull => "NOTNULL",
    Null => "NULL",
    Nulls => "NULLS",
    Of => "OF",
    Offset => "OFFSET",
    On => "ON",
    Or => "OR",
    Order => "ORDER",
    Outer => "OUTER",
    Over => "OVER",
    Partition => "PARTITION",
    Pragma => "PRAGMA",
    Primary => "PRIMARY",
    Raise => "RAISE",
    Recursive => "RECURSIVE",
    References => "REFERENCES",
    Regexp => "REGEXP",
    Reindex => "REINDEX",
    Release => "RELEASE",
    Rename => "RENAME",
    Replace => "REPLACE",
    Returning => "RETURNING",
    Right => "RIGHT",
    Rollback => "ROLLBACK",
    Row => "ROW",
    Savepoint => "SAVEPOINT",
    Select => "SELECT",
    Set => "SET",
    Start => "START",
    Stored => "STORED",
    Table => "TABLE",
    Temp => "TEMP",
    Temporary => "TEMPORARY",
    Then => "THEN",
    To => "TO",
    Transaction => "TRANSACTION",
    Trigger => "TRIGGER",
    Union => "UNION",
    Unique => "UNIQUE",
    Update => "UPDATE",
    Using => "USING",
    Vacuum => "VACUUM",
    Values => "VALUES",
    View => "VIEW",
    Virtual => "VIRTUAL",
    When => "WHEN",
    Where => "WHERE",
    Window => "WINDOW",
    With => "WITH",
    Without => "WITHOUT",
}

impl Keyword {
    /// Returns true when the keyword can never be used as a bare identifier
    /// or implicit alias.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(
            self,
            Self::All
                | Self::Alter
                | Self::And
                | Self::As
                | Self::Between
                | Self::By
                | Self::Case
                | Self::Cast
                | Self::Check
                | Self::Collate
                | Self::Commit
                | Self::Constraint
                | Self::Create
                | Self::Cross
                | Self::Default
                | Self::Delete
                | Self::Distinct
                | Self::Drop
                | Self::Else
                | Self::End
                | Self::Escape
                | Self::Except
                | Self::Exists
                | Self::Foreign
                | Self::From
                | Self::Full
                | Self::Glob
                | Self::Group
                | Self::Having
                | Self::In
                | Self::Index
                | Self::Inner
                | Self::Insert
                | Self::Intersect
                | Self::Into
                | Self::Is
                | Self::Isnull
                | Self::Join
                | Self::Left
                | Self::Like
                | Self::Limit
                | Self::Match
                | Self::Natural
                | Self::Not
                | Self::Notnull
                | Self::Null
                | Self::Offset
                | Self::On
                | Self::Or
                | Self::Order
                | Self::Outer
                | Self::Primary
                | Self::References
                | Self::Regexp
                | Self::Returning
                | Self::Right
                | Self::Select
                | Self::Set
                | Self::Table
                | Self::Then
                | Self::To
                | Self::Union
                | Self::Unique
                | Self::Update
                | Self::Using
                | Self::Values
                | Self::When
                | Self::Where
                | Self::Window
                | Self::With
        )
    }
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// Punctuation and operator symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `*`
    Star,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=` or `==`
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `||`
    Concat,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `~`
    Tilde,
    /// `->`
    Arrow,
    /// `->>`
    LongArrow,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Dot => ".",
            Self::Star => "*",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Concat => "||",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Tilde => "~",
            Self::Arrow => "->",
            Self::LongArrow => "->>",
        };
        f.write_str(text)
    }
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare word, with its keyword classification when it spells one.
    Word {
        /// Word text as written.
        text: String,
        /// Keyword match, if any.
        keyword: Option<Keyword>,
    },
    /// Identifier quoted with `"`, `` ` `` or `[]` (quotes removed).
    QuotedIdent(String),
    /// Single-quoted string literal (quotes removed, escapes resolved).
    String(String),
    /// Blob literal `X'..'` (hex digits only).
    Blob(String),
    /// Numeric literal as written.
    Number(String),
    /// Anonymous `?` placeholder.
    Placeholder,
    /// Punctuation or operator.
    Symbol(Symbol),
}

impl Token {
    /// Returns the keyword carried by a bare word.
    #[must_use]
    pub const fn keyword(&self) -> Option<Keyword> {
        match self {
            Self::Word {
                keyword, ..
            } => *keyword,
            _ => None,
        }
    }

    /// Returns true when the token is the given keyword.
    #[must_use]
    pub fn is_keyword(&self, expected: Keyword) -> bool {
        self.keyword() == Some(expected)
    }

    /// Returns true when the token is the given symbol.
    #[must_use]
    pub fn is_symbol(&self, expected: Symbol) -> bool {
        matches!(self, Self::Symbol(symbol) if *symbol == expected)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word {
                text, ..
            } => f.write_str(text),
            Self::QuotedIdent(text) => write!(f, "\"{text}\""),
            Self::String(text) => write!(f, "'{text}'"),
            Self::Blob(text) => write!(f, "X'{text}'"),
            Self::Number(text) => f.write_str(text),
            Self::Placeholder => f.write_str("?"),
            Self::Symbol(symbol) => symbol.fmt(f),
        }
    }
}

/// A token with its byte range in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// Token value.
    pub token: Token,
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Tokenizer over one SQL text.
pub struct Lexer<'a> {
    /// Source text.
    source: &'a str,
    /// Current byte offset.
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over the provided text.
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    /// Tokenizes the full input.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] on unterminated literals, comments, or
    /// unsupported characters.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(spanned) = self.next_token()? {
            tokens.push(spanned);
        }
        Ok(tokens)
    }

    /// Returns the character at the cursor.
    fn peek(&self) -> Option<char> {
        self.source[self.position ..].chars().next()
    }

    /// Returns the character `n` characters past the cursor.
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.position ..].chars().nth(n)
    }

    /// Advances past the current character.
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    /// Skips whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_nth(1)) {
                (Some(ch), _) if ch.is_whitespace() => {
                    self.bump();
                }
                (Some('-'), Some('-')) => {
                    while let Some(ch) = self.bump() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.position;
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(ParseError::new("unterminated block comment", start));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Produces the next token, or `None` at end of input.
    fn next_token(&mut self) -> Result<Option<Spanned>, ParseError> {
        self.skip_trivia()?;
        let start = self.position;
        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        let token = match ch {
            '\'' => Token::String(self.quoted('\'')?),
            '"' => Token::QuotedIdent(self.quoted('"')?),
            '`' => Token::QuotedIdent(self.quoted('`')?),
            '[' => Token::QuotedIdent(self.bracketed()?),
            'x' | 'X' if self.peek_nth(1) == Some('\'') => {
                self.bump();
                let hex = self.quoted('\'')?;
                if hex.len() % 2 != 0 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ParseError::new("malformed blob literal", start));
                }
                Token::Blob(hex)
            }
            '0' ..= '9' => Token::Number(self.number()?),
            '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                Token::Number(self.number()?)
            }
            '?' => {
                self.bump();
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(ParseError::new(
                        "numbered placeholders are not supported; use '?'",
                        start,
                    ));
                }
                Token::Placeholder
            }
            ':' | '@' | '$' => {
                return Err(ParseError::new(
                    format!("named placeholder '{ch}' is not supported; use '?'"),
                    start,
                ));
            }
            c if c.is_alphabetic() || c == '_' || !c.is_ascii() => self.word(),
            _ => Token::Symbol(self.symbol()?),
        };
        Ok(Some(Spanned {
            token,
            start,
            end: self.position,
        }))
    }

    /// Reads a quoted literal whose quote is escaped by doubling.
    fn quoted(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.position;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(ch) if ch == quote => {
                    if self.peek() == Some(quote) {
                        self.bump();
                        value.push(quote);
                    } else {
                        return Ok(value);
                    }
                }
                Some(ch) => value.push(ch),
                None => return Err(ParseError::new("unterminated quoted literal", start)),
            }
        }
    }

    /// Reads a `[bracketed]` identifier.
    fn bracketed(&mut self) -> Result<String, ParseError> {
        let start = self.position;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(']') => return Ok(value),
                Some(ch) => value.push(ch),
                None => return Err(ParseError::new("unterminated bracketed identifier", start)),
            }
        }
    }

    /// Reads a numeric literal (decimal, real, exponent, or hex).
    fn number(&mut self) -> Result<String, ParseError> {
        let start = self.position;
        if self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            if self.position - start == 2 {
                return Err(ParseError::new("malformed hex literal", start));
            }
            return Ok(self.source[start .. self.position].to_string());
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        if self.peek() == Some('.') {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let digits_at = match self.peek_nth(1) {
                Some('+' | '-') => 2,
                _ => 1,
            };
            if self.peek_nth(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0 .. digits_at {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(ParseError::new("malformed numeric literal", start));
        }
        Ok(self.source[start .. self.position].to_string())
    }

    /// Reads a bare word and classifies it as keyword or identifier.
    fn word(&mut self) -> Token {
        let start = self.position;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || !c.is_ascii())
        {
            self.bump();
        }
        let text = self.source[start .. self.position].to_string();
        let keyword = Keyword::from_upper(&text.to_ascii_uppercase());
        Token::Word {
            text,
            keyword,
        }
    }

    /// Reads an operator or punctuation symbol.
    fn symbol(&mut self) -> Result<Symbol, ParseError> {
        let start = self.position;
        let ch = self.bump().ok_or_else(|| ParseError::new("unexpected end of input", start))?;
        let next = self.peek();
        let (symbol, extra) = match (ch, next) {
            ('(', _) => (Symbol::LParen, 0),
            (')', _) => (Symbol::RParen, 0),
            (',', _) => (Symbol::Comma, 0),
            (';', _) => (Symbol::Semicolon, 0),
            ('.', _) => (Symbol::Dot, 0),
            ('*', _) => (Symbol::Star, 0),
            ('+', _) => (Symbol::Plus, 0),
            ('-', Some('>')) => {
                if self.peek_nth(1) == Some('>') {
                    (Symbol::LongArrow, 2)
                } else {
                    (Symbol::Arrow, 1)
                }
            }
            ('-', _) => (Symbol::Minus, 0),
            ('/', _) => (Symbol::Slash, 0),
            ('%', _) => (Symbol::Percent, 0),
            ('=', Some('=')) => (Symbol::Eq, 1),
            ('=', _) => (Symbol::Eq, 0),
            ('!', Some('=')) => (Symbol::NotEq, 1),
            ('<', Some('>')) => (Symbol::NotEq, 1),
            ('<', Some('=')) => (Symbol::LtEq, 1),
            ('<', Some('<')) => (Symbol::ShiftLeft, 1),
            ('<', _) => (Symbol::Lt, 0),
            ('>', Some('=')) => (Symbol::GtEq, 1),
            ('>', Some('>')) => (Symbol::ShiftRight, 1),
            ('>', _) => (Symbol::Gt, 0),
            ('|', Some('|')) => (Symbol::Concat, 1),
            ('|', _) => (Symbol::BitOr, 0),
            ('&', _) => (Symbol::BitAnd, 0),
            ('~', _) => (Symbol::Tilde, 0),
            (other, _) => {
                return Err(ParseError::new(format!("unexpected character '{other}'"), start));
            }
        };
        for _ in 0 .. extra {
            self.bump();
        }
        Ok(symbol)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        Lexer::new(text).tokenize().unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn skips_comments_and_keeps_spans() {
        let text = "-- lead\nSELECT /* inline */ a FROM t;";
        let spanned = Lexer::new(text).tokenize().unwrap();
        assert_eq!(spanned.len(), 5);
        assert_eq!(&text[spanned[0].start .. spanned[0].end], "SELECT");
        assert!(spanned[4].token.is_symbol(Symbol::Semicolon));
    }

    #[test]
    fn resolves_quote_escapes() {
        assert_eq!(
            tokens("'it''s' \"a\"\"b\" [c d] `e`"),
            vec![
                Token::String("it's".to_string()),
                Token::QuotedIdent("a\"b".to_string()),
                Token::QuotedIdent("c d".to_string()),
                Token::QuotedIdent("e".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_named_placeholders() {
        assert!(Lexer::new("SELECT :name").tokenize().is_err());
        assert!(Lexer::new("SELECT ?1").tokenize().is_err());
        assert_eq!(tokens("?"), vec![Token::Placeholder]);
    }

    #[test]
    fn lexes_compound_operators() {
        assert_eq!(
            tokens("a->>'$.x' <> b || c"),
            vec![
                Token::Word {
                    text: "a".to_string(),
                    keyword: None
                },
                Token::Symbol(Symbol::LongArrow),
                Token::String("$.x".to_string()),
                Token::Symbol(Symbol::NotEq),
                Token::Word {
                    text: "b".to_string(),
                    keyword: None
                },
                Token::Symbol(Symbol::Concat),
                Token::Word {
                    text: "c".to_string(),
                    keyword: None
                },
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Lexer::new("SELECT 'abc").tokenize().is_err());
    }
}
