// crates/mirrordb-core/src/sql/parser.rs
// ============================================================================
// Module: SQL Parser
// Description: Recursive-descent parser producing the mirrordb AST.
// Purpose: Parse one SQLite statement into a typed tree for classification.
// Dependencies: crate::sql::{ast, lexer}
// ============================================================================

//! ## Overview
//! A hand-written recursive-descent parser over [`Lexer`] tokens. Statements
//! dispatch on their leading keyword; expressions use precedence climbing in
//! the order SQLite documents (`OR`, `AND`, `NOT`, equality, comparison,
//! bitwise, additive, multiplicative, concatenation, unary, `COLLATE`).
//!
//! The parser counts `?` placeholders as it meets them so each
//! [`Expr::Placeholder`] records its ordinal within the statement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::sql::ParseError;
use crate::sql::ast::AlterAction;
use crate::sql::ast::AlterTable;
use crate::sql::ast::Assignment;
use crate::sql::ast::BinaryOperator;
use crate::sql::ast::ColumnConstraint;
use crate::sql::ast::ColumnDef;
use crate::sql::ast::ConflictAction;
use crate::sql::ast::CreateTable;
use crate::sql::ast::CreateTableBody;
use crate::sql::ast::Cte;
use crate::sql::ast::Delete;
use crate::sql::ast::DropTable;
use crate::sql::ast::Expr;
use crate::sql::ast::ForeignKey;
use crate::sql::ast::FunctionArgs;
use crate::sql::ast::Insert;
use crate::sql::ast::InsertSource;
use crate::sql::ast::Join;
use crate::sql::ast::JoinConstraint;
use crate::sql::ast::JoinKind;
use crate::sql::ast::Limit;
use crate::sql::ast::Literal;
use crate::sql::ast::ObjectKind;
use crate::sql::ast::ObjectName;
use crate::sql::ast::OrderByExpr;
use crate::sql::ast::OtherStatement;
use crate::sql::ast::PatternOperator;
use crate::sql::ast::Query;
use crate::sql::ast::Select;
use crate::sql::ast::SelectItem;
use crate::sql::ast::SetExpr;
use crate::sql::ast::SetOperator;
use crate::sql::ast::SqlStatement;
use crate::sql::ast::TableConstraint;
use crate::sql::ast::TableFactor;
use crate::sql::ast::TableWithJoins;
use crate::sql::ast::TransactionMode;
use crate::sql::ast::UnaryOperator;
use crate::sql::ast::Update;
use crate::sql::ast::Upsert;
use crate::sql::ast::UpsertAction;
use crate::sql::ast::WindowSpec;
use crate::sql::ast::With;
use crate::sql::lexer::Keyword;
use crate::sql::lexer::Lexer;
use crate::sql::lexer::Spanned;
use crate::sql::lexer::Symbol;
use crate::sql::lexer::Token;

// ============================================================================
// SECTION: Entry Points
// ============================================================================

/// Parses exactly one statement, allowing trailing semicolons.
///
/// # Errors
///
/// Returns [`ParseError`] when the text is empty, malformed, contains more
/// than one statement, or uses an unsupported shape.
pub fn parse_statement(text: &str) -> Result<SqlStatement, ParseError> {
    let mut parser = Parser::new(text)?;
    let statement = parser.parse_statement()?;
    while parser.eat_symbol(Symbol::Semicolon) {}
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input after statement"));
    }
    Ok(statement)
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser over one statement's tokens.
pub struct Parser<'a> {
    /// Source text, used to slice type names and frame clauses.
    source: &'a str,
    /// Token stream.
    tokens: Vec<Spanned>,
    /// Index of the next token.
    position: usize,
    /// Placeholders seen so far.
    placeholders: usize,
}

impl<'a> Parser<'a> {
    /// Tokenizes `source` and prepares a parser over it.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when tokenization fails.
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            source,
            tokens,
            position: 0,
            placeholders: 0,
        })
    }

    /// Number of `?` placeholders consumed so far.
    #[must_use]
    pub const fn placeholder_count(&self) -> usize {
        self.placeholders
    }

    // ------------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------------

    /// Returns true once every token is consumed.
    fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Peeks the next token.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|s| &s.token)
    }

    /// Peeks the token `n` places ahead.
    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n).map(|s| &s.token)
    }

    /// Consumes and returns the next token.
    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Byte offset of the next token, or end of input.
    fn offset(&self) -> usize {
        self.tokens.get(self.position).map_or(self.source.len(), |s| s.start)
    }

    /// Builds an error at the current token.
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.offset())
    }

    /// Builds an "expected X" error describing the current token.
    fn expected(&self, what: &str) -> ParseError {
        match self.peek() {
            Some(token) => self.error(format!("expected {what}, found '{token}'")),
            None => self.error(format!("expected {what}, found end of input")),
        }
    }

    /// Returns true when the next token is `keyword`.
    fn peek_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    /// Returns true when the token `n` places ahead is `keyword`.
    fn peek_nth_keyword(&self, n: usize, keyword: Keyword) -> bool {
        self.peek_nth(n).is_some_and(|t| t.is_keyword(keyword))
    }

    /// Consumes `keyword` when present.
    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consumes `keyword` or fails.
    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.expected(keyword.as_str()))
        }
    }

    /// Returns true when the next token is `symbol`.
    fn peek_symbol(&self, symbol: Symbol) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(symbol))
    }

    /// Consumes `symbol` when present.
    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        if self.peek_symbol(symbol) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consumes `symbol` or fails.
    fn expect_symbol(&mut self, symbol: Symbol) -> Result<(), ParseError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{symbol}'")))
        }
    }

    /// Consumes a bare word equal to `word` (case-insensitive) when present.
    fn eat_word(&mut self, word: &str) -> bool {
        let matched = matches!(
            self.peek(),
            Some(Token::Word { text, .. }) if text.eq_ignore_ascii_case(word)
        );
        if matched {
            self.position += 1;
        }
        matched
    }

    /// Returns true when the next token can start a query.
    fn peek_query_start(&self) -> bool {
        self.peek_keyword(Keyword::Select)
            || self.peek_keyword(Keyword::Values)
            || self.peek_keyword(Keyword::With)
    }

    /// Returns true when the token `n` ahead can be read as an identifier.
    fn is_identifier_at(&self, n: usize) -> bool {
        match self.peek_nth(n) {
            Some(Token::Word {
                keyword, ..
            }) => keyword.is_none_or(|k| !k.is_reserved()),
            Some(Token::QuotedIdent(_) | Token::String(_)) => true,
            _ => false,
        }
    }

    /// Parses an identifier (bare, quoted, or string-quoted).
    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        if !self.is_identifier_at(0) {
            return Err(self.expected("identifier"));
        }
        match self.advance().map(|s| s.token) {
            Some(
                Token::Word {
                    text, ..
                }
                | Token::QuotedIdent(text)
                | Token::String(text),
            ) => Ok(text),
            _ => Err(self.expected("identifier")),
        }
    }

    /// Parses `name` or `schema.name`.
    fn parse_object_name(&mut self) -> Result<ObjectName, ParseError> {
        let first = self.parse_identifier()?;
        if self.eat_symbol(Symbol::Dot) {
            let name = self.parse_identifier()?;
            return Ok(ObjectName {
                schema: Some(first),
                name,
            });
        }
        Ok(ObjectName::bare(first))
    }

    /// Parses `(ident, ident, ...)`.
    fn parse_parenthesized_identifiers(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect_symbol(Symbol::LParen)?;
        let mut names = vec![self.parse_identifier()?];
        while self.eat_symbol(Symbol::Comma) {
            names.push(self.parse_identifier()?);
        }
        self.expect_symbol(Symbol::RParen)?;
        Ok(names)
    }

    /// Parses an optional `[AS] alias`.
    fn parse_optional_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat_keyword(Keyword::As) {
            return self.parse_identifier().map(Some);
        }
        if self.is_identifier_at(0) && !matches!(self.peek(), Some(Token::String(_))) {
            return self.parse_identifier().map(Some);
        }
        Ok(None)
    }

    /// Skips `INDEXED BY name` / `NOT INDEXED`.
    fn skip_index_hint(&mut self) -> Result<(), ParseError> {
        if self.eat_keyword(Keyword::Indexed) {
            self.expect_keyword(Keyword::By)?;
            self.parse_identifier()?;
        } else if self.peek_keyword(Keyword::Not) && self.peek_nth_keyword(1, Keyword::Indexed) {
            self.position += 2;
        }
        Ok(())
    }

    /// Parses `IF NOT EXISTS` when present.
    fn parse_if_not_exists(&mut self) -> Result<bool, ParseError> {
        if self.eat_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Parses `IF EXISTS` when present.
    fn parse_if_exists(&mut self) -> Result<bool, ParseError> {
        if self.eat_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Exists)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Parses a conflict action keyword.
    fn parse_conflict_action(&mut self) -> Result<ConflictAction, ParseError> {
        let action = match self.peek().and_then(Token::keyword) {
            Some(Keyword::Rollback) => ConflictAction::Rollback,
            Some(Keyword::Abort) => ConflictAction::Abort,
            Some(Keyword::Fail) => ConflictAction::Fail,
            Some(Keyword::Ignore) => ConflictAction::Ignore,
            Some(Keyword::Replace) => ConflictAction::Replace,
            _ => return Err(self.expected("conflict action")),
        };
        self.position += 1;
        Ok(action)
    }

    /// Skips an optional `ON CONFLICT action` clause in constraints.
    fn skip_conflict_clause(&mut self) -> Result<(), ParseError> {
        if self.peek_keyword(Keyword::On) && self.peek_nth_keyword(1, Keyword::Conflict) {
            self.position += 2;
            self.parse_conflict_action()?;
        }
        Ok(())
    }

    /// Consumes tokens up to (and including) the `)` closing the current
    /// parenthesis level, returning the byte range of the skipped contents.
    fn skip_balanced(&mut self) -> Result<(usize, usize), ParseError> {
        let start = self.offset();
        let mut depth = 0usize;
        loop {
            let Some(spanned) = self.advance() else {
                return Err(self.error("unbalanced parentheses"));
            };
            match spanned.token {
                Token::Symbol(Symbol::LParen) => depth += 1,
                Token::Symbol(Symbol::RParen) if depth == 0 => return Ok((start, spanned.start)),
                Token::Symbol(Symbol::RParen) => depth -= 1,
                _ => {}
            }
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    /// Parses one statement without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for malformed or unsupported statements.
    pub fn parse_statement(&mut self) -> Result<SqlStatement, ParseError> {
        let Some(keyword) = self.peek().and_then(Token::keyword) else {
            return Err(self.expected("statement"));
        };
        match keyword {
            Keyword::Begin => self.parse_begin(),
            Keyword::Start => {
                self.position += 1;
                self.expect_keyword(Keyword::Transaction)?;
                Ok(SqlStatement::Begin(TransactionMode::Deferred))
            }
            Keyword::Commit | Keyword::End => {
                self.position += 1;
                self.eat_keyword(Keyword::Transaction);
                Ok(SqlStatement::Commit)
            }
            Keyword::Rollback => self.parse_rollback(),
            Keyword::Create => self.parse_create(),
            Keyword::Alter => self.parse_alter().map(SqlStatement::AlterTable),
            Keyword::Drop => self.parse_drop(),
            Keyword::With => self.parse_with_statement(),
            Keyword::Insert | Keyword::Replace => {
                self.parse_insert(None).map(|insert| SqlStatement::Insert(Box::new(insert)))
            }
            Keyword::Update => {
                self.parse_update(None).map(|update| SqlStatement::Update(Box::new(update)))
            }
            Keyword::Delete => {
                self.parse_delete(None).map(|delete| SqlStatement::Delete(Box::new(delete)))
            }
            Keyword::Select | Keyword::Values => {
                self.parse_query().map(|query| SqlStatement::Query(Box::new(query)))
            }
            Keyword::Pragma => self.parse_pragma(),
            Keyword::Vacuum => {
                self.position += 1;
                if self.is_identifier_at(0) {
                    self.parse_identifier()?;
                }
                if self.eat_keyword(Keyword::Into) {
                    self.parse_expr()?;
                }
                Ok(other(OtherStatement::Vacuum))
            }
            Keyword::Analyze => {
                self.position += 1;
                let target =
                    if self.is_identifier_at(0) { Some(self.parse_object_name()?) } else { None };
                Ok(other(OtherStatement::Analyze(target)))
            }
            Keyword::Reindex => {
                self.position += 1;
                let target =
                    if self.is_identifier_at(0) { Some(self.parse_object_name()?) } else { None };
                Ok(other(OtherStatement::Reindex(target)))
            }
            Keyword::Savepoint => {
                self.position += 1;
                Ok(other(OtherStatement::Savepoint(self.parse_identifier()?)))
            }
            Keyword::Release => {
                self.position += 1;
                self.eat_keyword(Keyword::Savepoint);
                Ok(other(OtherStatement::Release(self.parse_identifier()?)))
            }
            _ => Err(self.error(format!("unsupported statement '{}'", keyword.as_str()))),
        }
    }

    /// Parses `BEGIN [DEFERRED|IMMEDIATE|EXCLUSIVE] [TRANSACTION [name]]`.
    fn parse_begin(&mut self) -> Result<SqlStatement, ParseError> {
        self.expect_keyword(Keyword::Begin)?;
        let mode = if self.eat_keyword(Keyword::Immediate) {
            TransactionMode::Immediate
        } else if self.eat_keyword(Keyword::Exclusive) {
            TransactionMode::Exclusive
        } else {
            self.eat_keyword(Keyword::Deferred);
            TransactionMode::Deferred
        };
        if self.eat_keyword(Keyword::Transaction) && self.is_identifier_at(0) {
            self.parse_identifier()?;
        }
        Ok(SqlStatement::Begin(mode))
    }

    /// Parses `ROLLBACK [TRANSACTION] [TO [SAVEPOINT] name]`.
    fn parse_rollback(&mut self) -> Result<SqlStatement, ParseError> {
        self.expect_keyword(Keyword::Rollback)?;
        self.eat_keyword(Keyword::Transaction);
        if self.eat_keyword(Keyword::To) {
            self.eat_keyword(Keyword::Savepoint);
            return Ok(other(OtherStatement::RollbackTo(self.parse_identifier()?)));
        }
        Ok(SqlStatement::Rollback)
    }

    /// Parses the statement following a leading `WITH` clause.
    fn parse_with_statement(&mut self) -> Result<SqlStatement, ParseError> {
        let with = self.parse_with()?;
        match self.peek().and_then(Token::keyword) {
            Some(Keyword::Insert | Keyword::Replace) => {
                self.parse_insert(Some(with)).map(|insert| SqlStatement::Insert(Box::new(insert)))
            }
            Some(Keyword::Update) => {
                self.parse_update(Some(with)).map(|update| SqlStatement::Update(Box::new(update)))
            }
            Some(Keyword::Delete) => {
                self.parse_delete(Some(with)).map(|delete| SqlStatement::Delete(Box::new(delete)))
            }
            Some(Keyword::Select | Keyword::Values) => {
                let mut query = self.parse_query_body()?;
                query.with = Some(with);
                Ok(SqlStatement::Query(Box::new(query)))
            }
            _ => Err(self.expected("SELECT, INSERT, UPDATE or DELETE after WITH")),
        }
    }

    /// Parses `CREATE ...`.
    fn parse_create(&mut self) -> Result<SqlStatement, ParseError> {
        self.expect_keyword(Keyword::Create)?;
        let temporary = self.eat_keyword(Keyword::Temp) || self.eat_keyword(Keyword::Temporary);
        if self.eat_keyword(Keyword::Table) {
            return self.parse_create_table(temporary).map(SqlStatement::CreateTable);
        }
        if self.eat_keyword(Keyword::Unique) {
            self.expect_keyword(Keyword::Index)?;
            return self.parse_create_index(true);
        }
        if self.eat_keyword(Keyword::Index) {
            return self.parse_create_index(false);
        }
        if self.eat_keyword(Keyword::View) {
            self.parse_if_not_exists()?;
            let name = self.parse_object_name()?;
            let columns = if self.peek_symbol(Symbol::LParen) {
                self.parse_parenthesized_identifiers()?
            } else {
                Vec::new()
            };
            self.expect_keyword(Keyword::As)?;
            let query = Box::new(self.parse_query()?);
            return Ok(other(OtherStatement::CreateView {
                name,
                columns,
                query,
            }));
        }
        if self.eat_keyword(Keyword::Trigger) {
            return self.parse_create_trigger();
        }
        if self.eat_keyword(Keyword::Virtual) {
            self.expect_keyword(Keyword::Table)?;
            self.parse_if_not_exists()?;
            let name = self.parse_object_name()?;
            self.expect_keyword(Keyword::Using)?;
            let module = self.parse_identifier()?;
            if self.eat_symbol(Symbol::LParen) {
                self.skip_balanced()?;
            }
            return Ok(other(OtherStatement::CreateVirtualTable {
                name,
                module,
            }));
        }
        Err(self.expected("TABLE, INDEX, VIEW or TRIGGER after CREATE"))
    }

    /// Parses the remainder of `CREATE [TEMP] TABLE`.
    fn parse_create_table(&mut self, temporary: bool) -> Result<CreateTable, ParseError> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        let temporary = temporary
            || name.schema.as_deref().is_some_and(|schema| schema.eq_ignore_ascii_case("temp"));
        if self.eat_keyword(Keyword::As) {
            let query = self.parse_query()?;
            return Ok(CreateTable {
                name,
                temporary,
                if_not_exists,
                body: CreateTableBody::AsSelect(Box::new(query)),
            });
        }
        self.expect_symbol(Symbol::LParen)?;
        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        loop {
            if self.peek_table_constraint() {
                constraints.push(self.parse_table_constraint()?);
            } else if constraints.is_empty() {
                columns.push(self.parse_column_def()?);
            } else {
                return Err(self.expected("table constraint"));
            }
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        self.expect_symbol(Symbol::RParen)?;
        if columns.is_empty() {
            return Err(self.error("table must declare at least one column"));
        }
        let mut without_rowid = false;
        let mut strict = false;
        loop {
            if self.eat_keyword(Keyword::Without) {
                if !self.eat_word("rowid") {
                    return Err(self.expected("ROWID"));
                }
                without_rowid = true;
            } else if self.eat_word("strict") {
                strict = true;
            } else {
                break;
            }
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        Ok(CreateTable {
            name,
            temporary,
            if_not_exists,
            body: CreateTableBody::Columns {
                columns,
                constraints,
                without_rowid,
                strict,
            },
        })
    }

    /// Returns true when the next tokens begin a table constraint.
    fn peek_table_constraint(&self) -> bool {
        matches!(
            self.peek().and_then(Token::keyword),
            Some(
                Keyword::Constraint
                    | Keyword::Primary
                    | Keyword::Unique
                    | Keyword::Check
                    | Keyword::Foreign
            )
        )
    }

    /// Parses one table-level constraint.
    fn parse_table_constraint(&mut self) -> Result<TableConstraint, ParseError> {
        if self.eat_keyword(Keyword::Constraint) {
            self.parse_identifier()?;
        }
        if self.eat_keyword(Keyword::Primary) {
            self.expect_keyword(Keyword::Key)?;
            let (columns, autoincrement) = self.parse_indexed_columns()?;
            self.skip_conflict_clause()?;
            return Ok(TableConstraint::PrimaryKey {
                columns,
                autoincrement,
            });
        }
        if self.eat_keyword(Keyword::Unique) {
            let (columns, _) = self.parse_indexed_columns()?;
            self.skip_conflict_clause()?;
            return Ok(TableConstraint::Unique {
                columns,
            });
        }
        if self.eat_keyword(Keyword::Check) {
            self.expect_symbol(Symbol::LParen)?;
            let expr = self.parse_expr()?;
            self.expect_symbol(Symbol::RParen)?;
            return Ok(TableConstraint::Check(expr));
        }
        if self.eat_keyword(Keyword::Foreign) {
            self.expect_keyword(Keyword::Key)?;
            let columns = self.parse_parenthesized_identifiers()?;
            self.expect_keyword(Keyword::References)?;
            let references = self.parse_foreign_key_clause()?;
            return Ok(TableConstraint::ForeignKey {
                columns,
                references,
            });
        }
        Err(self.expected("table constraint"))
    }

    /// Parses `(col [COLLATE x] [ASC|DESC] [AUTOINCREMENT], ...)`.
    fn parse_indexed_columns(&mut self) -> Result<(Vec<String>, bool), ParseError> {
        self.expect_symbol(Symbol::LParen)?;
        let mut columns = Vec::new();
        let mut autoincrement = false;
        loop {
            columns.push(self.parse_identifier()?);
            if self.eat_keyword(Keyword::Collate) {
                self.parse_identifier()?;
            }
            if !self.eat_keyword(Keyword::Asc) {
                self.eat_keyword(Keyword::Desc);
            }
            if self.eat_keyword(Keyword::Autoincrement) {
                autoincrement = true;
            }
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        self.expect_symbol(Symbol::RParen)?;
        Ok((columns, autoincrement))
    }

    /// Parses a column definition.
    fn parse_column_def(&mut self) -> Result<ColumnDef, ParseError> {
        let name = self.parse_identifier()?;
        let data_type = self.parse_type_name()?;
        let mut constraints = Vec::new();
        while let Some(constraint) = self.parse_column_constraint()? {
            constraints.push(constraint);
        }
        Ok(ColumnDef {
            name,
            data_type,
            constraints,
        })
    }

    /// Parses a declared type (`INTEGER`, `VARCHAR(20)`, `DOUBLE PRECISION`).
    fn parse_type_name(&mut self) -> Result<Option<String>, ParseError> {
        let start = self.offset();
        let mut end = start;
        while let Some(Token::Word {
            keyword, ..
        }) = self.peek()
        {
            let is_type_word = match keyword {
                None => true,
                Some(
                    Keyword::Generated | Keyword::AutoIncrementMysql | Keyword::Autoincrement,
                ) => false,
                Some(other) => !other.is_reserved(),
            };
            if !is_type_word {
                break;
            }
            end = self.tokens[self.position].end;
            self.position += 1;
        }
        if end == start {
            return Ok(None);
        }
        if self.eat_symbol(Symbol::LParen) {
            let (_, close) = self.skip_balanced()?;
            end = close + 1;
        }
        Ok(Some(self.source[start .. end].trim().to_string()))
    }

    /// Parses one column constraint, or `None` when the definition ends.
    fn parse_column_constraint(&mut self) -> Result<Option<ColumnConstraint>, ParseError> {
        if self.eat_keyword(Keyword::Constraint) {
            self.parse_identifier()?;
        }
        let Some(keyword) = self.peek().and_then(Token::keyword) else {
            return Ok(None);
        };
        let constraint = match keyword {
            Keyword::Primary => {
                self.position += 1;
                self.expect_keyword(Keyword::Key)?;
                let descending = if self.eat_keyword(Keyword::Desc) {
                    true
                } else {
                    self.eat_keyword(Keyword::Asc);
                    false
                };
                self.skip_conflict_clause()?;
                let autoincrement = self.eat_keyword(Keyword::Autoincrement)
                    || self.eat_keyword(Keyword::AutoIncrementMysql);
                ColumnConstraint::PrimaryKey {
                    descending,
                    autoincrement,
                }
            }
            Keyword::Autoincrement | Keyword::AutoIncrementMysql => {
                self.position += 1;
                ColumnConstraint::AutoIncrement
            }
            Keyword::Not => {
                self.position += 1;
                self.expect_keyword(Keyword::Null)?;
                self.skip_conflict_clause()?;
                ColumnConstraint::NotNull
            }
            Keyword::Null => {
                self.position += 1;
                self.skip_conflict_clause()?;
                ColumnConstraint::Null
            }
            Keyword::Unique => {
                self.position += 1;
                self.skip_conflict_clause()?;
                ColumnConstraint::Unique
            }
            Keyword::Check => {
                self.position += 1;
                self.expect_symbol(Symbol::LParen)?;
                let expr = self.parse_expr()?;
                self.expect_symbol(Symbol::RParen)?;
                ColumnConstraint::Check(expr)
            }
            Keyword::Default => {
                self.position += 1;
                ColumnConstraint::Default(self.parse_default_value()?)
            }
            Keyword::Collate => {
                self.position += 1;
                ColumnConstraint::Collate(self.parse_identifier()?)
            }
            Keyword::References => {
                self.position += 1;
                ColumnConstraint::References(self.parse_foreign_key_clause()?)
            }
            Keyword::Generated | Keyword::As => {
                if self.eat_keyword(Keyword::Generated) {
                    self.expect_keyword(Keyword::Always)?;
                }
                self.expect_keyword(Keyword::As)?;
                self.expect_symbol(Symbol::LParen)?;
                let expr = self.parse_expr()?;
                self.expect_symbol(Symbol::RParen)?;
                let stored = if self.eat_keyword(Keyword::Stored) {
                    true
                } else {
                    self.eat_keyword(Keyword::Virtual);
                    false
                };
                ColumnConstraint::Generated {
                    expr,
                    stored,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(constraint))
    }

    /// Parses a `DEFAULT` value: literal, signed number, identifier, or
    /// parenthesized expression.
    fn parse_default_value(&mut self) -> Result<Expr, ParseError> {
        if self.eat_symbol(Symbol::LParen) {
            let expr = self.parse_expr()?;
            self.expect_symbol(Symbol::RParen)?;
            return Ok(Expr::Nested(vec![expr]));
        }
        if self.peek_symbol(Symbol::Minus) || self.peek_symbol(Symbol::Plus) {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    /// Parses the clause after `REFERENCES`.
    fn parse_foreign_key_clause(&mut self) -> Result<ForeignKey, ParseError> {
        let table = self.parse_object_name()?;
        let columns = if self.peek_symbol(Symbol::LParen) {
            self.parse_parenthesized_identifiers()?
        } else {
            Vec::new()
        };
        loop {
            if self.peek_keyword(Keyword::On)
                && (self.peek_nth_keyword(1, Keyword::Delete)
                    || self.peek_nth_keyword(1, Keyword::Update))
            {
                self.position += 2;
                if self.eat_keyword(Keyword::Set) {
                    if !self.eat_keyword(Keyword::Null) {
                        self.expect_keyword(Keyword::Default)?;
                    }
                } else if self.eat_word("no") {
                    if !self.eat_word("action") {
                        return Err(self.expected("ACTION"));
                    }
                } else if !(self.eat_word("cascade") || self.eat_word("restrict")) {
                    return Err(self.expected("foreign key action"));
                }
            } else if self.eat_keyword(Keyword::Match) {
                self.parse_identifier()?;
            } else if self.peek_keyword(Keyword::Deferrable)
                || (self.peek_keyword(Keyword::Not) && self.peek_nth_keyword(1, Keyword::Deferrable))
            {
                self.eat_keyword(Keyword::Not);
                self.position += 1;
                if self.eat_word("initially") {
                    if !self.eat_keyword(Keyword::Deferred) {
                        self.expect_keyword(Keyword::Immediate)?;
                    }
                }
            } else {
                break;
            }
        }
        Ok(ForeignKey {
            table,
            columns,
        })
    }

    /// Parses `ALTER TABLE name action`.
    fn parse_alter(&mut self) -> Result<AlterTable, ParseError> {
        self.expect_keyword(Keyword::Alter)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.parse_object_name()?;
        let action = if self.eat_keyword(Keyword::Rename) {
            if self.eat_keyword(Keyword::To) {
                AlterAction::RenameTable(self.parse_identifier()?)
            } else {
                self.eat_keyword(Keyword::Column);
                let from = self.parse_identifier()?;
                self.expect_keyword(Keyword::To)?;
                let to = self.parse_identifier()?;
                AlterAction::RenameColumn {
                    from,
                    to,
                }
            }
        } else if self.eat_keyword(Keyword::Add) {
            self.eat_keyword(Keyword::Column);
            AlterAction::AddColumn(self.parse_column_def()?)
        } else if self.eat_keyword(Keyword::Drop) {
            self.eat_keyword(Keyword::Column);
            AlterAction::DropColumn(self.parse_identifier()?)
        } else {
            return Err(self.expected("RENAME, ADD or DROP"));
        };
        Ok(AlterTable {
            name,
            action,
        })
    }

    /// Parses `DROP TABLE|INDEX|VIEW|TRIGGER [IF EXISTS] name`.
    fn parse_drop(&mut self) -> Result<SqlStatement, ParseError> {
        self.expect_keyword(Keyword::Drop)?;
        let kind = match self.peek().and_then(Token::keyword) {
            Some(Keyword::Table) => None,
            Some(Keyword::Index) => Some(ObjectKind::Index),
            Some(Keyword::View) => Some(ObjectKind::View),
            Some(Keyword::Trigger) => Some(ObjectKind::Trigger),
            _ => return Err(self.expected("TABLE, INDEX, VIEW or TRIGGER after DROP")),
        };
        self.position += 1;
        let if_exists = self.parse_if_exists()?;
        let name = self.parse_object_name()?;
        Ok(match kind {
            None => SqlStatement::DropTable(DropTable {
                name,
                if_exists,
            }),
            Some(kind) => other(OtherStatement::Drop {
                kind,
                name,
                if_exists,
            }),
        })
    }

    /// Parses `CREATE [UNIQUE] INDEX`.
    fn parse_create_index(&mut self, unique: bool) -> Result<SqlStatement, ParseError> {
        self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        self.expect_keyword(Keyword::On)?;
        let table = self.parse_object_name()?;
        self.expect_symbol(Symbol::LParen)?;
        let columns = self.parse_order_by_list()?;
        self.expect_symbol(Symbol::RParen)?;
        let selection = if self.eat_keyword(Keyword::Where) { Some(self.parse_expr()?) } else { None };
        Ok(other(OtherStatement::CreateIndex {
            name,
            table,
            unique,
            columns,
            selection,
        }))
    }

    /// Parses `CREATE TRIGGER ... BEGIN body END`.
    fn parse_create_trigger(&mut self) -> Result<SqlStatement, ParseError> {
        self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        if !(self.eat_keyword(Keyword::Before) || self.eat_keyword(Keyword::After))
            && self.eat_keyword(Keyword::Instead)
        {
            self.expect_keyword(Keyword::Of)?;
        }
        if self.eat_keyword(Keyword::Update) {
            if self.eat_keyword(Keyword::Of) {
                self.parse_identifier()?;
                while self.eat_symbol(Symbol::Comma) {
                    self.parse_identifier()?;
                }
            }
        } else if !(self.eat_keyword(Keyword::Insert) || self.eat_keyword(Keyword::Delete)) {
            return Err(self.expected("INSERT, UPDATE or DELETE"));
        }
        self.expect_keyword(Keyword::On)?;
        let table = self.parse_object_name()?;
        if self.eat_keyword(Keyword::For) {
            self.expect_keyword(Keyword::Each)?;
            self.expect_keyword(Keyword::Row)?;
        }
        let when = if self.eat_keyword(Keyword::When) { Some(self.parse_expr()?) } else { None };
        self.expect_keyword(Keyword::Begin)?;
        let mut body = Vec::new();
        while !self.eat_keyword(Keyword::End) {
            let statement = match self.peek().and_then(Token::keyword) {
                Some(
                    Keyword::Insert
                    | Keyword::Replace
                    | Keyword::Update
                    | Keyword::Delete
                    | Keyword::Select
                    | Keyword::Values
                    | Keyword::With,
                ) => self.parse_statement()?,
                _ => return Err(self.expected("trigger body statement or END")),
            };
            self.expect_symbol(Symbol::Semicolon)?;
            body.push(statement);
        }
        Ok(other(OtherStatement::CreateTrigger {
            name,
            table,
            when,
            body,
        }))
    }

    /// Parses `PRAGMA name [= value | (value)]`.
    fn parse_pragma(&mut self) -> Result<SqlStatement, ParseError> {
        self.expect_keyword(Keyword::Pragma)?;
        let name = self.parse_object_name()?;
        let value = if self.eat_symbol(Symbol::Eq) {
            Some(self.parse_pragma_value()?)
        } else if self.eat_symbol(Symbol::LParen) {
            let value = self.parse_pragma_value()?;
            self.expect_symbol(Symbol::RParen)?;
            Some(value)
        } else {
            None
        };
        Ok(other(OtherStatement::Pragma {
            name,
            value,
        }))
    }

    /// Parses a pragma value, where any bare word (including `ON`) is allowed.
    fn parse_pragma_value(&mut self) -> Result<Expr, ParseError> {
        if let Some(Token::Word {
            text, ..
        }) = self.peek()
        {
            let name = text.clone();
            self.position += 1;
            return Ok(Expr::Column {
                table: None,
                name,
            });
        }
        self.parse_unary()
    }

    /// Parses `[INSERT [OR action] | REPLACE] INTO ...`.
    fn parse_insert(&mut self, with: Option<With>) -> Result<Insert, ParseError> {
        let or_action = if self.eat_keyword(Keyword::Replace) {
            Some(ConflictAction::Replace)
        } else {
            self.expect_keyword(Keyword::Insert)?;
            if self.eat_keyword(Keyword::Or) { Some(self.parse_conflict_action()?) } else { None }
        };
        self.expect_keyword(Keyword::Into)?;
        let table = self.parse_object_name()?;
        let alias = if self.eat_keyword(Keyword::As) { Some(self.parse_identifier()?) } else { None };
        let columns = if self.peek_symbol(Symbol::LParen) {
            self.parse_parenthesized_identifiers()?
        } else {
            Vec::new()
        };
        let source = if self.eat_keyword(Keyword::Default) {
            self.expect_keyword(Keyword::Values)?;
            InsertSource::DefaultValues
        } else if self.peek_keyword(Keyword::Values) {
            let query = self.parse_query()?;
            match query {
                Query {
                    with: None,
                    body: SetExpr::Values(rows),
                    order_by,
                    limit: None,
                } if order_by.is_empty() => InsertSource::Values(rows),
                query => InsertSource::Query(Box::new(query)),
            }
        } else if self.peek_query_start() {
            InsertSource::Query(Box::new(self.parse_query()?))
        } else {
            return Err(self.expected("VALUES, SELECT or DEFAULT VALUES"));
        };
        let mut upsert = Vec::new();
        while self.peek_keyword(Keyword::On) && self.peek_nth_keyword(1, Keyword::Conflict) {
            self.position += 2;
            upsert.push(self.parse_upsert()?);
        }
        let returning = self.parse_returning()?;
        Ok(Insert {
            with,
            or_action,
            table,
            alias,
            columns,
            source,
            upsert,
            returning,
        })
    }

    /// Parses the body of an `ON CONFLICT` clause.
    fn parse_upsert(&mut self) -> Result<Upsert, ParseError> {
        let mut target = Vec::new();
        let mut target_selection = None;
        if self.eat_symbol(Symbol::LParen) {
            target = self.parse_expr_list()?;
            self.expect_symbol(Symbol::RParen)?;
            if self.eat_keyword(Keyword::Where) {
                target_selection = Some(self.parse_expr()?);
            }
        }
        self.expect_keyword(Keyword::Do)?;
        let action = if self.eat_keyword(Keyword::Nothing) {
            UpsertAction::Nothing
        } else {
            self.expect_keyword(Keyword::Update)?;
            self.expect_keyword(Keyword::Set)?;
            let assignments = self.parse_assignments()?;
            let selection =
                if self.eat_keyword(Keyword::Where) { Some(self.parse_expr()?) } else { None };
            UpsertAction::Update {
                assignments,
                selection,
            }
        };
        Ok(Upsert {
            target,
            target_selection,
            action,
        })
    }

    /// Parses an optional `RETURNING` clause.
    fn parse_returning(&mut self) -> Result<Vec<SelectItem>, ParseError> {
        if self.eat_keyword(Keyword::Returning) {
            return self.parse_select_items();
        }
        Ok(Vec::new())
    }

    /// Parses `SET` assignments.
    fn parse_assignments(&mut self) -> Result<Vec<Assignment>, ParseError> {
        let mut assignments = Vec::new();
        loop {
            let columns = if self.peek_symbol(Symbol::LParen) {
                self.parse_parenthesized_identifiers()?
            } else {
                let mut name = self.parse_identifier()?;
                if self.eat_symbol(Symbol::Dot) {
                    name = self.parse_identifier()?;
                }
                vec![name]
            };
            self.expect_symbol(Symbol::Eq)?;
            let value = self.parse_expr()?;
            assignments.push(Assignment {
                columns,
                value,
            });
            if !self.eat_symbol(Symbol::Comma) {
                return Ok(assignments);
            }
        }
    }

    /// Parses `UPDATE ...`.
    fn parse_update(&mut self, with: Option<With>) -> Result<Update, ParseError> {
        self.expect_keyword(Keyword::Update)?;
        let or_action =
            if self.eat_keyword(Keyword::Or) { Some(self.parse_conflict_action()?) } else { None };
        let table = self.parse_object_name()?;
        let alias = if self.eat_keyword(Keyword::As) { Some(self.parse_identifier()?) } else { None };
        self.skip_index_hint()?;
        self.expect_keyword(Keyword::Set)?;
        let assignments = self.parse_assignments()?;
        let from = if self.eat_keyword(Keyword::From) { self.parse_from()? } else { Vec::new() };
        let selection = if self.eat_keyword(Keyword::Where) { Some(self.parse_expr()?) } else { None };
        let returning = self.parse_returning()?;
        let order_by = self.parse_optional_order_by()?;
        let limit = self.parse_optional_limit()?;
        Ok(Update {
            with,
            or_action,
            table,
            alias,
            assignments,
            from,
            selection,
            returning,
            order_by,
            limit,
        })
    }

    /// Parses `DELETE FROM ...`.
    fn parse_delete(&mut self, with: Option<With>) -> Result<Delete, ParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.parse_object_name()?;
        let alias = if self.eat_keyword(Keyword::As) { Some(self.parse_identifier()?) } else { None };
        self.skip_index_hint()?;
        let selection = if self.eat_keyword(Keyword::Where) { Some(self.parse_expr()?) } else { None };
        let returning = self.parse_returning()?;
        let order_by = self.parse_optional_order_by()?;
        let limit = self.parse_optional_limit()?;
        Ok(Delete {
            with,
            table,
            alias,
            selection,
            returning,
            order_by,
            limit,
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Parses `WITH [RECURSIVE] name [(cols)] AS [[NOT] MATERIALIZED] (query), ...`.
    fn parse_with(&mut self) -> Result<With, ParseError> {
        self.expect_keyword(Keyword::With)?;
        let recursive = self.eat_keyword(Keyword::Recursive);
        let mut ctes = Vec::new();
        loop {
            let name = self.parse_identifier()?;
            let columns = if self.peek_symbol(Symbol::LParen) {
                self.parse_parenthesized_identifiers()?
            } else {
                Vec::new()
            };
            self.expect_keyword(Keyword::As)?;
            if self.eat_keyword(Keyword::Not) {
                self.expect_keyword(Keyword::Materialized)?;
            } else {
                self.eat_keyword(Keyword::Materialized);
            }
            self.expect_symbol(Symbol::LParen)?;
            let query = Box::new(self.parse_query()?);
            self.expect_symbol(Symbol::RParen)?;
            ctes.push(Cte {
                name,
                columns,
                query,
            });
            if !self.eat_symbol(Symbol::Comma) {
                break;
            }
        }
        Ok(With {
            recursive,
            ctes,
        })
    }

    /// Parses a full query including an optional leading `WITH`.
    fn parse_query(&mut self) -> Result<Query, ParseError> {
        let with = if self.peek_keyword(Keyword::With) { Some(self.parse_with()?) } else { None };
        let mut query = self.parse_query_body()?;
        query.with = with;
        Ok(query)
    }

    /// Parses a query body with `ORDER BY` and `LIMIT`.
    fn parse_query_body(&mut self) -> Result<Query, ParseError> {
        let body = self.parse_set_expr()?;
        let order_by = self.parse_optional_order_by()?;
        let limit = self.parse_optional_limit()?;
        Ok(Query {
            with: None,
            body,
            order_by,
            limit,
        })
    }

    /// Parses select cores joined by compound operators (left-associative).
    fn parse_set_expr(&mut self) -> Result<SetExpr, ParseError> {
        let mut left = self.parse_select_core()?;
        loop {
            let op = if self.eat_keyword(Keyword::Union) {
                if self.eat_keyword(Keyword::All) { SetOperator::UnionAll } else { SetOperator::Union }
            } else if self.eat_keyword(Keyword::Intersect) {
                SetOperator::Intersect
            } else if self.eat_keyword(Keyword::Except) {
                SetOperator::Except
            } else {
                return Ok(left);
            };
            let right = self.parse_select_core()?;
            left = SetExpr::Compound {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    /// Parses `SELECT ...` or `VALUES ...`.
    fn parse_select_core(&mut self) -> Result<SetExpr, ParseError> {
        if self.eat_keyword(Keyword::Values) {
            return self.parse_values_rows().map(SetExpr::Values);
        }
        self.expect_keyword(Keyword::Select)?;
        let distinct = if self.eat_keyword(Keyword::Distinct) {
            true
        } else {
            self.eat_keyword(Keyword::All);
            false
        };
        let projection = self.parse_select_items()?;
        let from = if self.eat_keyword(Keyword::From) { self.parse_from()? } else { Vec::new() };
        let selection = if self.eat_keyword(Keyword::Where) { Some(self.parse_expr()?) } else { None };
        let group_by = if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        let having = if self.eat_keyword(Keyword::Having) { Some(self.parse_expr()?) } else { None };
        let mut windows = Vec::new();
        if self.eat_keyword(Keyword::Window) {
            loop {
                let name = self.parse_identifier()?;
                self.expect_keyword(Keyword::As)?;
                self.expect_symbol(Symbol::LParen)?;
                let spec = self.parse_window_spec()?;
                windows.push((name, spec));
                if !self.eat_symbol(Symbol::Comma) {
                    break;
                }
            }
        }
        Ok(SetExpr::Select(Box::new(Select {
            distinct,
            projection,
            from,
            selection,
            group_by,
            having,
            windows,
        })))
    }

    /// Parses `(..), (..)` after `VALUES`.
    fn parse_values_rows(&mut self) -> Result<Vec<Vec<Expr>>, ParseError> {
        let mut rows = Vec::new();
        loop {
            self.expect_symbol(Symbol::LParen)?;
            rows.push(self.parse_expr_list()?);
            self.expect_symbol(Symbol::RParen)?;
            if !self.eat_symbol(Symbol::Comma) {
                return Ok(rows);
            }
        }
    }

    /// Parses result columns.
    fn parse_select_items(&mut self) -> Result<Vec<SelectItem>, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.eat_symbol(Symbol::Star) {
                items.push(SelectItem::Wildcard);
            } else if self.is_identifier_at(0)
                && self.peek_nth(1).is_some_and(|t| t.is_symbol(Symbol::Dot))
                && self.peek_nth(2).is_some_and(|t| t.is_symbol(Symbol::Star))
            {
                let table = self.parse_identifier()?;
                self.position += 2;
                items.push(SelectItem::QualifiedWildcard(table));
            } else {
                let expr = self.parse_expr()?;
                let alias = self.parse_optional_alias()?;
                items.push(SelectItem::Expr {
                    expr,
                    alias,
                });
            }
            if !self.eat_symbol(Symbol::Comma) {
                return Ok(items);
            }
        }
    }

    /// Parses a `FROM` clause (comma-separated join trees).
    fn parse_from(&mut self) -> Result<Vec<TableWithJoins>, ParseError> {
        let mut tables = vec![self.parse_table_with_joins()?];
        while self.eat_symbol(Symbol::Comma) {
            tables.push(self.parse_table_with_joins()?);
        }
        Ok(tables)
    }

    /// Parses one relation followed by its joins.
    fn parse_table_with_joins(&mut self) -> Result<TableWithJoins, ParseError> {
        let relation = self.parse_table_factor()?;
        let mut joins = Vec::new();
        while let Some(kind) = self.parse_join_operator()? {
            let natural = kind.1;
            let relation = self.parse_table_factor()?;
            let constraint = if natural {
                JoinConstraint::Natural
            } else if self.eat_keyword(Keyword::On) {
                JoinConstraint::On(self.parse_expr()?)
            } else if self.eat_keyword(Keyword::Using) {
                JoinConstraint::Using(self.parse_parenthesized_identifiers()?)
            } else {
                JoinConstraint::None
            };
            joins.push(Join {
                kind: kind.0,
                relation,
                constraint,
            });
        }
        Ok(TableWithJoins {
            relation,
            joins,
        })
    }

    /// Parses a join operator, returning its kind and whether it is natural.
    fn parse_join_operator(&mut self) -> Result<Option<(JoinKind, bool)>, ParseError> {
        let natural = self.eat_keyword(Keyword::Natural);
        let kind = if self.eat_keyword(Keyword::Join) {
            return Ok(Some((JoinKind::Inner, natural)));
        } else if self.eat_keyword(Keyword::Inner) {
            JoinKind::Inner
        } else if self.eat_keyword(Keyword::Cross) {
            JoinKind::Cross
        } else if self.eat_keyword(Keyword::Left) {
            self.eat_keyword(Keyword::Outer);
            JoinKind::Left
        } else if self.eat_keyword(Keyword::Right) {
            self.eat_keyword(Keyword::Outer);
            JoinKind::Right
        } else if self.eat_keyword(Keyword::Full) {
            self.eat_keyword(Keyword::Outer);
            JoinKind::Full
        } else if natural {
            return Err(self.expected("JOIN after NATURAL"));
        } else {
            return Ok(None);
        };
        self.expect_keyword(Keyword::Join)?;
        Ok(Some((kind, natural)))
    }

    /// Parses one relation in a `FROM` clause.
    fn parse_table_factor(&mut self) -> Result<TableFactor, ParseError> {
        if self.eat_symbol(Symbol::LParen) {
            if self.peek_query_start() {
                let subquery = Box::new(self.parse_query()?);
                self.expect_symbol(Symbol::RParen)?;
                let alias = self.parse_optional_alias()?;
                return Ok(TableFactor::Derived {
                    subquery,
                    alias,
                });
            }
            let nested = self.parse_table_with_joins()?;
            self.expect_symbol(Symbol::RParen)?;
            return Ok(TableFactor::NestedJoin(Box::new(nested)));
        }
        let name = self.parse_object_name()?;
        if self.eat_symbol(Symbol::LParen) {
            let args = if self.peek_symbol(Symbol::RParen) { Vec::new() } else { self.parse_expr_list()? };
            self.expect_symbol(Symbol::RParen)?;
            let alias = self.parse_optional_alias()?;
            return Ok(TableFactor::Function {
                name: name.name,
                args,
                alias,
            });
        }
        let alias = self.parse_optional_alias()?;
        self.skip_index_hint()?;
        Ok(TableFactor::Table {
            name,
            alias,
        })
    }

    /// Parses an optional `ORDER BY` clause.
    fn parse_optional_order_by(&mut self) -> Result<Vec<OrderByExpr>, ParseError> {
        if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            return self.parse_order_by_list();
        }
        Ok(Vec::new())
    }

    /// Parses `expr [ASC|DESC] [NULLS FIRST|LAST], ...`.
    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByExpr>, ParseError> {
        let mut terms = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let descending = if self.eat_keyword(Keyword::Desc) {
                true
            } else {
                self.eat_keyword(Keyword::Asc);
                false
            };
            if self.eat_keyword(Keyword::Nulls)
                && !(self.eat_keyword(Keyword::First) || self.eat_keyword(Keyword::Last))
            {
                return Err(self.expected("FIRST or LAST"));
            }
            terms.push(OrderByExpr {
                expr,
                descending,
            });
            if !self.eat_symbol(Symbol::Comma) {
                return Ok(terms);
            }
        }
    }

    /// Parses an optional `LIMIT` clause.
    fn parse_optional_limit(&mut self) -> Result<Option<Limit>, ParseError> {
        if !self.eat_keyword(Keyword::Limit) {
            return Ok(None);
        }
        let first = self.parse_expr()?;
        if self.eat_keyword(Keyword::Offset) {
            let offset = self.parse_expr()?;
            return Ok(Some(Limit {
                limit: first,
                offset: Some(offset),
            }));
        }
        if self.eat_symbol(Symbol::Comma) {
            let limit = self.parse_expr()?;
            return Ok(Some(Limit {
                limit,
                offset: Some(first),
            }));
        }
        Ok(Some(Limit {
            limit: first,
            offset: None,
        }))
    }

    /// Parses the inside of `OVER (...)` / `WINDOW w AS (...)` after `(`.
    fn parse_window_spec(&mut self) -> Result<WindowSpec, ParseError> {
        let mut spec = WindowSpec::default();
        if self.is_identifier_at(0) && !self.peek_keyword(Keyword::Partition) {
            let is_frame_word = matches!(
                self.peek(),
                Some(Token::Word { text, .. })
                    if ["range", "rows", "groups"].iter().any(|w| text.eq_ignore_ascii_case(w))
            );
            if !is_frame_word {
                spec.base = Some(self.parse_identifier()?);
            }
        }
        if self.eat_keyword(Keyword::Partition) {
            self.expect_keyword(Keyword::By)?;
            spec.partition_by = self.parse_expr_list()?;
        }
        spec.order_by = self.parse_optional_order_by()?;
        if self.peek_symbol(Symbol::RParen) {
            self.position += 1;
        } else {
            let (start, end) = self.skip_balanced()?;
            spec.frame = Some(self.source[start .. end].trim().to_string());
        }
        Ok(spec)
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    /// Parses a comma-separated expression list (at least one).
    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat_symbol(Symbol::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for malformed expressions.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    /// Parses `AND` chains.
    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    /// Parses prefix `NOT`.
    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.peek_keyword(Keyword::Not) && self.peek_nth_keyword(1, Keyword::Exists) {
            self.position += 2;
            let subquery = self.parse_parenthesized_query()?;
            return Ok(Expr::Exists {
                negated: true,
                subquery,
            });
        }
        if self.eat_keyword(Keyword::Not) {
            let expr = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_equality()
    }

    /// Parses equality-level operators and SQLite's postfix predicates.
    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            if self.eat_symbol(Symbol::Eq) {
                let right = self.parse_comparison()?;
                left = binary(left, BinaryOperator::Eq, right);
            } else if self.eat_symbol(Symbol::NotEq) {
                let right = self.parse_comparison()?;
                left = binary(left, BinaryOperator::NotEq, right);
            } else if self.eat_keyword(Keyword::Is) {
                let negated = self.eat_keyword(Keyword::Not);
                let distinct = if self.eat_keyword(Keyword::Distinct) {
                    self.expect_keyword(Keyword::From)?;
                    true
                } else {
                    false
                };
                let op = if negated == distinct { BinaryOperator::Is } else { BinaryOperator::IsNot };
                let right = self.parse_comparison()?;
                left = binary(left, op, right);
            } else if self.eat_keyword(Keyword::Isnull) {
                left = Expr::NullCheck {
                    expr: Box::new(left),
                    negated: false,
                };
            } else if self.eat_keyword(Keyword::Notnull) {
                left = Expr::NullCheck {
                    expr: Box::new(left),
                    negated: true,
                };
            } else if let Some(next) = self.parse_negatable_predicate(left.clone())? {
                left = next;
            } else {
                return Ok(left);
            }
        }
    }

    /// Parses `[NOT] IN|LIKE|GLOB|REGEXP|MATCH|BETWEEN` and `NOT NULL` after
    /// `left`, returning `None` when none applies.
    fn parse_negatable_predicate(&mut self, left: Expr) -> Result<Option<Expr>, ParseError> {
        let offset = usize::from(self.peek_keyword(Keyword::Not));
        let Some(keyword) = self.peek_nth(offset).and_then(Token::keyword) else {
            return Ok(None);
        };
        let negated = offset == 1;
        let pattern_op = match keyword {
            Keyword::Like => Some(PatternOperator::Like),
            Keyword::Glob => Some(PatternOperator::Glob),
            Keyword::Regexp => Some(PatternOperator::Regexp),
            Keyword::Match => Some(PatternOperator::Match),
            Keyword::In | Keyword::Between => None,
            Keyword::Null if negated => {
                self.position += 2;
                return Ok(Some(Expr::NullCheck {
                    expr: Box::new(left),
                    negated: true,
                }));
            }
            _ => return Ok(None),
        };
        self.position += offset + 1;
        let expr = Box::new(left);
        if let Some(op) = pattern_op {
            let pattern = Box::new(self.parse_comparison()?);
            let escape = if self.eat_keyword(Keyword::Escape) {
                Some(Box::new(self.parse_comparison()?))
            } else {
                None
            };
            return Ok(Some(Expr::Pattern {
                expr,
                negated,
                op,
                pattern,
                escape,
            }));
        }
        if keyword == Keyword::Between {
            let low = Box::new(self.parse_comparison()?);
            self.expect_keyword(Keyword::And)?;
            let high = Box::new(self.parse_comparison()?);
            return Ok(Some(Expr::Between {
                expr,
                negated,
                low,
                high,
            }));
        }
        if self.eat_symbol(Symbol::LParen) {
            if self.peek_query_start() {
                let subquery = Box::new(self.parse_query()?);
                self.expect_symbol(Symbol::RParen)?;
                return Ok(Some(Expr::InSubquery {
                    expr,
                    negated,
                    subquery,
                }));
            }
            let list = if self.peek_symbol(Symbol::RParen) { Vec::new() } else { self.parse_expr_list()? };
            self.expect_symbol(Symbol::RParen)?;
            return Ok(Some(Expr::InList {
                expr,
                negated,
                list,
            }));
        }
        let table = self.parse_object_name()?;
        if self.eat_symbol(Symbol::LParen) {
            let args = if self.peek_symbol(Symbol::RParen) { Vec::new() } else { self.parse_expr_list()? };
            self.expect_symbol(Symbol::RParen)?;
            return Ok(Some(Expr::InList {
                expr,
                negated,
                list: vec![Expr::Function {
                    name: table.name,
                    args: FunctionArgs::List {
                        distinct: false,
                        args,
                    },
                    filter: None,
                    over: None,
                }],
            }));
        }
        Ok(Some(Expr::InTable {
            expr,
            negated,
            table,
        }))
    }

    /// Parses `<`, `<=`, `>`, `>=`.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_bitwise()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Lt)) => BinaryOperator::Lt,
                Some(Token::Symbol(Symbol::LtEq)) => BinaryOperator::LtEq,
                Some(Token::Symbol(Symbol::Gt)) => BinaryOperator::Gt,
                Some(Token::Symbol(Symbol::GtEq)) => BinaryOperator::GtEq,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_bitwise()?;
            left = binary(left, op, right);
        }
    }

    /// Parses `&`, `|`, `<<`, `>>`.
    fn parse_bitwise(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::BitAnd)) => BinaryOperator::BitAnd,
                Some(Token::Symbol(Symbol::BitOr)) => BinaryOperator::BitOr,
                Some(Token::Symbol(Symbol::ShiftLeft)) => BinaryOperator::ShiftLeft,
                Some(Token::Symbol(Symbol::ShiftRight)) => BinaryOperator::ShiftRight,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
    }

    /// Parses `+`, `-`.
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Plus)) => BinaryOperator::Plus,
                Some(Token::Symbol(Symbol::Minus)) => BinaryOperator::Minus,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
    }

    /// Parses `*`, `/`, `%`.
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Star)) => BinaryOperator::Multiply,
                Some(Token::Symbol(Symbol::Slash)) => BinaryOperator::Divide,
                Some(Token::Symbol(Symbol::Percent)) => BinaryOperator::Modulo,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_concat()?;
            left = binary(left, op, right);
        }
    }

    /// Parses `||`, `->`, `->>`.
    fn parse_concat(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Concat)) => BinaryOperator::Concat,
                Some(Token::Symbol(Symbol::Arrow)) => BinaryOperator::JsonExtract,
                Some(Token::Symbol(Symbol::LongArrow)) => BinaryOperator::JsonExtractText,
                _ => return Ok(left),
            };
            self.position += 1;
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
    }

    /// Parses prefix `-`, `+`, `~`.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Symbol(Symbol::Minus)) => UnaryOperator::Minus,
            Some(Token::Symbol(Symbol::Plus)) => UnaryOperator::Plus,
            Some(Token::Symbol(Symbol::Tilde)) => UnaryOperator::BitNot,
            _ => return self.parse_collate(),
        };
        self.position += 1;
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    /// Parses a primary followed by `COLLATE name` suffixes.
    fn parse_collate(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.eat_keyword(Keyword::Collate) {
            let collation = self.parse_identifier()?;
            expr = Expr::Collate {
                expr: Box::new(expr),
                collation,
            };
        }
        Ok(expr)
    }

    /// Parses `( query )`.
    fn parse_parenthesized_query(&mut self) -> Result<Box<Query>, ParseError> {
        self.expect_symbol(Symbol::LParen)?;
        let query = self.parse_query()?;
        self.expect_symbol(Symbol::RParen)?;
        Ok(Box::new(query))
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.expected("expression"));
        };
        match token {
            Token::Number(text) => {
                self.position += 1;
                Ok(Expr::Literal(Literal::Number(text)))
            }
            Token::String(text) => {
                self.position += 1;
                Ok(Expr::Literal(Literal::String(text)))
            }
            Token::Blob(hex) => {
                self.position += 1;
                Ok(Expr::Literal(Literal::Blob(hex)))
            }
            Token::Placeholder => {
                self.position += 1;
                let index = self.placeholders;
                self.placeholders += 1;
                Ok(Expr::Placeholder(index))
            }
            Token::Symbol(Symbol::LParen) => {
                self.position += 1;
                if self.peek_query_start() {
                    let query = self.parse_query()?;
                    self.expect_symbol(Symbol::RParen)?;
                    return Ok(Expr::Subquery(Box::new(query)));
                }
                let exprs = self.parse_expr_list()?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(Expr::Nested(exprs))
            }
            Token::Word {
                keyword: Some(keyword),
                ..
            } if keyword.is_reserved() || keyword == Keyword::Raise => {
                self.parse_keyword_expr(keyword)
            }
            Token::Word {
                ..
            }
            | Token::QuotedIdent(_) => self.parse_identifier_expr(),
            Token::Symbol(_) => Err(self.expected("expression")),
        }
    }

    /// Parses expressions introduced by a keyword.
    fn parse_keyword_expr(&mut self, keyword: Keyword) -> Result<Expr, ParseError> {
        match keyword {
            Keyword::Null => {
                self.position += 1;
                Ok(Expr::Literal(Literal::Null))
            }
            Keyword::Exists => {
                self.position += 1;
                let subquery = self.parse_parenthesized_query()?;
                Ok(Expr::Exists {
                    negated: false,
                    subquery,
                })
            }
            Keyword::Cast => {
                self.position += 1;
                self.expect_symbol(Symbol::LParen)?;
                let expr = self.parse_expr()?;
                self.expect_keyword(Keyword::As)?;
                let data_type = self.parse_type_name()?.ok_or_else(|| self.expected("type name"))?;
                self.expect_symbol(Symbol::RParen)?;
                Ok(Expr::Cast {
                    expr: Box::new(expr),
                    data_type,
                })
            }
            Keyword::Case => self.parse_case(),
            Keyword::Raise => {
                self.position += 1;
                self.expect_symbol(Symbol::LParen)?;
                let action = match self.advance().map(|s| s.token) {
                    Some(Token::Word {
                        text, ..
                    }) => text.to_ascii_uppercase(),
                    _ => return Err(self.expected("RAISE action")),
                };
                let message = if self.eat_symbol(Symbol::Comma) {
                    Some(Box::new(self.parse_expr()?))
                } else {
                    None
                };
                self.expect_symbol(Symbol::RParen)?;
                Ok(Expr::Raise {
                    action,
                    message,
                })
            }
            Keyword::Like | Keyword::Glob | Keyword::Match
                if self.peek_nth(1).is_some_and(|t| t.is_symbol(Symbol::LParen)) =>
            {
                let name = keyword.as_str().to_ascii_lowercase();
                self.position += 2;
                self.parse_function_call(name)
            }
            _ => Err(self.expected("expression")),
        }
    }

    /// Parses `CASE ... END`.
    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword(Keyword::Case)?;
        let operand =
            if self.peek_keyword(Keyword::When) { None } else { Some(Box::new(self.parse_expr()?)) };
        let mut branches = Vec::new();
        while self.eat_keyword(Keyword::When) {
            let condition = self.parse_expr()?;
            self.expect_keyword(Keyword::Then)?;
            let result = self.parse_expr()?;
            branches.push((condition, result));
        }
        if branches.is_empty() {
            return Err(self.expected("WHEN"));
        }
        let else_result =
            if self.eat_keyword(Keyword::Else) { Some(Box::new(self.parse_expr()?)) } else { None };
        self.expect_keyword(Keyword::End)?;
        Ok(Expr::Case {
            operand,
            branches,
            else_result,
        })
    }

    /// Parses a column reference or function call starting with a name.
    fn parse_identifier_expr(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_identifier()?;
        if self.eat_symbol(Symbol::LParen) {
            return self.parse_function_call(first);
        }
        if !self.eat_symbol(Symbol::Dot) {
            return Ok(Expr::Column {
                table: None,
                name: first,
            });
        }
        let second = self.parse_identifier()?;
        if self.eat_symbol(Symbol::Dot) {
            let third = self.parse_identifier()?;
            return Ok(Expr::Column {
                table: Some(second),
                name: third,
            });
        }
        Ok(Expr::Column {
            table: Some(first),
            name: second,
        })
    }

    /// Parses a call once `name(` has been consumed.
    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        let args = if self.eat_symbol(Symbol::Star) {
            FunctionArgs::Star
        } else if self.peek_symbol(Symbol::RParen) {
            FunctionArgs::List {
                distinct: false,
                args: Vec::new(),
            }
        } else {
            let distinct = self.eat_keyword(Keyword::Distinct);
            let mut args = self.parse_expr_list()?;
            for term in self.parse_optional_order_by()? {
                args.push(term.expr);
            }
            FunctionArgs::List {
                distinct,
                args,
            }
        };
        self.expect_symbol(Symbol::RParen)?;
        let filter = if self.eat_keyword(Keyword::Filter) {
            self.expect_symbol(Symbol::LParen)?;
            self.expect_keyword(Keyword::Where)?;
            let expr = self.parse_expr()?;
            self.expect_symbol(Symbol::RParen)?;
            Some(Box::new(expr))
        } else {
            None
        };
        let over = if self.eat_keyword(Keyword::Over) {
            if self.eat_symbol(Symbol::LParen) {
                Some(self.parse_window_spec()?)
            } else {
                Some(WindowSpec {
                    base: Some(self.parse_identifier()?),
                    ..WindowSpec::default()
                })
            }
        } else {
            None
        };
        Ok(Expr::Function {
            name,
            args,
            filter,
            over,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Wraps an [`OtherStatement`].
fn other(statement: OtherStatement) -> SqlStatement {
    SqlStatement::Other(Box::new(statement))
}

/// Builds a binary expression.
fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}
