// crates/mirrordb-core/src/classifier.rs
// ============================================================================
// Module: Statement Classifier
// Description: Turn one statement's text and parameters into a Statement.
// Purpose: Determine kind, read/write tables, and table-definition metadata.
// Dependencies: crate::sql, crate::statement, crate::identifiers
// ============================================================================

//! ## Overview
//! Classification is rule-ordered: transaction control first, then table DDL,
//! then data modification and queries, then everything else. Table names are
//! gathered with a breadth-first walk over the AST; names bound by `WITH`
//! clauses are not reported as tables.
//!
//! [`classify_kind`] is the reduced form used once a script is flagged long:
//! it only reads leading keywords, except for table-modify statements which
//! always get the full parse because the diff generator depends on them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::identifiers::normalize;
use crate::sql::ParseError;
use crate::sql::ast::AlterAction;
use crate::sql::ast::ColumnConstraint;
use crate::sql::ast::CreateTable;
use crate::sql::ast::CreateTableBody;
use crate::sql::ast::Expr;
use crate::sql::ast::OtherStatement;
use crate::sql::ast::SqlStatement;
use crate::sql::ast::TableConstraint;
use crate::sql::ast::TableFactor;
use crate::sql::lexer::Keyword;
use crate::sql::lexer::Lexer;
use crate::sql::lexer::Spanned;
use crate::sql::lexer::Symbol;
use crate::sql::lexer::Token;
use crate::sql::parse_statement;
use crate::sql::visit::Node;
use crate::sql::visit::breadth_first;
use crate::sql::visit::contains_query;
use crate::statement::ColumnDefinition;
use crate::statement::SchemaChange;
use crate::statement::Statement;
use crate::statement::StatementKind;
use crate::statement::TableDefinition;
use crate::statement::Value;

// ============================================================================
// SECTION: Full Classification
// ============================================================================

/// Parses and classifies one statement.
///
/// # Errors
///
/// Returns [`ParseError`] when the statement cannot be parsed.
pub fn classify(text: &str, params: Vec<Value>) -> Result<Statement, ParseError> {
    let query = text.trim();
    let ast = parse_statement(query)?;
    Ok(classify_ast(query, params, &ast))
}

/// Classifies an already-parsed statement.
#[must_use]
pub fn classify_ast(query: &str, params: Vec<Value>, ast: &SqlStatement) -> Statement {
    let kind = kind_of(ast);
    let mut statement = Statement::bare(query, params, kind);
    let references = TableReferences::collect(ast);
    statement.tables_read = references.read;
    statement.tables_write = references.write;
    statement.is_read = kind == StatementKind::Select || contains_query(ast);
    match ast {
        SqlStatement::CreateTable(create) => {
            let definition = table_definition(create);
            if let Some(definition) = &definition {
                statement.columns = definition.column_names();
                statement.primary_keys.clone_from(&definition.primary_keys);
                statement.auto_increment.clone_from(&definition.auto_increment);
            }
            statement.schema_change = Some(SchemaChange::Create {
                table: create.name.normalized(),
                temporary: create.temporary,
                definition,
            });
        }
        SqlStatement::AlterTable(alter) => {
            let table = alter.name.normalized();
            statement.schema_change = Some(match &alter.action {
                AlterAction::RenameTable(to) => SchemaChange::Rename {
                    from: table,
                    to: normalize(to),
                },
                AlterAction::RenameColumn {
                    from,
                    to,
                } => {
                    statement.columns = vec![from.clone(), to.clone()];
                    SchemaChange::Modify {
                        table,
                    }
                }
                AlterAction::AddColumn(column) => {
                    statement.columns = vec![column.name.clone()];
                    SchemaChange::Modify {
                        table,
                    }
                }
                AlterAction::DropColumn(column) => {
                    statement.columns = vec![column.clone()];
                    SchemaChange::Modify {
                        table,
                    }
                }
            });
        }
        SqlStatement::DropTable(drop) => {
            statement.schema_change = Some(SchemaChange::Drop {
                table: drop.name.normalized(),
                if_exists: drop.if_exists,
            });
        }
        SqlStatement::Insert(insert) => statement.columns.clone_from(&insert.columns),
        SqlStatement::Update(update) => {
            statement.columns =
                update.assignments.iter().flat_map(|a| a.columns.iter().cloned()).collect();
        }
        SqlStatement::Begin(_)
        | SqlStatement::Commit
        | SqlStatement::Rollback
        | SqlStatement::Delete(_)
        | SqlStatement::Query(_)
        | SqlStatement::Other(_) => {}
    }
    statement
}

/// Maps a parsed statement to its kind.
const fn kind_of(ast: &SqlStatement) -> StatementKind {
    match ast {
        SqlStatement::Begin(_) => StatementKind::BeginTransaction,
        SqlStatement::Commit => StatementKind::CommitTransaction,
        SqlStatement::Rollback => StatementKind::RollbackTransaction,
        SqlStatement::CreateTable(_) => StatementKind::CreateTable,
        SqlStatement::AlterTable(alter) => match alter.action {
            AlterAction::RenameTable(_) => StatementKind::RenameTable,
            AlterAction::RenameColumn {
                ..
            }
            | AlterAction::AddColumn(_)
            | AlterAction::DropColumn(_) => StatementKind::ModifyTableColumns,
        },
        SqlStatement::DropTable(_) => StatementKind::DropTable,
        SqlStatement::Insert(_) => StatementKind::Insert,
        SqlStatement::Update(_) => StatementKind::Update,
        SqlStatement::Delete(_) => StatementKind::Delete,
        SqlStatement::Query(_) => StatementKind::Select,
        SqlStatement::Other(_) => StatementKind::Other,
    }
}

// ============================================================================
// SECTION: Kind-Only Classification
// ============================================================================

/// Classifies a statement from its leading keywords only.
///
/// Table-modify statements are still fully parsed. Row writes and index or
/// trigger creation keep their target table in `tables_write`, read from the
/// token stream, so reserved-table validation holds past the long latch.
///
/// # Errors
///
/// Returns [`ParseError`] when the statement cannot be tokenized, or when a
/// table-modify statement cannot be parsed.
pub fn classify_kind(text: &str, params: Vec<Value>) -> Result<Statement, ParseError> {
    let query = text.trim();
    let tokens = Lexer::new(query).tokenize()?;
    let keywords: Vec<Option<Keyword>> = tokens.iter().map(|s| s.token.keyword()).collect();
    let first = keywords.first().copied().flatten();
    let kind = match first {
        Some(Keyword::Begin | Keyword::Start) => StatementKind::BeginTransaction,
        Some(Keyword::Commit | Keyword::End) => StatementKind::CommitTransaction,
        Some(Keyword::Rollback) if !keywords.contains(&Some(Keyword::To)) => {
            StatementKind::RollbackTransaction
        }
        Some(Keyword::Create | Keyword::Alter | Keyword::Drop)
            if is_table_ddl(&keywords) =>
        {
            return classify(query, params);
        }
        Some(Keyword::Insert | Keyword::Replace) => StatementKind::Insert,
        Some(Keyword::Update) => StatementKind::Update,
        Some(Keyword::Delete) => StatementKind::Delete,
        Some(Keyword::Select | Keyword::Values) => StatementKind::Select,
        Some(Keyword::With) => {
            let mut depth = 0usize;
            let mut verb = StatementKind::Other;
            for spanned in tokens.iter().skip(1) {
                if spanned.token.is_symbol(Symbol::LParen) {
                    depth += 1;
                } else if spanned.token.is_symbol(Symbol::RParen) {
                    depth = depth.saturating_sub(1);
                } else if depth == 0 {
                    verb = match spanned.token.keyword() {
                        Some(Keyword::Insert | Keyword::Replace) => StatementKind::Insert,
                        Some(Keyword::Update) => StatementKind::Update,
                        Some(Keyword::Delete) => StatementKind::Delete,
                        Some(Keyword::Select | Keyword::Values) => StatementKind::Select,
                        _ => continue,
                    };
                    break;
                }
            }
            verb
        }
        None if tokens.is_empty() => return Err(ParseError::new("empty statement", 0)),
        _ => StatementKind::Other,
    };
    let mut statement = Statement::bare(query, params, kind);
    let anchor = match kind {
        StatementKind::Insert => Some(Keyword::Into),
        StatementKind::Update => Some(Keyword::Update),
        StatementKind::Delete => Some(Keyword::From),
        StatementKind::Other if first == Some(Keyword::Create) => Some(Keyword::On),
        _ => None,
    };
    if let Some(anchor) = anchor
        && let Some(table) = write_target(&tokens, anchor)
    {
        statement.tables_write.insert(table);
    }
    Ok(statement)
}

/// Reads the table name following the first top-level `anchor` keyword.
///
/// Skips an `OR <conflict>` clause and resolves `schema.table` to `table`.
fn write_target(tokens: &[Spanned], anchor: Keyword) -> Option<String> {
    let mut depth = 0usize;
    let mut position = None;
    for (index, spanned) in tokens.iter().enumerate() {
        if spanned.token.is_symbol(Symbol::LParen) {
            depth += 1;
        } else if spanned.token.is_symbol(Symbol::RParen) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && spanned.token.is_keyword(anchor) {
            position = Some(index + 1);
            break;
        }
    }
    let mut index = position?;
    if tokens.get(index).is_some_and(|s| s.token.is_keyword(Keyword::Or)) {
        index += 2;
    }
    let mut name = identifier(&tokens.get(index)?.token)?;
    if tokens.get(index + 1).is_some_and(|s| s.token.is_symbol(Symbol::Dot))
        && let Some(qualified) = tokens.get(index + 2).and_then(|s| identifier(&s.token))
    {
        name = qualified;
    }
    Some(normalize(&name))
}

/// Returns the name spelled by an identifier-like token.
fn identifier(token: &Token) -> Option<String> {
    match token {
        Token::Word {
            text, ..
        } => Some(text.clone()),
        Token::QuotedIdent(text) | Token::String(text) => Some(text.clone()),
        _ => None,
    }
}

/// Returns true when leading keywords spell a table DDL statement.
fn is_table_ddl(keywords: &[Option<Keyword>]) -> bool {
    match keywords {
        [Some(Keyword::Create), Some(Keyword::Temp | Keyword::Temporary), Some(Keyword::Table), ..]
        | [Some(Keyword::Create | Keyword::Alter | Keyword::Drop), Some(Keyword::Table), ..] => true,
        _ => false,
    }
}

// ============================================================================
// SECTION: Table References
// ============================================================================

/// Read and write table sets of one statement.
#[derive(Debug, Default)]
struct TableReferences {
    /// Tables read.
    read: BTreeSet<String>,
    /// Tables written.
    write: BTreeSet<String>,
}

impl TableReferences {
    /// Walks `ast` breadth-first collecting table names.
    fn collect(ast: &SqlStatement) -> Self {
        let mut refs = Self::default();
        let mut ctes = BTreeSet::new();
        for node in breadth_first(Node::Statement(ast)) {
            match node {
                Node::Statement(statement) => {
                    refs.collect_targets(statement);
                    ctes.extend(statement_ctes(statement));
                }
                Node::Query(query) => {
                    if let Some(with) = &query.with {
                        ctes.extend(with.ctes.iter().map(|cte| normalize(&cte.name)));
                    }
                }
                Node::TableFactor(TableFactor::Table {
                    name, ..
                }) => {
                    refs.read.insert(name.normalized());
                }
                Node::Expr(Expr::InTable {
                    table, ..
                }) => {
                    refs.read.insert(table.normalized());
                }
                Node::SetExpr(_)
                | Node::Select(_)
                | Node::TableWithJoins(_)
                | Node::TableFactor(_)
                | Node::Expr(_) => {}
            }
        }
        refs.read.retain(|name| !ctes.contains(name));
        refs
    }

    /// Records the write targets and statement-level CTEs of one statement.
    fn collect_targets(&mut self, statement: &SqlStatement) {
        match statement {
            SqlStatement::CreateTable(create) => {
                self.write.insert(create.name.normalized());
            }
            SqlStatement::AlterTable(alter) => {
                self.write.insert(alter.name.normalized());
                if let AlterAction::RenameTable(to) = &alter.action {
                    self.write.insert(normalize(to));
                }
            }
            SqlStatement::DropTable(drop) => {
                self.write.insert(drop.name.normalized());
            }
            SqlStatement::Insert(insert) => {
                self.write.insert(insert.table.normalized());
            }
            SqlStatement::Update(update) => {
                self.write.insert(update.table.normalized());
            }
            SqlStatement::Delete(delete) => {
                self.write.insert(delete.table.normalized());
            }
            SqlStatement::Other(other) => match other.as_ref() {
                OtherStatement::CreateIndex {
                    table, ..
                }
                | OtherStatement::CreateTrigger {
                    table, ..
                } => {
                    self.write.insert(table.normalized());
                }
                _ => {}
            },
            SqlStatement::Begin(_)
            | SqlStatement::Commit
            | SqlStatement::Rollback
            | SqlStatement::Query(_) => {}
        }
    }
}

/// Names bound by a statement-level `WITH` clause.
fn statement_ctes(statement: &SqlStatement) -> Vec<String> {
    let with = match statement {
        SqlStatement::Insert(insert) => insert.with.as_ref(),
        SqlStatement::Update(update) => update.with.as_ref(),
        SqlStatement::Delete(delete) => delete.with.as_ref(),
        _ => None,
    };
    with.map(|with| with.ctes.iter().map(|cte| normalize(&cte.name)).collect()).unwrap_or_default()
}

// ============================================================================
// SECTION: Table Definitions
// ============================================================================

/// Extracts the table definition of a `CREATE TABLE` with declared columns.
#[must_use]
pub fn table_definition(create: &CreateTable) -> Option<TableDefinition> {
    let CreateTableBody::Columns {
        columns,
        constraints,
        without_rowid,
        ..
    } = &create.body
    else {
        return None;
    };
    let mut primary_keys: Vec<String> =
        columns.iter().filter(|c| c.is_primary_key()).map(|c| c.name.clone()).collect();
    let mut auto_increment: Vec<String> =
        columns.iter().filter(|c| c.is_auto_increment()).map(|c| c.name.clone()).collect();
    for constraint in constraints {
        if let TableConstraint::PrimaryKey {
            columns: keys,
            autoincrement,
        } = constraint
        {
            for key in keys {
                if !primary_keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                    primary_keys.push(resolve_column(columns.iter().map(|c| &c.name), key));
                }
            }
            if *autoincrement && keys.len() == 1 {
                auto_increment.push(resolve_column(columns.iter().map(|c| &c.name), &keys[0]));
            }
        }
    }
    if auto_increment.is_empty() && !without_rowid && primary_keys.len() == 1 {
        let rowid_alias = columns.iter().find(|c| c.name.eq_ignore_ascii_case(&primary_keys[0]));
        if let Some(column) = rowid_alias {
            let is_integer =
                column.data_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("integer"));
            let is_descending = column.constraints.iter().any(|c| {
                matches!(
                    c,
                    ColumnConstraint::PrimaryKey {
                        descending: true,
                        ..
                    }
                )
            });
            if is_integer && !is_descending {
                auto_increment.push(column.name.clone());
            }
        }
    }
    Some(TableDefinition {
        name: create.name.normalized(),
        temporary: create.temporary,
        columns: columns
            .iter()
            .map(|c| ColumnDefinition {
                name: c.name.clone(),
                data_type: c.data_type.clone(),
            })
            .collect(),
        primary_keys,
        auto_increment,
    })
}

/// Returns the declared spelling of `key` among `columns`, or `key` itself.
fn resolve_column<'a>(mut columns: impl Iterator<Item = &'a String>, key: &str) -> String {
    columns.find(|name| name.eq_ignore_ascii_case(key)).cloned().unwrap_or_else(|| key.to_string())
}

/// Parses `CREATE TABLE` text read back from the schema catalog.
///
/// # Errors
///
/// Returns [`ParseError`] when the text is not a parseable `CREATE TABLE`.
pub fn definition_from_sql(sql: &str) -> Result<TableDefinition, ParseError> {
    match parse_statement(sql)? {
        SqlStatement::CreateTable(create) => table_definition(&create)
            .ok_or_else(|| ParseError::new("catalog definition has no column list", 0)),
        _ => Err(ParseError::new("catalog entry is not a CREATE TABLE statement", 0)),
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
    fn insert_values_in_write_set_only() {
        let statement = classify("INSERT INTO Users (id, name) VALUES (?, ?);", vec![
            Value::Integer(1),
            Value::from("a"),
        ])
        .unwrap();
        assert_eq!(statement.kind, StatementKind::Insert);
        assert!(!statement.is_read);
        assert!(statement.tables_read.is_empty());
        assert_eq!(statement.tables_write, BTreeSet::from(["users".to_string()]));
        assert_eq!(statement.columns, vec!["id", "name"]);
    }
}
