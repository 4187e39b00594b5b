// crates/mirrordb-core/src/diff.rs
// ============================================================================
// Module: Schema Diff Generator
// Description: DDL for companion tables, capture triggers, and registry rows.
// Purpose: Keep change capture in step with table-modify statements.
// Dependencies: crate::{classifier, identifiers, registry, statement}, serde_json
// ============================================================================

//! ## Overview
//! Every durable user table `t` is shadowed by three companion tables
//! (`t__add`, `t__set`, `t__del`) and three `AFTER` triggers that copy rows
//! into them while the `isDiff` variable is `1`. The generator only produces
//! SQL; the caller executes it on the durable connection and supplies a
//! [`SchemaCatalog`] for reading the DDL a statement left behind.
//!
//! Security posture: names are quoted through
//! [`crate::identifiers::quote_identifier`]; registry values travel as bound
//! parameters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::classifier::definition_from_sql;
use crate::identifiers::ChangeKind;
use crate::identifiers::companion_table;
use crate::identifiers::normalize;
use crate::identifiers::quote_identifier;
use crate::identifiers::quote_literal;
use crate::identifiers::trigger_name;
use crate::registry::TABLES_TABLE;
use crate::registry::VARIABLES_TABLE;
use crate::registry::Variable;
use crate::sql::ParseError;
use crate::statement::SchemaChange;
use crate::statement::TableDefinition;
use crate::statement::Value;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Diff generation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// The schema catalog could not be read.
    #[error("schema catalog error: {0}")]
    Catalog(String),
    /// Catalog DDL could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The table is not in the catalog after the statement ran.
    #[error("table '{0}' missing from schema catalog")]
    MissingTable(String),
}

// ============================================================================
// SECTION: Catalog Seam
// ============================================================================

/// Read access to the current schema of the durable target.
pub trait SchemaCatalog {
    /// Returns the `CREATE TABLE` text of `table`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Catalog`] when the catalog cannot be queried.
    fn table_sql(&self, table: &str) -> Result<Option<String>, DiffError>;
}

// ============================================================================
// SECTION: Generated SQL
// ============================================================================

/// One generated statement with bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSql {
    /// Statement text.
    pub sql: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

impl GeneratedSql {
    /// Creates a parameterless statement.
    fn plain(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Companion-table and trigger DDL generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDiffGenerator;

impl SchemaDiffGenerator {
    /// Generates companion tables, triggers and the registry upsert for
    /// `definition`. Temporary tables get nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Catalog`] when the key lists cannot be encoded.
    pub fn create_table(
        &self,
        definition: &TableDefinition,
        is_memory: bool,
    ) -> Result<Vec<GeneratedSql>, DiffError> {
        if definition.temporary {
            return Ok(Vec::new());
        }
        let table = normalize(&definition.name);
        let mut out = Vec::with_capacity(10);
        for kind in [ChangeKind::Add, ChangeKind::Set, ChangeKind::Del] {
            out.push(GeneratedSql::plain(companion_ddl(&table, kind, definition)));
        }
        out.extend(drop_triggers(&table));
        for kind in [ChangeKind::Add, ChangeKind::Set, ChangeKind::Del] {
            out.push(GeneratedSql::plain(trigger_ddl(&table, kind, definition)));
        }
        let keys = serde_json::to_string(&definition.primary_keys)
            .map_err(|err| DiffError::Catalog(err.to_string()))?;
        let auto_keys = serde_json::to_string(&definition.auto_increment)
            .map_err(|err| DiffError::Catalog(err.to_string()))?;
        out.push(GeneratedSql {
            sql: format!(
                "INSERT INTO {TABLES_TABLE} (name, keys, auto_keys, is_memory, change_count) \
                 VALUES (?, ?, ?, ?, 0) ON CONFLICT(name) DO UPDATE SET keys = excluded.keys, \
                 auto_keys = excluded.auto_keys"
            ),
            params: vec![
                Value::Text(table),
                Value::Text(keys),
                Value::Text(auto_keys),
                Value::Integer(i64::from(is_memory)),
            ],
        });
        Ok(out)
    }

    /// Statements to run before a table-modify statement.
    ///
    /// SQLite refuses to drop or rename a column a trigger references, so
    /// renames and column changes drop the capture triggers first.
    #[must_use]
    pub fn before(&self, change: &SchemaChange) -> Vec<GeneratedSql> {
        match change {
            SchemaChange::Rename {
                from, ..
            } => drop_triggers(from),
            SchemaChange::Modify {
                table,
            } => drop_triggers(table),
            SchemaChange::Create {
                ..
            }
            | SchemaChange::Drop {
                ..
            } => Vec::new(),
        }
    }

    /// Statements to run after a table-modify statement succeeded.
    ///
    /// `is_memory` is recorded only when the registry row is new.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError`] when the catalog cannot be read or parsed, or
    /// when a created or altered table is missing from it.
    pub fn after(
        &self,
        change: &SchemaChange,
        catalog: &dyn SchemaCatalog,
        is_memory: bool,
    ) -> Result<Vec<GeneratedSql>, DiffError> {
        match change {
            SchemaChange::Create {
                table,
                temporary,
                definition,
            } => {
                if *temporary {
                    return Ok(Vec::new());
                }
                let resolved = match catalog.table_sql(table)? {
                    Some(sql) => definition_from_sql(&sql)?,
                    None => definition.clone().ok_or_else(|| DiffError::MissingTable(table.clone()))?,
                };
                self.create_table(&resolved, is_memory)
            }
            SchemaChange::Rename {
                from,
                to,
            } => {
                let mut out = drop_companions(from);
                out.push(GeneratedSql {
                    sql: format!("UPDATE {TABLES_TABLE} SET name = ? WHERE name = ?"),
                    params: vec![Value::Text(to.clone()), Value::Text(from.clone())],
                });
                let definition = current_definition(catalog, to)?;
                out.extend(self.create_table(&definition, is_memory)?);
                Ok(out)
            }
            SchemaChange::Modify {
                table,
            } => {
                let mut out = drop_companions(table);
                let definition = current_definition(catalog, table)?;
                out.extend(self.create_table(&definition, is_memory)?);
                Ok(out)
            }
            SchemaChange::Drop {
                table, ..
            } => {
                let mut out = drop_companions(table);
                out.push(GeneratedSql {
                    sql: format!("DELETE FROM {TABLES_TABLE} WHERE name = ?"),
                    params: vec![Value::Text(table.clone())],
                });
                Ok(out)
            }
        }
    }
}

// ============================================================================
// SECTION: DDL Builders
// ============================================================================

/// Reads and parses the catalog DDL of `table`, naming it `table`.
fn current_definition(catalog: &dyn SchemaCatalog, table: &str) -> Result<TableDefinition, DiffError> {
    let sql = catalog.table_sql(table)?.ok_or_else(|| DiffError::MissingTable(table.to_string()))?;
    let mut definition = definition_from_sql(&sql)?;
    definition.name = normalize(table);
    Ok(definition)
}

/// `DROP TRIGGER IF EXISTS` for the three capture triggers of `table`.
fn drop_triggers(table: &str) -> Vec<GeneratedSql> {
    [ChangeKind::Add, ChangeKind::Set, ChangeKind::Del]
        .iter()
        .map(|kind| {
            GeneratedSql::plain(format!(
                "DROP TRIGGER IF EXISTS {}",
                quote_identifier(&trigger_name(table, *kind))
            ))
        })
        .collect()
}

/// `DROP TABLE IF EXISTS` for the three companion tables of `table`.
fn drop_companions(table: &str) -> Vec<GeneratedSql> {
    [ChangeKind::Add, ChangeKind::Set, ChangeKind::Del]
        .iter()
        .map(|kind| {
            GeneratedSql::plain(format!(
                "DROP TABLE IF EXISTS {}",
                quote_identifier(&companion_table(table, *kind))
            ))
        })
        .collect()
}

/// Companion table DDL: source columns with declared types, keyed like the
/// source when it has a primary key.
fn companion_ddl(table: &str, kind: ChangeKind, definition: &TableDefinition) -> String {
    let mut parts: Vec<String> = definition
        .columns
        .iter()
        .map(|column| match &column.data_type {
            Some(data_type) => format!("{} {data_type}", quote_identifier(&column.name)),
            None => quote_identifier(&column.name),
        })
        .collect();
    if !definition.primary_keys.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", quoted_list(&definition.primary_keys)));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(&companion_table(table, kind)),
        parts.join(", ")
    )
}

/// Capture trigger DDL for one change kind.
fn trigger_ddl(table: &str, kind: ChangeKind, definition: &TableDefinition) -> String {
    let columns = definition.column_names();
    let column_list = quoted_list(&columns);
    let keyed = !definition.primary_keys.is_empty();
    let insert = if keyed { "INSERT OR REPLACE INTO" } else { "INSERT INTO" };
    let row = |alias: &str| {
        columns.iter().map(|c| format!("{alias}.{}", quote_identifier(c))).collect::<Vec<_>>().join(", ")
    };
    let (event, body) = match kind {
        ChangeKind::Add => (
            "INSERT",
            format!(
                "{insert} {} ({column_list}) VALUES ({});",
                quote_identifier(&companion_table(table, ChangeKind::Add)),
                row("NEW")
            ),
        ),
        ChangeKind::Set => {
            let key_changed = if keyed {
                let checks: Vec<String> = definition
                    .primary_keys
                    .iter()
                    .map(|k| format!("OLD.{0} IS NOT NEW.{0}", quote_identifier(k)))
                    .collect();
                format!(" WHERE {}", checks.join(" OR "))
            } else {
                String::new()
            };
            (
                "UPDATE",
                format!(
                    "{insert} {} ({column_list}) VALUES ({}); {insert} {} ({column_list}) SELECT {}{key_changed};",
                    quote_identifier(&companion_table(table, ChangeKind::Set)),
                    row("NEW"),
                    quote_identifier(&companion_table(table, ChangeKind::Del)),
                    row("OLD"),
                ),
            )
        }
        ChangeKind::Del => (
            "DELETE",
            format!(
                "{insert} {} ({column_list}) VALUES ({});",
                quote_identifier(&companion_table(table, ChangeKind::Del)),
                row("OLD")
            ),
        ),
    };
    format!(
        "CREATE TRIGGER {trigger} AFTER {event} ON {source} \
         WHEN (SELECT value FROM {VARIABLES_TABLE} WHERE name = '{is_diff}') = 1 BEGIN \
         {body} \
         UPDATE {VARIABLES_TABLE} SET value = value + 1 WHERE name = '{change_count}'; \
         UPDATE {TABLES_TABLE} SET change_count = change_count + 1 WHERE name = {name}; END",
        trigger = quote_identifier(&trigger_name(table, kind)),
        source = quote_identifier(table),
        is_diff = Variable::IsDiff.as_str(),
        change_count = Variable::ChangeCount.as_str(),
        name = quote_literal(table),
    )
}

/// Comma-separated quoted identifiers.
fn quoted_list(names: &[String]) -> String {
    names.iter().map(|n| quote_identifier(n)).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;
    use crate::statement::ColumnDefinition;

    fn keyless() -> TableDefinition {
        TableDefinition {
            name: "log".to_string(),
            temporary: false,
            columns: vec![
                ColumnDefinition {
                    name: "line".to_string(),
                    data_type: Some("TEXT".to_string()),
                },
                ColumnDefinition {
                    name: "at".to_string(),
                    data_type: None,
                },
            ],
            primary_keys: Vec::new(),
            auto_increment: Vec::new(),
        }
    }

    #[test]
    fn keyless_update_always_records_old_row() {
        let sql = SchemaDiffGenerator.create_table(&keyless(), false).unwrap();
        let update = sql.iter().find(|s| s.sql.contains("AFTER UPDATE")).unwrap();
        assert!(update.sql.contains("INSERT INTO \"log__del\" (\"line\", \"at\") SELECT OLD.\"line\", OLD.\"at\";"));
        assert!(!update.sql.contains("OR REPLACE"));
    }

    #[test]
    fn temporary_tables_get_no_capture() {
        let mut definition = keyless();
        definition.temporary = true;
        assert!(SchemaDiffGenerator.create_table(&definition, false).unwrap().is_empty());
    }
}
