// crates/mirrordb-store-sqlite/src/value.rs
// ============================================================================
// Module: Value Conversion
// Description: Conversions between mirrordb values and SQLite values.
// Purpose: Bind parameters and read rows without loss.
// Dependencies: mirrordb-core, rusqlite
// ============================================================================

//! ## Overview
//! Parameters bind positionally; rows are read column by column into
//! [`Value`]s. Text that is not valid UTF-8 is decoded lossily.

// ============================================================================
// SECTION: Imports
// ============================================================================

use mirrordb_core::RowSet;
use mirrordb_core::Value;
use rusqlite::Connection;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use rusqlite::types::ValueRef;

use crate::error::SqliteStoreError;

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Converts a mirrordb value into an owned `SQLite` value.
#[must_use]
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(number) => SqlValue::Integer(*number),
        Value::Real(number) => SqlValue::Real(*number),
        Value::Text(text) => SqlValue::Text(text.clone()),
        Value::Blob(bytes) => SqlValue::Blob(bytes.clone()),
    }
}

/// Converts a borrowed `SQLite` value into a mirrordb value.
#[must_use]
pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::Integer(number),
        ValueRef::Real(number) => Value::Real(number),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Executes one statement with positional parameters.
///
/// Returns the rows when the statement produces columns (queries and
/// `RETURNING` clauses), otherwise `None`.
///
/// # Errors
///
/// Returns [`SqliteStoreError::Db`] with the engine message on failure.
pub fn execute(
    connection: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<Option<RowSet>, SqliteStoreError> {
    let mut statement =
        connection.prepare(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let bound = params_from_iter(params.iter().map(to_sql));
    if statement.column_count() == 0 {
        statement.execute(bound).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        return Ok(None);
    }
    let columns: Vec<String> = statement.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();
    let mut rows = statement.query(bound).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(|err| SqliteStoreError::Db(err.to_string()))? {
        let mut values = Vec::with_capacity(width);
        for index in 0 .. width {
            let value = row.get_ref(index).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            values.push(from_sql(value));
        }
        out.push(values);
    }
    Ok(Some(RowSet {
        columns,
        rows: out,
    }))
}

/// Executes a query and returns its rows, empty when it produced no columns.
///
/// # Errors
///
/// Returns [`SqliteStoreError::Db`] with the engine message on failure.
pub fn query(
    connection: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<RowSet, SqliteStoreError> {
    Ok(execute(connection, sql, params)?.unwrap_or_default())
}
