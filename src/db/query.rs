//! Execution of model-written SQL.
//!
//! Queries are restricted to a single `SELECT`/`WITH` statement and decoded
//! dynamically into JSON, since their shape is unknown ahead of time.

use base64::Engine as _;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// More rows matched than were returned.
    pub truncated: bool,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Skip leading whitespace, `--` line comments and `/* */` block comments.
fn skip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(line) = rest.strip_prefix("--") {
            rest = line.find('\n').map_or("", |end| &line[end + 1..]).trim_start();
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block.find("*/").map_or("", |end| &block[end + 2..]).trim_start();
        } else {
            return rest;
        }
    }
}

/// Whether `sql` has a `;` outside quoted literals and identifiers.
fn has_statement_separator(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            // a doubled quote closes and reopens, which nets out the same
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
            None if c == '[' => quote = Some(']'),
            None if c == ';' => return true,
            None => {}
        }
    }
    false
}

/// Normalize a statement and reject anything but a single read query.
pub fn validate_readonly(sql: &str) -> AppResult<&str> {
    let statement = skip_leading_comments(sql).trim_end().trim_end_matches(';').trim_end();
    if statement.is_empty() {
        return Err(AppError::InvalidRequest("empty SQL query".to_string()));
    }
    if has_statement_separator(statement) {
        return Err(AppError::InvalidRequest(
            "only a single SQL statement is allowed".to_string(),
        ));
    }

    let keyword = statement
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if keyword != "SELECT" && keyword != "WITH" {
        return Err(AppError::InvalidRequest(format!(
            "only SELECT queries are allowed, got {}",
            keyword
        )));
    }
    Ok(statement)
}

fn decode_value(row: &SqliteRow, index: usize) -> AppResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" | "NUMERIC" => Value::from(row.try_get::<f64, _>(index)?),
        "BLOB" => Value::String(
            base64::engine::general_purpose::STANDARD.encode(row.try_get::<Vec<u8>, _>(index)?),
        ),
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

/// Run a read-only query, returning at most `max_rows` rows.
pub async fn run_readonly(pool: &SqlitePool, sql: &str, max_rows: usize) -> AppResult<QueryResult> {
    let statement = validate_readonly(sql)?;
    debug!(sql = %statement, "Running analysis query");

    // Preparing first gives column names even when no rows match.
    let prepared = pool.prepare(statement).await?;
    let columns: Vec<String> = prepared
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let mut result = QueryResult {
        columns,
        ..Default::default()
    };

    let mut stream = sqlx::query(statement).fetch(pool);
    while let Some(row) = stream.try_next().await? {
        if result.rows.len() >= max_rows {
            result.truncated = true;
            break;
        }
        let values = (0..row.len())
            .map(|i| decode_value(&row, i))
            .collect::<AppResult<Vec<_>>>()?;
        result.rows.push(values);
    }

    info!(
        rows = result.rows.len(),
        columns = result.columns.len(),
        truncated = result.truncated,
        "Analysis query finished"
    );
    Ok(result)
}
