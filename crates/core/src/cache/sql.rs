//! SQL rendering for engine requests.
//!
//! Turns [`Query`], [`Selection`] and [`Row`] values into parameterized
//! statements and runs them on a plain `rusqlite` connection. Both the
//! auto-commit path and transaction scopes go through these functions.

use super::engine::{Cursor, Direction, OrderBy, Query, Row, Selection, TransactionScope, check_identifier};
use crate::Error;
use tokio_rusqlite::rusqlite::{self, params_from_iter, types::Value};

/// Render a selection on `table` into a WHERE clause, appending bound values
/// to `params`.
pub(crate) fn where_clause(table: &str, selection: &Selection, params: &mut Vec<Value>) -> Result<String, Error> {
    let clause = match selection {
        Selection::All => "1".to_string(),
        Selection::Eq(column, value) => {
            params.push(value.clone());
            format!("{} = ?", check_identifier(column)?)
        }
        Selection::In(column, values) if values.is_empty() => {
            check_identifier(column)?;
            "0".to_string()
        }
        Selection::NotIn(column, values) if values.is_empty() => {
            check_identifier(column)?;
            "1".to_string()
        }
        Selection::In(column, values) => {
            params.extend(values.iter().cloned());
            format!("{} IN ({})", check_identifier(column)?, placeholders(values.len()))
        }
        Selection::NotIn(column, values) => {
            params.extend(values.iter().cloned());
            format!("{} NOT IN ({})", check_identifier(column)?, placeholders(values.len()))
        }
        Selection::And(inner) if inner.is_empty() => "1".to_string(),
        Selection::And(inner) => {
            let parts = inner
                .iter()
                .map(|s| where_clause(table, s, params).map(|c| format!("({c})")))
                .collect::<Result<Vec<_>, _>>()?;
            parts.join(" AND ")
        }
        Selection::NotInRanked { column, order_by, limit } => {
            let column = check_identifier(column)?;
            let mut ranked = format!("SELECT {column} FROM {}", check_identifier(table)?);
            if !order_by.is_empty() {
                ranked.push_str(" ORDER BY ");
                ranked.push_str(&order_clause(order_by)?);
            }
            ranked.push_str(" LIMIT ?");
            params.push(limit_value(*limit));
            format!("{column} NOT IN ({ranked})")
        }
    };
    Ok(clause)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn order_clause(order_by: &[OrderBy]) -> Result<String, Error> {
    let order = order_by
        .iter()
        .map(|o| {
            let dir = match o.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            check_identifier(&o.column).map(|c| format!("{c} {dir}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(order.join(", "))
}

fn limit_value(limit: u64) -> Value {
    Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))
}

/// Render a full SELECT statement.
pub(crate) fn select_statement(table: &str, query: &Query) -> Result<(String, Vec<Value>), Error> {
    let mut params = Vec::new();
    let columns = match &query.columns {
        Some(cols) if !cols.is_empty() => cols
            .iter()
            .map(|c| check_identifier(c).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?
            .join(", "),
        _ => "*".to_string(),
    };

    let mut sql = format!("SELECT {columns} FROM {}", check_identifier(table)?);
    sql.push_str(" WHERE ");
    sql.push_str(&where_clause(table, &query.selection, &mut params)?);

    if let Some(group_by) = &query.group_by {
        sql.push_str(" GROUP BY ");
        sql.push_str(check_identifier(group_by)?);
        if let Some(having) = &query.having {
            sql.push_str(" HAVING ");
            sql.push_str(&where_clause(table, having, &mut params)?);
        }
    }

    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_clause(&query.order_by)?);
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(limit_value(limit));
    }

    Ok((sql, params))
}

pub(crate) fn query(conn: &rusqlite::Connection, table: &str, query: &Query) -> Result<Cursor, Error> {
    let (sql, params) = select_statement(table, query)?;
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, name)| Ok((name.clone(), row.get::<_, Value>(i)?)))
                .collect::<Result<Row, rusqlite::Error>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cursor::new(columns, rows))
}

pub(crate) fn insert_or_replace(conn: &rusqlite::Connection, table: &str, row: &Row) -> Result<i64, Error> {
    if row.is_empty() {
        return Err(Error::InvalidInput(format!("empty row for insert into {table}")));
    }
    let columns = row.columns().map(check_identifier).collect::<Result<Vec<_>, _>>()?;
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        check_identifier(table)?,
        columns.join(", "),
        placeholders(columns.len())
    );
    conn.execute(&sql, params_from_iter(row.iter().map(|(_, v)| v)))?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn update(conn: &rusqlite::Connection, table: &str, values: &Row, selection: &Selection) -> Result<u64, Error> {
    if values.is_empty() {
        return Err(Error::InvalidInput(format!("no values to update in {table}")));
    }
    let mut params: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
    let assignments = values
        .columns()
        .map(|c| check_identifier(c).map(|c| format!("{c} = ?")))
        .collect::<Result<Vec<_>, _>>()?;
    let clause = where_clause(table, selection, &mut params)?;
    let sql = format!("UPDATE {} SET {} WHERE {clause}", check_identifier(table)?, assignments.join(", "));
    let count = conn.execute(&sql, params_from_iter(params.iter()))?;
    Ok(count as u64)
}

/// Render a DELETE statement.
pub(crate) fn delete_statement(table: &str, selection: &Selection) -> Result<(String, Vec<Value>), Error> {
    let mut params = Vec::new();
    let clause = where_clause(table, selection, &mut params)?;
    Ok((format!("DELETE FROM {} WHERE {clause}", check_identifier(table)?), params))
}

pub(crate) fn delete(conn: &rusqlite::Connection, table: &str, selection: &Selection) -> Result<u64, Error> {
    let (sql, params) = delete_statement(table, selection)?;
    let count = conn.execute(&sql, params_from_iter(params.iter()))?;
    Ok(count as u64)
}

pub(crate) fn count(conn: &rusqlite::Connection, table: &str, selection: &Selection) -> Result<u64, Error> {
    let mut params = Vec::new();
    let clause = where_clause(table, selection, &mut params)?;
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {clause}", check_identifier(table)?);
    let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Transaction scope over an open SQLite transaction.
pub(crate) struct SqliteScope<'c> {
    conn: &'c rusqlite::Connection,
    pub(crate) successful: bool,
}

impl<'c> SqliteScope<'c> {
    pub(crate) fn new(conn: &'c rusqlite::Connection) -> Self {
        Self { conn, successful: false }
    }
}

impl TransactionScope for SqliteScope<'_> {
    fn query(&mut self, table: &str, q: &Query) -> Result<Cursor, Error> {
        query(self.conn, table, q)
    }

    fn insert_or_replace(&mut self, table: &str, row: &Row) -> Result<i64, Error> {
        insert_or_replace(self.conn, table, row)
    }

    fn update(&mut self, table: &str, values: &Row, selection: &Selection) -> Result<u64, Error> {
        update(self.conn, table, values, selection)
    }

    fn delete(&mut self, table: &str, selection: &Selection) -> Result<u64, Error> {
        delete(self.conn, table, selection)
    }

    fn mark_successful(&mut self) {
        self.successful = true;
    }
}
