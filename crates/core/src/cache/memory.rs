//! In-memory storage engine.
//!
//! Mirrors the SQLite engine's observable behavior over [`TableSpec`]
//! descriptions: autoincrement surrogate keys, replace-on-conflict for unique
//! columns, column defaults and NOT NULL checks. Transactions work on a copy
//! of the tables that is swapped in on commit.

use std::collections::BTreeMap;

use super::engine::{Cursor, Direction, OrderBy, Query, Row, Selection, StorageEngine, TransactionScope, compare_values};
use super::schema::{self, COLUMN_ROW_ID, TableSpec};
use crate::Error;
use tokio::sync::Mutex;
use tokio_rusqlite::rusqlite::types::Value;

#[derive(Debug, Clone)]
struct MemoryTable {
    spec: TableSpec,
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: BTreeMap<String, MemoryTable>,
}

/// [`StorageEngine`] keeping every table in process memory.
#[derive(Debug)]
pub struct MemoryEngine {
    state: Mutex<MemoryState>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Engine with the message and preference tables.
    pub fn new() -> Self {
        Self::with_tables([schema::in_app_messages(), schema::preference_table()])
    }

    pub fn with_tables(tables: impl IntoIterator<Item = TableSpec>) -> Self {
        let tables = tables
            .into_iter()
            .map(|spec| (spec.name.to_string(), MemoryTable { spec, rows: Vec::new(), next_id: 1 }))
            .collect();
        Self { state: Mutex::new(MemoryState { tables }) }
    }
}

impl MemoryState {
    fn table(&self, name: &str) -> Result<&MemoryTable, Error> {
        self.tables.get(name).ok_or_else(|| Error::Storage(format!("no such table: {name}")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, Error> {
        self.tables.get_mut(name).ok_or_else(|| Error::Storage(format!("no such table: {name}")))
    }

    fn query(&self, table: &str, query: &Query) -> Result<Cursor, Error> {
        let table = self.table(table)?;
        for column in query.selection.columns() {
            table.check_column(column)?;
        }

        let selection = table.resolve(&query.selection);
        let mut rows: Vec<&Row> = table.rows.iter().filter(|r| selection.matches(r)).collect();

        if let Some(group_by) = &query.group_by {
            table.check_column(group_by)?;
            let mut seen: Vec<Value> = Vec::new();
            rows.retain(|row| {
                let key = row.get(group_by).cloned().unwrap_or(Value::Null);
                if seen.iter().any(|k| compare_values(k, &key).is_eq()) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            });
            if let Some(having) = &query.having {
                let having = table.resolve(having);
                rows.retain(|row| having.matches(row));
            }
        }

        for order in &query.order_by {
            table.check_column(&order.column)?;
        }
        sort_rows(&mut rows, &query.order_by);

        if let Some(limit) = query.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        let columns: Vec<String> = match &query.columns {
            Some(cols) if !cols.is_empty() => {
                for column in cols {
                    table.check_column(column)?;
                }
                cols.clone()
            }
            _ => table.spec.column_names().into_iter().map(str::to_string).collect(),
        };

        let projected = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect::<Row>()
            })
            .collect();

        Ok(Cursor::new(columns, projected))
    }

    fn insert_or_replace(&mut self, table: &str, row: &Row) -> Result<i64, Error> {
        if row.is_empty() {
            return Err(Error::InvalidInput(format!("empty row for insert into {table}")));
        }
        let table = self.table_mut(table)?;

        let mut stored = Row::new();
        for column in &table.spec.columns {
            let value = row.get(column.name).cloned().unwrap_or_else(|| column.default.clone());
            stored.put(column.name, value);
        }
        for name in row.columns() {
            table.check_column(name)?;
        }
        table.check_not_null(&stored)?;

        let conflicts: Vec<(&'static str, Value)> = table
            .spec
            .columns
            .iter()
            .filter(|c| c.unique)
            .filter_map(|c| stored.get(c.name).map(|v| (c.name, v.clone())))
            .collect();
        table.rows.retain(|existing| {
            !conflicts
                .iter()
                .any(|(name, value)| existing.get(name).is_some_and(|v| compare_values(v, value).is_eq()))
        });

        let id = match row.get(COLUMN_ROW_ID) {
            Some(Value::Integer(id)) => *id,
            _ => table.next_id,
        };
        table.next_id = table.next_id.max(id + 1);

        let mut full = Row::new().with(COLUMN_ROW_ID, id);
        for (name, value) in stored.iter() {
            full.put(name, value.clone());
        }
        table.rows.push(full);
        Ok(id)
    }

    fn update(&mut self, table: &str, values: &Row, selection: &Selection) -> Result<u64, Error> {
        if values.is_empty() {
            return Err(Error::InvalidInput(format!("no values to update in {table}")));
        }
        let table = self.table_mut(table)?;
        for name in values.columns().chain(selection.columns()) {
            table.check_column(name)?;
        }
        let selection = table.resolve(selection);

        let mut updated = Vec::new();
        for (index, row) in table.rows.iter().enumerate() {
            if selection.matches(row) {
                let mut next = row.clone();
                for (name, value) in values.iter() {
                    next.put(name, value.clone());
                }
                table.check_not_null(&next)?;
                updated.push((index, next));
            }
        }

        let count = updated.len() as u64;
        for (index, row) in updated {
            table.rows[index] = row;
        }
        Ok(count)
    }

    fn delete(&mut self, table: &str, selection: &Selection) -> Result<u64, Error> {
        let table = self.table_mut(table)?;
        for name in selection.columns() {
            table.check_column(name)?;
        }
        let selection = table.resolve(selection);
        let before = table.rows.len();
        table.rows.retain(|row| !selection.matches(row));
        Ok((before - table.rows.len()) as u64)
    }

    fn count(&self, table: &str, selection: &Selection) -> Result<u64, Error> {
        let table = self.table(table)?;
        for name in selection.columns() {
            table.check_column(name)?;
        }
        let selection = table.resolve(selection);
        Ok(table.rows.iter().filter(|row| selection.matches(row)).count() as u64)
    }
}

/// Stable sort by each key in turn, missing values as NULL.
fn sort_rows(rows: &mut [&Row], order_by: &[OrderBy]) {
    rows.sort_by(|a, b| {
        order_by
            .iter()
            .map(|o| {
                let ord = compare_values(
                    a.get(&o.column).unwrap_or(&Value::Null),
                    b.get(&o.column).unwrap_or(&Value::Null),
                );
                match o.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

impl MemoryTable {
    /// Rewrite ranked selections into value lists over the current rows.
    fn resolve(&self, selection: &Selection) -> Selection {
        match selection {
            Selection::NotInRanked { column, order_by, limit } => {
                let mut rows: Vec<&Row> = self.rows.iter().collect();
                sort_rows(&mut rows, order_by);
                let kept = rows
                    .into_iter()
                    .take(usize::try_from(*limit).unwrap_or(usize::MAX))
                    .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
                    .collect();
                Selection::NotIn(column.clone(), kept)
            }
            Selection::And(inner) => Selection::And(inner.iter().map(|s| self.resolve(s)).collect()),
            other => other.clone(),
        }
    }

    fn check_column(&self, name: &str) -> Result<(), Error> {
        if name == COLUMN_ROW_ID || self.spec.column(name).is_some() {
            Ok(())
        } else {
            Err(Error::Storage(format!("table {} has no column named {name}", self.spec.name)))
        }
    }

    fn check_not_null(&self, row: &Row) -> Result<(), Error> {
        for column in self.spec.columns.iter().filter(|c| c.not_null) {
            if matches!(row.get(column.name), None | Some(Value::Null)) {
                return Err(Error::Storage(format!("NOT NULL constraint failed: {}.{}", self.spec.name, column.name)));
            }
        }
        Ok(())
    }
}

struct MemoryScope {
    state: MemoryState,
    successful: bool,
}

impl TransactionScope for MemoryScope {
    fn query(&mut self, table: &str, query: &Query) -> Result<Cursor, Error> {
        self.state.query(table, query)
    }

    fn insert_or_replace(&mut self, table: &str, row: &Row) -> Result<i64, Error> {
        self.state.insert_or_replace(table, row)
    }

    fn update(&mut self, table: &str, values: &Row, selection: &Selection) -> Result<u64, Error> {
        self.state.update(table, values, selection)
    }

    fn delete(&mut self, table: &str, selection: &Selection) -> Result<u64, Error> {
        self.state.delete(table, selection)
    }

    fn mark_successful(&mut self) {
        self.successful = true;
    }
}

#[async_trait::async_trait]
impl StorageEngine for MemoryEngine {
    async fn query(&self, table: &str, query: Query) -> Result<Cursor, Error> {
        self.state.lock().await.query(table, &query)
    }

    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<i64, Error> {
        self.state.lock().await.insert_or_replace(table, &row)
    }

    async fn update(&self, table: &str, values: Row, selection: Selection) -> Result<u64, Error> {
        self.state.lock().await.update(table, &values, &selection)
    }

    async fn delete(&self, table: &str, selection: Selection) -> Result<u64, Error> {
        self.state.lock().await.delete(table, &selection)
    }

    async fn count(&self, table: &str, selection: Selection) -> Result<u64, Error> {
        self.state.lock().await.count(table, &selection)
    }

    async fn transaction<T, F>(&self, work: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn TransactionScope) -> Result<T, Error> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        let mut scope = MemoryScope { state: state.clone(), successful: false };
        let output = work(&mut scope)?;
        if scope.successful {
            *state = scope.state;
        } else {
            tracing::debug!("Transaction not marked successful, rolling back");
        }
        Ok(output)
    }

    async fn close(self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::schema::messages;

    fn message_row(id: &str, status: &str, created: i64) -> Row {
        Row::new()
            .with(messages::ID, id.to_string())
            .with(messages::STATUS, status.to_string())
            .with(messages::CREATED, created)
    }

    #[tokio::test]
    async fn test_defaults_and_surrogate_keys() {
        let db = MemoryEngine::new();
        let first = db.insert_or_replace(messages::TABLE, message_row("m1", "NEW", 1)).await.unwrap();
        let second = db.insert_or_replace(messages::TABLE, message_row("m2", "NEW", 2)).await.unwrap();
        assert_eq!((first, second), (1, 2));

        let rows: Vec<Row> = db.query(messages::TABLE, Query::all()).await.unwrap().collect();
        assert_eq!(rows[0].get_text(messages::TAGS), Some(""));
        assert_eq!(rows[0].get_integer(messages::TTL), Some(0));
        assert_eq!(rows[0].get_integer(COLUMN_ROW_ID), Some(1));
    }

    #[tokio::test]
    async fn test_replace_assigns_new_surrogate_key() {
        let db = MemoryEngine::new();
        db.insert_or_replace(messages::TABLE, message_row("m1", "NEW", 1)).await.unwrap();
        db.insert_or_replace(messages::TABLE, message_row("m2", "NEW", 1)).await.unwrap();
        let replaced = db.insert_or_replace(messages::TABLE, message_row("m1", "READ", 3)).await.unwrap();
        assert_eq!(replaced, 3);

        let rows: Vec<Row> = db.query(messages::TABLE, Query::all()).await.unwrap().collect();
        assert_eq!(rows.len(), 2);
        let m1 = rows.iter().find(|r| r.get_text(messages::ID) == Some("m1")).unwrap();
        assert_eq!(m1.get_text(messages::STATUS), Some("READ"));
    }

    #[tokio::test]
    async fn test_order_limit_and_projection() {
        let db = MemoryEngine::new();
        for (id, created) in [("a", 100), ("b", 300), ("c", 200)] {
            db.insert_or_replace(messages::TABLE, message_row(id, "NEW", created)).await.unwrap();
        }

        let query = Query::all()
            .columns([messages::ID])
            .order_by(messages::CREATED, Direction::Desc)
            .limit(2);
        let ids: Vec<String> = db
            .query(messages::TABLE, query)
            .await
            .unwrap()
            .filter_map(|r| r.get_text(messages::ID).map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_group_by_having() {
        let db = MemoryEngine::new();
        db.insert_or_replace(messages::TABLE, message_row("a", "NEW", 1)).await.unwrap();
        db.insert_or_replace(messages::TABLE, message_row("b", "NEW", 2)).await.unwrap();
        db.insert_or_replace(messages::TABLE, message_row("c", "READ", 3)).await.unwrap();

        let grouped = db
            .query(messages::TABLE, Query::all().group_by(messages::STATUS))
            .await
            .unwrap();
        assert_eq!(grouped.len(), 2);

        let having = Query::all()
            .group_by(messages::STATUS)
            .having(Selection::eq(messages::STATUS, "READ".to_string()));
        assert_eq!(db.query(messages::TABLE, having).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_counts() {
        let db = MemoryEngine::new();
        db.insert_or_replace(messages::TABLE, message_row("a", "NEW", 1)).await.unwrap();
        db.insert_or_replace(messages::TABLE, message_row("b", "NEW", 2)).await.unwrap();

        let values = Row::new().with(messages::STATUS, "READ".to_string());
        let updated = db
            .update(messages::TABLE, values, Selection::eq(messages::ID, "a".to_string()))
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let missing = db
            .delete(messages::TABLE, Selection::eq(messages::ID, "zzz".to_string()))
            .await
            .unwrap();
        assert_eq!(missing, 0);
        assert_eq!(db.count(messages::TABLE, Selection::eq(messages::STATUS, "READ".to_string())).await.unwrap(), 1);
        assert_eq!(db.delete(messages::TABLE, Selection::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ranked_delete_keeps_top_rows() {
        let db = MemoryEngine::new();
        for (id, created) in [("a", 100), ("b", 300), ("c", 200), ("d", 300)] {
            db.insert_or_replace(messages::TABLE, message_row(id, "NEW", created)).await.unwrap();
        }

        let ranked = Selection::NotInRanked {
            column: messages::ID.to_string(),
            order_by: vec![
                OrderBy { column: messages::CREATED.to_string(), direction: Direction::Desc },
                OrderBy { column: COLUMN_ROW_ID.to_string(), direction: Direction::Desc },
            ],
            limit: 2,
        };
        assert_eq!(db.count(messages::TABLE, ranked.clone()).await.unwrap(), 2);
        assert_eq!(db.delete(messages::TABLE, ranked).await.unwrap(), 2);

        let mut ids: Vec<String> = db
            .query(messages::TABLE, Query::all())
            .await
            .unwrap()
            .filter_map(|r| r.get_text(messages::ID).map(str::to_string))
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[tokio::test]
    async fn test_not_null_and_unknown_column() {
        let db = MemoryEngine::new();
        let no_id = Row::new().with(messages::STATUS, "NEW".to_string());
        assert!(db.insert_or_replace(messages::TABLE, no_id).await.unwrap_err().is_storage_failure());

        let bogus = message_row("a", "NEW", 1).with("bogus", 1i64);
        assert!(db.insert_or_replace(messages::TABLE, bogus).await.unwrap_err().is_storage_failure());
    }

    #[tokio::test]
    async fn test_transaction_rollback_and_commit() {
        let db = MemoryEngine::new();
        db.transaction(|scope| scope.insert_or_replace(messages::TABLE, &message_row("a", "NEW", 1)))
            .await
            .unwrap();
        assert_eq!(db.query(messages::TABLE, Query::all()).await.unwrap().len(), 0);

        db.transaction(|scope| {
            scope.insert_or_replace(messages::TABLE, &message_row("a", "NEW", 1))?;
            scope.mark_successful();
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(db.query(messages::TABLE, Query::all()).await.unwrap().len(), 1);
    }
}
