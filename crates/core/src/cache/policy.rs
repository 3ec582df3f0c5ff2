//! Eviction of the oldest messages beyond the cache limit.

use super::engine::{Direction, OrderBy, Query, Selection, TransactionScope};
use super::limit::CacheLimit;
use super::schema::{COLUMN_ROW_ID, messages};
use crate::Error;

/// Ranking used for "newest first": creation time, then insertion order.
fn newest_order() -> Vec<OrderBy> {
    vec![
        OrderBy { column: messages::CREATED.to_string(), direction: Direction::Desc },
        OrderBy { column: COLUMN_ROW_ID.to_string(), direction: Direction::Desc },
    ]
}

pub(crate) fn newest_first(mut query: Query) -> Query {
    query.order_by.extend(newest_order());
    query
}

/// Delete every message that is not among the `limit` newest.
///
/// Runs inside the caller's transaction so the insert and the trim commit
/// together. The ranking stays inside the engine as a single delete, so the
/// cost does not depend on how many rows are kept. Returns the number of
/// evicted rows; an unbounded limit evicts nothing.
pub fn trim(scope: &mut dyn TransactionScope, limit: CacheLimit) -> Result<u64, Error> {
    let CacheLimit::Bounded(keep) = limit else {
        return Ok(0);
    };

    let stale = Selection::NotInRanked {
        column: messages::ID.to_string(),
        order_by: newest_order(),
        limit: u64::from(keep),
    };
    let evicted = scope.delete(messages::TABLE, &stale)?;
    if evicted > 0 {
        tracing::debug!(evicted, limit = keep, "Trimmed message cache");
    }
    Ok(evicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::connection::SqliteEngine;
    use crate::cache::engine::{Row, StorageEngine};
    use crate::cache::memory::MemoryEngine;

    async fn seed<E: StorageEngine>(db: &E, rows: &[(&str, i64)]) {
        for (id, created) in rows {
            let row = Row::new().with(messages::ID, id.to_string()).with(messages::CREATED, *created);
            db.insert_or_replace(messages::TABLE, row).await.unwrap();
        }
    }

    async fn trim_with<E: StorageEngine>(db: &E, limit: CacheLimit) -> u64 {
        db.transaction(move |scope| {
            let evicted = trim(scope, limit)?;
            scope.mark_successful();
            Ok(evicted)
        })
        .await
        .unwrap()
    }

    async fn ids<E: StorageEngine>(db: &E) -> Vec<String> {
        db.query(messages::TABLE, newest_first(Query::all()))
            .await
            .unwrap()
            .filter_map(|r| r.get_text(messages::ID).map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_trim_keeps_newest() {
        let db = MemoryEngine::new();
        seed(&db, &[("a", 100), ("b", 200), ("c", 300)]).await;
        assert_eq!(trim_with(&db, CacheLimit::Bounded(2)).await, 1);
        assert_eq!(ids(&db).await, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_trim_ties_prefer_latest_insert() {
        let db = MemoryEngine::new();
        seed(&db, &[("a", 100), ("b", 100), ("c", 100)]).await;
        trim_with(&db, CacheLimit::Bounded(2)).await;
        assert_eq!(ids(&db).await, vec!["c", "b"]);

        let db = SqliteEngine::open_in_memory().await.unwrap();
        seed(&db, &[("a", 100), ("b", 100), ("c", 100)]).await;
        trim_with(&db, CacheLimit::Bounded(2)).await;
        assert_eq!(ids(&db).await, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_trim_unbounded_is_noop() {
        let db = MemoryEngine::new();
        seed(&db, &[("a", 1), ("b", 2), ("c", 3)]).await;
        assert_eq!(trim_with(&db, CacheLimit::Unbounded).await, 0);
        assert_eq!(ids(&db).await.len(), 3);
    }

    #[tokio::test]
    async fn test_trim_under_limit_evicts_nothing() {
        let db = MemoryEngine::new();
        seed(&db, &[("a", 1)]).await;
        assert_eq!(trim_with(&db, CacheLimit::Bounded(2)).await, 0);
    }

    /// More kept rows than SQLite allows bound variables in one statement.
    #[tokio::test]
    async fn test_trim_with_large_limit_on_sqlite() {
        const ROWS: i64 = 251_000;
        let db = SqliteEngine::open_in_memory().await.unwrap();
        db.transaction(|scope| {
            for i in 0..ROWS {
                let row = Row::new().with(messages::ID, format!("m{i}")).with(messages::CREATED, i);
                scope.insert_or_replace(messages::TABLE, &row)?;
            }
            scope.mark_successful();
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(trim_with(&db, CacheLimit::Bounded(1_000_000)).await, 0);
        assert_eq!(trim_with(&db, CacheLimit::Bounded(250_500)).await, 500);
        assert_eq!(db.count(messages::TABLE, Selection::All).await.unwrap(), 250_500);

        let oldest_kept = Query::all().filter(Selection::eq(messages::ID, "m500".to_string()));
        assert_eq!(db.query(messages::TABLE, oldest_kept).await.unwrap().len(), 1);
    }
}
