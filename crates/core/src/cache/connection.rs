//! SQLite storage engine with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running schema setup.
//! Writes are serialized on one owned writer connection; file-backed
//! databases get a second, query-only connection so reads do not queue
//! behind writes.

use std::path::Path;
use std::time::Duration;

use super::engine::{Cursor, Query, Row, Selection, StorageEngine, TransactionScope};
use super::{migrations, sql};
use crate::Error;
use tokio_rusqlite::Connection;

/// SQLite-backed [`StorageEngine`].
///
/// Wraps tokio-rusqlite connections that run database operations
/// on background threads.
#[derive(Clone, Debug)]
pub struct SqliteEngine {
    pub(crate) writer: Connection,
    reader: Option<Connection>,
}

impl SqliteEngine {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and creates or recreates the schema as needed.
    pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let writer = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        configure(&writer, busy_timeout).await?;
        migrations::run(&writer).await?;

        let reader = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        configure(&reader, busy_timeout).await?;
        reader
            .call(|conn| conn.execute_batch("PRAGMA query_only=ON;"))
            .await
            .map_err(Error::Database)?;

        tracing::debug!(path = %path.display(), "Opened message cache database");
        Ok(Self { writer, reader: Some(reader) })
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases. Reads share the
    /// writer connection since a second connection would see a different
    /// database.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let writer = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        configure(&writer, Duration::ZERO).await?;
        migrations::run(&writer).await?;
        Ok(Self { writer, reader: None })
    }

    fn read_connection(&self) -> &Connection {
        self.reader.as_ref().unwrap_or(&self.writer)
    }
}

async fn configure(conn: &Connection, busy_timeout: Duration) -> Result<(), Error> {
    let busy_ms = busy_timeout.as_millis();
    conn.call(move |conn| {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout={busy_ms};"
        ))?;
        Ok(())
    })
    .await
    .map_err(Error::Database)
}

#[async_trait::async_trait]
impl StorageEngine for SqliteEngine {
    async fn query(&self, table: &str, query: Query) -> Result<Cursor, Error> {
        let table = table.to_string();
        self.read_connection()
            .call(move |conn| -> Result<Cursor, Error> { sql::query(conn, &table, &query) })
            .await
            .map_err(Error::from)
    }

    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<i64, Error> {
        let table = table.to_string();
        self.writer
            .call(move |conn| -> Result<i64, Error> { sql::insert_or_replace(conn, &table, &row) })
            .await
            .map_err(Error::from)
    }

    async fn update(&self, table: &str, values: Row, selection: Selection) -> Result<u64, Error> {
        let table = table.to_string();
        self.writer
            .call(move |conn| -> Result<u64, Error> { sql::update(conn, &table, &values, &selection) })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, table: &str, selection: Selection) -> Result<u64, Error> {
        let table = table.to_string();
        self.writer
            .call(move |conn| -> Result<u64, Error> { sql::delete(conn, &table, &selection) })
            .await
            .map_err(Error::from)
    }

    async fn count(&self, table: &str, selection: Selection) -> Result<u64, Error> {
        let table = table.to_string();
        self.read_connection()
            .call(move |conn| -> Result<u64, Error> { sql::count(conn, &table, &selection) })
            .await
            .map_err(Error::from)
    }

    async fn transaction<T, F>(&self, work: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn TransactionScope) -> Result<T, Error> + Send + 'static,
    {
        self.writer
            .call(move |conn| -> Result<T, Error> {
                let tx = conn.transaction()?;
                let mut scope = sql::SqliteScope::new(&tx);
                let output = work(&mut scope)?;
                if scope.successful {
                    tx.commit()?;
                } else {
                    tracing::debug!("Transaction not marked successful, rolling back");
                    tx.rollback()?;
                }
                Ok(output)
            })
            .await
            .map_err(Error::from)
    }

    async fn close(self) -> Result<(), Error> {
        if let Some(reader) = self.reader {
            reader.close().await.map_err(|e| Error::Storage(e.to_string()))?;
        }
        self.writer.close().await.map_err(|e| Error::Storage(e.to_string()))?;
        tracing::debug!("Closed message cache database");
        Ok(())
    }
}
