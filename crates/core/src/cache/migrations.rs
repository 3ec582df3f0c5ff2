//! Database schema management.
//!
//! The message table has no migration path: when the stored schema version is
//! older than [`SCHEMA_VERSION`] the table is dropped and recreated, losing
//! every cached message. The preference table sits outside the versioned
//! schema and is only ever created.

use super::Error;
use super::schema::messages;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Current version of the message table layout.
pub const SCHEMA_VERSION: i64 = 1;

const MESSAGES_SQL: &str = include_str!("../../migrations/in_app_messages.sql");
const PREFERENCES_SQL: &str = include_str!("../../migrations/preferences.sql");

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns an error if the SQL fails or the database was written by a newer
/// schema version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> { apply(conn, SCHEMA_VERSION) })
        .await
        .map_err(Error::from)
}

/// Apply the schema for `target` inside one transaction.
pub(crate) fn apply(conn: &mut rusqlite::Connection, target: i64) -> Result<(), Error> {
    let tx = conn.transaction()?;

    tx.execute(
        "CREATE TABLE IF NOT EXISTS _schema (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    tx.execute_batch(PREFERENCES_SQL)?;

    let current: i64 = tx.query_row("SELECT COALESCE(MAX(version), 0) FROM _schema", [], |row| row.get(0))?;

    if current > target {
        return Err(Error::MigrationFailed(format!("database schema v{current} is newer than supported v{target}")));
    }

    if current == 0 {
        tx.execute_batch(MESSAGES_SQL)?;
        tracing::info!(version = target, "Created message cache schema");
    } else if current < target {
        tracing::info!(from = current, to = target, "Schema upgrade, dropping and recreating message table");
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", messages::TABLE))?;
        tx.execute_batch(MESSAGES_SQL)?;
    }

    if current != target {
        tx.execute(
            "INSERT INTO _schema (version, applied_at) VALUES (?1, ?2)",
            params![target, chrono::Utc::now().to_rfc3339()],
        )?;
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &rusqlite::Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let (has_messages, has_prefs, versions) = conn
            .call(|conn| -> Result<_, rusqlite::Error> {
                let versions: i64 = conn.query_row("SELECT COUNT(*) FROM _schema", [], |row| row.get(0))?;
                Ok((table_exists(conn, messages::TABLE), table_exists(conn, "preferences"), versions))
            })
            .await
            .unwrap();

        assert!(has_messages);
        assert!(has_prefs);
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_upgrade_drops_messages_but_keeps_preferences() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        apply(&mut conn, 1).unwrap();
        conn.execute("INSERT INTO in_app_messages (id, created) VALUES ('m1', 10)", []).unwrap();
        conn.execute("INSERT INTO preferences (key, value) VALUES ('cache_limit', 5)", []).unwrap();

        apply(&mut conn, 2).unwrap();

        let messages: i64 = conn.query_row("SELECT COUNT(*) FROM in_app_messages", [], |row| row.get(0)).unwrap();
        let limit: i64 = conn
            .query_row("SELECT value FROM preferences WHERE key = 'cache_limit'", [], |row| row.get(0))
            .unwrap();
        let version: i64 = conn.query_row("SELECT MAX(version) FROM _schema", [], |row| row.get(0)).unwrap();

        assert_eq!(messages, 0);
        assert_eq!(limit, 5);
        assert_eq!(version, 2);
    }

    #[test]
    fn test_same_version_keeps_rows() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        apply(&mut conn, 1).unwrap();
        conn.execute("INSERT INTO in_app_messages (id) VALUES ('m1')", []).unwrap();
        apply(&mut conn, 1).unwrap();

        let messages: i64 = conn.query_row("SELECT COUNT(*) FROM in_app_messages", [], |row| row.get(0)).unwrap();
        assert_eq!(messages, 1);
    }

    #[test]
    fn test_downgrade_rejected() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        apply(&mut conn, 3).unwrap();
        assert!(matches!(apply(&mut conn, 1), Err(Error::MigrationFailed(_))));
    }
}
