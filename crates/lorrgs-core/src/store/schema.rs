//! SQLite schema for the ranking store.

use rusqlite::Connection;

use crate::errors::LorrgsResult;

/// Stamped into `PRAGMA user_version` once the DDL has run.
pub const SCHEMA_VERSION: i32 = 1;

/// Full DDL, safe to replay on an initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rankings (
        key TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE INDEX IF NOT EXISTS idx_rankings_updated ON rankings(updated_at);",
];

pub fn init_schema(conn: &Connection) -> LorrgsResult<()> {
    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> LorrgsResult<i32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_table_and_index() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
        init_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let index: String = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'rankings' \
                 AND name = 'idx_rankings_updated';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index, "idx_rankings_updated");
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute("INSERT INTO rankings(key, payload) VALUES('a', '{}');", [])
            .unwrap();
        init_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM rankings;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
