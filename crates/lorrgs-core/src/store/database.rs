//! SQLite-backed [`RankingStore`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::errors::LorrgsResult;
use crate::store::{schema, RankingStore};

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "~" || raw.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if raw.len() > 2 {
                expanded.push(&raw[2..]);
            }
            return expanded;
        }
    }
    path.to_path_buf()
}

/// One connection, serialised behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file, creating parent directories as
    /// needed, and apply the schema.
    pub fn open(db_path: &Path) -> LorrgsResult<Self> {
        let resolved = expand_tilde(db_path);
        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&resolved)?;
        schema::init_schema(&conn)?;
        debug!("Opened ranking store at {}", resolved.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> LorrgsResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> LorrgsResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM rankings ORDER BY key;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    /// Copy the database to `destination` with the SQLite backup API.
    pub fn backup_to(&self, destination: &Path) -> LorrgsResult<PathBuf> {
        let resolved = expand_tilde(destination);
        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let src_conn = self.conn.lock();
        let mut dst_conn = Connection::open(&resolved)?;
        let backup = rusqlite::backup::Backup::new(&src_conn, &mut dst_conn)?;
        backup.run_to_completion(100, Duration::from_millis(10), None)?;
        Ok(resolved)
    }
}

impl RankingStore for SqliteStore {
    fn load(&self, key: &str) -> LorrgsResult<Option<String>> {
        let conn = self.conn.lock();
        let payload = conn
            .query_row(
                "SELECT payload FROM rankings WHERE key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn save(&self, key: &str, value: &str) -> LorrgsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO rankings(key, payload, updated_at) VALUES(?1, ?2, CURRENT_TIMESTAMP) \
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, \
             updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }
}
