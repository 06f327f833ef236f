use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use super::FlagStore;

pub const DB_FILE: &str = "horus.db";

/// SQLite-backed durable flags, one row per (shard, name).
#[derive(Clone)]
pub struct Database {
    pub conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;
        let db_path = data_dir.join(DB_FILE);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("opening {}", db_path.display()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS flags (
                shard TEXT NOT NULL,
                name TEXT NOT NULL,
                value INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (shard, name)
            )",
            [],
        )?;

        Ok(())
    }

    /// Every persisted flag as `(shard, name, value)`, ordered by shard then name.
    pub fn list_flags(&self) -> Result<Vec<(String, String, bool)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT shard, name, value FROM flags ORDER BY shard, name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0))
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl FlagStore for Database {
    fn get_flag(&self, shard: &str, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM flags WHERE shard = ?1 AND name = ?2",
                params![shard, name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.is_some_and(|v| v != 0))
    }

    fn set_flag(&self, shard: &str, name: &str, value: bool) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO flags (shard, name, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(shard, name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![shard, name, value as i64, chrono::Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flags_default_to_unset() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        assert!(!db.get_flag("admin", "initialized").unwrap());
    }

    #[test]
    fn test_flags_are_per_shard() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.set_flag("admin", "initialized", true).unwrap();

        assert!(db.get_flag("admin", "initialized").unwrap());
        assert!(!db.get_flag("platform", "initialized").unwrap());

        db.set_flag("admin", "initialized", false).unwrap();
        assert!(!db.get_flag("admin", "initialized").unwrap());
    }

    #[test]
    fn test_flags_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let db = Database::new(dir.path()).unwrap();
            db.initialize().unwrap();
            db.set_flag("platform", "initialized", true).unwrap();
        }

        let db = Database::new(dir.path()).unwrap();
        db.initialize().unwrap();
        assert!(db.get_flag("platform", "initialized").unwrap());
        assert_eq!(
            db.list_flags().unwrap(),
            vec![("platform".to_string(), "initialized".to_string(), true)]
        );
    }
}
