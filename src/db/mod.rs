pub mod models;

use models::{StoredFileSession, UserRecord};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Document-style store over SQLite: users keyed by username, with their
/// file sessions kept as one JSON document column.
pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(app_dir: &std::path::Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(app_dir)?;
        Self::open(&app_dir.join("allytics.db"))
    }

    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL,
                name TEXT NOT NULL,
                file_sessions TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Users ──

    pub fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT username, password, name, file_sessions FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((username, password, name, sessions)) => Ok(Some(UserRecord {
                username,
                password,
                name,
                file_sessions: serde_json::from_str(&sessions)?,
            })),
            None => Ok(None),
        }
    }

    /// Insert a fresh user with no file sessions.
    pub fn insert_user(&self, username: &str, password: &str, name: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (username, password, name) VALUES (?1, ?2, ?3)",
            params![username, password, name],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }
        Ok(())
    }

    pub fn set_password(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET password = ?1, updated_at = datetime('now') WHERE username = ?2",
            params![password, username],
        )?;
        Ok(())
    }

    /// Replace the whole `file_sessions` document, creating the row if needed.
    ///
    /// Last writer wins; there is no version check.
    pub fn save_file_sessions(
        &self,
        username: &str,
        sessions: &[StoredFileSession],
    ) -> Result<(), StoreError> {
        let document = serde_json::to_string(sessions)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (username, password, name, file_sessions) VALUES (?1, '', '', ?2)
             ON CONFLICT(username) DO UPDATE SET
                file_sessions = excluded.file_sessions,
                updated_at = datetime('now')",
            params![username, document],
        )?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}
