//! Client-local durable key/value storage.
//!
//! Plays the role browser `localStorage` has for the web console: a
//! handful of namespaced string entries (the auth token, the rule state
//! snapshot) kept in a single SQLite table. Each write is one statement,
//! so an entry is either fully replaced or untouched.

use std::path::PathBuf;

use log::debug;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::hooks::TokenSource;
use crate::types::now_ms;

/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "jwt_token";

// ================================================================================================
// STORAGE CONFIGURATION
// ================================================================================================

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./var/data/console.db"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create storage directory: {0}")]
    Directory(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to serialize entry {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv_store (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  REAL NOT NULL
);
";

// ================================================================================================
// LOCAL STORAGE
// ================================================================================================

#[derive(Debug)]
pub struct LocalStorage {
    db: Mutex<Connection>,
}

impl LocalStorage {
    /// Opens (or creates) the database at `config.path`.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path)?;
        debug!("Opened local storage at {}", config.path.display());
        Self::with_connection(conn)
    }

    /// Storage that lives only as long as the process.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.db.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let updated_at = (now_ms() as f64) / 1000.0;
        let conn = self.db.lock();
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, updated_at],
        )?;
        Ok(())
    }

    /// Removes an entry. Returns true if it was present.
    pub fn remove_item(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.db.lock();
        let removed = conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    pub fn set_token(&self, token: &str) -> Result<(), StorageError> {
        self.set_item(TOKEN_KEY, token.trim())
    }

    pub fn clear_token(&self) -> Result<bool, StorageError> {
        self.remove_item(TOKEN_KEY)
    }
}

impl TokenSource for LocalStorage {
    fn token(&self) -> Option<String> {
        match self.get_item(TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                log::error!("Failed to read token from local storage: {}", e);
                None
            }
        }
    }
}
