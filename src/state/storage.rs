use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use tokio::task;

/// Errors from the persistent key-value storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not prepare storage directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] task::JoinError),
}

/// A durable, asynchronous, string-keyed store for textual blobs.
///
/// This is the only persistence surface the rest of the application
/// sees. Absence of a key is not an error (`get` returns `None`,
/// `delete` of an absent key succeeds).
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// SQLite-backed key-value storage.
///
/// The database file is created in the user's data directory:
/// - Linux: ~/.local/share/photo-shelf/photo_shelf.db
/// - macOS: ~/Library/Application Support/photo-shelf/photo_shelf.db
/// - Windows: %APPDATA%\photo-shelf\photo_shelf.db
///
/// Each operation opens its own connection and runs on the blocking
/// thread pool, because `rusqlite::Connection` cannot be shared across
/// the async tasks the UI spawns.
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create the storage backend at the default location and
    /// initialize its schema.
    pub fn new() -> Result<Self, StorageError> {
        Self::open(Self::default_db_path())
    }

    /// Create the storage backend at an explicit database path.
    pub fn open(db_path: PathBuf) -> Result<Self, StorageError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        init_schema(&conn)?;

        println!("📁 Storage initialized at: {}", db_path.display());

        Ok(SqliteStorage { db_path })
    }

    /// Get the path where the database should be stored
    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .expect("Could not determine user data directory");

        path.push("photo-shelf");
        path.push("photo_shelf.db");
        path
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }
}

/// Initialize the database schema.
/// Creates the key-value table if it doesn't exist.
fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_entries (
            key     TEXT PRIMARY KEY,
            value   TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

#[async_trait]
impl KeyValueStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let db_path = self.db_path.clone();
        let key = key.to_owned();

        let value = task::spawn_blocking(move || -> Result<Option<String>, rusqlite::Error> {
            let conn = Connection::open(&db_path)?;
            conn.query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                [&key],
                |row| row.get(0),
            )
            .optional()
        })
        .await??;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let db_path = self.db_path.clone();
        let key = key.to_owned();
        let value = value.to_owned();

        task::spawn_blocking(move || -> Result<(), rusqlite::Error> {
            let conn = Connection::open(&db_path)?;
            // Single upsert statement, so the blob is replaced atomically
            conn.execute(
                "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [&key, &value],
            )?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let db_path = self.db_path.clone();
        let key = key.to_owned();

        task::spawn_blocking(move || -> Result<(), rusqlite::Error> {
            let conn = Connection::open(&db_path)?;
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", [&key])?;
            Ok(())
        })
        .await??;

        Ok(())
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("db_path", &self.db_path)
            .finish()
    }
}
