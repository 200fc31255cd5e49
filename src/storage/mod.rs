use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};

mod schema;

pub const TODOS_KEY: &str = "todos";
pub const TIME_BLOCKS_KEY: &str = "timeBlocks";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored data under '{key}' is not valid: {source}")]
    InvalidStoredData {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("serialising '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

/// String key-value persistence, the one seam between view state and disk.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Reads a JSON array stored under `key`. A missing key is an empty
/// collection; anything that does not parse is `InvalidStoredData`.
pub fn read_collection<T>(store: &dyn KvStore, key: &str) -> Result<Vec<T>, StorageError>
where
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key)? else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&raw).map_err(|source| StorageError::InvalidStoredData {
        key: key.to_string(),
        source,
    })
}

/// Like [`read_collection`], but stored data that no longer parses resets to
/// an empty collection. Store failures still propagate, so a caller that
/// writes the collection back never replaces data it could not read.
pub fn read_collection_or_reset<T>(store: &dyn KvStore, key: &str) -> Result<Vec<T>, StorageError>
where
    T: DeserializeOwned,
{
    match read_collection(store, key) {
        Err(err @ StorageError::InvalidStoredData { .. }) => {
            tracing::warn!(%err, key, "discarding unreadable stored data");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Like [`read_collection`], but any failure falls back to an empty collection.
pub fn load_collection<T>(store: &dyn KvStore, key: &str) -> Vec<T>
where
    T: DeserializeOwned,
{
    match read_collection(store, key) {
        Ok(items) => {
            tracing::debug!(key, count = items.len(), "loaded collection");
            items
        }
        Err(err @ StorageError::InvalidStoredData { .. }) => {
            tracing::warn!(%err, key, "discarding unreadable stored data");
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(%err, key, "failed to read stored data, starting empty");
            Vec::new()
        }
    }
}

/// Replaces the whole collection stored under `key`.
pub fn write_collection<T>(store: &dyn KvStore, key: &str, items: &[T]) -> Result<(), StorageError>
where
    T: Serialize,
{
    let json = serde_json::to_string(items).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &json)
}

/// Best-effort mirror write: failures are logged and dropped.
pub fn save_collection<T>(store: &dyn KvStore, key: &str, items: &[T]) -> bool
where
    T: Serialize,
{
    match write_collection(store, key, items) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, key, count = items.len(), "failed to persist collection");
            false
        }
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl SqliteStore {
    pub fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
            Ok(())
        })
    }
}

/// Process-local store used by tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .insert(key.to_string(), value.to_string());
        store
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<SqliteStore> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage).context("configuring database connection")?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "key-value store ready");
    Ok(SqliteStore {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<(), StorageError> {
    conn.busy_timeout(Duration::from_millis(storage.busy_timeout_ms))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use crate::model::{TimeBlock, Todo};
    use assert_matches::assert_matches;
    use tempfile::TempDir;
    use time::macros::date;

    struct BrokenStore;

    impl KvStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disk gone".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
    }

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        let state_dir = base.join("state");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            database_path: data_dir.join("taskflow.db"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    fn init_store() -> anyhow::Result<(TempDir, SqliteStore)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let store = init(&paths, &StorageOptions::default())?;
        Ok((temp, store))
    }

    fn blocks() -> Vec<TimeBlock> {
        vec![
            TimeBlock {
                id: "1".into(),
                date: date!(2024 - 03 - 04),
                start_time: "09:00".into(),
                end_time: "10:00".into(),
                task: "Standup".into(),
            },
            TimeBlock {
                id: "2".into(),
                date: date!(2024 - 02 - 29),
                start_time: "14:30".into(),
                end_time: "15:00".into(),
                task: "Leap day review".into(),
            },
        ]
    }

    #[test]
    fn sqlite_store_round_trips_time_blocks() -> anyhow::Result<()> {
        let (_temp, store) = init_store()?;
        let original = blocks();
        write_collection(&store, TIME_BLOCKS_KEY, &original)?;

        let loaded: Vec<TimeBlock> = read_collection(&store, TIME_BLOCKS_KEY)?;
        assert_eq!(loaded, original);
        assert_eq!(store.keys()?, vec![TIME_BLOCKS_KEY.to_string()]);
        Ok(())
    }

    #[test]
    fn writes_replace_the_whole_collection() -> anyhow::Result<()> {
        let (_temp, store) = init_store()?;
        write_collection(&store, TIME_BLOCKS_KEY, &blocks())?;
        write_collection(&store, TIME_BLOCKS_KEY, &blocks()[..1])?;
        let loaded: Vec<TimeBlock> = read_collection(&store, TIME_BLOCKS_KEY)?;
        assert_eq!(loaded.len(), 1);
        Ok(())
    }

    #[test]
    fn connections_wait_on_locks() -> anyhow::Result<()> {
        let (_temp, store) = init_store()?;
        let timeout = store.with_connection(|conn| {
            Ok(conn.pragma_query_value(None, "busy_timeout", |row| row.get::<_, i64>(0))?)
        })?;
        assert_eq!(timeout, 5000);
        Ok(())
    }

    #[test]
    fn sqlite_store_persists_across_handles() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        {
            let store = init(&paths, &StorageOptions::default())?;
            store.set(TODOS_KEY, "[]")?;
        }
        let reopened = init(&paths, &StorageOptions::default())?;
        assert_eq!(reopened.get(TODOS_KEY)?.as_deref(), Some("[]"));
        Ok(())
    }

    #[test]
    fn missing_key_loads_as_empty() {
        let store = MemoryStore::new();
        let todos: Vec<Todo> = load_collection(&store, TODOS_KEY);
        assert!(todos.is_empty());
    }

    #[test]
    fn corrupt_data_is_reported_then_reset() {
        let store = MemoryStore::with_entry(TODOS_KEY, "{not json");
        assert_matches!(
            read_collection::<Todo>(&store, TODOS_KEY),
            Err(StorageError::InvalidStoredData { ref key, .. }) if key == TODOS_KEY
        );
        let todos: Vec<Todo> = load_collection(&store, TODOS_KEY);
        assert!(todos.is_empty());
    }

    #[test]
    fn reset_only_covers_unreadable_data() {
        let corrupt = MemoryStore::with_entry(TODOS_KEY, "{not json");
        let todos: Vec<Todo> = read_collection_or_reset(&corrupt, TODOS_KEY).expect("reset");
        assert!(todos.is_empty());

        assert_matches!(
            read_collection_or_reset::<Todo>(&BrokenStore, TODOS_KEY),
            Err(StorageError::Unavailable(_))
        );
    }

    #[test]
    fn foreign_shapes_are_invalid_stored_data() {
        let store = MemoryStore::with_entry(TIME_BLOCKS_KEY, r#"[{"id":"1","date":"soon"}]"#);
        assert_matches!(
            read_collection::<TimeBlock>(&store, TIME_BLOCKS_KEY),
            Err(StorageError::InvalidStoredData { .. })
        );
    }

    #[test]
    fn failed_writes_are_swallowed() {
        assert!(!save_collection(&BrokenStore, TODOS_KEY, &Vec::<Todo>::new()));
        let todos: Vec<Todo> = load_collection(&BrokenStore, TODOS_KEY);
        assert!(todos.is_empty());
    }

    #[test]
    fn memory_store_mirrors_saved_json() {
        let store = MemoryStore::new();
        assert!(save_collection(&store, TIME_BLOCKS_KEY, &blocks()[..1]));
        let raw = store.raw(TIME_BLOCKS_KEY).expect("saved");
        assert!(raw.contains(r#""date":"2024-03-04""#));
        assert!(raw.contains(r#""startTime":"09:00""#));
    }
}
