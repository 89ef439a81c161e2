// SQLite-backed `Store`: a single `kv` table keyed by the flat key string.
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::store::Store;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`. The parent directory
    /// must already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|err| sqlite_error("failed to open database", path, err))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|err| sqlite_error("failed to set busy timeout", path, err))?;
        conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
            .map_err(|err| sqlite_error("failed to enable WAL", path, err))?;
        conn.execute_batch(SCHEMA)
            .map_err(|err| sqlite_error("failed to create schema", path, err))?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, Error>) -> Result<T, Error> {
        let guard = self.lock()?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::new(ErrorKind::Usage)
                .with_message("store is closed")
                .with_path(&self.path)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, Error> {
        self.conn.lock().map_err(|_| {
            Error::new(ErrorKind::Internal)
                .with_message("sqlite connection lock poisoned")
                .with_path(&self.path)
        })
    }
}

impl Store for SqliteStore {
    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(|err| sqlite_error("failed to write key", &self.path, err).with_key(key))?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> Result<String, Error> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()
                .map_err(|err| sqlite_error("failed to read key", &self.path, err).with_key(key))?;
            Ok(value.unwrap_or_default())
        })
    }

    fn list_keys(&self) -> Result<Vec<String>, Error> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT key FROM kv ORDER BY key")
                .map_err(|err| sqlite_error("failed to list keys", &self.path, err))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|err| sqlite_error("failed to list keys", &self.path, err))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|err| sqlite_error("failed to list keys", &self.path, err))
        })
    }

    fn close(&self) -> Result<(), Error> {
        let conn = self.lock()?.take();
        match conn {
            Some(conn) => conn
                .close()
                .map_err(|(_, err)| sqlite_error("failed to close database", &self.path, err)),
            None => Ok(()),
        }
    }
}

fn sqlite_error(message: &str, path: &Path, err: rusqlite::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}
