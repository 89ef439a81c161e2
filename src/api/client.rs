//! Purpose: Define the local client that runs value operations against the on-disk store.
//! Exports: `LocalClient`, `ApiResult`.
//! Role: Stable boundary for the CLI; owns database path resolution and write serialization.
//! Invariants: `add` always holds the database write lock for its whole read-modify-write.
//! Invariants: The database directory is created on demand with owner-only permissions.

use super::{Store, values};
use crate::config::create_private_dir;
use crate::core::error::Error;
use crate::core::lock::WriteLock;
use crate::core::sqlite::SqliteStore;
use crate::paths::default_db_path;
use std::path::{Path, PathBuf};

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct LocalClient {
    db_path: PathBuf,
}

impl LocalClient {
    pub fn new() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open_store(&self) -> ApiResult<SqliteStore> {
        if let Some(parent) = self.db_path.parent() {
            create_private_dir(parent)?;
        }
        SqliteStore::open(&self.db_path)
    }

    pub fn add(&self, bucket: &str, subkey: &str, value: &str) -> ApiResult<String> {
        let store = self.open_store()?;
        let lock = WriteLock::acquire(&self.db_path)?;
        let result = values::add(&store, bucket, subkey, value);
        drop(lock);
        finish(store, result)
    }

    pub fn get(&self, bucket: &str, subkey: &str) -> ApiResult<Vec<String>> {
        let store = self.open_store()?;
        let result = values::get(&store, bucket, subkey);
        finish(store, result)
    }

    pub fn list_keys(&self) -> ApiResult<Vec<String>> {
        let store = self.open_store()?;
        let result = values::list_keys(&store);
        finish(store, result)
    }
}

impl Default for LocalClient {
    fn default() -> Self {
        Self::new()
    }
}

// The operation's error wins over a close failure.
fn finish<T>(store: SqliteStore, result: ApiResult<T>) -> ApiResult<T> {
    let closed = store.close();
    let value = result?;
    closed?;
    Ok(value)
}
