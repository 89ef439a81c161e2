// Storage capability consumed by value operations, plus an in-memory backend.
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::core::error::{Error, ErrorKind};

/// Flat string key-value persistence.
///
/// `get` on a missing key yields an empty string, never an error.
/// `list_keys` returns every stored key in lexicographic order.
pub trait Store: Send + Sync {
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    fn get(&self, key: &str) -> Result<String, Error>;
    fn list_keys(&self) -> Result<Vec<String>, Error>;
    fn close(&self) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, Error> {
        self.entries
            .lock()
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, Error> {
        Ok(self.entries()?.get(key).cloned().unwrap_or_default())
    }

    fn list_keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}
