//! Purpose: Define the public Rust API boundary for kvit.
//! Exports: Key addressing, value operations, stores, and local/remote clients.
//! Role: Public, additive-only surface shared by the CLI, the daemon, and tests.
//! Invariants: This module is the only public path the binaries use for storage.

mod client;
mod remote;

pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::key::{
    is_plural_bucket, key_path, list_item_key, list_length_key, split_key,
};
pub use crate::core::lock::WriteLock;
pub use crate::core::sqlite::SqliteStore;
pub use crate::core::store::{MemoryStore, Store};
pub use crate::core::values;
pub use client::{ApiResult, LocalClient};
pub use remote::{DEFAULT_PORT, RemoteClient};
