// Core modules: key addressing, value operations, storage backends, errors.
pub mod error;
pub mod key;
pub mod lock;
pub mod sqlite;
pub mod store;
pub mod values;
