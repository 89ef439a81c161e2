// Add/get/list over a `Store`, encoding lists for plural buckets.
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::key::{is_plural_bucket, key_path, list_item_key, list_length_key};
use crate::core::store::Store;

/// Stores `value` under `bucket[/subkey]` and returns the key written.
///
/// Singular buckets overwrite. Plural buckets append at `<list>/:<n>` and bump
/// `<list>/:len` to `n + 1`. The two writes are not atomic: unserialized
/// concurrent appends to the same list can both claim index `n`, and one value
/// is lost. Callers that share a store across writers must serialize `add`
/// (see `core::lock::WriteLock`).
pub fn add<S>(store: &S, bucket: &str, subkey: &str, value: &str) -> Result<String, Error>
where
    S: Store + ?Sized,
{
    let path = key_path(bucket, subkey);
    if !is_plural_bucket(bucket) {
        store.set(&path, value)?;
        debug!(key = %path, "stored value");
        return Ok(path);
    }

    let len_key = list_length_key(&path);
    let len = read_list_len(store, &len_key)?;
    let item_key = list_item_key(&path, len);
    store.set(&item_key, value)?;
    store.set(&len_key, &(len + 1).to_string())?;
    debug!(key = %item_key, len = len + 1, "appended list item");
    Ok(item_key)
}

/// Reads the values under `bucket[/subkey]`.
///
/// Plural buckets yield items from index 0 up to the first empty read; the
/// `:len` counter is not consulted. Missing data yields an empty vec.
pub fn get<S>(store: &S, bucket: &str, subkey: &str) -> Result<Vec<String>, Error>
where
    S: Store + ?Sized,
{
    let path = key_path(bucket, subkey);
    if !is_plural_bucket(bucket) {
        let value = store.get(&path)?;
        if value.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![value]);
    }

    let mut values = Vec::new();
    for index in 0.. {
        let value = store.get(&list_item_key(&path, index))?;
        if value.is_empty() {
            break;
        }
        values.push(value);
    }
    Ok(values)
}

/// Every stored key, sorted, including list bookkeeping keys.
pub fn list_keys<S>(store: &S) -> Result<Vec<String>, Error>
where
    S: Store + ?Sized,
{
    store.list_keys()
}

fn read_list_len<S>(store: &S, len_key: &str) -> Result<u64, Error>
where
    S: Store + ?Sized,
{
    let raw = store.get(len_key)?;
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<u64>().map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message(format!("malformed list length {raw:?}"))
            .with_key(len_key)
            .with_source(err)
    })
}
