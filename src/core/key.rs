// Flat-key addressing for buckets, subkeys, and emulated lists.
//
// Key shape: `bucket[/subkey][/:index | /:len]`. Inputs are not validated, so a
// subkey containing `/` produces a key that is indistinguishable from a deeper
// path; callers own that ambiguity.

const SEPARATOR: char = '/';
const LENGTH_SUFFIX: &str = "/:len";

/// Joins a bucket and an optional (possibly empty) subkey.
pub fn key_path(bucket: &str, subkey: &str) -> String {
    if subkey.is_empty() {
        return bucket.to_string();
    }
    format!("{bucket}{SEPARATOR}{subkey}")
}

/// A bucket holds lists when its name ends in `s` and is longer than one byte.
///
/// Case-sensitive and purely textual: `status` is plural, `Servers` is plural,
/// `SERVERS` and `s` are not.
pub fn is_plural_bucket(bucket: &str) -> bool {
    bucket.len() > 1 && bucket.ends_with('s')
}

pub fn list_length_key(list_path: &str) -> String {
    format!("{list_path}{LENGTH_SUFFIX}")
}

pub fn list_item_key(list_path: &str, index: u64) -> String {
    format!("{list_path}{SEPARATOR}:{index}")
}

/// Splits `bucket[/subkey]` at the first separator. The subkey keeps any
/// further separators and is empty when none is present.
pub fn split_key(key: &str) -> (&str, &str) {
    key.split_once(SEPARATOR).unwrap_or((key, ""))
}
