//! Purpose: Resolve default database and config locations from the environment.
//! Exports: `default_db_path`, `default_config_path`.
//! Role: Keep CLI, daemon, and API-client path semantics aligned from one source.
//! Invariants: `KVIT_DB` wins; then XDG variables; then `$HOME`-relative defaults.
//! Invariants: Empty environment variables are treated as unset.

use std::ffi::OsString;
use std::path::PathBuf;

pub const DB_ENV: &str = "KVIT_DB";

pub fn default_db_path() -> PathBuf {
    resolve_db_path(|name| std::env::var_os(name))
}

pub fn default_config_path() -> PathBuf {
    resolve_config_path(|name| std::env::var_os(name))
}

fn resolve_db_path(env: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    if let Some(path) = non_empty(&env, DB_ENV) {
        return PathBuf::from(path);
    }
    let data_home = non_empty(&env, "XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir(&env).join(".local").join("share"));
    data_home.join("kvit").join("data.db")
}

fn resolve_config_path(env: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    let config_home = non_empty(&env, "XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir(&env).join(".config"));
    config_home.join("kvit").join("config.yaml")
}

fn home_dir(env: &impl Fn(&str) -> Option<OsString>) -> PathBuf {
    non_empty(env, "HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn non_empty(env: &impl Fn(&str) -> Option<OsString>, name: &str) -> Option<OsString> {
    env(name).filter(|value| !value.is_empty())
}
