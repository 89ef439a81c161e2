//! Purpose: Load, edit, and persist the CLI contexts file (named daemon addresses).
//! Exports: `Config`.
//! Role: Explicit configuration value loaded once per process and passed to commands.
//! Invariants: A missing file is equivalent to the default (no contexts, no current).
//! Invariants: `use_context` only selects names that already exist.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    pub contexts: BTreeMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("failed to read config")
                    .with_path(path)
                    .with_source(err));
            }
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("invalid config yaml")
                .with_path(path)
                .with_source(err)
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }
        let text = serde_yaml::to_string(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode config yaml")
                .with_source(err)
        })?;
        write_private_file(path, text.as_bytes())
    }

    pub fn add_context(&mut self, name: &str, address: &str) {
        self.contexts.insert(name.to_string(), address.to_string());
    }

    pub fn use_context(&mut self, name: &str) -> Result<(), Error> {
        if !self.contexts.contains_key(name) {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("context {name:?} not found"))
                .with_hint("Add it first with `kvit context add <name> <address>`."));
        }
        self.current = name.to_string();
        Ok(())
    }

    pub fn unset_context(&mut self) {
        self.current.clear();
    }

    /// Address of the selected daemon, or `None` for local execution.
    ///
    /// A current name that no longer resolves, or resolves to an empty
    /// address, also means local.
    pub fn remote_address(&self) -> Option<&str> {
        if self.current.is_empty() {
            return None;
        }
        self.contexts
            .get(&self.current)
            .map(String::as_str)
            .filter(|address| !address.is_empty())
    }
}

pub(crate) fn create_private_dir(dir: &Path) -> Result<(), Error> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to create directory")
            .with_path(dir)
            .with_source(err)
    })
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let write = || -> io::Result<()> {
        use std::io::Write;
        let mut file = options.open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    write().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write config")
            .with_path(path)
            .with_source(err)
    })
}
