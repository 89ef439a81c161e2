// Cross-process write serialization via an advisory lock beside the database.
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind};

/// Exclusive lock on `<db>.lock`, released on drop.
#[derive(Debug)]
pub struct WriteLock {
    file: File,
    path: PathBuf,
}

impl WriteLock {
    /// Blocks until the lock for `db_path` is held.
    pub fn acquire(db_path: &Path) -> Result<Self, Error> {
        let path = lock_path(db_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to open write lock")
                    .with_path(&path)
                    .with_source(err)
            })?;
        if file.try_lock_exclusive().is_err() {
            info!(path = %path.display(), "waiting for write lock");
            file.lock_exclusive().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to acquire write lock")
                    .with_path(&path)
                    .with_source(err)
            })?;
        }
        debug!(path = %path.display(), "acquired write lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::{WriteLock, lock_path};
    use fs2::FileExt;
    use std::fs::File;
    use std::path::Path;

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path(Path::new("/tmp/kvit/data.db")),
            Path::new("/tmp/kvit/data.db.lock")
        );
    }

    #[test]
    fn held_lock_excludes_other_handles_until_drop() {
        let temp = tempfile::tempdir().expect("tempdir");
        let db_path = temp.path().join("data.db");

        let lock = WriteLock::acquire(&db_path).expect("acquire");
        assert!(lock.path().exists());

        let other = File::open(lock.path()).expect("open lock file");
        assert!(other.try_lock_exclusive().is_err());

        drop(lock);
        other.try_lock_exclusive().expect("lock after release");
        FileExt::unlock(&other).expect("unlock");
    }
}
