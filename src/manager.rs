// Copyright 2018 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::{
    collections::BTreeSet,
    io,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Mutex,
        PoisonError,
    },
};

use lazy_static::lazy_static;

/// A process may hold only one writable handle to each database directory.
/// This registry enforces that: opening for writing locks the canonical path
/// until the returned `PathLock` is dropped.
lazy_static! {
    static ref MANAGER: Mutex<Manager> = Mutex::new(Manager::new());
}

#[derive(Debug)]
pub struct Manager {
    locked: BTreeSet<PathBuf>,
}

impl Manager {
    fn new() -> Manager {
        Manager {
            locked: Default::default(),
        }
    }

    pub fn singleton() -> &'static Mutex<Manager> {
        &*MANAGER
    }

    /// Whether a database at `path` is currently open for writing in this
    /// process.
    pub fn is_locked<'p, P>(&self, path: P) -> io::Result<bool>
    where
        P: Into<&'p Path>,
    {
        let canonical = path.into().canonicalize()?;
        Ok(self.locked.contains(&canonical))
    }

    pub fn len(&self) -> usize {
        self.locked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked.is_empty()
    }

    /// Lock the existing directory `path`, or return `None` if it is locked
    /// already.
    pub(crate) fn try_lock(&mut self, path: &Path) -> io::Result<Option<PathLock>> {
        let canonical = path.canonicalize()?;
        if !self.locked.insert(canonical.clone()) {
            return Ok(None);
        }
        Ok(Some(PathLock {
            path: canonical,
        }))
    }
}

/// Releases its path in the registry when dropped. Must not be dropped while
/// the registry's mutex is held.
#[derive(Debug)]
pub(crate) struct PathLock {
    path: PathBuf,
}

impl PathLock {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLock {
    fn drop(&mut self) {
        let mut manager = MANAGER.lock().unwrap_or_else(PoisonError::into_inner);
        manager.locked.remove(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let root = tempfile::Builder::new().prefix("test_lock_exclusive").tempdir().expect("tempdir");
        fs::create_dir_all(root.path()).expect("dir created");

        let lock = Manager::singleton().lock().expect("manager").try_lock(root.path()).expect("locked");
        let lock = lock.expect("first lock");
        assert!(Manager::singleton().lock().expect("manager").is_locked(root.path()).expect("checked"));

        let second = Manager::singleton().lock().expect("manager").try_lock(root.path()).expect("checked");
        assert!(second.is_none());

        drop(lock);
        assert!(!Manager::singleton().lock().expect("manager").is_locked(root.path()).expect("checked"));
    }

    #[test]
    fn test_lock_uses_canonical_path() {
        let root = tempfile::Builder::new().prefix("test_lock_canonical").tempdir().expect("tempdir");
        let nested = root.path().join("db");
        fs::create_dir_all(&nested).expect("dir created");
        let indirect = nested.join("..").join("db");

        let lock = Manager::singleton().lock().expect("manager").try_lock(&nested).expect("locked").expect("first lock");
        assert_eq!(lock.path(), nested.canonicalize().expect("canonical"));
        let second = Manager::singleton().lock().expect("manager").try_lock(&indirect).expect("checked");
        assert!(second.is_none());
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let root = tempfile::Builder::new().prefix("test_lock_missing").tempdir().expect("tempdir");
        let missing = root.path().join("missing");
        assert!(Manager::singleton().lock().expect("manager").try_lock(&missing).is_err());
    }
}
