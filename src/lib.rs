// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! An ordered, embedded key-value store with snapshots, atomic write
//! batches and optimistic transactions.
//!
//! Keys and values are opaque byte strings, kept sorted by key. A
//! [`Database`] owns one engine instance on disk; everything else borrows
//! it, so the compiler rejects closing a database while an iterator,
//! snapshot or transaction is still alive.
//!
//! ## Basic usage
//!
//! ```
//! use orderkv::{
//!     Database,
//!     Options,
//!     ReadOptions,
//!     WriteBatch,
//! };
//! use tempfile::Builder;
//!
//! let root = Builder::new().prefix("simple-db").tempdir().unwrap();
//!
//! let mut options = Options::new();
//! options.set_create_if_missing(true);
//! let db = Database::open(&options, root.path()).unwrap();
//!
//! // Point operations. A missing key reads as `None`.
//! db.put(b"apple", b"red").unwrap();
//! assert_eq!(db.get(b"apple").unwrap(), Some(b"red".to_vec()));
//! assert_eq!(db.get(b"banana").unwrap(), None);
//!
//! // A batch is applied atomically; later operations on a key win.
//! let mut batch = WriteBatch::new();
//! batch.put(b"banana", b"yellow");
//! batch.delete(b"apple");
//! batch.put(b"cherry", b"dark red");
//! db.write(&batch).unwrap();
//!
//! // A snapshot keeps seeing the state it was taken at.
//! let snapshot = db.snapshot().unwrap();
//! db.put(b"date", b"brown").unwrap();
//! let mut read = ReadOptions::new();
//! read.set_snapshot(&snapshot);
//! assert_eq!(db.get_opt(b"date", &read).unwrap(), None);
//!
//! // Iterators walk keys in byte order.
//! let mut iter = db.iterator_opt(&read);
//! iter.seek_to_first();
//! let mut keys = vec![];
//! while let Some(key) = iter.key() {
//!     keys.push(key.to_vec());
//!     iter.next();
//! }
//! assert_eq!(keys, vec![b"banana".to_vec(), b"cherry".to_vec()]);
//! assert!(iter.status().is_ok());
//!
//! drop(iter);
//! snapshot.release();
//! db.close().unwrap();
//! ```
//!
//! ## Optimistic transactions
//!
//! A database opened with [`Database::open_transactional`] hands out
//! [`Transaction`]s. Writes are buffered until commit; keys read with
//! `get_for_update` are checked at commit, and the first committer wins.
//!
//! ```
//! use orderkv::{
//!     CommitOutcome,
//!     Database,
//!     Options,
//! };
//! use tempfile::Builder;
//!
//! let root = Builder::new().prefix("txn-db").tempdir().unwrap();
//! let mut options = Options::new();
//! options.set_create_if_missing(true);
//! let db = Database::open_transactional(&options, root.path()).unwrap();
//!
//! let mut first = db.transaction().unwrap();
//! let mut second = db.transaction().unwrap();
//! first.get_for_update(b"counter").unwrap();
//! second.get_for_update(b"counter").unwrap();
//! first.put(b"counter", b"1").unwrap();
//! second.put(b"counter", b"2").unwrap();
//!
//! assert_eq!(first.commit(), CommitOutcome::Committed);
//! assert!(second.commit().is_conflict());
//! assert_eq!(db.get(b"counter").unwrap(), Some(b"1".to_vec()));
//! ```
//!
//! ## Ownership rules checked at compile time
//!
//! A snapshot is released by value, so it cannot be released twice:
//!
//! ```compile_fail
//! # use orderkv::{Database, Options};
//! # let root = tempfile::Builder::new().prefix("double-release").tempdir().unwrap();
//! # let mut options = Options::new();
//! # options.set_create_if_missing(true);
//! let db = Database::open(&options, root.path()).unwrap();
//! let snapshot = db.snapshot().unwrap();
//! snapshot.release();
//! snapshot.release();
//! ```
//!
//! An iterator borrows its database, which therefore cannot be closed
//! while the iterator is in use:
//!
//! ```compile_fail
//! # use orderkv::{Database, Options};
//! # let root = tempfile::Builder::new().prefix("use-after-close").tempdir().unwrap();
//! # let mut options = Options::new();
//! # options.set_create_if_missing(true);
//! let db = Database::open(&options, root.path()).unwrap();
//! let mut iter = db.iterator();
//! db.close().unwrap();
//! iter.seek_to_first();
//! ```

pub mod backend;
pub mod error;
pub mod options;

mod batch;
mod db;
mod iter;
mod manager;
mod snapshot;
mod transaction;

pub use backend::{
    KeyRange,
    OpenMode,
};
pub use batch::WriteBatch;
pub use db::Database;
pub use error::{
    Code,
    Result,
    Status,
};
pub use iter::DbIterator;
pub use manager::Manager;
pub use options::{
    CompressionType,
    Options,
    PrefixExtractor,
    ReadOptions,
    WriteOptions,
};
pub use snapshot::Snapshot;
pub use transaction::{
    CommitOutcome,
    Transaction,
};
