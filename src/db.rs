// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::path::{
    Path,
    PathBuf,
};

use log::{
    debug,
    info,
};
use uuid::Uuid;

use crate::{
    backend::{
        BackendEngine,
        KeyRange,
        OpenMode,
        SafeModeEngine,
    },
    batch::WriteBatch,
    error::{
        Result,
        Status,
    },
    iter::DbIterator,
    options::{
        Options,
        ReadOptions,
        WriteOptions,
    },
    snapshot::Snapshot,
    transaction::{
        CommitOutcome,
        Transaction,
    },
};

/// The sequence number `options` pins reads to, if any. A snapshot taken
/// from another database is rejected.
pub(crate) fn snapshot_sequence(options: &ReadOptions, owner: Uuid) -> Result<Option<u64>> {
    match options.snapshot() {
        Some(snapshot) if snapshot.owner() != owner => {
            Err(Status::invalid_argument("Snapshot belongs to a different database"))
        },
        Some(snapshot) => Ok(Some(snapshot.sequence())),
        None => Ok(None),
    }
}

/// An open database: the exclusive owner of one engine instance.
///
/// Iterators, snapshots and transactions borrow the database, so it can only
/// be closed once all of them are gone. A `Database` is `Send + Sync`; share
/// it across threads by reference or in an `Arc`.
#[derive(Debug)]
pub struct Database<E = SafeModeEngine>
where
    E: BackendEngine,
{
    engine: E,
    id: Uuid,
    mode: OpenMode,
    path: PathBuf,
}

/// Constructors for the default engine.
impl Database {
    /// Open for reading and writing, creating the database if
    /// `create_if_missing` is set.
    pub fn open<P>(options: &Options, path: P) -> Result<Database>
    where
        P: AsRef<Path>,
    {
        Database::open_with_backend(options, path, OpenMode::ReadWrite)
    }

    /// Open an existing database without the right to modify it. The
    /// write-ahead log is replayed into memory, or with
    /// `error_if_wal_exists`, a non-empty one fails the open.
    pub fn open_for_read_only<P>(options: &Options, path: P, error_if_wal_exists: bool) -> Result<Database>
    where
        P: AsRef<Path>,
    {
        Database::open_with_backend(
            options,
            path,
            OpenMode::ReadOnly {
                error_if_wal_exists,
            },
        )
    }

    /// Open for reading and writing with support for optimistic
    /// transactions.
    pub fn open_transactional<P>(options: &Options, path: P) -> Result<Database>
    where
        P: AsRef<Path>,
    {
        Database::open_with_backend(options, path, OpenMode::Transactional)
    }
}

impl<E> Database<E>
where
    E: BackendEngine,
{
    pub fn open_with_backend<P>(options: &Options, path: P, mode: OpenMode) -> Result<Database<E>>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let engine = E::open(path, options, mode).map_err(Into::<Status>::into)?;
        let id = Uuid::new_v4();
        info!("Opened database {} at {:?} in {:?} mode", id, path, mode);
        Ok(Database {
            engine,
            id,
            mode,
            path: path.to_path_buf(),
        })
    }

    /// Stop background work, persist what only lives in memory and release
    /// the path. Dropping the database does the same but can only log a
    /// failure.
    pub fn close(mut self) -> Result<()> {
        self.engine.close().map_err(Into::into)
    }

    /// An identifier unique to this handle, not to the data on disk.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &Options {
        self.engine.options()
    }

    pub fn is_transactional(&self) -> bool {
        self.mode.is_transactional()
    }

    pub fn is_read_only(&self) -> bool {
        self.mode.is_read_only()
    }
}

/// Key-value operations.
impl<E> Database<E>
where
    E: BackendEngine,
{
    pub fn put<K, V>(&self, key: K, value: V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.put_opt(key, value, &WriteOptions::default())
    }

    pub fn put_opt<K, V>(&self, key: K, value: V, options: &WriteOptions) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_opt(&batch, options)
    }

    /// Look `key` up in the latest committed state. Absence is `Ok(None)`.
    pub fn get<K>(&self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        self.get_opt(key, &ReadOptions::default())
    }

    pub fn get_opt<K>(&self, key: K, options: &ReadOptions) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        let sequence = snapshot_sequence(options, self.id)?;
        self.engine.get(key.as_ref(), sequence).map_err(Into::into)
    }

    pub fn delete<K>(&self, key: K) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        self.delete_opt(key, &WriteOptions::default())
    }

    pub fn delete_opt<K>(&self, key: K, options: &WriteOptions) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write_opt(&batch, options)
    }

    /// A cheap membership test. May answer `true` for an absent key, never
    /// `false` for a present one.
    pub fn key_may_exist<K>(&self, key: K) -> bool
    where
        K: AsRef<[u8]>,
    {
        self.key_may_exist_opt(key, &ReadOptions::default())
    }

    /// With a snapshot, the answer is exact for the snapshot's view.
    pub fn key_may_exist_opt<K>(&self, key: K, options: &ReadOptions) -> bool
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        match snapshot_sequence(options, self.id) {
            Ok(Some(sequence)) => self.engine.get(key, Some(sequence)).map_or(true, |value| value.is_some()),
            Ok(None) => self.engine.key_may_exist(key),
            Err(_) => true,
        }
    }

    pub fn write(&self, batch: &WriteBatch) -> Result<()> {
        self.write_opt(batch, &WriteOptions::default())
    }

    /// Apply every operation in `batch` atomically, in order. On failure
    /// nothing is applied.
    pub fn write_opt(&self, batch: &WriteBatch, options: &WriteOptions) -> Result<()> {
        self.engine.write(batch.ops(), options, None).map(|_| ()).map_err(Into::into)
    }
}

/// Views and transactions.
impl<E> Database<E>
where
    E: BackendEngine,
{
    pub fn iterator(&self) -> DbIterator<'_, E> {
        self.iterator_opt(&ReadOptions::default())
    }

    /// An iterator over the latest committed state, or over `options`'
    /// snapshot. Errors binding the view surface through `status`.
    pub fn iterator_opt(&self, options: &ReadOptions) -> DbIterator<'_, E> {
        DbIterator::new(&self.engine, self.id, options, None)
    }

    /// Pin the latest committed state.
    pub fn snapshot(&self) -> Result<Snapshot<'_>> {
        let sequence = self.engine.acquire_snapshot().map_err(Into::<Status>::into)?;
        Ok(Snapshot::new(sequence, self.id, &self.engine))
    }

    pub fn transaction(&self) -> Result<Transaction<'_, E>> {
        self.transaction_opt(&WriteOptions::default())
    }

    /// Begin an optimistic transaction whose commit is written with
    /// `options`. Requires a database opened with `open_transactional`.
    pub fn transaction_opt(&self, options: &WriteOptions) -> Result<Transaction<'_, E>> {
        if !self.is_transactional() {
            return Err(Status::not_supported("Transactions require a database opened as transactional"));
        }
        let begin = self.engine.acquire_snapshot().map_err(Into::<Status>::into)?;
        Ok(Transaction::new(&self.engine, self.id, *options, begin))
    }

    /// Run `body` in a fresh transaction and commit it, starting over on a
    /// conflict until `max_attempts` attempts have been made. An error from
    /// `body` or a failed commit is returned at once.
    pub fn transaction_with_retry<T, F>(&self, options: &WriteOptions, max_attempts: usize, mut body: F) -> Result<T>
    where
        F: FnMut(&mut Transaction<'_, E>) -> Result<T>,
    {
        if max_attempts == 0 {
            return Err(Status::invalid_argument("max_attempts must be at least 1"));
        }
        let mut attempt = 1;
        loop {
            let mut txn = self.transaction_opt(options)?;
            let value = body(&mut txn)?;
            match txn.commit() {
                CommitOutcome::Committed => return Ok(value),
                CommitOutcome::Conflict(status) if attempt >= max_attempts => return Err(status),
                CommitOutcome::Conflict(status) => {
                    debug!("Retrying transaction after attempt {}: {}", attempt, status);
                    attempt += 1;
                },
                CommitOutcome::Failed(status) => return Err(status),
            }
        }
    }
}

/// Maintenance and introspection.
impl<E> Database<E>
where
    E: BackendEngine,
{
    /// Drop versions no snapshot or transaction can observe within
    /// `[start, end)`, then rewrite the table. `None` extends the range to
    /// that end of the keyspace.
    pub fn compact_range(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        self.engine
            .compact_range(KeyRange {
                start,
                end,
            })
            .map_err(Into::into)
    }

    /// Persist buffered writes. With `wait` the flush runs on the calling
    /// thread, otherwise it is handed to the background worker.
    pub fn flush(&self, wait: bool) -> Result<()> {
        self.engine.flush(wait).map_err(Into::into)
    }

    /// The value of an engine property, or `None` for an unknown name.
    pub fn property_value(&self, name: &str) -> Option<String> {
        self.engine.property(name)
    }

    /// An engine property parsed as an integer. `None` for an unknown name
    /// or a non-numeric value.
    pub fn property_int_value(&self, name: &str) -> Option<u64> {
        self.property_value(name)?.trim().parse().ok()
    }

    /// Estimated storage used by each range, in bytes.
    ///
    /// The estimate sums the encoded size of every retained version of every
    /// key in the range, including superseded versions and tombstones that a
    /// compaction has not yet discarded. It is a heuristic: expect it to
    /// grow with writes and shrink with compaction, not to match file sizes.
    pub fn approximate_sizes(&self, ranges: &[KeyRange]) -> Result<Vec<u64>> {
        self.engine.approximate_sizes(ranges).map_err(Into::into)
    }
}
