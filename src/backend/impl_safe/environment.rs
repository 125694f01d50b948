// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        atomic::{
            AtomicBool,
            AtomicU64,
            Ordering,
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
    },
};

use crossbeam_channel::Sender;
use log::{
    debug,
    error,
    info,
    warn,
};
use uuid::Uuid;

use super::{
    database::{
        Keyspace,
        SnapshotList,
    },
    stats::{
        Statistics,
        Ticker,
    },
    table,
    wal::{
        self,
        Replay,
        WalWriter,
    },
    worker::{
        Job,
        Worker,
    },
    ErrorImpl,
};
use crate::{
    backend::{
        common::{
            BatchOp,
            ConflictCheck,
            KeyRange,
            OpenMode,
            SeekTarget,
        },
        traits::{
            BackendEngine,
            BackendSnapshots,
        },
    },
    manager::{
        Manager,
        PathLock,
    },
    options::{
        Options,
        WriteOptions,
    },
};

const IDENTITY_FILENAME: &str = "IDENTITY";
const OPTIONS_FILENAME: &str = "OPTIONS";
const PROPERTY_PREFIX: &str = "orderkv.";

#[derive(Debug, Default)]
struct Counters {
    memtable_bytes: AtomicU64,
    memtable_entries: AtomicU64,
    /// Writes not yet persisted in the table.
    dirty: AtomicBool,
    /// Writes that skipped the log and are not yet persisted in the table.
    unlogged: AtomicBool,
    flush_pending: AtomicBool,
    flushes: AtomicU64,
    flushes_since_compaction: AtomicU64,
    compactions: AtomicU64,
    background_errors: AtomicU64,
}

/// State shared between an engine handle and its background worker.
///
/// Lock order: `keyspace`, then `wal` or `snapshots`.
#[derive(Debug)]
pub(crate) struct Shared {
    path: PathBuf,
    options: Options,
    mode: OpenMode,
    keyspace: RwLock<Keyspace>,
    wal: Mutex<Option<WalWriter>>,
    snapshots: Mutex<SnapshotList>,
    stats: Option<Statistics>,
    counters: Counters,
    background_error: Mutex<Option<String>>,
    jobs: Option<Sender<Job>>,
}

impl Shared {
    fn new(
        path: &Path,
        options: &Options,
        mode: OpenMode,
        keyspace: Keyspace,
        wal: Option<WalWriter>,
        jobs: Option<Sender<Job>>,
    ) -> Shared {
        Shared {
            path: path.to_path_buf(),
            options: options.clone(),
            mode,
            keyspace: RwLock::new(keyspace),
            wal: Mutex::new(wal),
            snapshots: Mutex::new(SnapshotList::default()),
            stats: if options.statistics {
                Some(Statistics::default())
            } else {
                None
            },
            counters: Counters::default(),
            background_error: Mutex::new(None),
            jobs,
        }
    }

    fn keyspace(&self) -> Result<RwLockReadGuard<Keyspace>, ErrorImpl> {
        self.keyspace.read().map_err(|_| ErrorImpl::DbPoisonError)
    }

    fn keyspace_mut(&self) -> Result<RwLockWriteGuard<Keyspace>, ErrorImpl> {
        self.keyspace.write().map_err(|_| ErrorImpl::DbPoisonError)
    }

    fn wal(&self) -> Result<MutexGuard<Option<WalWriter>>, ErrorImpl> {
        self.wal.lock().map_err(|_| ErrorImpl::DbPoisonError)
    }

    fn snapshots(&self) -> Result<MutexGuard<SnapshotList>, ErrorImpl> {
        self.snapshots.lock().map_err(|_| ErrorImpl::DbPoisonError)
    }

    fn tick(&self, ticker: Ticker, count: u64) {
        if let Some(stats) = &self.stats {
            stats.record(ticker, count);
        }
    }

    fn schedule(&self, job: Job) -> Result<(), ErrorImpl> {
        let jobs = self.jobs.as_ref().ok_or(ErrorImpl::ReadOnly)?;
        jobs.send(job).map_err(|_| ErrorImpl::ShuttingDown)
    }

    fn check_background_error(&self) -> Result<(), ErrorImpl> {
        let slot = self.background_error.lock().map_err(|_| ErrorImpl::DbPoisonError)?;
        match slot.as_ref() {
            Some(message) => Err(ErrorImpl::Background(message.clone())),
            None => Ok(()),
        }
    }

    pub(crate) fn record_background_error(&self, e: &ErrorImpl) {
        error!("Refusing further writes to {:?}: {}", self.path, e);
        self.counters.background_errors.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.background_error.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert_with(|| e.to_string());
    }

    /// Persist the live state as the table and empty the write-ahead log.
    /// Unless `force`d, does nothing when no write happened since the last
    /// flush.
    pub(crate) fn flush_now(&self, force: bool) -> Result<(), ErrorImpl> {
        if !self.write_table(force)? {
            return Ok(());
        }
        let trigger = self.options.level0_file_num_compaction_trigger;
        let since = self.counters.flushes_since_compaction.fetch_add(1, Ordering::SeqCst) + 1;
        if trigger > 0 && since >= trigger as u64 {
            self.counters.flushes_since_compaction.store(0, Ordering::SeqCst);
            if let Err(e) = self.schedule(Job::Compact) {
                debug!("Not scheduling compaction of {:?}: {}", self.path, e);
            }
        }
        Ok(())
    }

    /// The flush itself, without counting toward the compaction trigger.
    /// Returns whether a table was written.
    fn write_table(&self, force: bool) -> Result<bool, ErrorImpl> {
        let keyspace = self.keyspace()?;
        self.counters.flush_pending.store(false, Ordering::SeqCst);
        if !force && !self.counters.dirty.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut wal = self.wal()?;
        let sequence = keyspace.last_sequence();
        let written = table::write(&self.path, self.options.compression, sequence, keyspace.live_entries(sequence))?;
        if let Some(wal) = wal.as_mut() {
            wal.reset()?;
        }
        self.counters.dirty.store(false, Ordering::SeqCst);
        self.counters.unlogged.store(false, Ordering::SeqCst);
        self.counters.memtable_bytes.store(0, Ordering::SeqCst);
        self.counters.memtable_entries.store(0, Ordering::SeqCst);
        drop(wal);
        drop(keyspace);

        self.counters.flushes.fetch_add(1, Ordering::SeqCst);
        self.tick(Ticker::Flushes, 1);
        self.tick(Ticker::FlushBytes, written);
        debug!("Flushed {} bytes at sequence {} to {:?}", written, sequence, self.path);
        Ok(true)
    }

    /// Drop versions in `range` no pinned sequence can observe, then rewrite
    /// the table.
    pub(crate) fn compact_now(&self, range: KeyRange) -> Result<(), ErrorImpl> {
        let dropped = {
            let mut keyspace = self.keyspace_mut()?;
            let horizon = self.snapshots()?.oldest().unwrap_or_else(|| keyspace.last_sequence());
            keyspace.collect_garbage(range, horizon)
        };
        self.write_table(true)?;
        self.counters.flushes_since_compaction.store(0, Ordering::SeqCst);
        self.counters.compactions.fetch_add(1, Ordering::SeqCst);
        self.tick(Ticker::Compactions, 1);
        self.tick(Ticker::VersionsDropped, dropped as u64);
        debug!("Compacted {:?}: dropped {} obsolete versions", self.path, dropped);
        Ok(())
    }

    fn summary(&self) -> Option<String> {
        let keyspace = self.keyspace().ok()?;
        let snapshots = self.snapshots().ok()?;
        let wal_bytes = self.wal().ok()?.as_ref().map_or(0, WalWriter::len);
        Some(format!(
            "latest sequence: {}\nlive keys: {}\nretained versions: {}\nsnapshots: {}\nmemtable bytes: {}\nwal bytes: {}\nflushes: {}\ncompactions: {}\nbackground errors: {}\n",
            keyspace.last_sequence(),
            keyspace.num_live_keys(),
            keyspace.num_versions(),
            snapshots.len(),
            self.counters.memtable_bytes.load(Ordering::SeqCst),
            wal_bytes,
            self.counters.flushes.load(Ordering::SeqCst),
            self.counters.compactions.load(Ordering::SeqCst),
            self.counters.background_errors.load(Ordering::SeqCst),
        ))
    }
}

fn validate_options(options: &Options) -> Result<(), ErrorImpl> {
    if options.write_buffer_size == 0 {
        return Err(ErrorImpl::InvalidOption("write_buffer_size must be positive".into()));
    }
    if options.max_write_buffer_number < 1 {
        return Err(ErrorImpl::InvalidOption("max_write_buffer_number must be at least 1".into()));
    }
    if !table::is_linked(options.compression) {
        return Err(ErrorImpl::CompressionNotLinked(options.compression));
    }
    Ok(())
}

fn log_ignored_tunables(options: &Options) {
    let defaults = Options::default();
    macro_rules! ignored {
        ($($field:ident),*) => {
            $(
                if options.$field != defaults.$field {
                    debug!("Ignoring `{}={:?}`", stringify!($field), options.$field);
                }
            )*
        };
    }
    ignored!(
        min_write_buffer_number_to_merge,
        max_open_files,
        max_background_compactions,
        max_background_flushes,
        level0_slowdown_writes_trigger,
        level0_stop_writes_trigger,
        target_file_size_base,
        max_bytes_for_level_base,
        block_cache_size,
        bloom_bits_per_key,
        memtable_whole_key_filtering,
        memtable_prefix_bloom_size_ratio
    );
}

/// What reopening a directory recovered: the keyspace, plus the operations
/// and bytes replayed from the log on top of the table.
struct Recovery {
    keyspace: Keyspace,
    replayed_ops: u64,
    replayed_bytes: u64,
}

fn recover(path: &Path, replay: Replay) -> Result<Recovery, ErrorImpl> {
    let mut keyspace = match table::read(path)? {
        Some(table) => Keyspace::load(table.entries, table.sequence),
        None => Keyspace::default(),
    };
    let base = keyspace.last_sequence();
    let mut replayed_ops = 0;
    let mut replayed_bytes = 0;
    // Frames at or below the table's sequence were flushed before the log
    // could be emptied.
    for record in replay.records.iter().filter(|record| record.sequence > base) {
        replayed_bytes += keyspace.apply(&record.ops, record.sequence);
        replayed_ops += record.ops.len() as u64;
    }
    if replayed_ops > 0 {
        info!("Recovered {} operations from the write-ahead log of {:?}", replayed_ops, path);
    }
    Ok(Recovery {
        keyspace,
        replayed_ops,
        replayed_bytes,
    })
}

#[derive(Debug)]
pub struct EngineImpl {
    shared: Arc<Shared>,
    worker: Option<Worker>,
    lock: Option<PathLock>,
    closed: bool,
}

impl EngineImpl {
    fn open_writable(path: &Path, options: &Options, mode: OpenMode) -> Result<EngineImpl, ErrorImpl> {
        validate_options(options)?;
        let identity = path.join(IDENTITY_FILENAME);
        let exists = identity.exists();
        if exists && options.error_if_exists {
            return Err(ErrorImpl::DbAlreadyExists(path.to_path_buf()));
        }
        if !exists && !options.create_if_missing {
            return Err(ErrorImpl::DbDoesNotExist(path.to_path_buf()));
        }
        fs::create_dir_all(path)?;

        let lock = Manager::singleton()
            .lock()
            .map_err(|_| ErrorImpl::ManagerPoisonError)?
            .try_lock(path)?
            .ok_or_else(|| ErrorImpl::LockHeld(path.to_path_buf()))?;
        if !exists {
            fs::write(&identity, format!("{}\n", Uuid::new_v4()))?;
            info!("Created database at {:?}", lock.path());
        }

        let replay = wal::replay(path, options.paranoid_checks)?;
        let valid_len = replay.valid_len;
        let recovery = recover(path, replay)?;
        let wal = WalWriter::open(path, valid_len)?;
        fs::write(path.join(OPTIONS_FILENAME), bincode::serialize(options)?)?;
        log_ignored_tunables(options);

        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::new(path, options, mode, recovery.keyspace, Some(wal), Some(sender.clone())));
        shared.counters.dirty.store(recovery.replayed_ops > 0, Ordering::SeqCst);
        shared.counters.memtable_entries.store(recovery.replayed_ops, Ordering::SeqCst);
        shared.counters.memtable_bytes.store(recovery.replayed_bytes, Ordering::SeqCst);
        let worker = Worker::spawn(shared.clone(), sender, receiver)?;

        info!("Opened database at {:?} ({:?})", lock.path(), mode);
        Ok(EngineImpl {
            shared,
            worker: Some(worker),
            lock: Some(lock),
            closed: false,
        })
    }

    fn open_read_only(path: &Path, options: &Options, mode: OpenMode, error_if_wal_exists: bool) -> Result<EngineImpl, ErrorImpl> {
        if !path.join(IDENTITY_FILENAME).exists() {
            return Err(ErrorImpl::DbDoesNotExist(path.to_path_buf()));
        }
        if error_if_wal_exists && wal::size(path)? > 0 {
            return Err(ErrorImpl::WalExists(path.to_path_buf()));
        }
        let recovery = recover(path, wal::replay(path, options.paranoid_checks)?)?;
        info!("Opened database at {:?} for reading only", path);
        Ok(EngineImpl {
            shared: Arc::new(Shared::new(path, options, mode, recovery.keyspace, None, None)),
            worker: None,
            lock: None,
            closed: false,
        })
    }

    fn check_writable(&self) -> Result<(), ErrorImpl> {
        if self.shared.mode.is_read_only() {
            return Err(ErrorImpl::ReadOnly);
        }
        Ok(())
    }

    fn persist_on_close(&self) -> Result<(), ErrorImpl> {
        if self.shared.counters.unlogged.load(Ordering::SeqCst) {
            self.shared.flush_now(false)?;
        }
        if let Some(wal) = self.shared.wal()?.as_mut() {
            wal.sync()?;
        }
        Ok(())
    }
}

impl BackendSnapshots for EngineImpl {
    fn release_snapshot(&self, sequence: u64) {
        let mut snapshots = self.shared.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        snapshots.unpin(sequence);
    }
}

impl BackendEngine for EngineImpl {
    type Error = ErrorImpl;

    fn open(path: &Path, options: &Options, mode: OpenMode) -> Result<EngineImpl, ErrorImpl> {
        match mode {
            OpenMode::ReadOnly {
                error_if_wal_exists,
            } => EngineImpl::open_read_only(path, options, mode, error_if_wal_exists),
            OpenMode::ReadWrite | OpenMode::Transactional => EngineImpl::open_writable(path, options, mode),
        }
    }

    fn options(&self) -> &Options {
        &self.shared.options
    }

    fn get(&self, key: &[u8], sequence: Option<u64>) -> Result<Option<Vec<u8>>, ErrorImpl> {
        let keyspace = self.shared.keyspace()?;
        let sequence = sequence.unwrap_or_else(|| keyspace.last_sequence());
        let value = keyspace.get(key, sequence).map(<[u8]>::to_vec);
        drop(keyspace);
        self.shared.tick(Ticker::KeysRead, 1);
        if let Some(value) = &value {
            self.shared.tick(Ticker::BytesRead, value.len() as u64);
        }
        Ok(value)
    }

    fn key_may_exist(&self, key: &[u8]) -> bool {
        self.shared.keyspace().map(|keyspace| keyspace.has_versions(key)).unwrap_or(true)
    }

    fn write(&self, ops: &[BatchOp], options: &WriteOptions, check: Option<ConflictCheck>) -> Result<u64, ErrorImpl> {
        self.check_writable()?;
        self.shared.check_background_error()?;
        for op in ops {
            if let BatchOp::DeleteRange {
                start,
                end,
            } = op
            {
                if end < start {
                    return Err(ErrorImpl::InvalidRange);
                }
            }
        }

        let mut keyspace = self.shared.keyspace_mut()?;
        if let Some(check) = check {
            let stale = check.keys.iter().find(|key| keyspace.latest_sequence_of(key).map_or(false, |seq| seq > check.since));
            if let Some(key) = stale {
                self.shared.tick(Ticker::Conflicts, 1);
                return Err(ErrorImpl::WriteConflict(key.clone()));
            }
        }
        if ops.is_empty() {
            return Ok(keyspace.last_sequence());
        }

        let sequence = keyspace.last_sequence() + 1;
        if options.disable_wal {
            self.shared.counters.unlogged.store(true, Ordering::SeqCst);
        } else {
            let mut wal = self.shared.wal()?;
            let writer = wal.as_mut().ok_or(ErrorImpl::ReadOnly)?;
            let logged = match writer.append(sequence, ops, options.sync) {
                Ok(logged) => logged,
                Err(e) => {
                    // A frame left behind would replay under a reused sequence.
                    if writer.is_damaged() {
                        self.shared.record_background_error(&e);
                    }
                    return Err(e);
                },
            };
            self.shared.tick(Ticker::WalBytes, logged);
            if options.sync {
                self.shared.tick(Ticker::WalSyncs, 1);
            }
        }
        let added = keyspace.apply(ops, sequence);
        self.shared.counters.dirty.store(true, Ordering::SeqCst);
        self.shared.counters.memtable_entries.fetch_add(ops.len() as u64, Ordering::SeqCst);
        let buffered = self.shared.counters.memtable_bytes.fetch_add(added, Ordering::SeqCst) + added;
        drop(keyspace);

        self.shared.tick(Ticker::KeysWritten, ops.len() as u64);
        self.shared.tick(Ticker::BytesWritten, added);
        if buffered >= self.shared.options.write_buffer_size as u64
            && !self.shared.counters.flush_pending.swap(true, Ordering::SeqCst)
        {
            if let Err(e) = self.shared.schedule(Job::Flush) {
                warn!("Unable to schedule a flush of {:?}: {}", self.shared.path, e);
            }
        }
        Ok(sequence)
    }

    fn seek(&self, target: SeekTarget, sequence: u64) -> Result<Option<(Vec<u8>, Vec<u8>)>, ErrorImpl> {
        let keyspace = self.shared.keyspace()?;
        self.shared.tick(Ticker::Seeks, 1);
        Ok(keyspace.seek(target, sequence).map(|(key, value)| (key.to_vec(), value.to_vec())))
    }

    fn acquire_snapshot(&self) -> Result<u64, ErrorImpl> {
        let keyspace = self.shared.keyspace()?;
        let sequence = keyspace.last_sequence();
        self.shared.snapshots()?.pin(sequence);
        Ok(sequence)
    }

    fn compact_range(&self, range: KeyRange) -> Result<(), ErrorImpl> {
        self.check_writable()?;
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if end < start {
                return Err(ErrorImpl::InvalidRange);
            }
        }
        self.shared.compact_now(range)
    }

    fn flush(&self, wait: bool) -> Result<(), ErrorImpl> {
        self.check_writable()?;
        if wait {
            self.shared.flush_now(false)
        } else {
            self.shared.schedule(Job::Flush)
        }
    }

    fn property(&self, name: &str) -> Option<String> {
        let shared = &self.shared;
        let counters = &shared.counters;
        let value = match name.strip_prefix(PROPERTY_PREFIX)? {
            "estimate-num-keys" => shared.keyspace().ok()?.num_live_keys().to_string(),
            "num-entries-active-mem-table" => counters.memtable_entries.load(Ordering::SeqCst).to_string(),
            "cur-size-active-mem-table" => counters.memtable_bytes.load(Ordering::SeqCst).to_string(),
            "num-snapshots" => shared.snapshots().ok()?.len().to_string(),
            "oldest-snapshot-sequence" => shared.snapshots().ok()?.oldest()?.to_string(),
            "latest-sequence-number" => shared.keyspace().ok()?.last_sequence().to_string(),
            "num-versions" => shared.keyspace().ok()?.num_versions().to_string(),
            "estimate-live-data-size" => shared.keyspace().ok()?.live_data_size().to_string(),
            "num-flushes" => counters.flushes.load(Ordering::SeqCst).to_string(),
            "num-compactions" => counters.compactions.load(Ordering::SeqCst).to_string(),
            "background-errors" => counters.background_errors.load(Ordering::SeqCst).to_string(),
            "is-read-only" => u8::from(shared.mode.is_read_only()).to_string(),
            "options" => shared.options.describe(),
            "stats" => shared.summary()?,
            "options-statistics" => shared.stats.as_ref()?.render(),
            _ => return None,
        };
        Some(value)
    }

    fn approximate_sizes(&self, ranges: &[KeyRange]) -> Result<Vec<u64>, ErrorImpl> {
        let keyspace = self.shared.keyspace()?;
        Ok(ranges.iter().map(|range| keyspace.approximate_size(*range)).collect())
    }

    fn close(&mut self) -> Result<(), ErrorImpl> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        let result = if self.shared.mode.is_read_only() {
            Ok(())
        } else {
            self.persist_on_close()
        };
        self.lock = None;
        info!("Closed database at {:?}", self.shared.path);
        result
    }
}

impl Drop for EngineImpl {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close database at {:?}: {}", self.shared.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(key: &[u8], value: &[u8]) -> BatchOp {
        BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    fn create_options() -> Options {
        let mut options = Options::new();
        options.set_create_if_missing(true);
        options
    }

    #[test]
    fn test_reopen_replays_log_then_table() {
        let root = tempfile::Builder::new().prefix("test_engine_reopen").tempdir().expect("tempdir");
        let wo = WriteOptions::default();
        {
            let engine = EngineImpl::open(root.path(), &create_options(), OpenMode::ReadWrite).expect("opened");
            engine.write(&[put(b"a", b"1")], &wo, None).expect("written");
            engine.flush(true).expect("flushed");
            engine.write(&[put(b"b", b"2")], &wo, None).expect("written");
        }
        let engine = EngineImpl::open(root.path(), &Options::new(), OpenMode::ReadWrite).expect("reopened");
        assert_eq!(engine.get(b"a", None).expect("read"), Some(b"1".to_vec()));
        assert_eq!(engine.get(b"b", None).expect("read"), Some(b"2".to_vec()));
        assert_eq!(engine.property("orderkv.latest-sequence-number"), Some("2".to_string()));
    }

    #[test]
    fn test_conflict_check() {
        let root = tempfile::Builder::new().prefix("test_engine_conflict").tempdir().expect("tempdir");
        let engine = EngineImpl::open(root.path(), &create_options(), OpenMode::Transactional).expect("opened");
        let wo = WriteOptions::default();
        let begin = engine.write(&[put(b"k", b"0")], &wo, None).expect("written");
        let keys = vec![b"k".to_vec()];

        engine.write(&[put(b"k", b"1")], &wo, None).expect("written");
        let check = ConflictCheck {
            since: begin,
            keys: &keys,
        };
        match engine.write(&[put(b"k", b"2")], &wo, Some(check)) {
            Err(ErrorImpl::WriteConflict(key)) => assert_eq!(key, b"k".to_vec()),
            other => panic!("expected a conflict, got {:?}", other),
        }
        assert_eq!(engine.get(b"k", None).expect("read"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_compaction_keeps_pinned_versions() {
        let root = tempfile::Builder::new().prefix("test_engine_compaction").tempdir().expect("tempdir");
        let engine = EngineImpl::open(root.path(), &create_options(), OpenMode::ReadWrite).expect("opened");
        let wo = WriteOptions::default();
        engine.write(&[put(b"k", b"old")], &wo, None).expect("written");
        let pinned = engine.acquire_snapshot().expect("pinned");
        engine.write(&[put(b"k", b"new")], &wo, None).expect("written");

        engine.compact_range(KeyRange::all()).expect("compacted");
        assert_eq!(engine.get(b"k", Some(pinned)).expect("read"), Some(b"old".to_vec()));
        assert_eq!(engine.property("orderkv.num-versions"), Some("2".to_string()));

        engine.release_snapshot(pinned);
        engine.compact_range(KeyRange::all()).expect("compacted");
        assert_eq!(engine.property("orderkv.num-versions"), Some("1".to_string()));
        assert_eq!(engine.property("orderkv.num-compactions"), Some("2".to_string()));
    }

    #[test]
    fn test_compaction_does_not_schedule_compaction() {
        let root = tempfile::Builder::new().prefix("test_engine_compaction_trigger").tempdir().expect("tempdir");
        let mut options = create_options();
        options.set_level0_file_num_compaction_trigger(1);
        let mut engine = EngineImpl::open(root.path(), &options, OpenMode::ReadWrite).expect("opened");
        engine.write(&[put(b"k", b"v")], &WriteOptions::default(), None).expect("written");

        engine.compact_range(KeyRange::all()).expect("compacted");
        // Shutting down runs whatever the compaction queued.
        engine.worker.take().expect("worker").shutdown();
        assert_eq!(engine.property("orderkv.num-compactions"), Some("1".to_string()));
        assert_eq!(engine.property("orderkv.num-flushes"), Some("1".to_string()));
    }

    #[test]
    fn test_scheduling_after_shutdown() {
        let root = tempfile::Builder::new().prefix("test_engine_shutdown").tempdir().expect("tempdir");
        let mut engine = EngineImpl::open(root.path(), &create_options(), OpenMode::ReadWrite).expect("opened");
        engine.worker.take().expect("worker").shutdown();
        match engine.flush(false) {
            Err(ErrorImpl::ShuttingDown) => {},
            other => panic!("expected shutdown, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_background_flush_fails_writes() {
        let root = tempfile::Builder::new().prefix("test_engine_bg_error").tempdir().expect("tempdir");
        let path = root.path().join("db");
        let mut engine = EngineImpl::open(&path, &create_options(), OpenMode::ReadWrite).expect("opened");
        let wo = WriteOptions::default();
        engine.write(&[put(b"a", b"1")], &wo, None).expect("written");

        fs::remove_dir_all(&path).expect("removed");
        engine.flush(false).expect("scheduled");
        engine.worker.take().expect("worker").shutdown();

        match engine.write(&[put(b"b", b"2")], &wo, None) {
            Err(ErrorImpl::Background(_)) => {},
            other => panic!("expected a background error, got {:?}", other),
        }
        assert_eq!(engine.property("orderkv.background-errors"), Some("1".to_string()));
    }

    #[test]
    fn test_auto_flush_when_buffer_fills() {
        let root = tempfile::Builder::new().prefix("test_engine_auto_flush").tempdir().expect("tempdir");
        let mut options = create_options();
        options.set_write_buffer_size(64);
        let mut engine = EngineImpl::open(root.path(), &options, OpenMode::ReadWrite).expect("opened");
        let wo = WriteOptions::default();
        engine.write(&[put(b"key", &[7u8; 100])], &wo, None).expect("written");
        engine.worker.take().expect("worker").shutdown();

        assert_eq!(engine.property("orderkv.num-flushes"), Some("1".to_string()));
        assert_eq!(engine.property("orderkv.cur-size-active-mem-table"), Some("0".to_string()));
        assert!(root.path().join(table::TABLE_FILENAME).exists());
    }

    #[test]
    fn test_unknown_property() {
        let root = tempfile::Builder::new().prefix("test_engine_property").tempdir().expect("tempdir");
        let engine = EngineImpl::open(root.path(), &create_options(), OpenMode::ReadWrite).expect("opened");
        assert_eq!(engine.property("orderkv.no-such-property"), None);
        assert_eq!(engine.property("estimate-num-keys"), None);
        assert_eq!(engine.property("orderkv.oldest-snapshot-sequence"), None);
        assert_eq!(engine.property("orderkv.options-statistics"), None);
        assert_eq!(engine.property("orderkv.is-read-only"), Some("0".to_string()));
    }
}
