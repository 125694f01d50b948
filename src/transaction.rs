// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use log::debug;
use uuid::Uuid;

use crate::{
    backend::{
        BackendEngine,
        BatchOp,
        ConflictCheck,
        SafeModeEngine,
    },
    db::snapshot_sequence,
    error::{
        Code,
        Result,
        Status,
    },
    iter::{
        DbIterator,
        Overlay,
    },
    options::{
        ReadOptions,
        WriteOptions,
    },
};

/// How a commit ended.
#[must_use]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CommitOutcome {
    /// Every buffered write is now visible. The transaction is finished.
    Committed,
    /// A key read with `get_for_update` was changed by a commit that
    /// happened after this transaction began. Nothing was written and the
    /// transaction is finished; run it again from the start to retry.
    Conflict(Status),
    /// The engine failed to apply the writes. The transaction is still open
    /// with its buffer intact.
    Failed(Status),
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        *self == CommitOutcome::Committed
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CommitOutcome::Conflict(_))
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            CommitOutcome::Committed => Ok(()),
            CommitOutcome::Conflict(status) | CommitOutcome::Failed(status) => Err(status),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum State {
    Open,
    Committed,
    Conflicted,
    RolledBack,
}

#[derive(Debug, Copy, Clone)]
struct Savepoint {
    writes: usize,
    tracked: usize,
}

/// An optimistic unit of work on a transactional `Database`.
///
/// Writes are buffered and become visible atomically on `commit`. Reads see
/// committed state overlaid with the transaction's own writes. Keys read
/// with `get_for_update` are validated at commit: if another commit changed
/// one of them after this transaction began, the commit reports a conflict
/// and writes nothing.
///
/// Committing, hitting a conflict or rolling back finishes the transaction,
/// after which every operation fails with `InvalidArgument`. Dropping an
/// unfinished transaction rolls it back.
#[derive(Debug)]
pub struct Transaction<'db, E = SafeModeEngine>
where
    E: BackendEngine,
{
    engine: &'db E,
    owner: Uuid,
    write_options: WriteOptions,
    begin_sequence: u64,
    writes: Vec<BatchOp>,
    overlay: Overlay,
    tracked: Vec<Vec<u8>>,
    savepoints: Vec<Savepoint>,
    state: State,
}

impl<'db, E> Transaction<'db, E>
where
    E: BackendEngine,
{
    /// `begin_sequence` must already be pinned. The transaction unpins it
    /// when it finishes.
    pub(crate) fn new(engine: &'db E, owner: Uuid, write_options: WriteOptions, begin_sequence: u64) -> Transaction<'db, E> {
        Transaction {
            engine,
            owner,
            write_options,
            begin_sequence,
            writes: vec![],
            overlay: Overlay::new(),
            tracked: vec![],
            savepoints: vec![],
            state: State::Open,
        }
    }

    /// The sequence number of the last commit visible when the transaction
    /// began.
    pub fn begin_sequence(&self) -> u64 {
        self.begin_sequence
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// The number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Committed => Err(Status::invalid_argument("Transaction has already been committed")),
            State::Conflicted => Err(Status::invalid_argument("Transaction has already failed to commit")),
            State::RolledBack => Err(Status::invalid_argument("Transaction has already been rolled back")),
        }
    }

    fn finish(&mut self, state: State) {
        self.state = state;
        self.writes.clear();
        self.overlay.clear();
        self.tracked.clear();
        self.savepoints.clear();
        self.engine.release_snapshot(self.begin_sequence);
    }

    pub fn get<K>(&self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        self.get_opt(key, &ReadOptions::default())
    }

    /// Read `key` from the transaction's own writes, falling back to
    /// committed state.
    pub fn get_opt<K>(&self, key: K, options: &ReadOptions) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        self.check_open()?;
        let key = key.as_ref();
        if let Some(buffered) = self.overlay.get(key) {
            return Ok(buffered.clone());
        }
        let sequence = snapshot_sequence(options, self.owner)?;
        self.engine.get(key, sequence).map_err(|e| e.into())
    }

    pub fn get_for_update<K>(&mut self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        self.get_for_update_opt(key, &ReadOptions::default())
    }

    /// Read `key` like `get_opt` and validate at commit that no other
    /// commit changed it after this transaction began.
    pub fn get_for_update_opt<K>(&mut self, key: K, options: &ReadOptions) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        let value = self.get_opt(key, options)?;
        if !self.tracked.iter().any(|tracked| tracked == key) {
            self.tracked.push(key.to_vec());
        }
        Ok(value)
    }

    pub fn put<K, V>(&mut self, key: K, value: V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.check_open()?;
        let (key, value) = (key.as_ref().to_vec(), value.as_ref().to_vec());
        self.overlay.insert(key.clone(), Some(value.clone()));
        self.writes.push(BatchOp::Put {
            key,
            value,
        });
        Ok(())
    }

    pub fn delete<K>(&mut self, key: K) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        self.check_open()?;
        let key = key.as_ref().to_vec();
        self.overlay.insert(key.clone(), None);
        self.writes.push(BatchOp::Delete {
            key,
        });
        Ok(())
    }

    pub fn iterator(&self) -> DbIterator<'_, E> {
        self.iterator_opt(&ReadOptions::default())
    }

    /// Iterate over committed state overlaid with this transaction's writes.
    pub fn iterator_opt(&self, options: &ReadOptions) -> DbIterator<'_, E> {
        match self.check_open() {
            Ok(()) => DbIterator::new(self.engine, self.owner, options, Some(&self.overlay)),
            Err(status) => DbIterator::failed(self.engine, status),
        }
    }

    /// Mark the current state of the buffer, to return to it with
    /// `rollback_to_savepoint`.
    pub fn set_savepoint(&mut self) -> Result<()> {
        self.check_open()?;
        self.savepoints.push(Savepoint {
            writes: self.writes.len(),
            tracked: self.tracked.len(),
        });
        Ok(())
    }

    /// Discard the writes, and forget the keys read for update, since the
    /// most recent savepoint, and remove that savepoint. Fails with
    /// `NotFound` when there is none.
    pub fn rollback_to_savepoint(&mut self) -> Result<()> {
        self.check_open()?;
        let savepoint = self.savepoints.pop().ok_or_else(|| Status::not_found("No savepoint to roll back to"))?;
        self.writes.truncate(savepoint.writes);
        self.tracked.truncate(savepoint.tracked);
        self.overlay.clear();
        for op in &self.writes {
            match op {
                BatchOp::Put {
                    key,
                    value,
                } => self.overlay.insert(key.clone(), Some(value.clone())),
                BatchOp::Delete {
                    key,
                } => self.overlay.insert(key.clone(), None),
                BatchOp::DeleteRange {
                    ..
                } => None,
            };
        }
        Ok(())
    }

    /// Validate and apply every buffered write atomically.
    pub fn commit(&mut self) -> CommitOutcome {
        if let Err(status) = self.check_open() {
            return CommitOutcome::Failed(status);
        }
        let check = ConflictCheck {
            since: self.begin_sequence,
            keys: &self.tracked,
        };
        match self.engine.write(&self.writes, &self.write_options, Some(check)) {
            Ok(sequence) => {
                debug!("Committed {} writes at sequence {}", self.writes.len(), sequence);
                self.finish(State::Committed);
                CommitOutcome::Committed
            },
            Err(e) => {
                let status: Status = e.into();
                if status.code() == Code::Busy {
                    self.finish(State::Conflicted);
                    CommitOutcome::Conflict(status)
                } else {
                    CommitOutcome::Failed(status)
                }
            },
        }
    }

    /// Discard every buffered write and finish the transaction.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        self.finish(State::RolledBack);
        Ok(())
    }
}

impl<'db, E> Drop for Transaction<'db, E>
where
    E: BackendEngine,
{
    fn drop(&mut self) {
        if self.state == State::Open {
            debug!("Rolling back an abandoned transaction with {} writes", self.writes.len());
            self.finish(State::RolledBack);
        }
    }
}
