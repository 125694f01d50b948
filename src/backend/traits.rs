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
    fmt::{
        Debug,
        Display,
    },
    path::Path,
};

use crate::{
    backend::common::{
        BatchOp,
        ConflictCheck,
        KeyRange,
        OpenMode,
        SeekTarget,
    },
    error::Status,
    options::{
        Options,
        WriteOptions,
    },
};

pub trait BackendError: Debug + Display + Into<Status> {}

/// The part of an engine a `Snapshot` needs to release itself on drop.
pub trait BackendSnapshots: Send + Sync {
    fn release_snapshot(&self, sequence: u64);
}

/// The primitives an engine instance provides to the handle layer.
///
/// Reads are addressed by sequence number: `Some(seq)` observes the state as
/// of that commit, `None` the latest committed state. The handle layer pins a
/// sequence with `acquire_snapshot` before relying on it for more than one
/// call.
pub trait BackendEngine: BackendSnapshots + Debug + Sized {
    type Error: BackendError;

    fn open(path: &Path, options: &Options, mode: OpenMode) -> Result<Self, Self::Error>;

    fn options(&self) -> &Options;

    fn get(&self, key: &[u8], sequence: Option<u64>) -> Result<Option<Vec<u8>>, Self::Error>;

    /// May answer `true` for an absent key. Never answers `false` for a
    /// present one.
    fn key_may_exist(&self, key: &[u8]) -> bool;

    /// Apply `ops` atomically under a single new sequence number, which is
    /// returned. With a `check`, the write is rejected as a conflict if any
    /// checked key changed after `check.since`.
    fn write(&self, ops: &[BatchOp], options: &WriteOptions, check: Option<ConflictCheck>) -> Result<u64, Self::Error>;

    /// The entry `target` lands on, as visible at `sequence`.
    #[allow(clippy::type_complexity)]
    fn seek(&self, target: SeekTarget, sequence: u64) -> Result<Option<(Vec<u8>, Vec<u8>)>, Self::Error>;

    /// Pin the latest sequence number so the versions it observes survive
    /// compaction until `release_snapshot`.
    fn acquire_snapshot(&self) -> Result<u64, Self::Error>;

    fn compact_range(&self, range: KeyRange) -> Result<(), Self::Error>;

    fn flush(&self, wait: bool) -> Result<(), Self::Error>;

    fn property(&self, name: &str) -> Option<String>;

    fn approximate_sizes(&self, ranges: &[KeyRange]) -> Result<Vec<u64>, Self::Error>;

    fn close(&mut self) -> Result<(), Self::Error>;
}
