// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use serde_derive::{
    Deserialize,
    Serialize,
};

/// How an engine instance is opened.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum OpenMode {
    ReadWrite,
    ReadOnly {
        error_if_wal_exists: bool,
    },
    Transactional,
}

impl OpenMode {
    pub fn is_read_only(self) -> bool {
        matches!(self, OpenMode::ReadOnly { .. })
    }

    pub fn is_transactional(self) -> bool {
        self == OpenMode::Transactional
    }
}

/// One mutation of a write batch, as handed to the engine and logged.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum BatchOp {
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        key: Vec<u8>,
    },
    /// Deletes every key in `[start, end)`.
    DeleteRange {
        start: Vec<u8>,
        end: Vec<u8>,
    },
}

/// Where a cursor should land, relative to a key.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SeekTarget<'k> {
    First,
    Last,
    /// First key `>= k`.
    AtOrAfter(&'k [u8]),
    /// First key `> k`.
    After(&'k [u8]),
    /// Last key `<= k`.
    AtOrBefore(&'k [u8]),
    /// Last key `< k`.
    Before(&'k [u8]),
}

impl<'k> SeekTarget<'k> {
    pub fn is_forward(&self) -> bool {
        matches!(self, SeekTarget::First | SeekTarget::AtOrAfter(_) | SeekTarget::After(_))
    }
}

/// A half-open key range `[start, end)`. A missing bound extends to that end
/// of the keyspace.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct KeyRange<'k> {
    pub start: Option<&'k [u8]>,
    pub end: Option<&'k [u8]>,
}

impl<'k> KeyRange<'k> {
    pub fn new(start: &'k [u8], end: &'k [u8]) -> KeyRange<'k> {
        KeyRange {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn all() -> KeyRange<'k> {
        KeyRange::default()
    }

    pub fn from_start(start: &'k [u8]) -> KeyRange<'k> {
        KeyRange {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: &'k [u8]) -> KeyRange<'k> {
        KeyRange {
            start: None,
            end: Some(end),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.start.map_or(true, |start| key >= start) && self.end.map_or(true, |end| key < end)
    }
}

/// Keys an optimistic transaction read for update, and the sequence number
/// it began at. A write carrying this check fails if any of the keys has a
/// committed version newer than `since`.
#[derive(Debug, Clone, Copy)]
pub struct ConflictCheck<'t> {
    pub since: u64,
    pub keys: &'t [Vec<u8>],
}
