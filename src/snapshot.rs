// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fmt;

use uuid::Uuid;

use crate::backend::BackendSnapshots;

/// A pinned, point-in-time view of a `Database`.
///
/// Reads through `ReadOptions::set_snapshot` observe the committed state as
/// of the moment the snapshot was taken. The engine keeps every version such
/// a read could need until the snapshot is released, either explicitly with
/// `release` or by dropping it. A snapshot that is never released makes the
/// engine retain superseded versions indefinitely, so space grows without
/// bound; it is never a memory-safety hazard.
pub struct Snapshot<'db> {
    sequence: u64,
    owner: Uuid,
    engine: &'db dyn BackendSnapshots,
}

impl<'db> Snapshot<'db> {
    pub(crate) fn new(sequence: u64, owner: Uuid, engine: &'db dyn BackendSnapshots) -> Snapshot<'db> {
        Snapshot {
            sequence,
            owner,
            engine,
        }
    }

    /// The sequence number of the last commit this snapshot observes.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn owner(&self) -> Uuid {
        self.owner
    }

    /// Release the pin. Equivalent to dropping the snapshot.
    pub fn release(self) {}
}

impl<'db> Drop for Snapshot<'db> {
    fn drop(&mut self) {
        self.engine.release_snapshot(self.sequence);
    }
}

impl<'db> fmt::Debug for Snapshot<'db> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Snapshot").field("sequence", &self.sequence).field("owner", &self.owner).finish()
    }
}
