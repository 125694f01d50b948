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
    collections::BTreeMap,
    ops::Bound,
};

use crate::backend::common::{
    BatchOp,
    KeyRange,
    SeekTarget,
};

/// A committed version: the sequence number that wrote it, and the value, or
/// `None` for a deletion.
type Version = (u64, Option<Box<[u8]>>);

type Entry<'a> = (&'a Box<[u8]>, &'a Vec<Version>);

/// Per-version bookkeeping counted towards size estimates.
const VERSION_OVERHEAD: u64 = 8;

/// The versioned keyspace. Each key keeps its versions in ascending sequence
/// order, so a read at sequence `s` sees the newest version `<= s`.
#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    map: BTreeMap<Box<[u8]>, Vec<Version>>,
    last_sequence: u64,
}

fn visible(versions: &[Version], sequence: u64) -> Option<&[u8]> {
    versions.iter().rev().find(|(seq, _)| *seq <= sequence).and_then(|(_, value)| value.as_deref())
}

fn first_live<'a, I>(mut entries: I, sequence: u64) -> Option<(&'a [u8], &'a [u8])>
where
    I: Iterator<Item = Entry<'a>>,
{
    entries.find_map(|(key, versions)| visible(versions, sequence).map(|value| (&key[..], value)))
}

fn bound(key: Option<&[u8]>, inclusive: bool) -> Bound<&[u8]> {
    match key {
        None => Bound::Unbounded,
        Some(key) if inclusive => Bound::Included(key),
        Some(key) => Bound::Excluded(key),
    }
}

impl Keyspace {
    /// A keyspace holding `entries`, all visible from `sequence` on.
    pub(crate) fn load(entries: Vec<(Vec<u8>, Vec<u8>)>, sequence: u64) -> Keyspace {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key.into_boxed_slice(), vec![(sequence, Some(value.into_boxed_slice()))]))
            .collect();
        Keyspace {
            map,
            last_sequence: sequence,
        }
    }

    pub(crate) fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub(crate) fn get(&self, key: &[u8], sequence: u64) -> Option<&[u8]> {
        self.map.get(key).and_then(|versions| visible(versions, sequence))
    }

    /// Whether any version of `key` is retained, deletions included.
    pub(crate) fn has_versions(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// The sequence number of the newest retained version of `key`.
    pub(crate) fn latest_sequence_of(&self, key: &[u8]) -> Option<u64> {
        self.map.get(key).and_then(|versions| versions.last()).map(|(seq, _)| *seq)
    }

    /// Apply `ops` in order under `sequence`, returning the number of bytes
    /// they added. Later ops in the same batch overwrite earlier ones.
    pub(crate) fn apply(&mut self, ops: &[BatchOp], sequence: u64) -> u64 {
        let mut added = 0;
        for op in ops {
            match op {
                BatchOp::Put {
                    key,
                    value,
                } => {
                    added += self.record(key, Some(&value[..]), sequence);
                },
                BatchOp::Delete {
                    key,
                } => {
                    added += self.record(key, None, sequence);
                },
                BatchOp::DeleteRange {
                    start,
                    end,
                } => {
                    if start >= end {
                        continue;
                    }
                    let doomed: Vec<Box<[u8]>> = self
                        .map
                        .range::<[u8], _>((Bound::Included(&start[..]), Bound::Excluded(&end[..])))
                        .filter(|(_, versions)| visible(versions, sequence).is_some())
                        .map(|(key, _)| key.clone())
                        .collect();
                    for key in doomed {
                        added += self.record(&key, None, sequence);
                    }
                },
            }
        }
        if sequence > self.last_sequence {
            self.last_sequence = sequence;
        }
        added
    }

    fn record(&mut self, key: &[u8], value: Option<&[u8]>, sequence: u64) -> u64 {
        let size = key.len() as u64 + value.map_or(0, |v| v.len() as u64) + VERSION_OVERHEAD;
        let value = value.map(Box::from);
        let versions = match self.map.get_mut(key) {
            Some(versions) => versions,
            None => self.map.entry(Box::from(key)).or_default(),
        };
        match versions.last_mut() {
            Some(last) if last.0 == sequence => last.1 = value,
            _ => versions.push((sequence, value)),
        }
        size
    }

    /// The entry `target` lands on, as visible at `sequence`.
    pub(crate) fn seek(&self, target: SeekTarget, sequence: u64) -> Option<(&[u8], &[u8])> {
        match target {
            SeekTarget::First => first_live(self.map.iter(), sequence),
            SeekTarget::Last => first_live(self.map.iter().rev(), sequence),
            SeekTarget::AtOrAfter(key) => {
                first_live(self.map.range::<[u8], _>((Bound::Included(key), Bound::Unbounded)), sequence)
            },
            SeekTarget::After(key) => first_live(self.map.range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded)), sequence),
            SeekTarget::AtOrBefore(key) => {
                first_live(self.map.range::<[u8], _>((Bound::Unbounded, Bound::Included(key))).rev(), sequence)
            },
            SeekTarget::Before(key) => {
                first_live(self.map.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key))).rev(), sequence)
            },
        }
    }

    /// Every live pair at `sequence`, in key order.
    pub(crate) fn live_entries(&self, sequence: u64) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.map.iter().filter_map(move |(key, versions)| visible(versions, sequence).map(|value| (&key[..], value)))
    }

    fn range(&self, range: KeyRange) -> impl Iterator<Item = Entry> {
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start >= end {
                return self.map.range::<[u8], _>((Bound::Included(start), Bound::Excluded(start)));
            }
        }
        self.map.range::<[u8], _>((bound(range.start, true), bound(range.end, false)))
    }

    /// Drop versions in `range` that no read at or after `horizon` can
    /// observe. Returns the number of versions removed.
    pub(crate) fn collect_garbage(&mut self, range: KeyRange, horizon: u64) -> usize {
        let keys: Vec<Box<[u8]>> = self.range(range).map(|(key, _)| key.clone()).collect();
        let mut removed = 0;
        for key in keys {
            let versions = match self.map.get_mut(&key) {
                Some(versions) => versions,
                None => continue,
            };
            let before = versions.len();
            if let Some(keep_from) = versions.iter().rposition(|(seq, _)| *seq <= horizon) {
                versions.drain(..keep_from);
                // Nothing older is left for this deletion to hide.
                if versions[0].1.is_none() {
                    versions.remove(0);
                }
            }
            removed += before - versions.len();
            if versions.is_empty() {
                self.map.remove(&key);
            }
        }
        removed
    }

    pub(crate) fn approximate_size(&self, range: KeyRange) -> u64 {
        self.range(range)
            .flat_map(|(key, versions)| {
                versions.iter().map(move |(_, value)| {
                    key.len() as u64 + value.as_ref().map_or(0, |v| v.len() as u64) + VERSION_OVERHEAD
                })
            })
            .sum()
    }

    pub(crate) fn num_live_keys(&self) -> usize {
        self.live_entries(self.last_sequence).count()
    }

    pub(crate) fn num_versions(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub(crate) fn live_data_size(&self) -> u64 {
        self.live_entries(self.last_sequence).map(|(key, value)| (key.len() + value.len()) as u64).sum()
    }
}

/// Sequence numbers pinned by live snapshots and transactions, with a count
/// per sequence.
#[derive(Debug, Default)]
pub(crate) struct SnapshotList {
    pinned: BTreeMap<u64, usize>,
}

impl SnapshotList {
    pub(crate) fn pin(&mut self, sequence: u64) {
        *self.pinned.entry(sequence).or_insert(0) += 1;
    }

    pub(crate) fn unpin(&mut self, sequence: u64) {
        if let Some(count) = self.pinned.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                self.pinned.remove(&sequence);
            }
        }
    }

    pub(crate) fn oldest(&self) -> Option<u64> {
        self.pinned.keys().next().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.pinned.values().sum()
    }
}
