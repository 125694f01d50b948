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

use uuid::Uuid;

use crate::{
    backend::{
        BackendEngine,
        SafeModeEngine,
        SeekTarget,
    },
    error::{
        Result,
        Status,
    },
    options::{
        PrefixExtractor,
        ReadOptions,
    },
};

/// A transaction's buffered writes by key. `None` marks a deletion.
pub(crate) type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

type Entry = (Vec<u8>, Vec<u8>);

fn seek_overlay<'o>(overlay: &'o Overlay, target: SeekTarget) -> Option<(&'o Vec<u8>, &'o Option<Vec<u8>>)> {
    match target {
        SeekTarget::First => overlay.iter().next(),
        SeekTarget::Last => overlay.iter().next_back(),
        SeekTarget::AtOrAfter(key) => overlay.range::<[u8], _>((Bound::Included(key), Bound::Unbounded)).next(),
        SeekTarget::After(key) => overlay.range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded)).next(),
        SeekTarget::AtOrBefore(key) => overlay.range::<[u8], _>((Bound::Unbounded, Bound::Included(key))).next_back(),
        SeekTarget::Before(key) => overlay.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key))).next_back(),
    }
}

/// A cursor over a consistent view of the keyspace.
///
/// The view is fixed when the iterator is created: the latest committed
/// state at that moment, the state of an explicit snapshot, or a
/// transaction's buffered writes over committed state. Writes made afterwards
/// are not observed.
///
/// An iterator is either valid, positioned on an entry, or invalid. Running
/// off either end leaves it invalid with an `Ok` status; `status` reports
/// whether an error stopped it instead.
///
/// `key` and `value` borrow from the iterator, so they cannot be held across
/// a call that moves it.
pub struct DbIterator<'a, E = SafeModeEngine>
where
    E: BackendEngine,
{
    engine: &'a E,
    overlay: Option<&'a Overlay>,
    sequence: u64,
    pinned: bool,
    current: Option<Entry>,
    status: Result<()>,
    extractor: Option<PrefixExtractor>,
    prefix_same_as_start: bool,
    prefix: Option<Vec<u8>>,
}

impl<'a, E> DbIterator<'a, E>
where
    E: BackendEngine,
{
    pub(crate) fn new(engine: &'a E, owner: Uuid, options: &ReadOptions, overlay: Option<&'a Overlay>) -> DbIterator<'a, E> {
        let mut iter = DbIterator {
            engine,
            overlay,
            sequence: 0,
            pinned: false,
            current: None,
            status: Ok(()),
            extractor: engine.options().prefix_extractor(),
            prefix_same_as_start: options.prefix_same_as_start(),
            prefix: None,
        };
        match options.snapshot() {
            Some(snapshot) if snapshot.owner() != owner => {
                iter.status = Err(Status::invalid_argument("Snapshot belongs to a different database"));
            },
            Some(snapshot) => iter.sequence = snapshot.sequence(),
            None => match engine.acquire_snapshot() {
                Ok(sequence) => {
                    iter.sequence = sequence;
                    iter.pinned = true;
                },
                Err(e) => iter.status = Err(e.into()),
            },
        }
        iter
    }

    /// An iterator that failed before it could be bound to a view.
    pub(crate) fn failed(engine: &'a E, status: Status) -> DbIterator<'a, E> {
        DbIterator {
            engine,
            overlay: None,
            sequence: 0,
            pinned: false,
            current: None,
            status: Err(status),
            extractor: None,
            prefix_same_as_start: false,
            prefix: None,
        }
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn seek_to_first(&mut self) {
        self.prefix = None;
        self.position(SeekTarget::First);
    }

    pub fn seek_to_last(&mut self) {
        self.prefix = None;
        self.position(SeekTarget::Last);
    }

    /// Position at the first key at or after `key`.
    pub fn seek<K>(&mut self, key: K)
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        self.bind_prefix(key);
        self.position(SeekTarget::AtOrAfter(key));
    }

    /// Position at the last key at or before `key`.
    pub fn seek_for_prev<K>(&mut self, key: K)
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        self.bind_prefix(key);
        self.position(SeekTarget::AtOrBefore(key));
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.position(SeekTarget::After(&key));
        }
    }

    pub fn prev(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.position(SeekTarget::Before(&key));
        }
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(key, _)| &key[..])
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, value)| &value[..])
    }

    pub fn item(&self) -> Option<(&[u8], &[u8])> {
        self.current.as_ref().map(|(key, value)| (&key[..], &value[..]))
    }

    /// `Ok` unless an error stopped the iterator.
    pub fn status(&self) -> Result<()> {
        self.status.clone()
    }

    fn bind_prefix(&mut self, target: &[u8]) {
        self.prefix = match (self.prefix_same_as_start, self.extractor) {
            (true, Some(extractor)) => extractor.prefix(target).map(<[u8]>::to_vec),
            _ => None,
        };
    }

    fn within_prefix(&self, key: &[u8]) -> bool {
        match (&self.prefix, self.extractor) {
            (Some(prefix), Some(extractor)) => extractor.prefix(key) == Some(&prefix[..]),
            _ => true,
        }
    }

    fn position(&mut self, target: SeekTarget) {
        if self.status.is_err() {
            self.current = None;
            return;
        }
        match self.locate(target) {
            Ok(entry) => self.current = entry.filter(|(key, _)| self.within_prefix(key)),
            Err(status) => {
                self.current = None;
                self.status = Err(status);
            },
        }
    }

    /// The entry `target` lands on in the merged view. Buffered writes shadow
    /// committed entries with the same key, and buffered deletions are
    /// stepped over.
    fn locate(&self, target: SeekTarget) -> Result<Option<Entry>> {
        let forward = target.is_forward();
        let mut resume: Option<Vec<u8>> = None;
        loop {
            let target = match &resume {
                None => target,
                Some(key) if forward => SeekTarget::After(key),
                Some(key) => SeekTarget::Before(key),
            };
            let committed = self.engine.seek(target, self.sequence).map_err(Into::<Status>::into)?;
            let overlay = match self.overlay {
                Some(overlay) => overlay,
                None => return Ok(committed),
            };
            let (key, value) = match seek_overlay(overlay, target) {
                Some(buffered) => buffered,
                None => return Ok(committed),
            };
            if let Some((committed_key, _)) = &committed {
                let buffered_first = if forward {
                    key <= committed_key
                } else {
                    key >= committed_key
                };
                if !buffered_first {
                    return Ok(committed);
                }
            }
            match value {
                Some(value) => return Ok(Some((key.clone(), value.clone()))),
                None => resume = Some(key.clone()),
            }
        }
    }
}

impl<'a, E> Drop for DbIterator<'a, E>
where
    E: BackendEngine,
{
    fn drop(&mut self) {
        if self.pinned {
            self.engine.release_snapshot(self.sequence);
        }
    }
}
