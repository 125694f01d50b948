// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use crate::backend::BatchOp;

/// Fixed part of an encoded batch: an 8-byte sequence number and a 4-byte
/// operation count.
const HEADER_SIZE: usize = 12;

fn varint_len(mut n: usize) -> usize {
    let mut len = 1;
    while n >= 0x80 {
        n >>= 7;
        len += 1;
    }
    len
}

fn slice_size(bytes: &[u8]) -> usize {
    varint_len(bytes.len()) + bytes.len()
}

/// An ordered set of mutations, applied atomically by `Database::write`.
///
/// A batch has no effect until written. Later operations on the same key
/// win. Writing does not consume the batch, so it can be written again or
/// cleared and refilled.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    data_size: usize,
}

impl Default for WriteBatch {
    fn default() -> WriteBatch {
        WriteBatch {
            ops: vec![],
            data_size: HEADER_SIZE,
        }
    }
}

impl WriteBatch {
    pub fn new() -> WriteBatch {
        WriteBatch::default()
    }

    pub fn put<K, V>(&mut self, key: K, value: V)
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let (key, value) = (key.as_ref(), value.as_ref());
        self.data_size += 1 + slice_size(key) + slice_size(value);
        self.ops.push(BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn delete<K>(&mut self, key: K)
    where
        K: AsRef<[u8]>,
    {
        let key = key.as_ref();
        self.data_size += 1 + slice_size(key);
        self.ops.push(BatchOp::Delete {
            key: key.to_vec(),
        });
    }

    /// Delete every key in `[start, end)`. An empty range deletes nothing;
    /// a range whose end sorts before its start makes the write fail.
    pub fn delete_range<K, L>(&mut self, start: K, end: L)
    where
        K: AsRef<[u8]>,
        L: AsRef<[u8]>,
    {
        let (start, end) = (start.as_ref(), end.as_ref());
        self.data_size += 1 + slice_size(start) + slice_size(end);
        self.ops.push(BatchOp::DeleteRange {
            start: start.to_vec(),
            end: end.to_vec(),
        });
    }

    /// Discard every buffered operation.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.data_size = HEADER_SIZE;
    }

    /// The number of buffered operations.
    pub fn count(&self) -> usize {
        self.ops.len()
    }

    /// The encoded size of the batch in bytes.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}
