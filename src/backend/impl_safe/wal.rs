// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The write-ahead log. Each committed batch is appended as one frame:
//!
//! ```text
//! | crc32 (4B LE) | len (4B LE) | payload (len bytes) |
//! ```
//!
//! The checksum covers the length field and the payload. The payload is the
//! bincode encoding of the batch's sequence number and operations.

use std::{
    convert::TryFrom,
    fs::{
        self,
        File,
        OpenOptions,
    },
    io::Write,
    path::Path,
};

use log::warn;
use serde_derive::{
    Deserialize,
    Serialize,
};

use super::ErrorImpl;
use crate::backend::common::BatchOp;

pub(crate) const WAL_FILENAME: &str = "WAL";

const CRC_SIZE: usize = 4;
const LEN_SIZE: usize = 4;
const HEADER_SIZE: usize = CRC_SIZE + LEN_SIZE;

#[derive(Serialize)]
struct RecordRef<'a> {
    sequence: u64,
    ops: &'a [BatchOp],
}

#[derive(Debug, Deserialize)]
pub(crate) struct Record {
    pub sequence: u64,
    pub ops: Vec<BatchOp>,
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn frame_length(len: usize) -> Result<u32, ErrorImpl> {
    u32::try_from(len).map_err(|_| ErrorImpl::RecordTooLarge(len))
}

pub(crate) fn encode(sequence: u64, ops: &[BatchOp]) -> Result<Vec<u8>, ErrorImpl> {
    let payload = bincode::serialize(&RecordRef {
        sequence,
        ops,
    })?;
    let len = frame_length(payload.len())?;
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&[0u8; CRC_SIZE]);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = crc32fast::hash(&frame[CRC_SIZE..]);
    frame[..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// What replaying a log recovered.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    pub records: Vec<Record>,
    /// Length of the prefix made of intact frames.
    pub valid_len: u64,
}

/// Decode every intact frame of `bytes`.
///
/// A frame cut short by a crash ends the replay. A frame whose checksum or
/// payload is bad is corruption when `paranoid`, and otherwise ends the
/// replay as well.
pub(crate) fn decode_all(bytes: &[u8], paranoid: bool) -> Result<Replay, ErrorImpl> {
    let mut replay = Replay::default();
    let mut offset = 0;
    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < HEADER_SIZE {
            warn!("Dropping {} trailing bytes of a torn write-ahead log frame", rest.len());
            break;
        }
        let len = read_u32(&rest[CRC_SIZE..]) as usize;
        if rest.len() - HEADER_SIZE < len {
            warn!("Dropping a torn write-ahead log frame at offset {}", offset);
            break;
        }
        let frame = &rest[..HEADER_SIZE + len];
        let record = if read_u32(frame) == crc32fast::hash(&frame[CRC_SIZE..]) {
            bincode::deserialize::<Record>(&frame[HEADER_SIZE..]).ok()
        } else {
            None
        };
        match record {
            Some(record) => replay.records.push(record),
            None if paranoid => {
                return Err(ErrorImpl::Corrupted(format!("write-ahead log frame at offset {} is corrupt", offset)));
            },
            None => {
                warn!("Ignoring write-ahead log from corrupt frame at offset {}", offset);
                break;
            },
        }
        offset += frame.len();
        replay.valid_len = offset as u64;
    }
    Ok(replay)
}

pub(crate) fn replay(dir: &Path, paranoid: bool) -> Result<Replay, ErrorImpl> {
    let path = dir.join(WAL_FILENAME);
    if !path.exists() {
        return Ok(Replay::default());
    }
    decode_all(&fs::read(&path)?, paranoid)
}

/// Size of the log file in `dir`, zero if there is none.
pub(crate) fn size(dir: &Path) -> Result<u64, ErrorImpl> {
    let path = dir.join(WAL_FILENAME);
    if !path.exists() {
        return Ok(0);
    }
    Ok(fs::metadata(&path)?.len())
}

/// Appends frames to the log file of a database opened for writing.
#[derive(Debug)]
pub(crate) struct WalWriter {
    file: File,
    len: u64,
    /// Set when a failed append could not be cut back off the log.
    damaged: bool,
}

impl WalWriter {
    /// Open the log in `dir` for appending, first cutting it to `valid_len`
    /// to discard any torn tail.
    pub(crate) fn open(dir: &Path, valid_len: u64) -> Result<WalWriter, ErrorImpl> {
        let file = OpenOptions::new().create(true).append(true).open(dir.join(WAL_FILENAME))?;
        if file.metadata()?.len() != valid_len {
            file.set_len(valid_len)?;
        }
        Ok(WalWriter {
            file,
            len: valid_len,
            damaged: false,
        })
    }

    pub(crate) fn append(&mut self, sequence: u64, ops: &[BatchOp], sync: bool) -> Result<u64, ErrorImpl> {
        let frame = encode(sequence, ops)?;
        if let Err(e) = self.file.write_all(&frame) {
            self.discard_tail();
            return Err(e.into());
        }
        if sync {
            if let Err(e) = self.file.sync_data() {
                // The write is reported as failed, so its frame must not replay.
                self.discard_tail();
                return Err(e.into());
            }
        }
        self.len += frame.len() as u64;
        Ok(frame.len() as u64)
    }

    /// Cut the log back to its last acknowledged frame.
    fn discard_tail(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            warn!("Unable to discard an unacknowledged write-ahead log frame: {}", e);
            self.damaged = true;
        }
    }

    pub(crate) fn is_damaged(&self) -> bool {
        self.damaged
    }

    pub(crate) fn sync(&mut self) -> Result<(), ErrorImpl> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Drop every frame once their contents are persisted elsewhere.
    pub(crate) fn reset(&mut self) -> Result<(), ErrorImpl> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        Ok(())
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }
}
