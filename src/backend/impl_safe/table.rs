// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The table file holds every live pair as of a sequence number:
//!
//! ```text
//! | "OKVT" | version u8 | compression u8 | sequence u64 | payload_len u64 | crc32 u32 | payload |
//! ```
//!
//! Integers are little-endian. The payload is the bincode list of pairs,
//! compressed with the recorded codec, and the checksum covers it as stored.

use std::{
    fs::{
        self,
        File,
    },
    io::{
        self,
        Write,
    },
    path::Path,
};

use super::ErrorImpl;
use crate::options::CompressionType;

pub(crate) const TABLE_FILENAME: &str = "TABLE";
const TEMP_FILENAME: &str = "TABLE.tmp";

const MAGIC: &[u8; 4] = b"OKVT";
const FORMAT_VERSION: u8 = 1;
const HEADER_SIZE: usize = 4 + 1 + 1 + 8 + 8 + 4;

#[derive(Debug)]
pub(crate) struct TableContents {
    pub sequence: u64,
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Whether the engine can write tables with `kind`.
pub(crate) fn is_linked(kind: CompressionType) -> bool {
    matches!(kind, CompressionType::None | CompressionType::Snappy)
}

fn compress(data: Vec<u8>, kind: CompressionType) -> Result<Vec<u8>, ErrorImpl> {
    match kind {
        CompressionType::None => Ok(data),
        CompressionType::Snappy => snap::raw::Encoder::new()
            .compress_vec(&data)
            .map_err(|e| ErrorImpl::IoError(io::Error::new(io::ErrorKind::Other, e))),
        kind => Err(ErrorImpl::CompressionNotLinked(kind)),
    }
}

fn decompress(data: &[u8], kind: CompressionType) -> Result<Vec<u8>, ErrorImpl> {
    match kind {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Snappy => snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| ErrorImpl::Corrupted(format!("table payload is not valid snappy: {}", e))),
        kind => Err(ErrorImpl::CompressionNotLinked(kind)),
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// Persist `entries` as the table of `dir`, replacing any previous one
/// atomically. Returns the number of bytes written.
pub(crate) fn write<'a, I>(dir: &Path, kind: CompressionType, sequence: u64, entries: I) -> Result<u64, ErrorImpl>
where
    I: Iterator<Item = (&'a [u8], &'a [u8])>,
{
    let pairs: Vec<(&[u8], &[u8])> = entries.collect();
    let payload = compress(bincode::serialize(&pairs)?, kind)?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.push(kind as u8);
    bytes.extend_from_slice(&sequence.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    bytes.extend_from_slice(&payload);

    let temp = dir.join(TEMP_FILENAME);
    let mut file = File::create(&temp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&temp, dir.join(TABLE_FILENAME))?;
    Ok(bytes.len() as u64)
}

/// Load the table of `dir`, or `None` if none was written yet.
pub(crate) fn read(dir: &Path) -> Result<Option<TableContents>, ErrorImpl> {
    let path = dir.join(TABLE_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    let corrupt = |what: &str| ErrorImpl::Corrupted(format!("{}: {}", path.display(), what));

    if bytes.len() < HEADER_SIZE || &bytes[..4] != MAGIC {
        return Err(corrupt("not a table file"));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(corrupt("unsupported table format version"));
    }
    let kind = CompressionType::from_u8(bytes[5]).ok_or(ErrorImpl::UnknownCompression(bytes[5]))?;
    let sequence = read_u64(&bytes[6..]);
    let payload_len = read_u64(&bytes[14..]) as usize;
    let mut crc = [0u8; 4];
    crc.copy_from_slice(&bytes[22..26]);
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != payload_len {
        return Err(corrupt("truncated table payload"));
    }
    if u32::from_le_bytes(crc) != crc32fast::hash(payload) {
        return Err(corrupt("table checksum mismatch"));
    }
    let entries = bincode::deserialize(&decompress(payload, kind)?).map_err(|e| corrupt(&e.to_string()))?;
    Ok(Some(TableContents {
        sequence,
        entries,
    }))
}
