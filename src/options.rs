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

use serde_derive::{
    Deserialize,
    Serialize,
};

use crate::snapshot::Snapshot;

const MIB: u64 = 1024 * 1024;

/// Codec used for persisted table data.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
pub enum CompressionType {
    None = 0,
    Snappy = 1,
    Zlib = 2,
    Bz2 = 3,
    Lz4 = 4,
    Lz4hc = 5,
    Xpress = 6,
    Zstd = 7,
}

impl CompressionType {
    pub fn from_u8(tag: u8) -> Option<CompressionType> {
        Some(match tag {
            0 => CompressionType::None,
            1 => CompressionType::Snappy,
            2 => CompressionType::Zlib,
            3 => CompressionType::Bz2,
            4 => CompressionType::Lz4,
            5 => CompressionType::Lz4hc,
            6 => CompressionType::Xpress,
            7 => CompressionType::Zstd,
            _ => return None,
        })
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            CompressionType::None => "NoCompression",
            CompressionType::Snappy => "Snappy",
            CompressionType::Zlib => "Zlib",
            CompressionType::Bz2 => "BZip2",
            CompressionType::Lz4 => "LZ4",
            CompressionType::Lz4hc => "LZ4HC",
            CompressionType::Xpress => "Xpress",
            CompressionType::Zstd => "ZSTD",
        })
    }
}

/// How a key's prefix is derived, for prefix-scoped iteration.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum PrefixExtractor {
    /// The first `n` bytes of a key. Keys shorter than `n` have no prefix.
    FixedPrefix(usize),
}

impl PrefixExtractor {
    pub(crate) fn prefix<'k>(&self, key: &'k [u8]) -> Option<&'k [u8]> {
        match *self {
            PrefixExtractor::FixedPrefix(len) => key.get(..len),
        }
    }
}

/// Engine tuning applied when a database is opened.
///
/// Setters mutate in place and chain. `Database::open` copies the options, so
/// changing them afterwards has no effect on an open database.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Options {
    pub(crate) create_if_missing: bool,
    pub(crate) error_if_exists: bool,
    pub(crate) paranoid_checks: bool,
    pub(crate) compression: CompressionType,
    pub(crate) write_buffer_size: usize,
    pub(crate) max_write_buffer_number: i32,
    pub(crate) min_write_buffer_number_to_merge: i32,
    pub(crate) max_open_files: i32,
    pub(crate) max_background_compactions: i32,
    pub(crate) max_background_flushes: i32,
    pub(crate) level0_file_num_compaction_trigger: i32,
    pub(crate) level0_slowdown_writes_trigger: i32,
    pub(crate) level0_stop_writes_trigger: i32,
    pub(crate) target_file_size_base: u64,
    pub(crate) max_bytes_for_level_base: u64,
    pub(crate) statistics: bool,
    pub(crate) block_cache_size: u64,
    pub(crate) bloom_bits_per_key: Option<u32>,
    pub(crate) memtable_whole_key_filtering: bool,
    pub(crate) memtable_prefix_bloom_size_ratio: f64,
    pub(crate) prefix_extractor: Option<PrefixExtractor>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: true,
            compression: CompressionType::Snappy,
            write_buffer_size: 64 * MIB as usize,
            max_write_buffer_number: 2,
            min_write_buffer_number_to_merge: 1,
            max_open_files: -1,
            max_background_compactions: -1,
            max_background_flushes: -1,
            level0_file_num_compaction_trigger: 4,
            level0_slowdown_writes_trigger: 20,
            level0_stop_writes_trigger: 36,
            target_file_size_base: 64 * MIB,
            max_bytes_for_level_base: 256 * MIB,
            statistics: false,
            block_cache_size: 8 * MIB,
            bloom_bits_per_key: None,
            memtable_whole_key_filtering: false,
            memtable_prefix_bloom_size_ratio: 0.0,
            prefix_extractor: None,
        }
    }
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    pub fn set_create_if_missing(&mut self, value: bool) -> &mut Self {
        self.create_if_missing = value;
        self
    }

    pub fn set_error_if_exists(&mut self, value: bool) -> &mut Self {
        self.error_if_exists = value;
        self
    }

    pub fn set_paranoid_checks(&mut self, value: bool) -> &mut Self {
        self.paranoid_checks = value;
        self
    }

    pub fn set_compression(&mut self, compression: CompressionType) -> &mut Self {
        self.compression = compression;
        self
    }

    pub fn set_write_buffer_size(&mut self, size: usize) -> &mut Self {
        self.write_buffer_size = size;
        self
    }

    pub fn set_max_write_buffer_number(&mut self, value: i32) -> &mut Self {
        self.max_write_buffer_number = value;
        self
    }

    pub fn set_max_open_files(&mut self, value: i32) -> &mut Self {
        self.max_open_files = value;
        self
    }

    pub fn set_max_background_compactions(&mut self, value: i32) -> &mut Self {
        self.max_background_compactions = value;
        self
    }

    pub fn set_max_background_flushes(&mut self, value: i32) -> &mut Self {
        self.max_background_flushes = value;
        self
    }

    pub fn set_level0_file_num_compaction_trigger(&mut self, value: i32) -> &mut Self {
        self.level0_file_num_compaction_trigger = value;
        self
    }

    pub fn set_level0_slowdown_writes_trigger(&mut self, value: i32) -> &mut Self {
        self.level0_slowdown_writes_trigger = value;
        self
    }

    pub fn set_level0_stop_writes_trigger(&mut self, value: i32) -> &mut Self {
        self.level0_stop_writes_trigger = value;
        self
    }

    pub fn set_target_file_size_base(&mut self, size: u64) -> &mut Self {
        self.target_file_size_base = size;
        self
    }

    pub fn set_max_bytes_for_level_base(&mut self, size: u64) -> &mut Self {
        self.max_bytes_for_level_base = size;
        self
    }

    pub fn enable_statistics(&mut self) -> &mut Self {
        self.statistics = true;
        self
    }

    pub fn set_prefix_extractor(&mut self, extractor: PrefixExtractor) -> &mut Self {
        self.prefix_extractor = Some(extractor);
        self
    }

    /// Tune for workloads dominated by point lookups, with a block cache of
    /// `block_cache_size_mb` MiB.
    pub fn optimize_for_point_lookup(&mut self, block_cache_size_mb: u64) -> &mut Self {
        self.block_cache_size = block_cache_size_mb.saturating_mul(MIB);
        self.bloom_bits_per_key = Some(10);
        self.memtable_whole_key_filtering = true;
        self.memtable_prefix_bloom_size_ratio = 0.02;
        self
    }

    /// Size write buffers, level-0 triggers and level targets from a single
    /// memtable memory budget in bytes.
    pub fn optimize_level_style_compaction(&mut self, memtable_memory_budget: u64) -> &mut Self {
        self.write_buffer_size = (memtable_memory_budget / 4) as usize;
        self.min_write_buffer_number_to_merge = 2;
        self.max_write_buffer_number = 6;
        self.level0_file_num_compaction_trigger = 2;
        self.target_file_size_base = memtable_memory_budget / 8;
        self.max_bytes_for_level_base = memtable_memory_budget;
        self
    }

    pub fn create_if_missing(&self) -> bool {
        self.create_if_missing
    }

    pub fn error_if_exists(&self) -> bool {
        self.error_if_exists
    }

    pub fn paranoid_checks(&self) -> bool {
        self.paranoid_checks
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub fn max_write_buffer_number(&self) -> i32 {
        self.max_write_buffer_number
    }

    pub fn level0_file_num_compaction_trigger(&self) -> i32 {
        self.level0_file_num_compaction_trigger
    }

    pub fn target_file_size_base(&self) -> u64 {
        self.target_file_size_base
    }

    pub fn max_bytes_for_level_base(&self) -> u64 {
        self.max_bytes_for_level_base
    }

    pub fn statistics_enabled(&self) -> bool {
        self.statistics
    }

    pub fn block_cache_size(&self) -> u64 {
        self.block_cache_size
    }

    pub fn prefix_extractor(&self) -> Option<PrefixExtractor> {
        self.prefix_extractor
    }

    /// Render as `name=value` lines, one option per line.
    pub(crate) fn describe(&self) -> String {
        let mut lines = vec![
            format!("create_if_missing={}", self.create_if_missing),
            format!("error_if_exists={}", self.error_if_exists),
            format!("paranoid_checks={}", self.paranoid_checks),
            format!("compression={}", self.compression),
            format!("write_buffer_size={}", self.write_buffer_size),
            format!("max_write_buffer_number={}", self.max_write_buffer_number),
            format!("min_write_buffer_number_to_merge={}", self.min_write_buffer_number_to_merge),
            format!("max_open_files={}", self.max_open_files),
            format!("max_background_compactions={}", self.max_background_compactions),
            format!("max_background_flushes={}", self.max_background_flushes),
            format!("level0_file_num_compaction_trigger={}", self.level0_file_num_compaction_trigger),
            format!("level0_slowdown_writes_trigger={}", self.level0_slowdown_writes_trigger),
            format!("level0_stop_writes_trigger={}", self.level0_stop_writes_trigger),
            format!("target_file_size_base={}", self.target_file_size_base),
            format!("max_bytes_for_level_base={}", self.max_bytes_for_level_base),
            format!("statistics={}", self.statistics),
            format!("block_cache_size={}", self.block_cache_size),
            format!("memtable_whole_key_filtering={}", self.memtable_whole_key_filtering),
            format!("memtable_prefix_bloom_size_ratio={}", self.memtable_prefix_bloom_size_ratio),
        ];
        if let Some(bits) = self.bloom_bits_per_key {
            lines.push(format!("bloom_bits_per_key={}", bits));
        }
        if let Some(PrefixExtractor::FixedPrefix(len)) = self.prefix_extractor {
            lines.push(format!("prefix_extractor=fixed:{}", len));
        }
        lines.join("\n")
    }
}

/// Per-call read policy.
///
/// `verify_checksums` and `fill_cache` are hints to the engine and never
/// change which data a read observes.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions<'s> {
    pub(crate) verify_checksums: bool,
    pub(crate) fill_cache: bool,
    pub(crate) snapshot: Option<&'s Snapshot<'s>>,
    pub(crate) prefix_same_as_start: bool,
}

impl<'s> Default for ReadOptions<'s> {
    fn default() -> ReadOptions<'s> {
        ReadOptions {
            verify_checksums: true,
            fill_cache: true,
            snapshot: None,
            prefix_same_as_start: false,
        }
    }
}

impl<'s> ReadOptions<'s> {
    pub fn new() -> ReadOptions<'s> {
        ReadOptions::default()
    }

    pub fn set_verify_checksums(&mut self, value: bool) -> &mut Self {
        self.verify_checksums = value;
        self
    }

    pub fn set_fill_cache(&mut self, value: bool) -> &mut Self {
        self.fill_cache = value;
        self
    }

    /// Read from the point in time `snapshot` was taken. The snapshot is
    /// borrowed and must outlive these options.
    pub fn set_snapshot(&mut self, snapshot: &'s Snapshot<'s>) -> &mut Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn clear_snapshot(&mut self) -> &mut Self {
        self.snapshot = None;
        self
    }

    pub fn set_prefix_same_as_start(&mut self, value: bool) -> &mut Self {
        self.prefix_same_as_start = value;
        self
    }

    pub fn verify_checksums(&self) -> bool {
        self.verify_checksums
    }

    pub fn fill_cache(&self) -> bool {
        self.fill_cache
    }

    pub fn snapshot(&self) -> Option<&'s Snapshot<'s>> {
        self.snapshot
    }

    pub fn prefix_same_as_start(&self) -> bool {
        self.prefix_same_as_start
    }
}

/// Per-call write policy.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub struct WriteOptions {
    pub(crate) sync: bool,
    pub(crate) disable_wal: bool,
}

impl WriteOptions {
    pub fn new() -> WriteOptions {
        WriteOptions::default()
    }

    /// Wait for the write-ahead log to reach stable storage before returning.
    pub fn set_sync(&mut self, value: bool) -> &mut Self {
        self.sync = value;
        self
    }

    /// Skip the write-ahead log. Such writes survive a restart only once a
    /// flush has persisted them.
    pub fn disable_wal(&mut self, value: bool) -> &mut Self {
        self.disable_wal = value;
        self
    }

    pub fn sync(&self) -> bool {
        self.sync
    }

    pub fn wal_disabled(&self) -> bool {
        self.disable_wal
    }
}
