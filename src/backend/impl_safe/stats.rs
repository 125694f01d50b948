// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::sync::atomic::{
    AtomicU64,
    Ordering,
};

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub(crate) enum Ticker {
    KeysRead,
    KeysWritten,
    BytesRead,
    BytesWritten,
    WalSyncs,
    WalBytes,
    Seeks,
    Flushes,
    FlushBytes,
    Compactions,
    VersionsDropped,
    Conflicts,
}

const TICKER_COUNT: usize = 12;

const TICKERS: [Ticker; TICKER_COUNT] = [
    Ticker::KeysRead,
    Ticker::KeysWritten,
    Ticker::BytesRead,
    Ticker::BytesWritten,
    Ticker::WalSyncs,
    Ticker::WalBytes,
    Ticker::Seeks,
    Ticker::Flushes,
    Ticker::FlushBytes,
    Ticker::Compactions,
    Ticker::VersionsDropped,
    Ticker::Conflicts,
];

impl Ticker {
    fn name(self) -> &'static str {
        match self {
            Ticker::KeysRead => "orderkv.number.keys.read",
            Ticker::KeysWritten => "orderkv.number.keys.written",
            Ticker::BytesRead => "orderkv.bytes.read",
            Ticker::BytesWritten => "orderkv.bytes.written",
            Ticker::WalSyncs => "orderkv.wal.synced",
            Ticker::WalBytes => "orderkv.wal.bytes",
            Ticker::Seeks => "orderkv.number.db.seek",
            Ticker::Flushes => "orderkv.flush.count",
            Ticker::FlushBytes => "orderkv.flush.write.bytes",
            Ticker::Compactions => "orderkv.compaction.count",
            Ticker::VersionsDropped => "orderkv.compaction.key.drop.obsolete",
            Ticker::Conflicts => "orderkv.txn.conflicts",
        }
    }
}

/// Counters kept when statistics are enabled.
#[derive(Debug, Default)]
pub(crate) struct Statistics {
    counters: [AtomicU64; TICKER_COUNT],
}

impl Statistics {
    pub(crate) fn record(&self, ticker: Ticker, count: u64) {
        self.counters[ticker as usize].fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn get(&self, ticker: Ticker) -> u64 {
        self.counters[ticker as usize].load(Ordering::Relaxed)
    }

    /// One `name COUNT : n` line per ticker.
    pub(crate) fn render(&self) -> String {
        TICKERS.iter().map(|ticker| format!("{} COUNT : {}\n", ticker.name(), self.get(*ticker))).collect()
    }
}
