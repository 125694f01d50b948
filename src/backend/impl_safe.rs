// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! A pure-Rust engine: a versioned in-memory keyspace made durable by a
//! write-ahead log and a compressed table file, with flushes and
//! compactions run on a background thread.

mod database;
mod environment;
mod error;
mod stats;
mod table;
mod wal;
mod worker;

pub use environment::EngineImpl;
pub use error::ErrorImpl;
