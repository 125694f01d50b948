// Copyright 2018-2019 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fs;

use tempfile::Builder;

use orderkv::{
    Code,
    CompressionType,
    Database,
    Options,
    WriteBatch,
    WriteOptions,
};

fn create_options() -> Options {
    let mut options = Options::new();
    options.set_create_if_missing(true);
    options
}

#[test]
fn test_reopen_replays_the_log() {
    let root = Builder::new().prefix("test_reopen_log").tempdir().expect("tempdir");
    {
        let db = Database::open(&create_options(), root.path()).expect("opened");
        db.put(b"a", b"1").expect("put");
        let mut batch = WriteBatch::new();
        batch.put(b"b", b"2");
        batch.delete(b"a");
        batch.put(b"c", b"3");
        db.write(&batch).expect("written");
        db.close().expect("closed");
    }

    let db = Database::open(&Options::new(), root.path()).expect("reopened");
    assert_eq!(db.get(b"a").expect("read"), None);
    assert_eq!(db.get(b"b").expect("read"), Some(b"2".to_vec()));
    assert_eq!(db.get(b"c").expect("read"), Some(b"3".to_vec()));
    assert_eq!(db.property_int_value("orderkv.latest-sequence-number"), Some(2));

    // Sequence numbers continue where they left off.
    db.put(b"d", b"4").expect("put");
    assert_eq!(db.property_int_value("orderkv.latest-sequence-number"), Some(3));
}

#[test]
fn test_reopen_combines_table_and_log() {
    let root = Builder::new().prefix("test_reopen_table_log").tempdir().expect("tempdir");
    {
        let db = Database::open(&create_options(), root.path()).expect("opened");
        db.put(b"flushed", b"1").expect("put");
        db.put(b"overwritten", b"old").expect("put");
        db.flush(true).expect("flushed");
        db.put(b"logged", b"2").expect("put");
        db.put(b"overwritten", b"new").expect("put");
        db.delete(b"flushed").expect("deleted");
    }

    let db = Database::open(&Options::new(), root.path()).expect("reopened");
    assert_eq!(db.get(b"flushed").expect("read"), None);
    assert_eq!(db.get(b"logged").expect("read"), Some(b"2".to_vec()));
    assert_eq!(db.get(b"overwritten").expect("read"), Some(b"new".to_vec()));
    assert_eq!(db.property_int_value("orderkv.latest-sequence-number"), Some(5));
}

#[test]
fn test_unlogged_writes_are_flushed_on_close() {
    let root = Builder::new().prefix("test_unlogged_close").tempdir().expect("tempdir");
    let mut unlogged = WriteOptions::new();
    unlogged.disable_wal(true);
    {
        let db = Database::open(&create_options(), root.path()).expect("opened");
        db.put_opt(b"unlogged", b"1", &unlogged).expect("put");
        assert_eq!(fs::metadata(root.path().join("WAL")).expect("log").len(), 0);
        db.close().expect("closed");
    }

    let db = Database::open(&Options::new(), root.path()).expect("reopened");
    assert_eq!(db.get(b"unlogged").expect("read"), Some(b"1".to_vec()));
}

#[test]
fn test_compression_codecs() {
    for compression in &[CompressionType::None, CompressionType::Snappy] {
        let root = Builder::new().prefix("test_compression").tempdir().expect("tempdir");
        let mut options = create_options();
        options.set_compression(*compression);
        {
            let db = Database::open(&options, root.path()).expect("opened");
            for i in 0..100 {
                db.put(format!("key{:03}", i), vec![b'x'; 64]).expect("put");
            }
            db.flush(true).expect("flushed");
        }

        // The table records its own codec.
        let db = Database::open(&Options::new(), root.path()).expect("reopened");
        assert_eq!(db.property_int_value("orderkv.estimate-num-keys"), Some(100));
        assert_eq!(db.get(b"key042").expect("read"), Some(vec![b'x'; 64]));
    }
}

#[test]
fn test_snappy_shrinks_the_table() {
    let mut sizes = vec![];
    for compression in &[CompressionType::None, CompressionType::Snappy] {
        let root = Builder::new().prefix("test_snappy_size").tempdir().expect("tempdir");
        let mut options = create_options();
        options.set_compression(*compression);
        let db = Database::open(&options, root.path()).expect("opened");
        for i in 0..100 {
            db.put(format!("key{:03}", i), vec![b'x'; 256]).expect("put");
        }
        db.flush(true).expect("flushed");
        sizes.push(fs::metadata(root.path().join("TABLE")).expect("table").len());
    }
    assert!(sizes[1] < sizes[0], "{:?}", sizes);
}

fn write_three_records(path: &std::path::Path) {
    let db = Database::open(&create_options(), path).expect("opened");
    db.put(b"one", b"1").expect("put");
    db.put(b"two", b"2").expect("put");
    db.put(b"three", b"3").expect("put");
    db.close().expect("closed");
}

#[test]
fn test_corrupt_log_with_paranoid_checks() {
    let root = Builder::new().prefix("test_corrupt_log_paranoid").tempdir().expect("tempdir");
    write_three_records(root.path());

    let wal = root.path().join("WAL");
    let mut bytes = fs::read(&wal).expect("log");
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&wal, &bytes).expect("corrupted");

    let err = Database::open(&Options::new(), root.path()).expect_err("corrupt log");
    assert_eq!(err.code(), Code::Corruption);
    assert!(err.code().is_fatal());
}

#[test]
fn test_corrupt_log_without_paranoid_checks() {
    let root = Builder::new().prefix("test_corrupt_log_lenient").tempdir().expect("tempdir");
    write_three_records(root.path());

    let wal = root.path().join("WAL");
    let mut bytes = fs::read(&wal).expect("log");
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&wal, &bytes).expect("corrupted");

    let mut options = Options::new();
    options.set_paranoid_checks(false);
    let db = Database::open(&options, root.path()).expect("replayed up to the damage");
    assert_eq!(db.get(b"one").expect("read"), Some(b"1".to_vec()));
    assert_eq!(db.get(b"two").expect("read"), Some(b"2".to_vec()));
    assert_eq!(db.get(b"three").expect("read"), None);

    // The damaged tail was cut off, so later writes replay cleanly.
    db.put(b"four", b"4").expect("put");
    db.close().expect("closed");
    let db = Database::open(&Options::new(), root.path()).expect("reopened");
    assert_eq!(db.get(b"four").expect("read"), Some(b"4".to_vec()));
    assert_eq!(db.get(b"three").expect("read"), None);
}

#[test]
fn test_torn_log_tail_is_dropped() {
    let root = Builder::new().prefix("test_torn_log").tempdir().expect("tempdir");
    write_three_records(root.path());

    let wal = root.path().join("WAL");
    let bytes = fs::read(&wal).expect("log");
    fs::write(&wal, &bytes[..bytes.len() - 3]).expect("truncated");

    // A torn frame is the normal result of a crash mid-write, not corruption.
    let db = Database::open(&Options::new(), root.path()).expect("reopened");
    assert_eq!(db.get(b"two").expect("read"), Some(b"2".to_vec()));
    assert_eq!(db.get(b"three").expect("read"), None);
}
