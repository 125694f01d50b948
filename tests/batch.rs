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
    sync::atomic::{
        AtomicBool,
        Ordering,
    },
    thread,
};

use tempfile::Builder;

use orderkv::{
    Code,
    Database,
    Options,
    ReadOptions,
    WriteBatch,
};

fn create_options() -> Options {
    let mut options = Options::new();
    options.set_create_if_missing(true);
    options
}

#[test]
fn test_later_operations_win() {
    let root = Builder::new().prefix("test_batch_order").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.put(b"b", b"0").expect("put");

    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.delete(b"b");
    batch.put(b"a", b"2");
    assert_eq!(batch.count(), 3);
    db.write(&batch).expect("written");

    assert_eq!(db.get(b"a").expect("read"), Some(b"2".to_vec()));
    assert_eq!(db.get(b"b").expect("read"), None);
    // One sequence number for the whole batch.
    assert_eq!(db.property_int_value("orderkv.latest-sequence-number"), Some(2));
}

#[test]
fn test_batch_is_invisible_until_written() {
    let root = Builder::new().prefix("test_batch_invisible").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");

    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    assert_eq!(db.get(b"a").expect("read"), None);
    drop(batch);
    assert_eq!(db.get(b"a").expect("read"), None);
}

#[test]
fn test_batch_is_atomic_to_concurrent_readers() {
    let root = Builder::new().prefix("test_batch_atomic").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.put(b"a", b"0").expect("put");
    db.put(b"b", b"0").expect("put");
    let written = AtomicBool::new(false);

    thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut observed_after = false;
            loop {
                let done = written.load(Ordering::SeqCst);
                let snapshot = db.snapshot().expect("snapshot");
                let mut read = ReadOptions::new();
                read.set_snapshot(&snapshot);
                let a = db.get_opt(b"a", &read).expect("read a");
                let b = db.get_opt(b"b", &read).expect("read b");
                match (a.as_deref(), b.as_deref()) {
                    (Some(b"0"), Some(b"0")) => assert!(!done, "reverted after the write"),
                    (Some(b"2"), None) => observed_after = true,
                    other => panic!("observed an intermediate state: {:?}", other),
                }
                if done {
                    return observed_after;
                }
            }
        });

        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.delete(b"b");
        batch.put(b"a", b"2");
        db.write(&batch).expect("written");
        written.store(true, Ordering::SeqCst);

        assert!(reader.join().expect("joined"));
    });
}

#[test]
fn test_delete_range() {
    let root = Builder::new().prefix("test_delete_range").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    for key in &["a", "b", "ba", "c", "d"] {
        db.put(key, key).expect("put");
    }

    let mut batch = WriteBatch::new();
    batch.delete_range(b"b", b"d");
    db.write(&batch).expect("written");

    assert_eq!(db.get(b"a").expect("read"), Some(b"a".to_vec()));
    assert_eq!(db.get(b"b").expect("read"), None);
    assert_eq!(db.get(b"ba").expect("read"), None);
    assert_eq!(db.get(b"c").expect("read"), None);
    assert_eq!(db.get(b"d").expect("read"), Some(b"d".to_vec()), "end is exclusive");

    // An empty range deletes nothing.
    let mut batch = WriteBatch::new();
    batch.delete_range(b"a", b"a");
    db.write(&batch).expect("written");
    assert_eq!(db.get(b"a").expect("read"), Some(b"a".to_vec()));
}

#[test]
fn test_reversed_range_applies_nothing() {
    let root = Builder::new().prefix("test_reversed_range").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.put(b"k", b"v").expect("put");

    let mut batch = WriteBatch::new();
    batch.put(b"new", b"1");
    batch.delete_range(b"z", b"a");
    let err = db.write(&batch).expect_err("reversed range");
    assert_eq!(err.code(), Code::InvalidArgument);

    assert_eq!(db.get(b"new").expect("read"), None);
    assert_eq!(db.get(b"k").expect("read"), Some(b"v".to_vec()));
    // The failed write left the batch as it was.
    assert_eq!(batch.count(), 2);
}

#[test]
fn test_batch_reuse() {
    let root = Builder::new().prefix("test_batch_reuse").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");

    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    db.write(&batch).expect("written");
    db.delete(b"a").expect("deleted");
    db.write(&batch).expect("written again");
    assert_eq!(db.get(b"a").expect("read"), Some(b"1".to_vec()));

    batch.clear();
    assert!(batch.is_empty());
    assert_eq!(batch.data_size(), 12);
    batch.put(b"b", b"2");
    db.write(&batch).expect("written");
    assert_eq!(db.get(b"b").expect("read"), Some(b"2".to_vec()));
}

#[test]
fn test_empty_batch() {
    let root = Builder::new().prefix("test_empty_batch").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.write(&WriteBatch::new()).expect("written");
    assert_eq!(db.property_int_value("orderkv.latest-sequence-number"), Some(0));
}
