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
    sync::Arc,
    thread,
};

use tempfile::Builder;

use orderkv::{
    Database,
    Options,
    ReadOptions,
    WriteOptions,
};

fn create_options() -> Options {
    let mut options = Options::new();
    options.set_create_if_missing(true);
    options
}

#[test]
fn test_get_unwritten_key() {
    let root = Builder::new().prefix("test_get_unwritten").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    for key in &[&b""[..], &b"a"[..], &b"missing"[..], &[0u8, 255, 7][..]] {
        assert_eq!(db.get(key).expect("read"), None);
    }
}

#[test]
fn test_put_then_get() {
    let root = Builder::new().prefix("test_put_then_get").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");

    macro_rules! round_trip {
        ($key:expr, $value:expr) => {
            db.put($key, $value).expect("put");
            assert_eq!(db.get($key).expect("read"), Some($value.to_vec()));
        };
    }

    round_trip!(b"str", b"value");
    round_trip!(b"binary\x00key", &[0u8, 1, 2, 255][..]);
    round_trip!(b"empty", b"");
    round_trip!(b"", b"empty key");
    round_trip!(b"str", b"overwritten");
    round_trip!(b"large", &vec![42u8; 1 << 20][..]);
}

#[test]
fn test_string_keys_and_values() {
    let root = Builder::new().prefix("test_string_keys").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.put("héllo", "yöu").expect("put");
    let value = db.get("héllo").expect("read").expect("present");
    assert_eq!(String::from_utf8(value).expect("utf8"), "yöu");
}

#[test]
fn test_delete() {
    let root = Builder::new().prefix("test_delete").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.put(b"key", b"value").expect("put");
    db.delete(b"key").expect("deleted");
    assert_eq!(db.get(b"key").expect("read"), None);

    // Deleting an absent key succeeds.
    db.delete(b"never-written").expect("deleted");

    db.put(b"key", b"again").expect("put");
    assert_eq!(db.get(b"key").expect("read"), Some(b"again".to_vec()));
}

#[test]
fn test_write_options() {
    let root = Builder::new().prefix("test_write_options").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");

    let mut sync = WriteOptions::new();
    sync.set_sync(true);
    db.put_opt(b"synced", b"1", &sync).expect("put");
    db.delete_opt(b"synced", &sync).expect("deleted");
    assert_eq!(db.get(b"synced").expect("read"), None);

    let mut unlogged = WriteOptions::new();
    unlogged.disable_wal(true);
    db.put_opt(b"unlogged", b"1", &unlogged).expect("put");
    assert_eq!(db.get(b"unlogged").expect("read"), Some(b"1".to_vec()));
}

#[test]
fn test_read_hints_do_not_change_results() {
    let root = Builder::new().prefix("test_read_hints").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.put(b"key", b"value").expect("put");

    let mut read = ReadOptions::new();
    read.set_verify_checksums(false).set_fill_cache(false);
    assert_eq!(db.get_opt(b"key", &read).expect("read"), Some(b"value".to_vec()));
}

#[test]
fn test_key_may_exist() {
    let root = Builder::new().prefix("test_key_may_exist").tempdir().expect("tempdir");
    let db = Database::open(&create_options(), root.path()).expect("opened");
    db.put(b"present", b"1").expect("put");
    assert!(db.key_may_exist(b"present"));
    assert!(!db.key_may_exist(b"absent"));

    // A snapshot makes the answer exact for its view.
    let snapshot = db.snapshot().expect("snapshot");
    db.put(b"later", b"1").expect("put");
    let mut read = ReadOptions::new();
    read.set_snapshot(&snapshot);
    assert!(db.key_may_exist_opt(b"present", &read));
    assert!(!db.key_may_exist_opt(b"later", &read));
    assert!(db.key_may_exist(b"later"));
}

#[test]
fn test_concurrent_writers_and_readers() {
    let root = Builder::new().prefix("test_concurrent").tempdir().expect("tempdir");
    let db = Arc::new(Database::open(&create_options(), root.path()).expect("opened"));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{}-{:03}", t, i);
                    db.put(&key, &key).expect("put");
                    assert_eq!(db.get(&key).expect("read"), Some(key.into_bytes()));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("joined");
    }

    assert_eq!(db.property_int_value("orderkv.estimate-num-keys"), Some(400));
    assert_eq!(db.property_int_value("orderkv.latest-sequence-number"), Some(400));
}
