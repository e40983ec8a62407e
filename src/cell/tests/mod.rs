//! Unit tests for snapshot and derived cells.
//! Files live in per-test temporary directories; no watcher is involved.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::sync::broadcast;

use crate::{
    ConfigError,
    cell::{DerivedCell, Reload, ReloadContext, SnapshotCell},
    crypto::Decryptor,
    format::Format,
    registry::ReloadEvent,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestYaml {
    name: String,
    age: i64,
    height: i64,
}

fn sample(age: i64) -> TestYaml {
    TestYaml {
        name: "hello word".to_string(),
        age,
        height: 280,
    }
}

fn write_yaml(path: &Path, value: &TestYaml) {
    fs::write(path, serde_yaml_ng::to_string(value).unwrap()).unwrap();
}

fn setup(age: i64) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.yaml");
    write_yaml(&path, &sample(age));
    (temp_dir, path)
}

mod snapshot {
    use super::*;

    #[test]
    fn load_populates_value_from_file() {
        let (_temp, path) = setup(99);

        let cell = SnapshotCell::<TestYaml>::load(&path, &ReloadContext::new()).unwrap();

        assert!(cell.is_loaded());
        assert_eq!(*cell.get(), sample(99));
        assert_eq!(cell.path(), path.as_path());
        assert_eq!(cell.format(), Format::Yaml);
    }

    #[test]
    fn reload_replaces_value() {
        let (_temp, path) = setup(99);
        let ctx = ReloadContext::new();
        let cell = SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap();
        let before = cell.get();

        write_yaml(&path, &sample(98));
        cell.reload(&ctx).unwrap();

        assert_eq!(before.age, 99);
        assert_eq!(cell.get().age, 98);
    }

    #[test]
    fn marshal_round_trips() {
        let (_temp, path) = setup(42);
        let cell = SnapshotCell::<TestYaml>::load(&path, &ReloadContext::new()).unwrap();

        let text = cell.marshal().unwrap();
        let reparsed: TestYaml = Format::Yaml.decode(text.as_bytes(), None).unwrap();

        assert_eq!(reparsed, *cell.get());
    }

    #[test]
    fn toml_files_are_parsed_as_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.toml");
        fs::write(&path, "name = \"toml\"\nage = 7\nheight = 170\n").unwrap();

        let cell = SnapshotCell::<TestYaml>::load(&path, &ReloadContext::new()).unwrap();

        assert_eq!(cell.format(), Format::Toml);
        assert_eq!(cell.get().name, "toml");
        assert_eq!(cell.get().age, 7);
    }

    #[test]
    fn missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let cell = SnapshotCell::<TestYaml>::new(temp_dir.path().join("absent.yaml"));

        let err = cell.reload(&ReloadContext::new()).unwrap_err();

        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(cell.try_get().is_none());
        assert!(matches!(
            cell.marshal().unwrap_err(),
            ConfigError::Unpopulated { .. }
        ));
    }

    #[test]
    #[should_panic(expected = "read before its initial load")]
    fn get_before_load_panics() {
        let cell = SnapshotCell::<TestYaml>::new("never-loaded.yaml");
        let _ = cell.get();
    }

    #[test]
    fn malformed_write_keeps_last_good_value() {
        let (_temp, path) = setup(99);
        let ctx = ReloadContext::new();
        let cell = SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap();

        fs::write(&path, "name: [unclosed\n").unwrap();
        let err = cell.reload(&ctx).unwrap_err();

        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert_eq!(*cell.get(), sample(99));
    }

    #[test]
    fn type_mismatch_keeps_last_good_value() {
        let (_temp, path) = setup(99);
        let ctx = ReloadContext::new();
        let cell = SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap();

        fs::write(&path, "name: x\nage: old\nheight: 1\n").unwrap();

        assert!(matches!(
            cell.reload(&ctx).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
        assert_eq!(cell.get().age, 99);
    }

    #[test]
    fn repeated_reload_of_unchanged_file_is_idempotent() {
        let (_temp, path) = setup(5);
        let ctx = ReloadContext::new();
        let cell = SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap();

        for _ in 0..3 {
            cell.reload(&ctx).unwrap();
        }

        assert_eq!(*cell.get(), sample(5));
    }

    #[test]
    fn concurrent_readers_never_see_partial_values() {
        #[derive(Debug, Deserialize)]
        struct Pair {
            a: i64,
            b: i64,
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pair.yaml");
        fs::write(&path, "a: 0\nb: 0\n").unwrap();

        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<Pair>::load(&path, &ctx).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut reads = 0u64;
                    while !done.load(Ordering::Relaxed) {
                        let pair = cell.get();
                        assert_eq!(pair.b, pair.a * 2);
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for i in 1..200 {
            fs::write(&path, format!("a: {i}\nb: {}\n", i * 2)).unwrap();
            cell.reload(&ctx).unwrap();
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(cell.get().a, 199);
    }
}

mod decryption {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Secrets {
        password: String,
        user: String,
    }

    fn decryptor() -> Decryptor {
        Decryptor::new(&[0x11u8; 32], &[0x22u8; 16]).unwrap()
    }

    #[test]
    fn marked_fields_are_decrypted_before_parsing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.yaml");
        let decryptor = decryptor();
        fs::write(
            &path,
            format!(
                "password: \"{}\"\nuser: admin\n",
                decryptor.encrypt_marked("helloworld")
            ),
        )
        .unwrap();

        let ctx = ReloadContext::new().with_decryptor(decryptor);
        let cell = SnapshotCell::<Secrets>::load(&path, &ctx).unwrap();

        assert_eq!(cell.get().password, "helloworld");
        assert_eq!(cell.get().user, "admin");
    }

    #[test]
    fn without_decryptor_marked_fields_stay_as_written() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.yaml");
        let marked = decryptor().encrypt_marked("helloworld");
        fs::write(&path, format!("password: \"{marked}\"\nuser: admin\n")).unwrap();

        let cell = SnapshotCell::<Secrets>::load(&path, &ReloadContext::new()).unwrap();

        assert_eq!(cell.get().password, marked);
    }

    #[test]
    fn decrypt_failure_keeps_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.yaml");
        let decryptor = decryptor();
        fs::write(
            &path,
            format!(
                "password: \"{}\"\nuser: admin\n",
                decryptor.encrypt_marked("first")
            ),
        )
        .unwrap();

        let ctx = ReloadContext::new().with_decryptor(decryptor);
        let cell = SnapshotCell::<Secrets>::load(&path, &ctx).unwrap();

        fs::write(&path, "password: \"{encrypted}@@@\"\nuser: other\n").unwrap();
        let err = cell.reload(&ctx).unwrap_err();

        assert!(matches!(err, ConfigError::DecryptError { .. }));
        assert_eq!(cell.get().password, "first");
        assert_eq!(cell.get().user, "admin");
    }
}

mod derived {
    use super::*;

    #[test]
    fn attach_computes_from_current_snapshot() {
        let (_temp, path) = setup(30);
        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());

        write_yaml(&path, &sample(31));
        cell.reload(&ctx).unwrap();

        let doubled = DerivedCell::attach(&cell, |c: &TestYaml| c.age * 2).unwrap();

        assert_eq!(*doubled.get(), 62);
        assert_eq!(cell.dependent_count(), 1);
    }

    #[test]
    fn reflects_source_after_reload() {
        let (_temp, path) = setup(10);
        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());
        let label = DerivedCell::attach(&cell, |c: &TestYaml| format!("{}:{}", c.name, c.age))
            .unwrap();

        write_yaml(&path, &sample(11));
        cell.reload(&ctx).unwrap();

        assert_eq!(*label.get(), "hello word:11");
    }

    #[test]
    fn chains_through_derived_cells() {
        let (_temp, path) = setup(3);
        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());
        let age = DerivedCell::attach(&cell, |c: &TestYaml| c.age).unwrap();
        let squared = DerivedCell::attach(&age, |a: &i64| a * a).unwrap();

        assert_eq!(*squared.get(), 9);

        write_yaml(&path, &sample(4));
        cell.reload(&ctx).unwrap();

        assert_eq!(*age.get(), 4);
        assert_eq!(*squared.get(), 16);
    }

    #[test]
    fn cascade_runs_in_registration_order() {
        let (_temp, path) = setup(1);
        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());
        let order = Arc::new(Mutex::new(Vec::new()));

        let dependents: Vec<_> = ["first", "second", "third"]
            .into_iter()
            .map(|name| {
                let order = Arc::clone(&order);
                DerivedCell::attach(&cell, move |c: &TestYaml| {
                    order.lock().unwrap().push(name);
                    c.age
                })
                .unwrap()
            })
            .collect();

        order.lock().unwrap().clear();
        cell.reload(&ctx).unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(dependents.len(), 3);
    }

    #[test]
    fn failing_transform_spares_source_and_siblings() {
        let (_temp, path) = setup(1);
        let (events_tx, mut events_rx) = broadcast::channel(16);
        let ctx = ReloadContext::new().with_events(events_tx);
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());

        let fragile = DerivedCell::attach(&cell, |c: &TestYaml| {
            if c.age > 1 {
                panic!("age too high");
            }
            c.age
        })
        .unwrap();
        let sibling = DerivedCell::attach(&cell, |c: &TestYaml| c.age + 100).unwrap();

        write_yaml(&path, &sample(2));
        cell.reload(&ctx).unwrap();

        assert_eq!(cell.get().age, 2);
        assert_eq!(*fragile.get(), 1);
        assert_eq!(*sibling.get(), 102);

        match events_rx.try_recv().unwrap() {
            ReloadEvent::Failed { target, error } => {
                assert!(target.starts_with("derived from"));
                assert!(matches!(error, ConfigError::TransformError { ref details, .. }
                    if details.contains("age too high")));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            events_rx.try_recv().unwrap(),
            ReloadEvent::Reloaded { ref target, .. } if target.starts_with("derived from")
        ));
    }

    #[test]
    fn fallible_transform_error_is_reported() {
        let (_temp, path) = setup(1);
        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());

        let err = DerivedCell::try_attach(&cell, |c: &TestYaml| {
            if c.age < 18 {
                Err(format!("age {} below minimum", c.age))
            } else {
                Ok(c.age)
            }
        })
        .unwrap_err();

        assert!(matches!(err, ConfigError::TransformError { ref details, .. }
            if details == "age 1 below minimum"));
        assert_eq!(cell.dependent_count(), 0);
    }

    #[test]
    fn attach_to_unloaded_source_fails() {
        let cell = Arc::new(SnapshotCell::<TestYaml>::new("unloaded.yaml"));

        let err = DerivedCell::attach(&cell, |c: &TestYaml| c.age).unwrap_err();

        assert!(matches!(err, ConfigError::Unpopulated { .. }));
    }

    #[test]
    fn discarded_handle_detaches_immediately() {
        let (_temp, path) = setup(1);
        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());

        let computed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&computed);
        drop(
            DerivedCell::attach(&cell, move |c: &TestYaml| {
                flag.store(true, Ordering::Relaxed);
                c.age
            })
            .unwrap(),
        );
        computed.store(false, Ordering::Relaxed);

        cell.reload(&ctx).unwrap();

        assert!(!computed.load(Ordering::Relaxed));
        assert_eq!(cell.dependent_count(), 0);
    }

    #[test]
    fn dropped_dependents_are_detached() {
        let (_temp, path) = setup(1);
        let ctx = ReloadContext::new();
        let cell = Arc::new(SnapshotCell::<TestYaml>::load(&path, &ctx).unwrap());

        let derived = DerivedCell::attach(&cell, |c: &TestYaml| c.age).unwrap();
        assert_eq!(cell.dependent_count(), 1);

        drop(derived);
        cell.reload(&ctx).unwrap();

        assert_eq!(cell.dependent_count(), 0);
    }
}
