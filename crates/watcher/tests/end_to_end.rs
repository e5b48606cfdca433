//! End-to-end watch against the real filesystem

mod common;

use common::{drain, recv_until};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use watcher::{start_watch, ChangeEvent, EventPolicy, WatchOptions};

fn settle() {
    // Give the OS watch time to register before generating changes
    std::thread::sleep(Duration::from_millis(200));
}

#[test]
fn test_create_mkdir_rename() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();

    let options = WatchOptions {
        policy: EventPolicy {
            emit_modified: false,
            ..EventPolicy::default()
        },
        ..WatchOptions::default()
    };
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = start_watch(&root, options, tx).unwrap();
    settle();

    fs::write(root.join("a.txt"), b"hello").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::rename(root.join("a.txt"), root.join("c.txt")).unwrap();

    // Everything up to the rename, then anything that trails it
    let mut events = recv_until(&rx, |e| matches!(e, ChangeEvent::Renamed { .. }));
    events.extend(drain(&rx, Duration::from_millis(500)));

    assert_eq!(
        events,
        vec![
            ChangeEvent::Created {
                name: "a.txt".into(),
                is_dir: false
            },
            ChangeEvent::Created {
                name: "sub".into(),
                is_dir: true
            },
            ChangeEvent::Renamed {
                old: Some("a.txt".into()),
                new: "c.txt".into()
            },
        ]
    );

    let report = handle.stop().unwrap();
    assert_eq!(report.events, 3);
}

#[test]
fn test_open_missing_path_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = start_watch(
        &temp_dir.path().join("missing"),
        WatchOptions::default(),
        |_e: ChangeEvent| {},
    );
    assert!(result.is_err());
}
