// tests/watch_events.rs
mod common;

use std::path::Path;

use tokio::sync::mpsc;

use wpwatch::engine::RuntimeEvent;
use wpwatch::fs::mock::MockFileSystem;
use wpwatch::units::{STYLES, VENDOR_SCRIPTS};
use wpwatch::watch::event_handler::process_path_change;
use wpwatch::watch::{build_bindings, ContentCache};
use wpwatch_test_utils::ConfigBuilder;

fn drain(rx: &mut mpsc::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn watched_change_becomes_one_event_per_binding() {
    common::init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("./sass/style.scss", "a{}");
    fs.add_file("./js/vendor/slick/slick.js", "slick()");
    let bindings = build_bindings(&ConfigBuilder::new().build()).unwrap();
    let mut cache = ContentCache::new();
    let (tx, mut rx) = mpsc::channel(8);
    let root = Path::new(".");

    for path in ["./sass/style.scss", "./js/vendor/slick/slick.js", "./js/min/app.min.js"] {
        assert!(process_path_change(&fs, root, Path::new(path), &bindings, &mut cache, &tx).await);
    }

    assert_eq!(
        drain(&mut rx),
        vec![
            RuntimeEvent::PathChanged {
                binding: STYLES.to_string(),
                path: "sass/style.scss".to_string(),
            },
            RuntimeEvent::PathChanged {
                binding: VENDOR_SCRIPTS.to_string(),
                path: "js/vendor/slick/slick.js".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn touch_without_edit_is_dropped() {
    let fs = MockFileSystem::new();
    fs.add_file("./sass/style.scss", "a{}");
    let bindings = build_bindings(&ConfigBuilder::new().build()).unwrap();
    let mut cache = ContentCache::new();
    let (tx, mut rx) = mpsc::channel(8);
    let root = Path::new(".");
    let path = Path::new("./sass/style.scss");

    process_path_change(&fs, root, path, &bindings, &mut cache, &tx).await;
    process_path_change(&fs, root, path, &bindings, &mut cache, &tx).await;
    assert_eq!(drain(&mut rx).len(), 1);

    fs.add_file(path, "a{color:red}");
    process_path_change(&fs, root, path, &bindings, &mut cache, &tx).await;
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn paths_outside_the_root_are_ignored() {
    let fs = MockFileSystem::new();
    let bindings = build_bindings(&ConfigBuilder::new().build()).unwrap();
    let mut cache = ContentCache::new();
    let (tx, mut rx) = mpsc::channel(8);

    let open = process_path_change(
        &fs,
        Path::new("/theme"),
        Path::new("/elsewhere/sass/style.scss"),
        &bindings,
        &mut cache,
        &tx,
    )
    .await;

    assert!(open);
    assert!(drain(&mut rx).is_empty());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn closed_runtime_channel_stops_the_watcher() {
    let fs = MockFileSystem::new();
    fs.add_file("./footer.php", "<?php");
    let bindings = build_bindings(&ConfigBuilder::new().build()).unwrap();
    let mut cache = ContentCache::new();
    let (tx, rx) = mpsc::channel(8);
    drop(rx);

    let open = process_path_change(
        &fs,
        Path::new("."),
        Path::new("./footer.php"),
        &bindings,
        &mut cache,
        &tx,
    )
    .await;
    assert!(!open);
}
