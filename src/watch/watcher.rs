// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::watch::bindings::WatchBinding;
use crate::watch::cache::ContentCache;
use crate::watch::event_handler::process_path_change;

/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send `RuntimeEvent::PathChanged` for every
/// binding a changed path matches.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    bindings: Arc<Vec<WatchBinding>>,
    fs: Arc<dyn FileSystem>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // No tracing subscriber guarantees on notify's thread.
                    eprintln!("wpwatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("wpwatch: file watch error: {err}"),
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {root:?}"))?;
    info!(root = ?root, bindings = bindings.len(), "file watcher started");

    tokio::spawn(async move {
        let mut cache = ContentCache::new();
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            debug!(?event, "received notify event");
            for path in event.paths {
                let open = process_path_change(
                    fs.as_ref(),
                    &root,
                    &path,
                    &bindings,
                    &mut cache,
                    &runtime_tx,
                )
                .await;
                if !open {
                    debug!("runtime gone; watcher loop finished");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
