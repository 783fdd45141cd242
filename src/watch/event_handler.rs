// src/watch/event_handler.rs

//! Turns one changed path into binding events.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::units::sources::relative_str;
use crate::watch::bindings::{matching, WatchBinding};
use crate::watch::cache::ContentCache;

/// Forward a change on `path` to every binding it matches.
///
/// Paths outside `root`, paths no binding watches and rewrites that leave
/// the content unchanged are dropped. Returns `false` once the runtime
/// channel is closed.
pub async fn process_path_change(
    fs: &dyn FileSystem,
    root: &Path,
    path: &Path,
    bindings: &[WatchBinding],
    cache: &mut ContentCache,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    let Some(rel) = relative_str(root, path) else {
        debug!(?path, ?root, "event outside project root; ignoring");
        return true;
    };

    let hits = matching(bindings, &rel);
    if hits.is_empty() {
        return true;
    }

    if !cache.observe(fs, path) {
        return true;
    }

    for binding in hits {
        debug!(binding = %binding, path = %rel, "watch match");
        let event = RuntimeEvent::PathChanged {
            binding: binding.to_string(),
            path: rel.clone(),
        };
        if let Err(err) = runtime_tx.send(event).await {
            warn!("failed to send RuntimeEvent::PathChanged: {err}");
            return false;
        }
    }
    true
}
