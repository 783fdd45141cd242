// src/units/freshness.rs

//! Modification-time based skip logic.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::FileSystem;
use crate::units::sources::SourceFile;

/// Drop every candidate whose output is already strictly newer than it.
///
/// `output_for` maps a source to the file the unit would write for it. If
/// `dest_dir` does not exist nothing can be fresh and all candidates are
/// returned unchanged. A source or output whose timestamp cannot be read is
/// treated as stale.
pub fn filter_stale<F>(
    fs: &dyn FileSystem,
    candidates: Vec<SourceFile>,
    dest_dir: &Path,
    output_for: F,
) -> Vec<SourceFile>
where
    F: Fn(&SourceFile) -> PathBuf,
{
    if !fs.is_dir(dest_dir) {
        debug!(dest = ?dest_dir, "destination missing; every source is stale");
        return candidates;
    }

    candidates
        .into_iter()
        .filter(|source| {
            let output = output_for(source);
            let fresh = is_fresh(fs, &source.path, &output);
            if fresh {
                debug!(source = %source.rel, output = ?output, "output newer than source; skipping");
            }
            !fresh
        })
        .collect()
}

fn is_fresh(fs: &dyn FileSystem, source: &Path, output: &Path) -> bool {
    if !fs.is_file(output) {
        return false;
    }
    match (fs.modified(source), fs.modified(output)) {
        (Ok(src), Ok(out)) => out > src,
        _ => false,
    }
}
