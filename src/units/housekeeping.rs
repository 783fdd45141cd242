// src/units/housekeeping.rs

//! The `build` steps: remove stale scaffold files and create the expected
//! folder layout.

use tracing::{debug, info};

use crate::config::HousekeepingSection;
use crate::units::{BuildContext, BuildError, BuildOutput, BuildResult};

pub const DELETE_STALE: &str = "delete-stale";
pub const MAKE_FOLDERS: &str = "make-folders";

/// Delete every configured file that exists. Absent files are fine.
pub fn delete_stale(ctx: &BuildContext, cfg: &HousekeepingSection) -> BuildResult {
    let mut removed = Vec::new();
    for rel in &cfg.delete {
        let path = ctx.path(rel);
        if ctx.fs.is_file(&path) {
            ctx.fs
                .remove_file(&path)
                .map_err(|e| BuildError::io(DELETE_STALE, e))?;
            info!(file = %rel, "stale file deleted");
            removed.push(path);
        } else if ctx.fs.is_dir(&path) {
            ctx.fs
                .remove_dir_all(&path)
                .map_err(|e| BuildError::io(DELETE_STALE, e))?;
            info!(dir = %rel, "stale directory deleted");
            removed.push(path);
        } else {
            debug!(file = %rel, "nothing to delete");
        }
    }
    Ok(BuildOutput {
        unit: DELETE_STALE.to_string(),
        written: removed,
        skipped: 0,
    })
}

/// Create every configured folder that does not exist yet.
pub fn make_folders(ctx: &BuildContext, cfg: &HousekeepingSection) -> BuildResult {
    let mut created = Vec::new();
    for rel in &cfg.folders {
        let path = ctx.path(rel);
        if ctx.fs.exists(&path) {
            continue;
        }
        ctx.fs
            .create_dir_all(&path)
            .map_err(|e| BuildError::io(MAKE_FOLDERS, e))?;
        info!(folder = %rel, "📁  folder created");
        created.push(path);
    }
    Ok(BuildOutput {
        unit: MAKE_FOLDERS.to_string(),
        written: created,
        skipped: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::fs::FileSystem;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn missing_stale_file_is_not_an_error() {
        let fs = MockFileSystem::new();
        let ctx = BuildContext::new(Arc::new(fs.clone()), ".");
        let out = delete_stale(&ctx, &HousekeepingSection::default()).unwrap();
        assert!(out.written.is_empty());
        assert_eq!(fs.mutation_count(), 0);
    }

    #[test]
    fn deletes_then_creates_folders_once() {
        let fs = MockFileSystem::new();
        fs.add_file("./phpcs.xml.dist", "<ruleset/>");
        fs.add_dir("./imgs");
        let ctx = BuildContext::new(Arc::new(fs.clone()), ".");
        let cfg = HousekeepingSection::default();

        delete_stale(&ctx, &cfg).unwrap();
        assert!(!fs.exists(Path::new("./phpcs.xml.dist")));

        let first = make_folders(&ctx, &cfg).unwrap();
        assert_eq!(first.written.len(), 2);
        assert!(fs.is_dir(Path::new("./js/vendor")));

        let second = make_folders(&ctx, &cfg).unwrap();
        assert!(second.written.is_empty());
    }
}
