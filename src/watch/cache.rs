// src/watch/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Content hash of a byte buffer, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

/// Last seen content hash per watched file.
///
/// Editors often rewrite a file without changing it; such events are dropped.
#[derive(Debug, Default)]
pub struct ContentCache {
    hashes: HashMap<PathBuf, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current contents of `path` and report whether they differ
    /// from the previous observation.
    ///
    /// The first observation, a deletion and an unreadable file all count as
    /// changes.
    pub fn observe(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        if !fs.is_file(path) {
            self.hashes.remove(path);
            return true;
        }

        let hash = match fs.read(path) {
            Ok(bytes) => content_hash(&bytes),
            Err(err) => {
                debug!(?path, error = %err, "cannot hash file; treating as changed");
                self.hashes.remove(path);
                return true;
            }
        };

        match self.hashes.insert(path.to_path_buf(), hash.clone()) {
            Some(previous) if previous == hash => {
                debug!(?path, "content unchanged");
                false
            }
            _ => true,
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
