// src/units/sources.rs

//! Glob-driven source discovery.
//!
//! Patterns follow minimatch conventions: they are relative to the project
//! root (a leading `./` is ignored), `*` never crosses a `/`, and `**` spans
//! any number of directories. Each pattern has a *base*: the literal directory
//! prefix before the first wildcard. Outputs keep a source's path relative to
//! that base, so `sass/**/*.scss` with destination `./` turns
//! `sass/blocks/card.scss` into `blocks/card.css`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::errors::WpwatchError;
use crate::fs::{normalize_rel, resolve, FileSystem};
use crate::types::GlobList;

/// One discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path as handed to the filesystem (`root` joined with `rel`).
    pub path: PathBuf,
    /// Path relative to the project root, forward slashes.
    pub rel: String,
    /// Path relative to the base of the pattern that matched it.
    pub base_rel: String,
}

impl SourceFile {
    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.rel.rsplit('/').next().unwrap_or(&self.rel)
    }
}

#[derive(Clone)]
struct SourcePattern {
    pattern: String,
    base: String,
    matcher: GlobMatcher,
}

/// A compiled, ordered list of source globs.
#[derive(Clone)]
pub struct SourceSet {
    patterns: Vec<SourcePattern>,
    set: GlobSet,
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet")
            .field("patterns", &self.patterns())
            .finish_non_exhaustive()
    }
}

/// Compile a single pattern with minimatch-like separator semantics.
pub fn compile_glob(pattern: &str) -> crate::errors::Result<GlobMatcher> {
    let normalized = normalize_rel(pattern);
    GlobBuilder::new(normalized)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| WpwatchError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Literal directory prefix of a pattern.
///
/// `sass/**/*.scss` → `sass`, `**/*.php` → `""`, `js/app.js` → `js`.
pub fn glob_base(pattern: &str) -> String {
    let normalized = normalize_rel(pattern);
    let parts: Vec<&str> = normalized.split('/').collect();
    let literal: Vec<&str> = parts
        .iter()
        .take_while(|part| !part.contains(['*', '?', '[', '{']))
        .copied()
        .collect();

    if literal.len() == parts.len() {
        // No wildcard at all: the base is the containing directory.
        parts[..parts.len().saturating_sub(1)].join("/")
    } else {
        literal.join("/")
    }
}

impl SourceSet {
    pub fn new(globs: &GlobList) -> crate::errors::Result<Self> {
        Self::from_patterns(globs.patterns())
    }

    pub fn from_patterns<I, S>(patterns: I) -> crate::errors::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let normalized = normalize_rel(pattern).to_string();
            let matcher = compile_glob(pattern)?;
            builder.add(matcher.glob().clone());
            compiled.push(SourcePattern {
                base: glob_base(&normalized),
                pattern: normalized,
                matcher,
            });
        }

        let set = builder.build().map_err(|e| WpwatchError::InvalidGlob {
            pattern: compiled
                .iter()
                .map(|p| p.pattern.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            patterns: compiled,
            set,
        })
    }

    /// Normalized patterns in declaration order.
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.pattern.as_str()).collect()
    }

    /// Whether a root-relative path (forward slashes) matches any pattern.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }

    /// Collect every file under `root` matching this set.
    ///
    /// A pattern whose base directory does not exist contributes nothing; a
    /// set with no matches yields an empty list rather than an error. The
    /// result is sorted by root-relative path and free of duplicates.
    pub fn collect(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<SourceFile>> {
        let mut found: BTreeMap<String, SourceFile> = BTreeMap::new();

        for pattern in &self.patterns {
            let start = resolve(root, &pattern.base);
            if !fs.is_dir(&start) {
                debug!(pattern = %pattern.pattern, base = ?start, "glob base missing; no sources");
                continue;
            }

            let mut stack = vec![start];
            while let Some(dir) = stack.pop() {
                for path in fs.read_dir(&dir)? {
                    if fs.is_dir(&path) {
                        stack.push(path);
                        continue;
                    }
                    if !fs.is_file(&path) {
                        continue;
                    }
                    let Some(rel) = relative_str(root, &path) else {
                        continue;
                    };
                    if found.contains_key(&rel) || !pattern.matcher.is_match(&rel) {
                        continue;
                    }
                    let base_rel = strip_base(&rel, &pattern.base);
                    found.insert(
                        rel.clone(),
                        SourceFile {
                            path,
                            rel,
                            base_rel,
                        },
                    );
                }
            }
        }

        Ok(found.into_values().collect())
    }
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let s = rel.to_string_lossy().replace('\\', "/");
    Some(s)
}

fn strip_base(rel: &str, base: &str) -> String {
    if base.is_empty() {
        return rel.to_string();
    }
    rel.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(rel)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn base_is_literal_prefix() {
        assert_eq!(glob_base("./sass/**/*.scss"), "sass");
        assert_eq!(glob_base("./**/*.php"), "");
        assert_eq!(glob_base("js/vendor/**/*.js"), "js/vendor");
        assert_eq!(glob_base("./sass/style.scss"), "sass");
        assert_eq!(glob_base("fonts/*.{zip,tar}"), "fonts");
    }

    #[test]
    fn star_does_not_cross_directories() {
        let set = SourceSet::new(&GlobList::from("./js/*.js")).unwrap();
        assert!(set.matches("js/app.js"));
        assert!(!set.matches("js/min/app.min.js"));
        assert!(!set.matches("js/vendor/lib.js"));
    }

    #[test]
    fn collect_keeps_path_under_base() {
        let fs = MockFileSystem::new();
        fs.add_file("./sass/style.scss", "a{}");
        fs.add_file("./sass/blocks/card.scss", "b{}");
        fs.add_file("./sass/readme.md", "#");

        let set = SourceSet::new(&GlobList::from("./sass/**/*.scss")).unwrap();
        let files = set.collect(&fs, Path::new(".")).unwrap();

        let rels: Vec<_> = files.iter().map(|f| f.base_rel.as_str()).collect();
        assert_eq!(rels, vec!["blocks/card.scss", "style.scss"]);
        assert_eq!(files[1].rel, "sass/style.scss");
    }

    #[test]
    fn missing_base_yields_empty_set() {
        let fs = MockFileSystem::new();
        let set = SourceSet::new(&GlobList::from("./js/vendor/**/*.js")).unwrap();
        assert!(set.collect(&fs, Path::new(".")).unwrap().is_empty());
    }
}
