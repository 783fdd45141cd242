// src/units/fonts.rs

//! The one-off font steps: `unzip-fonts`, `fonts-css`, `fonts-sass` and
//! `clean-fonts`.
//!
//! Archives are unpacked by an [`Extractor`] into memory; only the entries
//! selected by the configured include globs are written into the project.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{bail, Context};
use globset::GlobSet;
use tracing::{debug, info};

use crate::config::{PathsSection, ToolsSection};
use crate::pipeline::command::{render_template, shell_command};
use crate::pipeline::BoxFuture;
use crate::units::sources::{SourceFile, SourceSet};
use crate::units::{BuildContext, BuildError, BuildOutput, BuildResult};

pub const UNZIP_FONTS: &str = "unzip-fonts";
pub const FONTS_CSS: &str = "fonts-css";
pub const FONTS_SASS: &str = "fonts-sass";
pub const CLEAN_FONTS: &str = "clean-fonts";

/// A file inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, forward slashes.
    pub path: String,
    pub contents: Vec<u8>,
}

/// Unpacks an archive held in memory.
pub trait Extractor: Send + Sync + std::fmt::Debug {
    /// `name` is the archive's file name; its extension selects the format.
    fn extract<'a>(&'a self, name: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, anyhow::Result<Vec<ArchiveEntry>>>;
}

/// Extracts with the `[tools].unzip` / `[tools].untar` command templates.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    unzip: String,
    untar: String,
}

impl CommandExtractor {
    pub fn new(tools: &ToolsSection) -> Self {
        Self {
            unzip: tools.unzip.clone(),
            untar: tools.untar.clone(),
        }
    }

    fn template_for(&self, name: &str) -> &str {
        if name.to_ascii_lowercase().ends_with(".zip") {
            &self.unzip
        } else {
            &self.untar
        }
    }

    async fn run(&self, name: &str, bytes: Vec<u8>) -> anyhow::Result<Vec<ArchiveEntry>> {
        if !is_archive(Path::new(name)) {
            bail!("unsupported archive format: {name}");
        }
        let scratch = tempfile::tempdir().context("creating scratch dir")?;
        let archive = scratch.path().join(name);
        let out_dir = scratch.path().join("entries");
        tokio::fs::write(&archive, &bytes)
            .await
            .with_context(|| format!("staging archive {name}"))?;
        tokio::fs::create_dir_all(&out_dir)
            .await
            .context("creating extraction dir")?;

        let line = render_template(
            self.template_for(name),
            &[("archive", archive.as_path()), ("dir", out_dir.as_path())],
        );
        debug!(archive = %name, cmd = %line, "extracting archive");

        let out = shell_command(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawning `{line}`"))?;
        if !out.status.success() {
            bail!(
                "extracting {name} failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        let mut entries = Vec::new();
        let mut stack = vec![out_dir.clone()];
        while let Some(dir) = stack.pop() {
            let mut rd = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("reading {dir:?}"))?;
            while let Some(entry) = rd.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&out_dir) else {
                    continue;
                };
                entries.push(ArchiveEntry {
                    path: rel.to_string_lossy().replace('\\', "/"),
                    contents: tokio::fs::read(&path).await?,
                });
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

impl Extractor for CommandExtractor {
    fn extract<'a>(&'a self, name: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, anyhow::Result<Vec<ArchiveEntry>>> {
        Box::pin(self.run(name, bytes))
    }
}

/// The fonts steps, sharing one set of paths and one extractor.
#[derive(Debug, Clone)]
pub struct FontSteps {
    paths: PathsSection,
    extractor: Arc<dyn Extractor>,
}

impl FontSteps {
    pub fn new(paths: PathsSection, extractor: Arc<dyn Extractor>) -> Self {
        Self { paths, extractor }
    }

    /// Matching archives; none at all fails the step.
    fn archives(&self, ctx: &BuildContext, step: &str) -> Result<Vec<SourceFile>, BuildError> {
        let set = SourceSet::new(&self.paths.fonts_src).map_err(|e| BuildError::io(step, e.into()))?;
        let found = set
            .collect(ctx.fs.as_ref(), &ctx.root)
            .map_err(|e| BuildError::io(step, e))?;
        if found.is_empty() {
            return Err(BuildError::Step {
                unit: step.to_string(),
                message: format!("no font archive matches {}", set.patterns().join(", ")),
            });
        }
        Ok(found)
    }

    /// Extract every archive and keep the entries matching `include`.
    async fn selected_entries(
        &self,
        ctx: &BuildContext,
        step: &str,
        include: &GlobSet,
    ) -> Result<Vec<ArchiveEntry>, BuildError> {
        let mut selected = Vec::new();
        for archive in self.archives(ctx, step)? {
            let bytes = ctx
                .fs
                .read(&archive.path)
                .map_err(|e| BuildError::io(step, e))?;
            let entries = self
                .extractor
                .extract(archive.file_name(), bytes)
                .await
                .map_err(|e| BuildError::Step {
                    unit: step.to_string(),
                    message: format!("{}: {e:#}", archive.rel),
                })?;
            selected.extend(entries.into_iter().filter(|e| include.is_match(&e.path)));
        }
        Ok(selected)
    }

    /// Unpack the font binaries into `fonts_dest`, keeping archive paths.
    pub async fn unzip_fonts(&self, ctx: &BuildContext) -> BuildResult {
        let include = include_set(&self.paths.fonts_include, UNZIP_FONTS)?;
        let entries = self.selected_entries(ctx, UNZIP_FONTS, &include).await?;

        let dest = ctx.path(&self.paths.fonts_dest);
        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let out = dest.join(&entry.path);
            ctx.fs
                .write(&out, &entry.contents)
                .map_err(|e| BuildError::io(UNZIP_FONTS, e))?;
            written.push(out);
        }
        Ok(output(UNZIP_FONTS, written))
    }

    /// Concatenate the stylesheets shipped in the archives into one file.
    pub async fn fonts_css(&self, ctx: &BuildContext) -> BuildResult {
        let include = include_set(&self.paths.fonts_css_include, FONTS_CSS)?;
        let entries = self.selected_entries(ctx, FONTS_CSS, &include).await?;
        if entries.is_empty() {
            debug!("no stylesheet in font archives");
            return Ok(output(FONTS_CSS, Vec::new()));
        }

        let parts: Vec<&[u8]> = entries.iter().map(|e| e.contents.as_slice()).collect();
        let out = ctx
            .path(&self.paths.fonts_css_dest)
            .join(&self.paths.fonts_css_filename);
        ctx.fs
            .write(&out, &parts.join(&b'\n'))
            .map_err(|e| BuildError::io(FONTS_CSS, e))?;
        Ok(output(FONTS_CSS, vec![out]))
    }

    /// Merge the listed files, in order, into the typography partial.
    ///
    /// Missing files are skipped; if none exists nothing is written.
    pub async fn fonts_sass(&self, ctx: &BuildContext) -> BuildResult {
        let mut parts = Vec::new();
        for rel in &self.paths.fonts_sass_src {
            let path = ctx.path(rel);
            if !ctx.fs.is_file(&path) {
                debug!(file = %rel, "typography source missing; skipped");
                continue;
            }
            parts.push(ctx.fs.read(&path).map_err(|e| BuildError::io(FONTS_SASS, e))?);
        }
        if parts.is_empty() {
            return Ok(output(FONTS_SASS, Vec::new()));
        }

        let out = ctx
            .path(&self.paths.fonts_sass_dest)
            .join(&self.paths.fonts_sass_filename);
        ctx.fs
            .write(&out, &parts.join(&b'\n'))
            .map_err(|e| BuildError::io(FONTS_SASS, e))?;
        Ok(output(FONTS_SASS, vec![out]))
    }

    /// Remove the intermediate stylesheet directory and the archives.
    pub async fn clean_fonts(&self, ctx: &BuildContext) -> BuildResult {
        let mut removed = Vec::new();

        let css_dir = ctx.path(&self.paths.fonts_css_dest);
        if ctx.fs.is_dir(&css_dir) {
            ctx.fs
                .remove_dir_all(&css_dir)
                .map_err(|e| BuildError::io(CLEAN_FONTS, e))?;
            removed.push(css_dir);
        }

        let set = SourceSet::new(&self.paths.fonts_src)
            .map_err(|e| BuildError::io(CLEAN_FONTS, e.into()))?;
        let archives = set
            .collect(ctx.fs.as_ref(), &ctx.root)
            .map_err(|e| BuildError::io(CLEAN_FONTS, e))?;
        for archive in archives {
            ctx.fs
                .remove_file(&archive.path)
                .map_err(|e| BuildError::io(CLEAN_FONTS, e))?;
            removed.push(archive.path);
        }

        info!(removed = removed.len(), "font leftovers removed");
        Ok(output(CLEAN_FONTS, removed))
    }
}

fn include_set(globs: &crate::types::GlobList, step: &str) -> Result<GlobSet, BuildError> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in globs.patterns() {
        let matcher = crate::units::sources::compile_glob(pattern)
            .map_err(|e| BuildError::io(step, e.into()))?;
        builder.add(matcher.glob().clone());
    }
    builder.build().map_err(|e| BuildError::io(step, e.into()))
}

fn output(unit: &str, written: Vec<PathBuf>) -> BuildOutput {
    BuildOutput {
        unit: unit.to_string(),
        written,
        skipped: 0,
    }
}

/// Whether `path` names an archive format the extractor understands.
pub fn is_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    [".zip", ".tar", ".tar.gz", ".tgz", ".tar.bz2"]
        .iter()
        .any(|ext| name.ends_with(ext))
}
