// src/units/mod.rs

//! Task units: named, independently invocable build steps.
//!
//! - [`sources`] discovers input files from globs.
//! - [`freshness`] skips inputs whose outputs are already newer.
//! - [`assets`] wires the style, script and vendor-script units.
//! - [`fonts`] and [`housekeeping`] hold the one-off steps.
//!
//! Every unit invocation yields a [`BuildResult`]. [`TaskUnit::run`] is the
//! boundary where a failure is handed to the error sink, exactly once.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::fs::{resolve, FileSystem};
use crate::pipeline::{Asset, Pipeline, StageError};
use crate::sink::ErrorSink;
use crate::types::TaskName;
use crate::units::freshness::filter_stale;
use crate::units::sources::{SourceFile, SourceSet};

pub mod assets;
pub mod fonts;
pub mod freshness;
pub mod housekeeping;
pub mod sources;

pub use assets::{AssetUnits, SCRIPTS, STYLES, VENDOR_SCRIPTS};

/// Everything a unit needs to touch the project.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub fs: Arc<dyn FileSystem>,
    /// Project root all config paths are relative to.
    pub root: PathBuf,
}

impl BuildContext {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// Resolve a config path against the project root.
    pub fn path(&self, rel: &str) -> PathBuf {
        resolve(&self.root, rel)
    }
}

/// Successful unit invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub unit: TaskName,
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
    /// Sources skipped because their outputs were fresh.
    pub skipped: usize,
}

/// Failed unit invocation.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("{unit}: {input}: {source}")]
    Stage {
        unit: TaskName,
        input: String,
        #[source]
        source: StageError,
    },

    #[error("{unit}: {message}")]
    Io { unit: TaskName, message: String },

    #[error("{unit}: {message}")]
    Step { unit: TaskName, message: String },
}

impl BuildError {
    pub fn unit(&self) -> &str {
        match self {
            BuildError::Stage { unit, .. }
            | BuildError::Io { unit, .. }
            | BuildError::Step { unit, .. } => unit,
        }
    }

    pub(crate) fn io(unit: &str, err: anyhow::Error) -> Self {
        BuildError::Io {
            unit: unit.to_string(),
            message: format!("{err:#}"),
        }
    }

    /// Description without the unit prefix, for operator notifications.
    pub fn detail(&self) -> String {
        match self {
            BuildError::Stage { input, source, .. } => format!("{input}: {source}"),
            BuildError::Io { message, .. } | BuildError::Step { message, .. } => message.clone(),
        }
    }
}

pub type BuildResult = Result<BuildOutput, BuildError>;

/// Log a finished step, or hand its failure to `sink`. Every step result
/// passes through here exactly once.
pub fn finish(result: BuildResult, sink: &ErrorSink) -> BuildResult {
    match &result {
        Ok(output) => info!(
            task = %output.unit,
            written = output.written.len(),
            skipped = output.skipped,
            "completed task"
        ),
        Err(err) => sink.report(err.unit(), &err.detail()),
    }
    result
}

/// A glob-driven build step: sources → pipeline → destination directory.
#[derive(Debug, Clone)]
pub struct TaskUnit {
    name: TaskName,
    sources: SourceSet,
    dest: String,
    pipeline: Pipeline,
    skip_if_newer: bool,
    skip_partials: bool,
}

impl TaskUnit {
    pub fn new(
        name: impl Into<TaskName>,
        sources: SourceSet,
        dest: impl Into<String>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            dest: dest.into(),
            pipeline,
            skip_if_newer: false,
            skip_partials: false,
        }
    }

    /// Skip sources whose output is newer than them.
    pub fn skip_if_newer(mut self, yes: bool) -> Self {
        self.skip_if_newer = yes;
        self
    }

    /// Never compile sources whose file name starts with `_`.
    pub fn skip_partials(mut self, yes: bool) -> Self {
        self.skip_partials = yes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Where the output for `source` lands.
    pub fn output_path(&self, dest_dir: &Path, source: &SourceFile) -> PathBuf {
        dest_dir.join(self.pipeline.output_rel(&source.base_rel))
    }

    /// Build once and hand any failure to `sink`.
    pub async fn run(&self, ctx: &BuildContext, sink: &ErrorSink) -> BuildResult {
        finish(self.build(ctx).await, sink)
    }

    /// Build once without reporting.
    ///
    /// Every source goes through the pipeline before anything is written:
    /// a failing source aborts the run with no outputs touched.
    pub async fn build(&self, ctx: &BuildContext) -> BuildResult {
        let fs = ctx.fs.as_ref();
        let dest_dir = ctx.path(&self.dest);

        let mut sources = self
            .sources
            .collect(fs, &ctx.root)
            .map_err(|e| BuildError::io(&self.name, e))?;

        if self.skip_partials {
            sources.retain(|s| !s.file_name().starts_with('_'));
        }

        let discovered = sources.len();
        if self.skip_if_newer {
            sources = filter_stale(fs, sources, &dest_dir, |s| self.output_path(&dest_dir, s));
        }
        let skipped = discovered - sources.len();

        if sources.is_empty() {
            debug!(task = %self.name, skipped, "no sources to build");
            return Ok(BuildOutput {
                unit: self.name.clone(),
                written: Vec::new(),
                skipped,
            });
        }

        let mut built = Vec::with_capacity(sources.len());
        for source in &sources {
            let contents = fs
                .read(&source.path)
                .map_err(|e| BuildError::io(&self.name, e))?;
            let asset = self
                .pipeline
                .run(Asset::from_source(source, contents))
                .await
                .map_err(|e| BuildError::Stage {
                    unit: self.name.clone(),
                    input: source.rel.clone(),
                    source: e,
                })?;
            built.push(asset);
        }

        let mut written = Vec::new();
        for asset in built {
            let out = dest_dir.join(&asset.rel);
            fs.write(&out, &asset.contents)
                .map_err(|e| BuildError::io(&self.name, e))?;
            written.push(out);

            if let Some(map) = &asset.source_map {
                let map_out = dest_dir.join(asset.map_rel());
                fs.write(&map_out, map)
                    .map_err(|e| BuildError::io(&self.name, e))?;
                written.push(map_out);
            }
        }

        Ok(BuildOutput {
            unit: self.name.clone(),
            written,
            skipped,
        })
    }
}
