// src/pipeline/mod.rs

//! Explicitly composed transform stages.
//!
//! A task unit turns each source file into an [`Asset`] and pushes it through
//! a [`Pipeline`]: an ordered list of [`Stage`]s, each taking an asset and
//! returning a new one or a [`StageError`]. Stages run strictly in sequence;
//! the first failure ends the pipeline for that asset.
//!
//! - [`command`] wraps an external tool (sass, postcss, esbuild, ...).
//! - [`builtin`] holds the pure in-process stages (renaming, source-map
//!   linking).

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::units::sources::SourceFile;

pub mod builtin;
pub mod command;

pub use builtin::{CommentStyle, Rename, SourceMapLink};
pub use command::CommandStage;

/// Boxed future returned by stages, as used at the executor seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A file travelling through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Original source file on disk.
    pub source: PathBuf,
    /// Original source relative to the project root.
    pub source_rel: String,
    /// Output path relative to the unit's destination directory.
    pub rel: String,
    pub contents: Vec<u8>,
    /// Source map for `contents`, if a stage produced one.
    pub source_map: Option<Vec<u8>>,
}

impl Asset {
    pub fn from_source(source: &SourceFile, contents: Vec<u8>) -> Self {
        Self {
            source: source.path.clone(),
            source_rel: source.rel.clone(),
            rel: source.base_rel.clone(),
            contents,
            source_map: None,
        }
    }

    /// File name of the output, without directories.
    pub fn file_name(&self) -> &str {
        self.rel.rsplit('/').next().unwrap_or(&self.rel)
    }

    /// Relative path of the sibling source-map file.
    pub fn map_rel(&self) -> String {
        format!("{}.map", self.rel)
    }
}

/// Failure of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage}: {message}")]
pub struct StageError {
    pub stage: String,
    pub message: String,
}

impl StageError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type StageResult = Result<Asset, StageError>;

/// One transform step.
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Name this stage gives an output called `rel`.
    ///
    /// Used to predict output paths (for freshness checks) without running
    /// the stage.
    fn rename(&self, rel: &str) -> String {
        rel.to_string()
    }

    fn apply(&self, asset: Asset) -> BoxFuture<'_, StageResult>;
}

/// Ordered list of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage.
    pub fn then<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Output path (relative to the destination) for an input named `rel`.
    pub fn output_rel(&self, rel: &str) -> String {
        self.stages
            .iter()
            .fold(rel.to_string(), |acc, stage| stage.rename(&acc))
    }

    /// Run every stage in order.
    pub async fn run(&self, mut asset: Asset) -> StageResult {
        for stage in &self.stages {
            debug!(stage = stage.name(), asset = %asset.rel, "applying stage");
            asset = stage.apply(asset).await?;
        }
        Ok(asset)
    }
}
