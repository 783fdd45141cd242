// src/exec/task_runner.rs

//! Maps task-graph step names onto the code that performs them.

use std::sync::Arc;

use tracing::info;

use crate::config::ConfigFile;
use crate::graph::invocation::SERVE;
use crate::graph::{StepExecutor, StepOutcome};
use crate::pipeline::BoxFuture;
use crate::session::{self, Session};
use crate::sink::ErrorSink;
use crate::units::fonts::{FontSteps, CLEAN_FONTS, FONTS_CSS, FONTS_SASS, UNZIP_FONTS};
use crate::units::housekeeping::{delete_stale, make_folders, DELETE_STALE, MAKE_FOLDERS};
use crate::units::{finish, AssetUnits, BuildContext, BuildError, BuildResult};

/// Production [`StepExecutor`].
#[derive(Debug, Clone)]
pub struct TaskRunner {
    cfg: Arc<ConfigFile>,
    ctx: BuildContext,
    units: Arc<AssetUnits>,
    fonts: FontSteps,
    sink: ErrorSink,
}

impl TaskRunner {
    pub fn new(
        cfg: Arc<ConfigFile>,
        ctx: BuildContext,
        units: Arc<AssetUnits>,
        fonts: FontSteps,
        sink: ErrorSink,
    ) -> Self {
        Self {
            cfg,
            ctx,
            units,
            fonts,
            sink,
        }
    }

    async fn build_step(&self, step: &str) -> BuildResult {
        let housekeeping = self.cfg.housekeeping();
        match step {
            DELETE_STALE => delete_stale(&self.ctx, housekeeping),
            MAKE_FOLDERS => make_folders(&self.ctx, housekeeping),
            UNZIP_FONTS => self.fonts.unzip_fonts(&self.ctx).await,
            FONTS_CSS => self.fonts.fonts_css(&self.ctx).await,
            FONTS_SASS => self.fonts.fonts_sass(&self.ctx).await,
            CLEAN_FONTS => self.fonts.clean_fonts(&self.ctx).await,
            unit => match self.units.get(unit) {
                Some(task) => task.build(&self.ctx).await,
                None => Err(BuildError::Step {
                    unit: unit.to_string(),
                    message: "unknown step".to_string(),
                }),
            },
        }
    }

    async fn run(&self, step: &str) -> StepOutcome {
        if step == SERVE {
            let session = Session::new(
                Arc::clone(&self.cfg),
                self.ctx.clone(),
                Arc::clone(&self.units),
                self.sink.clone(),
            );
            return match session::serve(session).await {
                Ok(()) => {
                    info!("session ended");
                    StepOutcome::Succeeded
                }
                Err(err) => {
                    self.sink.report(SERVE, &format!("{err:#}"));
                    StepOutcome::Failed
                }
            };
        }

        match finish(self.build_step(step).await, &self.sink) {
            Ok(_) => StepOutcome::Succeeded,
            Err(_) => StepOutcome::Failed,
        }
    }
}

impl StepExecutor for TaskRunner {
    fn run_step<'a>(&'a self, step: &'a str) -> BoxFuture<'a, StepOutcome> {
        Box::pin(self.run(step))
    }
}
