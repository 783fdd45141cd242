// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod reload;
pub mod session;
pub mod sink;
pub mod types;
pub mod units;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::exec::TaskRunner;
use crate::fs::RealFileSystem;
use crate::graph::invocation::SERVE;
use crate::graph::{run_invocation, DagGraph, FailurePolicy, Invocation};
use crate::sink::ErrorSink;
use crate::units::fonts::{CommandExtractor, FontSteps};
use crate::units::{AssetUnits, BuildContext};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - task units, font steps and the error sink
/// - the requested invocation and its runner
///
/// The `serve` step (part of `default`) blocks until Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let invocation = graph::resolve(&args.task)?;

    if args.dry_run {
        print_dry_run(&cfg, &invocation)?;
        return Ok(());
    }

    let root = project_root(&config_path);
    info!(root = %root.display(), task = %invocation.name(), "starting");

    let cfg = Arc::new(cfg);
    let ctx = BuildContext::new(Arc::new(RealFileSystem), root);
    let units = Arc::new(AssetUnits::from_config(&cfg)?);
    let fonts = FontSteps::new(
        cfg.paths().clone(),
        Arc::new(CommandExtractor::new(cfg.tools())),
    );
    let sink = ErrorSink::from_config(cfg.notify());

    let runner = TaskRunner::new(cfg, ctx, units, fonts, sink);
    let report = run_invocation(&invocation, Arc::new(runner)).await;

    // A failed build inside `default` has already been reported and the
    // session kept running; only a failed serve step is fatal there.
    let fatal = match invocation.policy() {
        FailurePolicy::Stop => !report.is_success(),
        FailurePolicy::Continue => report.failed.iter().any(|step| step == SERVE),
    };
    if fatal {
        bail!(
            "task '{}' failed: failed {:?}, blocked {:?}",
            report.invocation,
            report.failed,
            report.blocked
        );
    }
    if !report.is_success() {
        warn!(task = %report.invocation, failed = ?report.failed, "finished with failed steps");
    } else {
        info!(task = %report.invocation, steps = report.succeeded.len(), "finished");
    }
    Ok(())
}

/// Config paths are relative to the directory holding the config file.
///
/// - "theme/wpwatch.toml" → "theme"
/// - bare "wpwatch.toml" (parent = "") → current working directory
fn project_root(config_path: &Path) -> PathBuf {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    dir.canonicalize().unwrap_or(dir)
}

/// Print the invocation graph and watch bindings without running anything.
fn print_dry_run(cfg: &ConfigFile, invocation: &Invocation) -> Result<()> {
    let order = invocation.order()?;
    let graph = DagGraph::from_invocation(invocation);

    println!("wpwatch dry-run");
    println!("  task = {}", invocation.name());
    println!("  policy = {:?}", invocation.policy());
    println!("  order = {order:?}");
    println!();

    println!("steps ({}):", invocation.steps().len());
    for step in graph.steps() {
        println!("  - {step}");
        let after = graph.dependencies_of(step);
        if !after.is_empty() {
            println!("      after: {after:?}");
        }
    }
    println!();

    let bindings = watch::build_bindings(cfg)?;
    println!("watch bindings ({}):", bindings.len());
    for binding in &bindings {
        println!("  - {}", binding.name());
        println!("      globs: {:?}", binding.patterns());
        if !binding.units().is_empty() {
            println!("      units: {:?}", binding.units());
        }
        println!("      reload: {:?}", binding.reload());
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
