// tests/graph_runner.rs
mod common;

use std::sync::Arc;

use wpwatch::errors::WpwatchError;
use wpwatch::graph::invocation::{self, SERVE};
use wpwatch::graph::{run_invocation, FailurePolicy, Invocation};
use wpwatch::units::fonts::{CLEAN_FONTS, FONTS_CSS, FONTS_SASS, UNZIP_FONTS};
use wpwatch::units::housekeeping::{DELETE_STALE, MAKE_FOLDERS};
use wpwatch::units::{SCRIPTS, STYLES, VENDOR_SCRIPTS};
use wpwatch_test_utils::FakeStepExecutor;

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn default_builds_everything_before_serving() {
    common::init_tracing();

    let executor = FakeStepExecutor::new();
    let report = common::with_timeout(run_invocation(
        &invocation::resolve("default").unwrap(),
        Arc::new(executor.clone()),
    ))
    .await;

    assert!(report.is_success());
    let ran = executor.ran();
    assert_eq!(ran.len(), 4);
    assert_eq!(ran.last().map(String::as_str), Some(SERVE));
    for build in [STYLES, SCRIPTS, VENDOR_SCRIPTS] {
        assert!(ran.iter().any(|s| s == build), "{build} did not run");
    }
}

#[tokio::test]
async fn default_still_serves_after_a_failed_build() {
    let executor = FakeStepExecutor::new().failing(STYLES);
    let report = common::with_timeout(run_invocation(
        &invocation::default_invocation(),
        Arc::new(executor.clone()),
    ))
    .await;

    assert_eq!(report.failed, strings(&[STYLES]));
    assert!(report.blocked.is_empty());
    assert_eq!(executor.ran().last().map(String::as_str), Some(SERVE));
}

#[tokio::test]
async fn fonts_stop_after_a_failed_stage() {
    let executor = FakeStepExecutor::new().failing(FONTS_CSS);
    let report = common::with_timeout(run_invocation(
        &invocation::fonts_invocation(),
        Arc::new(executor.clone()),
    ))
    .await;

    assert_eq!(executor.ran(), strings(&[UNZIP_FONTS, FONTS_CSS]));
    assert_eq!(report.succeeded, strings(&[UNZIP_FONTS]));
    assert_eq!(report.failed, strings(&[FONTS_CSS]));
    assert_eq!(report.blocked, strings(&[FONTS_SASS, CLEAN_FONTS]));
    assert!(!report.is_success());
}

#[tokio::test]
async fn build_runs_housekeeping_in_order() {
    let executor = FakeStepExecutor::new();
    let report = common::with_timeout(run_invocation(
        &invocation::resolve("build").unwrap(),
        Arc::new(executor.clone()),
    ))
    .await;

    assert!(report.is_success());
    assert_eq!(executor.ran(), strings(&[DELETE_STALE, MAKE_FOLDERS]));
}

#[tokio::test]
async fn a_single_step_runs_alone() {
    let executor = FakeStepExecutor::new();
    let inv = invocation::resolve(SCRIPTS).unwrap();
    assert_eq!(inv.policy(), FailurePolicy::Stop);

    let report = common::with_timeout(run_invocation(&inv, Arc::new(executor.clone()))).await;

    assert_eq!(report.invocation, SCRIPTS);
    assert_eq!(executor.ran(), strings(&[SCRIPTS]));
}

#[test]
fn unknown_task_is_rejected() {
    let err = invocation::resolve("deploy").unwrap_err();
    assert!(matches!(err, WpwatchError::UnknownTask(ref name) if name == "deploy"));
}

#[test]
fn cyclic_invocation_is_rejected() {
    let looping = Invocation::new("loop", FailurePolicy::Stop)
        .step("a", &["b"])
        .step("b", &["a"]);
    assert!(matches!(looping.validate(), Err(WpwatchError::DagCycle(_))));
}

#[test]
fn every_invocation_orders_dependencies_first() {
    for name in invocation::names() {
        let inv = invocation::resolve(name).unwrap();
        let order = inv.order().unwrap();
        for spec in inv.steps() {
            let at = order.iter().position(|s| *s == spec.name).unwrap();
            for dep in &spec.after {
                let dep_at = order.iter().position(|s| s == dep).unwrap();
                assert!(dep_at < at, "{dep} must precede {} in {name}", spec.name);
            }
        }
    }
}
