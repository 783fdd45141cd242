// tests/runtime_fake_executor.rs
mod common;

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use wpwatch::engine::{CoreRuntime, Runtime, RuntimeEvent};
use wpwatch::exec::UnitExecutor;
use wpwatch::fs::mock::MockFileSystem;
use wpwatch::pipeline::{CommentStyle, Pipeline, Rename, SourceMapLink};
use wpwatch::reload::{ClientRegistry, ReloadMessage};
use wpwatch::types::GlobList;
use wpwatch::units::sources::SourceSet;
use wpwatch::units::{AssetUnits, TaskUnit, SCRIPTS, STYLES};
use wpwatch::watch::build_bindings;
use wpwatch_test_utils::{ConfigBuilder, Dispatch, FakeBindingExecutor, FnStage};

use crate::common::{mock_ctx, recording_sink};

type TestResult = Result<(), Box<dyn Error>>;

fn changed(binding: &str, path: &str) -> RuntimeEvent {
    RuntimeEvent::PathChanged {
        binding: binding.to_string(),
        path: path.to_string(),
    }
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<ReloadMessage>) -> ReloadMessage {
    timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("no reload within 3 seconds")
        .expect("registry dropped the client")
}

#[tokio::test]
async fn runtime_with_fake_executor_broadcasts_reloads() -> TestResult {
    common::init_tracing();

    let cfg = ConfigBuilder::new().build();
    let bindings = build_bindings(&cfg)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);

    let executor = FakeBindingExecutor::new(rt_tx.clone())
        .writes(STYLES, &["style.css", "style.css.map"])
        .failing(SCRIPTS);
    let dispatched = executor.dispatched();

    let registry = Arc::new(ClientRegistry::new());
    let (_id, mut browser) = registry.connect();

    let runtime = Runtime::new(
        CoreRuntime::new(&bindings),
        rt_rx,
        executor,
        Arc::clone(&registry),
    );
    let handle = tokio::spawn(runtime.run());

    rt_tx.send(changed(STYLES, "sass/style.scss")).await?;
    assert_eq!(
        next_message(&mut browser).await,
        ReloadMessage::Inject {
            paths: vec!["style.css".to_string()]
        }
    );

    // A failing build still refreshes the page.
    rt_tx.send(changed(SCRIPTS, "js/navigation.js")).await?;
    assert_eq!(next_message(&mut browser).await, ReloadMessage::Reload);

    rt_tx.send(changed("php", "footer.php")).await?;
    assert_eq!(next_message(&mut browser).await, ReloadMessage::Reload);

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    timeout(Duration::from_secs(3), handle)
        .await
        .expect("runtime did not stop within 3 seconds")??;

    assert!(browser.try_recv().is_err());
    let dispatched = dispatched.lock().unwrap().clone();
    assert_eq!(
        dispatched,
        vec![
            Dispatch {
                binding: STYLES.to_string(),
                units: vec![STYLES.to_string()],
            },
            Dispatch {
                binding: SCRIPTS.to_string(),
                units: vec![SCRIPTS.to_string()],
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn broken_stylesheet_is_reported_and_the_loop_keeps_going() -> TestResult {
    common::init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("./sass/style.scss", "body{ {{ }");
    let ctx = mock_ctx(&fs);
    let (sink, notifier) = recording_sink();

    let styles = TaskUnit::new(
        STYLES,
        SourceSet::new(&GlobList::from("./sass/**/*.scss"))?,
        "./",
        Pipeline::new()
            .then(FnStage::reject_containing("sass", "{{"))
            .then(Rename::extension("css"))
            .then(SourceMapLink::new(CommentStyle::Css)),
    )
    .skip_partials(true);
    let units = Arc::new(AssetUnits::default().with(styles));

    let cfg = ConfigBuilder::new().build();
    let bindings = build_bindings(&cfg)?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let registry = Arc::new(ClientRegistry::new());
    let (_id, mut browser) = registry.connect();

    let executor = UnitExecutor::new(units, ctx, sink.clone(), rt_tx.clone());
    let runtime = Runtime::new(
        CoreRuntime::new(&bindings),
        rt_rx,
        executor,
        Arc::clone(&registry),
    );
    let handle = tokio::spawn(runtime.run());

    rt_tx.send(changed(STYLES, "sass/style.scss")).await?;
    common::with_timeout(async {
        while notifier.count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(next_message(&mut browser).await, ReloadMessage::Reload);
    assert_eq!(fs.mutation_count(), 0);

    fs.add_file("./sass/style.scss", "body{margin:0}");
    rt_tx.send(changed(STYLES, "sass/style.scss")).await?;
    assert_eq!(
        next_message(&mut browser).await,
        ReloadMessage::Inject {
            paths: vec!["style.css".to_string()]
        }
    );
    assert_eq!(sink.reported(), 1);
    assert!(fs.contents("./style.css").is_some());

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    timeout(Duration::from_secs(3), handle)
        .await
        .expect("runtime did not stop within 3 seconds")??;
    Ok(())
}
