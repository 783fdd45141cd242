// tests/style_unit.rs
mod common;

use std::error::Error;
use std::path::{Path, PathBuf};

use wpwatch::fs::mock::MockFileSystem;
use wpwatch::pipeline::{CommentStyle, Pipeline, Rename, SourceMapLink};
use wpwatch::types::GlobList;
use wpwatch::units::sources::SourceSet;
use wpwatch::units::{TaskUnit, STYLES};
use wpwatch_test_utils::FnStage;

use crate::common::{mock_ctx, recording_sink, text};

type TestResult = Result<(), Box<dyn Error>>;

/// The production style pipeline with the two external tools swapped for
/// in-memory stand-ins: "sass" rejects `{{`, "postcss" uppercases.
fn style_unit() -> TaskUnit {
    let pipeline = Pipeline::new()
        .then(FnStage::reject_containing("sass", "{{"))
        .then(FnStage::uppercase("postcss"))
        .then(Rename::extension("css"))
        .then(SourceMapLink::new(CommentStyle::Css));

    TaskUnit::new(
        STYLES,
        SourceSet::new(&GlobList::from("./sass/**/*.scss")).unwrap(),
        "./",
        pipeline,
    )
    .skip_partials(true)
}

fn theme_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("./sass/style.scss", "body{color:red}");
    fs.add_file("./sass/variables-site/_colors.scss", "$red: red;");
    fs
}

#[tokio::test]
async fn valid_stylesheet_produces_css_and_map() -> TestResult {
    common::init_tracing();

    let fs = theme_fs();
    let (sink, notifier) = recording_sink();

    let out = style_unit().run(&mock_ctx(&fs), &sink).await?;

    assert_eq!(
        out.written,
        vec![PathBuf::from("./style.css"), PathBuf::from("./style.css.map")]
    );
    assert_eq!(
        text(&fs, "./style.css").as_deref(),
        Some("BODY{COLOR:RED}\n/*# sourceMappingURL=style.css.map */\n")
    );
    let map: serde_json::Value = serde_json::from_slice(&fs.contents("./style.css.map").unwrap())?;
    assert_eq!(map["file"], "style.css");
    assert_eq!(map["sources"][0], "sass/style.scss");

    // Partials are inputs to other stylesheets, never outputs of their own.
    assert!(fs.contents("./variables-site/_colors.css").is_none());
    assert_eq!(notifier.count(), 0);
    Ok(())
}

#[tokio::test]
async fn syntax_error_writes_nothing_and_reports_once() -> TestResult {
    common::init_tracing();

    let fs = theme_fs();
    fs.add_file("./sass/editor.scss", "h1{ {{ }");
    let (sink, notifier) = recording_sink();

    let result = style_unit().run(&mock_ctx(&fs), &sink).await;

    let err = result.expect_err("broken stylesheet must fail the unit");
    assert_eq!(err.unit(), STYLES);
    assert_eq!(fs.mutation_count(), 0, "no output may be written");
    assert_eq!(sink.reported(), 1);

    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].source, STYLES);
    assert!(alerts[0].message.contains("sass/editor.scss"));
    Ok(())
}

#[tokio::test]
async fn fixed_stylesheet_builds_after_a_failure() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("./sass/style.scss", "body{ {{ }");
    let (sink, notifier) = recording_sink();
    let unit = style_unit();
    let ctx = mock_ctx(&fs);

    assert!(unit.run(&ctx, &sink).await.is_err());

    fs.add_file("./sass/style.scss", "body{margin:0}");
    let out = unit.run(&ctx, &sink).await?;

    assert_eq!(out.written.len(), 2);
    assert!(text(&fs, "./style.css").unwrap().starts_with("BODY{MARGIN:0}"));
    assert_eq!(notifier.count(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_input_set_succeeds_without_outputs() -> TestResult {
    let fs = MockFileSystem::new();
    let (sink, notifier) = recording_sink();

    let out = style_unit().run(&mock_ctx(&fs), &sink).await?;

    assert!(out.written.is_empty());
    assert_eq!(out.skipped, 0);
    assert_eq!(fs.mutation_count(), 0);
    assert_eq!(notifier.count(), 0);
    Ok(())
}

#[tokio::test]
async fn rebuilding_unchanged_inputs_is_byte_identical() -> TestResult {
    let fs = theme_fs();
    let (sink, _) = recording_sink();
    let unit = style_unit();
    let ctx = mock_ctx(&fs);

    unit.run(&ctx, &sink).await?;
    let first = (fs.contents("./style.css"), fs.contents("./style.css.map"));

    unit.run(&ctx, &sink).await?;
    let second = (fs.contents("./style.css"), fs.contents("./style.css.map"));

    assert!(first.0.is_some());
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn nested_stylesheets_keep_their_directory() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("./sass/blocks/card.scss", "a{b:c}");
    let (sink, _) = recording_sink();

    let out = style_unit().run(&mock_ctx(&fs), &sink).await?;

    assert_eq!(out.written[0], Path::new("./blocks/card.css"));
    Ok(())
}
