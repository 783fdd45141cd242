// tests/config_errors.rs
mod common;

use std::error::Error;
use std::io::Write;

use wpwatch::config::{load_and_validate, ConfigFile, RawConfigFile};
use wpwatch::errors::WpwatchError;
use wpwatch::types::GlobList;
use wpwatch_test_utils::ConfigBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn empty_file_yields_theme_defaults() -> TestResult {
    let file = write_config("")?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.paths().sass_src, GlobList::from("./sass/**/*.scss"));
    assert_eq!(cfg.paths().js_dest, "./js/min/");
    assert_eq!(cfg.server().port, 3000);
    assert!(cfg.server().inject_changes);
    assert!(cfg.project_url().is_none());
    assert_eq!(cfg.housekeeping().folders, vec!["imgs", "fonts", "js/vendor"]);
    Ok(())
}

#[test]
fn lists_and_single_patterns_both_load() -> TestResult {
    let file = write_config(
        r#"
project_url = "http://mytheme.local:8080"

[paths]
sass_src = ["./sass/style.scss", "./sass/editor.scss"]
js_src = "./src/js/*.js"

[server]
port = 4000
inject_changes = false

[notify]
bell = false
"#,
    )?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.paths().sass_src.patterns(), vec!["./sass/style.scss", "./sass/editor.scss"]);
    assert_eq!(cfg.paths().js_src.patterns(), vec!["./src/js/*.js"]);
    assert_eq!(cfg.server().port, 4000);
    assert!(!cfg.server().inject_changes);
    assert!(!cfg.notify().bell);
    assert_eq!(cfg.project_url(), Some("http://mytheme.local:8080"));
    Ok(())
}

#[test]
fn port_zero_is_rejected() {
    let err = ConfigBuilder::new().port(0).try_build().unwrap_err();
    assert!(matches!(err, WpwatchError::ConfigError(ref msg) if msg.contains("port")));
}

#[test]
fn invalid_glob_is_rejected() {
    let err = ConfigBuilder::new()
        .sass("./sass/[style.scss", "./")
        .try_build()
        .unwrap_err();
    assert!(matches!(err, WpwatchError::InvalidGlob { ref pattern, .. } if pattern == "./sass/[style.scss"));
}

#[test]
fn https_project_url_is_rejected() {
    let err = ConfigBuilder::new()
        .project_url("https://mytheme.local")
        .try_build()
        .unwrap_err();
    assert!(matches!(err, WpwatchError::ConfigError(ref msg) if msg.contains("project_url")));
}

#[test]
fn empty_destination_is_rejected() {
    let err = ConfigBuilder::new()
        .scripts("./js/*.js", "  ")
        .try_build()
        .unwrap_err();
    assert!(matches!(err, WpwatchError::ConfigError(ref msg) if msg.contains("js_dest")));
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let file = write_config("[server\nport = 3000")?;
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, WpwatchError::TomlError(_)));
    Ok(())
}

#[test]
fn wrong_type_is_a_toml_error() -> TestResult {
    let file = write_config("[server]\nport = \"three thousand\"")?;
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, WpwatchError::TomlError(_)));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/wpwatch.toml").unwrap_err();
    assert!(matches!(err, WpwatchError::IoError(_)));
}

#[test]
fn raw_default_validates() {
    assert!(ConfigFile::try_from(RawConfigFile::default()).is_ok());
}
