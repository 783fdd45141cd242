#![allow(dead_code)]

pub use wpwatch_test_utils::builders;
pub use wpwatch_test_utils::{init_tracing, with_timeout};

use std::path::Path;
use std::sync::Arc;

use wpwatch::fs::mock::MockFileSystem;
use wpwatch::sink::ErrorSink;
use wpwatch::units::BuildContext;
use wpwatch_test_utils::RecordingNotifier;

/// Build context over an in-memory filesystem rooted at ".".
///
/// Seed files with the "./" prefix, e.g. `fs.add_file("./sass/style.scss", ..)`.
pub fn mock_ctx(fs: &MockFileSystem) -> BuildContext {
    BuildContext::new(Arc::new(fs.clone()), ".")
}

/// Error sink plus the notifier that observes it.
pub fn recording_sink() -> (ErrorSink, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let sink = ErrorSink::new().with_notifier(notifier.clone());
    (sink, notifier)
}

pub fn text(fs: &MockFileSystem, path: impl AsRef<Path>) -> Option<String> {
    fs.contents(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
