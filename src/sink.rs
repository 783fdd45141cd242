// src/sink.rs

//! Error sink: the single place build failures are surfaced to the operator.
//!
//! A report is logged, printed as a banner on stderr and passed to every
//! configured [`Notifier`]. Notifier failures are logged and swallowed: the
//! sink never panics and never ends the process.

use std::fmt::Debug;
use std::io::Write;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::config::NotifySection;

/// One failure, as handed to notifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Unit or step that failed.
    pub source: String,
    pub message: String,
}

impl Alert {
    pub fn title(&self) -> String {
        format!("wpwatch: {} failed", self.source)
    }
}

/// A channel through which the operator is alerted.
pub trait Notifier: Send + Sync + Debug {
    fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Prints a banner to stderr, optionally ringing the terminal bell.
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    bell: bool,
}

impl TerminalNotifier {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }

    fn banner(&self, alert: &Alert) -> String {
        let mut text = format!("\n❌  ===> ERROR: {}\n{}\n", alert.source, alert.message);
        if self.bell {
            text.push('\x07');
        }
        text
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, alert: &Alert) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(self.banner(alert).as_bytes())
            .context("writing error banner")?;
        stderr.flush().context("flushing stderr")?;
        Ok(())
    }
}

/// Desktop notification via `osascript` on macOS, `notify-send` elsewhere.
///
/// The helper is spawned on the current tokio runtime and reaped in the
/// background; `notify` never waits for it.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(alert: &Alert) -> Command {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\" sound name \"Basso\"",
                escape_applescript(&alert.message),
                escape_applescript(&alert.title()),
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--urgency=critical")
                .arg("--app-name=wpwatch")
                .arg(alert.title())
                .arg(&alert.message);
            cmd
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, alert: &Alert) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("desktop notifications need a running tokio runtime")?;
        let _guard = runtime.enter();
        let mut child = Self::command(alert)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("launching desktop notifier")?;

        runtime.spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!("desktop notification shown"),
                Ok(status) => warn!(%status, "desktop notifier exited unsuccessfully"),
                Err(err) => warn!(error = %err, "waiting for desktop notifier"),
            }
        });
        Ok(())
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Shared error sink. Clone it or wrap it in an `Arc`; clones report to the
/// same notifiers and share one counter.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    notifiers: Vec<Arc<dyn Notifier>>,
    reported: Arc<AtomicUsize>,
}

impl ErrorSink {
    /// A sink that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal banner plus whatever `[notify]` enables.
    pub fn from_config(cfg: &NotifySection) -> Self {
        let mut sink = Self::new().with_notifier(TerminalNotifier::new(cfg.bell));
        if cfg.desktop {
            sink = sink.with_notifier(DesktopNotifier);
        }
        sink
    }

    pub fn with_notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifiers.push(Arc::new(notifier));
        self
    }

    /// Surface one failure.
    pub fn report(&self, source: &str, message: &str) {
        self.reported.fetch_add(1, Ordering::SeqCst);
        error!(task = %source, error = %message, "task failed");

        let alert = Alert {
            source: source.to_string(),
            message: message.to_string(),
        };
        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify(&alert) {
                warn!(notifier = ?notifier, error = %err, "notifier failed");
            } else {
                debug!(notifier = ?notifier, "operator notified");
            }
        }
    }

    /// Number of failures reported through this sink (and its clones).
    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _alert: &Alert) -> Result<()> {
            bail!("no display")
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Collect(Arc<Mutex<Vec<Alert>>>);

    impl Notifier for Collect {
        fn notify(&self, alert: &Alert) -> Result<()> {
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    #[test]
    fn banner_contains_source_and_bell() {
        let alert = Alert {
            source: "styles".into(),
            message: "Undefined variable".into(),
        };
        let text = TerminalNotifier::new(true).banner(&alert);
        assert!(text.contains("ERROR: styles"));
        assert!(text.contains("Undefined variable"));
        assert!(text.ends_with('\x07'));
        assert!(!TerminalNotifier::new(false).banner(&alert).contains('\x07'));
    }

    #[test]
    fn desktop_notifier_outside_a_runtime_errors_instead_of_blocking() {
        let alert = Alert {
            source: "styles".into(),
            message: "boom".into(),
        };
        let err = DesktopNotifier.notify(&alert).unwrap_err();
        assert!(format!("{err:#}").contains("tokio runtime"));
    }

    #[test]
    fn desktop_command_picks_the_platform_helper() {
        let alert = Alert {
            source: "scripts".into(),
            message: "say \"hi\"".into(),
        };
        let cmd = DesktopNotifier::command(&alert);
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        if cfg!(target_os = "macos") {
            assert_eq!(program, "osascript");
        } else {
            assert_eq!(program, "notify-send");
        }
    }

    #[test]
    fn failing_notifier_does_not_stop_others() {
        let seen = Collect::default();
        let sink = ErrorSink::new()
            .with_notifier(Broken)
            .with_notifier(seen.clone());

        sink.report("scripts", "boom");
        sink.clone().report("scripts", "again");

        assert_eq!(sink.reported(), 2);
        assert_eq!(seen.0.lock().unwrap().len(), 2);
    }
}
