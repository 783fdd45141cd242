//! In-memory stand-ins for the external collaborators: tools, archives and
//! notification channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wpwatch::pipeline::{Asset, BoxFuture, Stage, StageError, StageResult};
use wpwatch::sink::{Alert, Notifier};
use wpwatch::units::fonts::{ArchiveEntry, Extractor};

type Transform = dyn Fn(Asset) -> StageResult + Send + Sync;

/// A stage backed by a closure, with an optional output extension.
pub struct FnStage {
    name: String,
    extension: Option<String>,
    f: Arc<Transform>,
}

impl FnStage {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(Asset) -> StageResult + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            extension: None,
            f: Arc::new(f),
        }
    }

    /// Uppercase the contents; a stand-in for a compiler.
    pub fn uppercase(name: &str) -> Self {
        Self::new(name, |mut asset| {
            asset.contents = asset.contents.to_ascii_uppercase();
            Ok(asset)
        })
    }

    /// Fail whenever the contents contain `marker`.
    pub fn reject_containing(name: &str, marker: &str) -> Self {
        let stage = name.to_string();
        let marker = marker.as_bytes().to_vec();
        Self::new(name, move |asset| {
            if asset
                .contents
                .windows(marker.len())
                .any(|w| w == marker.as_slice())
            {
                Err(StageError::new(
                    stage.clone(),
                    format!("{}: syntax error", asset.source_rel),
                ))
            } else {
                Ok(asset)
            }
        })
    }

    /// Rewrite the output extension, e.g. `scss` → `css`.
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.extension = Some(ext.to_string());
        self
    }

    fn renamed(&self, rel: &str) -> String {
        match &self.extension {
            Some(ext) => match rel.rsplit_once('.') {
                Some((stem, _)) => format!("{stem}.{ext}"),
                None => format!("{rel}.{ext}"),
            },
            None => rel.to_string(),
        }
    }
}

impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename(&self, rel: &str) -> String {
        self.renamed(rel)
    }

    fn apply(&self, asset: Asset) -> BoxFuture<'_, StageResult> {
        let mut result = (self.f)(asset);
        if let Ok(asset) = &mut result {
            asset.rel = self.renamed(&asset.rel);
        }
        Box::pin(async move { result })
    }
}

/// A stage that always fails with `message`.
pub struct FailingStage {
    name: String,
    message: String,
}

impl FailingStage {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, _asset: Asset) -> BoxFuture<'_, StageResult> {
        let err = StageError::new(self.name.clone(), self.message.clone());
        Box::pin(async move { Err(err) })
    }
}

/// Records every alert it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: &Alert) -> anyhow::Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Serves canned entries per archive file name.
#[derive(Debug, Clone, Default)]
pub struct FakeExtractor {
    archives: HashMap<String, Vec<ArchiveEntry>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive(mut self, name: &str, entries: &[(&str, &str)]) -> Self {
        let entries = entries
            .iter()
            .map(|(path, contents)| ArchiveEntry {
                path: path.to_string(),
                contents: contents.as_bytes().to_vec(),
            })
            .collect();
        self.archives.insert(name.to_string(), entries);
        self
    }

    /// Archive names extracted so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Extractor for FakeExtractor {
    fn extract<'a>(
        &'a self,
        name: &'a str,
        _bytes: Vec<u8>,
    ) -> BoxFuture<'a, anyhow::Result<Vec<ArchiveEntry>>> {
        self.calls.lock().unwrap().push(name.to_string());
        let result = self
            .archives
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("corrupt archive '{name}'"));
        Box::pin(async move { result })
    }
}
