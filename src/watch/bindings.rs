// src/watch/bindings.rs

//! Which globs trigger which units, and how browsers refresh afterwards.

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::types::{GlobList, ReloadStyle, TaskName};
use crate::units::sources::SourceSet;
use crate::units::{SCRIPTS, STYLES, VENDOR_SCRIPTS};

/// One watched glob list and the units it re-runs.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    name: String,
    sources: SourceSet,
    units: Vec<TaskName>,
    reload: ReloadStyle,
}

impl WatchBinding {
    pub fn new(
        name: impl Into<String>,
        globs: &GlobList,
        units: Vec<TaskName>,
        reload: ReloadStyle,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            sources: SourceSet::new(globs)?,
            units,
            reload,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units to run, in order. Empty for reload-only bindings.
    pub fn units(&self) -> &[TaskName] {
        &self.units
    }

    pub fn reload(&self) -> ReloadStyle {
        self.reload
    }

    pub fn patterns(&self) -> Vec<&str> {
        self.sources.patterns()
    }

    /// `rel_path` is relative to the project root, forward slashes.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.sources.matches(rel_path)
    }
}

/// The bindings of a watch session.
///
/// Stylesheets inject (unless `[server].inject_changes` is off); scripts,
/// templates and images reload the page. Templates and images run no unit.
pub fn build_bindings(cfg: &ConfigFile) -> Result<Vec<WatchBinding>> {
    let paths = cfg.paths();
    let style_reload = if cfg.server().inject_changes {
        ReloadStyle::Inject
    } else {
        ReloadStyle::Full
    };

    Ok(vec![
        WatchBinding::new(STYLES, &paths.sass_src, vec![STYLES.to_string()], style_reload)?,
        WatchBinding::new(SCRIPTS, &paths.js_src, vec![SCRIPTS.to_string()], ReloadStyle::Full)?,
        WatchBinding::new(
            VENDOR_SCRIPTS,
            &paths.js_vendor_src,
            vec![VENDOR_SCRIPTS.to_string()],
            ReloadStyle::Full,
        )?,
        WatchBinding::new("php", &paths.php_src, Vec::new(), ReloadStyle::Full)?,
        WatchBinding::new("images", &paths.imgs_src, Vec::new(), ReloadStyle::Full)?,
    ])
}

/// Names of the bindings matching `rel_path`, in binding order.
pub fn matching<'a>(bindings: &'a [WatchBinding], rel_path: &str) -> Vec<&'a str> {
    bindings
        .iter()
        .filter(|b| b.matches(rel_path))
        .map(|b| b.name())
        .collect()
}
