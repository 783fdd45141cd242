use serde::Deserialize;

/// Canonical name of a task unit or graph step.
pub type TaskName = String;

/// A glob field in the config: either a single pattern or an ordered list.
///
/// ```toml
/// sass_src = "./sass/**/*.scss"
/// fonts_sass_src = ["./fonts/css/typography.css", "./sass/variables-site/_typography.scss"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GlobList {
    One(String),
    Many(Vec<String>),
}

impl GlobList {
    /// Patterns in declaration order.
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            GlobList::One(p) => vec![p.as_str()],
            GlobList::Many(list) => list.iter().map(|s| s.as_str()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GlobList::One(p) => p.trim().is_empty(),
            GlobList::Many(list) => list.iter().all(|p| p.trim().is_empty()),
        }
    }
}

impl From<&str> for GlobList {
    fn from(s: &str) -> Self {
        GlobList::One(s.to_string())
    }
}

impl From<Vec<&str>> for GlobList {
    fn from(list: Vec<&str>) -> Self {
        GlobList::Many(list.into_iter().map(|s| s.to_string()).collect())
    }
}

/// How connected browsers should refresh after a binding completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStyle {
    /// Swap changed stylesheets in place without a page reload.
    Inject,
    /// Reload the whole page.
    Full,
}
