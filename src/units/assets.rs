// src/units/assets.rs

//! The three asset units the watch loop rebuilds: styles, scripts and
//! vendor scripts.

use std::collections::BTreeMap;

use crate::config::{ConfigFile, ToolsSection};
use crate::errors::{Result, WpwatchError};
use crate::pipeline::{CommandStage, CommentStyle, Pipeline, Rename, SourceMapLink};
use crate::types::GlobList;
use crate::units::sources::SourceSet;
use crate::units::TaskUnit;

pub const STYLES: &str = "styles";
pub const SCRIPTS: &str = "scripts";
pub const VENDOR_SCRIPTS: &str = "vendor-scripts";

/// sass → postcss → `.css` → source map. Partials are never compiled on
/// their own, and every run rebuilds every stylesheet (a partial change can
/// affect any of them).
pub fn style_unit(cfg: &ConfigFile) -> Result<TaskUnit> {
    let paths = cfg.paths();
    let tools = cfg.tools();

    let pipeline = Pipeline::new()
        .then(CommandStage::new("sass", tools.sass.clone()))
        .then(CommandStage::new("postcss", tools.postcss.clone()))
        .then(Rename::extension("css"))
        .then(SourceMapLink::new(CommentStyle::Css));

    Ok(TaskUnit::new(
        STYLES,
        SourceSet::new(&paths.sass_src)?,
        paths.sass_dest.clone(),
        pipeline,
    )
    .skip_partials(true))
}

/// bundle → `.min` suffix → source map, skipping sources whose minified
/// output is already newer.
pub fn script_unit(name: &str, src: &GlobList, dest: &str, tools: &ToolsSection) -> Result<TaskUnit> {
    let pipeline = Pipeline::new()
        .then(CommandStage::new("bundle", tools.bundle.clone()))
        .then(Rename::suffix(".min"))
        .then(SourceMapLink::new(CommentStyle::Js));

    Ok(TaskUnit::new(name, SourceSet::new(src)?, dest, pipeline).skip_if_newer(true))
}

/// Registry of asset units, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AssetUnits {
    units: BTreeMap<String, TaskUnit>,
}

impl AssetUnits {
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let paths = cfg.paths();
        let tools = cfg.tools();

        Ok(Self::default()
            .with(style_unit(cfg)?)
            .with(script_unit(SCRIPTS, &paths.js_src, &paths.js_dest, tools)?)
            .with(script_unit(
                VENDOR_SCRIPTS,
                &paths.js_vendor_src,
                &paths.js_vendor_dest,
                tools,
            )?))
    }

    /// Add or replace a unit under its own name.
    pub fn with(mut self, unit: TaskUnit) -> Self {
        self.units.insert(unit.name().to_string(), unit);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TaskUnit> {
        self.units.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&TaskUnit> {
        self.get(name)
            .ok_or_else(|| WpwatchError::UnknownTask(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfigFile;

    fn config() -> ConfigFile {
        ConfigFile::try_from(RawConfigFile::default()).unwrap()
    }

    #[test]
    fn registry_holds_three_units() {
        let units = AssetUnits::from_config(&config()).unwrap();
        let names: Vec<_> = units.names().collect();
        assert_eq!(names, vec![SCRIPTS, STYLES, VENDOR_SCRIPTS]);
        assert!(units.require("images").is_err());
    }

    #[test]
    fn output_names_follow_pipeline() {
        let units = AssetUnits::from_config(&config()).unwrap();

        let styles = units.require(STYLES).unwrap();
        assert_eq!(styles.pipeline().output_rel("blocks/card.scss"), "blocks/card.css");
        assert_eq!(
            styles.pipeline().stage_names(),
            vec!["sass", "postcss", "rename", "sourcemap"]
        );

        let scripts = units.require(SCRIPTS).unwrap();
        assert_eq!(scripts.pipeline().output_rel("navigation.js"), "navigation.min.js");
        assert_eq!(scripts.dest(), "./js/min/");
        assert!(scripts.sources().matches("js/navigation.js"));
        assert!(!scripts.sources().matches("js/vendor/lib.js"));

        let vendor = units.require(VENDOR_SCRIPTS).unwrap();
        assert!(vendor.sources().matches("js/vendor/slick/slick.js"));
        assert_eq!(vendor.dest(), "./js/min/");
    }
}
