#![allow(dead_code)]

use wpwatch::config::{ConfigFile, RawConfigFile};
use wpwatch::errors::Result;
use wpwatch::types::GlobList;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the stock defaults with the terminal bell switched off.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.notify.bell = false;
        Self { config }
    }

    pub fn project_url(mut self, url: &str) -> Self {
        self.config.project_url = Some(url.to_string());
        self
    }

    pub fn sass(mut self, src: impl Into<GlobList>, dest: &str) -> Self {
        self.config.paths.sass_src = src.into();
        self.config.paths.sass_dest = dest.to_string();
        self
    }

    pub fn scripts(mut self, src: impl Into<GlobList>, dest: &str) -> Self {
        self.config.paths.js_src = src.into();
        self.config.paths.js_dest = dest.to_string();
        self
    }

    pub fn vendor_scripts(mut self, src: impl Into<GlobList>, dest: &str) -> Self {
        self.config.paths.js_vendor_src = src.into();
        self.config.paths.js_vendor_dest = dest.to_string();
        self
    }

    pub fn php(mut self, src: impl Into<GlobList>) -> Self {
        self.config.paths.php_src = src.into();
        self
    }

    pub fn fonts_src(mut self, src: impl Into<GlobList>) -> Self {
        self.config.paths.fonts_src = src.into();
        self
    }

    pub fn fonts_sass_src(mut self, files: &[&str]) -> Self {
        self.config.paths.fonts_sass_src = files.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn inject_changes(mut self, yes: bool) -> Self {
        self.config.server.inject_changes = yes;
        self
    }

    pub fn tool(mut self, name: &str, template: &str) -> Self {
        let slot = match name {
            "sass" => &mut self.config.tools.sass,
            "postcss" => &mut self.config.tools.postcss,
            "bundle" => &mut self.config.tools.bundle,
            "unzip" => &mut self.config.tools.unzip,
            "untar" => &mut self.config.tools.untar,
            other => panic!("unknown tool '{other}'"),
        };
        *slot = template.to_string();
        self
    }

    pub fn delete(mut self, files: &[&str]) -> Self {
        self.config.housekeeping.delete = files.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn folders(mut self, folders: &[&str]) -> Self {
        self.config.housekeeping.folders = folders.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
