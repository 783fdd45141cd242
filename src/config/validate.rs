// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WpwatchError};
use crate::reload::Upstream;
use crate::types::GlobList;
use crate::units::sources::compile_glob;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WpwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_globs(cfg)?;
    validate_destinations(cfg)?;
    validate_server(cfg)?;
    validate_housekeeping(cfg)?;
    Ok(())
}

fn validate_globs(cfg: &RawConfigFile) -> Result<()> {
    let p = &cfg.paths;
    let fields: [(&str, &GlobList); 8] = [
        ("sass_src", &p.sass_src),
        ("js_src", &p.js_src),
        ("js_vendor_src", &p.js_vendor_src),
        ("php_src", &p.php_src),
        ("imgs_src", &p.imgs_src),
        ("fonts_src", &p.fonts_src),
        ("fonts_include", &p.fonts_include),
        ("fonts_css_include", &p.fonts_css_include),
    ];

    for (field, globs) in fields {
        if globs.is_empty() {
            return Err(WpwatchError::ConfigError(format!(
                "[paths].{field} must contain at least one pattern"
            )));
        }
        for pattern in globs.patterns() {
            compile_glob(pattern)?;
        }
    }

    Ok(())
}

fn validate_destinations(cfg: &RawConfigFile) -> Result<()> {
    let p = &cfg.paths;
    let fields = [
        ("sass_dest", &p.sass_dest),
        ("js_dest", &p.js_dest),
        ("js_vendor_dest", &p.js_vendor_dest),
        ("fonts_dest", &p.fonts_dest),
        ("fonts_css_dest", &p.fonts_css_dest),
        ("fonts_css_filename", &p.fonts_css_filename),
        ("fonts_sass_dest", &p.fonts_sass_dest),
        ("fonts_sass_filename", &p.fonts_sass_filename),
    ];

    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(WpwatchError::ConfigError(format!(
                "[paths].{field} must not be empty (use \"./\" for the project root)"
            )));
        }
    }

    if p.fonts_sass_src.is_empty() {
        return Err(WpwatchError::ConfigError(
            "[paths].fonts_sass_src must list at least one file".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(WpwatchError::ConfigError(
            "[server].port must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(url) = cfg.project_url.as_deref() {
        Upstream::parse(url).map_err(|e| {
            WpwatchError::ConfigError(format!("project_url {url:?} is not usable: {e}"))
        })?;
    }

    Ok(())
}

fn validate_housekeeping(cfg: &RawConfigFile) -> Result<()> {
    for folder in cfg.housekeeping.folders.iter() {
        if folder.trim().is_empty() {
            return Err(WpwatchError::ConfigError(
                "[housekeeping].folders entries must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}
