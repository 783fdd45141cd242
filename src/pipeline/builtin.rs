// src/pipeline/builtin.rs

//! Pure, in-process stages.

use std::sync::LazyLock;

use regex::bytes::Regex;
use serde_json::{json, Value};

use super::{Asset, BoxFuture, Stage, StageError, StageResult};

/// Renames the output: swaps the extension and/or adds a suffix before it.
///
/// `Rename::extension("css")` turns `style.scss` into `style.css`;
/// `Rename::suffix(".min")` turns `app.js` into `app.min.js`.
#[derive(Debug, Clone, Default)]
pub struct Rename {
    extension: Option<String>,
    suffix: Option<String>,
}

impl Rename {
    pub fn extension(ext: impl Into<String>) -> Self {
        Self {
            extension: Some(ext.into()),
            suffix: None,
        }
    }

    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self {
            extension: None,
            suffix: Some(suffix.into()),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }
}

impl Stage for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn rename(&self, rel: &str) -> String {
        let (dir, file) = match rel.rfind('/') {
            Some(idx) => (&rel[..=idx], &rel[idx + 1..]),
            None => ("", rel),
        };
        let (stem, ext) = match file.rfind('.') {
            Some(idx) if idx > 0 => (&file[..idx], Some(&file[idx + 1..])),
            _ => (file, None),
        };

        let mut name = String::from(dir);
        name.push_str(stem);
        if let Some(suffix) = &self.suffix {
            name.push_str(suffix);
        }
        if let Some(ext) = self.extension.as_deref().or(ext) {
            name.push('.');
            name.push_str(ext);
        }
        name
    }

    fn apply(&self, mut asset: Asset) -> BoxFuture<'_, StageResult> {
        asset.rel = Stage::rename(self, &asset.rel);
        Box::pin(async move { Ok(asset) })
    }
}

/// Annotation syntax for the `sourceMappingURL` comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/*# sourceMappingURL=... */`
    Css,
    /// `//# sourceMappingURL=...`
    Js,
}

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:/\*[#@] sourceMappingURL=[^*]*\*/|//[#@] sourceMappingURL=\S*)[ \t]*\r?\n?")
        .expect("sourceMappingURL pattern is valid")
});

/// Final stage: points the output at its sibling `.map` file.
///
/// Removes annotations left by earlier tools, rewrites the map's `file`
/// field to the final output name and appends a single annotation. When no
/// earlier stage produced a map, a minimal one naming the original source is
/// emitted so every output ships with its map.
#[derive(Debug, Clone)]
pub struct SourceMapLink {
    style: CommentStyle,
}

impl SourceMapLink {
    pub fn new(style: CommentStyle) -> Self {
        Self { style }
    }

    fn link(&self, mut asset: Asset) -> StageResult {
        let file_name = asset.file_name().to_string();

        let map = match asset.source_map.take() {
            Some(raw) => {
                let mut value: Value = serde_json::from_slice(&raw).map_err(|e| {
                    StageError::new("sourcemap", format!("unreadable source map: {e}"))
                })?;
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("file".to_string(), Value::String(file_name.clone()));
                }
                value
            }
            None => json!({
                "version": 3,
                "file": file_name,
                "sources": [asset.source_rel],
                "names": [],
                "mappings": "",
            }),
        };

        let mut contents = ANNOTATION.replace_all(&asset.contents, &b""[..]).into_owned();
        while contents.last().is_some_and(|b| b.is_ascii_whitespace()) {
            contents.pop();
        }
        let annotation = match self.style {
            CommentStyle::Css => format!("\n/*# sourceMappingURL={file_name}.map */\n"),
            CommentStyle::Js => format!("\n//# sourceMappingURL={file_name}.map\n"),
        };
        contents.extend_from_slice(annotation.as_bytes());

        asset.contents = contents;
        asset.source_map = Some(
            serde_json::to_vec(&map)
                .map_err(|e| StageError::new("sourcemap", format!("encoding source map: {e}")))?,
        );
        Ok(asset)
    }
}

impl Stage for SourceMapLink {
    fn name(&self) -> &str {
        "sourcemap"
    }

    fn apply(&self, asset: Asset) -> BoxFuture<'_, StageResult> {
        let linked = self.link(asset);
        Box::pin(async move { linked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn asset(rel: &str, contents: &str) -> Asset {
        Asset {
            source: PathBuf::from("sass/style.scss"),
            source_rel: "sass/style.scss".to_string(),
            rel: rel.to_string(),
            contents: contents.as_bytes().to_vec(),
            source_map: None,
        }
    }

    #[test]
    fn rename_swaps_extension_and_adds_suffix() {
        assert_eq!(Stage::rename(&Rename::extension("css"), "blocks/card.scss"), "blocks/card.css");
        assert_eq!(Stage::rename(&Rename::suffix(".min"), "app.js"), "app.min.js");
        assert_eq!(
            Stage::rename(&Rename::extension("js").with_suffix(".min"), "lib/x.mjs"),
            "lib/x.min.js"
        );
        assert_eq!(Stage::rename(&Rename::suffix(".min"), "LICENSE"), "LICENSE.min");
    }

    #[test]
    fn link_replaces_existing_annotation_and_sets_map_file() {
        let mut input = asset("style.css", "a{b:c}\n/*# sourceMappingURL=output.css.map */\n");
        input.source_map = Some(br#"{"version":3,"file":"output.css","sources":["x"],"mappings":"AAAA"}"#.to_vec());

        let out = SourceMapLink::new(CommentStyle::Css).link(input).unwrap();
        let text = String::from_utf8(out.contents).unwrap();
        assert_eq!(text, "a{b:c}\n/*# sourceMappingURL=style.css.map */\n");

        let map: Value = serde_json::from_slice(&out.source_map.unwrap()).unwrap();
        assert_eq!(map["file"], "style.css");
        assert_eq!(map["mappings"], "AAAA");
    }

    #[test]
    fn link_synthesizes_map_when_missing() {
        let out = SourceMapLink::new(CommentStyle::Js)
            .link(asset("app.min.js", "(()=>{})();"))
            .unwrap();
        assert!(String::from_utf8(out.contents).unwrap().ends_with("//# sourceMappingURL=app.min.js.map\n"));
        let map: Value = serde_json::from_slice(&out.source_map.unwrap()).unwrap();
        assert_eq!(map["sources"][0], "sass/style.scss");
    }

    #[test]
    fn invalid_map_is_a_stage_error() {
        let mut input = asset("style.css", "a{}");
        input.source_map = Some(b"not json".to_vec());
        let err = SourceMapLink::new(CommentStyle::Css).link(input).unwrap_err();
        assert_eq!(err.stage, "sourcemap");
    }
}
