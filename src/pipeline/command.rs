// src/pipeline/command.rs

//! Stage backed by an external command-line tool.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Asset, BoxFuture, Stage, StageError, StageResult};

/// Runs a shell command template over the asset.
///
/// The current contents are written to a scratch `{input}` file (plus
/// `{input}.map` when a map is available); the tool writes `{output}` and
/// optionally `{output}.map`; a map from an earlier stage is dropped when the
/// tool writes none, since it no longer describes the output. Templates that name neither `{input}` nor
/// `{source}` get the contents on stdin; templates without `{output}` are
/// read from stdout. A non-zero exit fails the stage with the tool's stderr.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    template: String,
}

impl CommandStage {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn fail(&self, message: impl Into<String>) -> StageError {
        StageError::new(self.name.clone(), message)
    }

    async fn run(&self, mut asset: Asset) -> StageResult {
        let scratch = tempfile::tempdir()
            .map_err(|e| self.fail(format!("creating scratch dir: {e}")))?;

        let ext = match asset.rel.rsplit('/').next().and_then(|f| f.rfind('.').map(|i| &f[i..])) {
            Some(ext) => ext.to_string(),
            None => String::new(),
        };
        let input = scratch.path().join(format!("input{ext}"));
        let output = scratch.path().join(format!("output{ext}"));

        tokio::fs::write(&input, &asset.contents)
            .await
            .map_err(|e| self.fail(format!("writing scratch input: {e}")))?;
        if let Some(map) = &asset.source_map {
            tokio::fs::write(map_path(&input), map)
                .await
                .map_err(|e| self.fail(format!("writing scratch map: {e}")))?;
        }

        let reads_file = self.template.contains("{input}") || self.template.contains("{source}");
        let writes_file = self.template.contains("{output}");

        let source_dir = asset
            .source
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        let command_line = render_template(
            &self.template,
            &[
                ("source_dir", source_dir.as_path()),
                ("source", asset.source.as_path()),
                ("input", input.as_path()),
                ("output", output.as_path()),
            ],
        );

        debug!(stage = %self.name, cmd = %command_line, asset = %asset.rel, "running tool");

        let mut cmd = shell_command(&command_line);
        cmd.stdin(if reads_file { Stdio::null() } else { Stdio::piped() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| self.fail(format!("spawning `{command_line}`: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            let data = asset.contents.clone();
            let stage = self.name.clone();
            // Feed stdin concurrently so a chatty tool cannot deadlock on a full pipe.
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&data).await {
                    warn!(stage = %stage, error = %e, "failed to write tool stdin");
                }
            });
        }

        let out = child
            .wait_with_output()
            .await
            .map_err(|e| self.fail(format!("waiting for `{command_line}`: {e}")))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
            let detail = if !stderr.is_empty() {
                stderr
            } else if !stdout.is_empty() {
                stdout
            } else {
                format!("exited with code {}", out.status.code().unwrap_or(-1))
            };
            return Err(self.fail(detail));
        }

        if writes_file {
            asset.contents = tokio::fs::read(&output)
                .await
                .map_err(|e| self.fail(format!("tool produced no output file: {e}")))?;
            asset.source_map = tokio::fs::read(map_path(&output)).await.ok();
        } else {
            asset.contents = out.stdout;
            asset.source_map = None;
        }

        Ok(asset)
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, asset: Asset) -> BoxFuture<'_, StageResult> {
        Box::pin(self.run(asset))
    }
}

fn map_path(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".map");
    os.into()
}

/// Substitute `{name}` placeholders with shell-quoted paths.
pub fn render_template(template: &str, values: &[(&str, &Path)]) -> String {
    let mut rendered = template.to_string();
    for (name, path) in values {
        rendered = rendered.replace(&format!("{{{name}}}"), &shell_quote(path));
    }
    rendered
}

fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if cfg!(windows) {
        format!("\"{}\"", raw.replace('"', "\\\""))
    } else {
        format!("'{}'", raw.replace('\'', r"'\''"))
    }
}

/// Build a shell command appropriate for the platform.
pub fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_quoted() {
        let line = render_template(
            "sass {source} {output}",
            &[
                ("source", Path::new("/theme/sass/it's.scss")),
                ("output", Path::new("/tmp/out.css")),
            ],
        );
        if !cfg!(windows) {
            assert_eq!(line, r"sass '/theme/sass/it'\''s.scss' '/tmp/out.css'");
        }
    }

    fn mapped_asset() -> Asset {
        Asset {
            source: "/theme/sass/style.scss".into(),
            source_rel: "sass/style.scss".to_string(),
            rel: "style.css".to_string(),
            contents: b"body{margin:0}".to_vec(),
            source_map: Some(br#"{"version":3,"sources":["style.scss"]}"#.to_vec()),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_without_map_drops_the_previous_map() {
        let stage = CommandStage::new("postcss", "cp {input} {output}");
        let out = stage.apply(mapped_asset()).await.unwrap();
        assert_eq!(out.contents, b"body{margin:0}");
        assert_eq!(out.source_map, None);

        let stage = CommandStage::new("minify", "cat");
        let out = stage.apply(mapped_asset()).await.unwrap();
        assert_eq!(out.source_map, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_map_replaces_the_previous_map() {
        let stage = CommandStage::new(
            "postcss",
            "cp {input} {output} && echo '{\"version\":3}' > {output}.map",
        );
        let out = stage.apply(mapped_asset()).await.unwrap();
        assert_eq!(out.source_map.as_deref(), Some(&b"{\"version\":3}\n"[..]));
    }
}
