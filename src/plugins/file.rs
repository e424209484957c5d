//! # File Sink
//!
//! Writes the rendered track to a file, for status bars and streaming
//! overlays that watch a text file:
//!
//! ```toml
//! [[outputs]]
//! type = "file"
//! path = "~/.cache/nowplaying.txt"
//! template = "{artist} - {title}"     # or template_file = "np.tmpl"
//! empty_template = ""                 # written when nothing plays
//! ```
//!
//! Files are replaced atomically so readers never see a half-written line.

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::plugin::{Context, PluginOptions, Sink};
use crate::template::render;
use crate::track::Track;

pub const NAME: &str = "file";

pub const DEFAULT_TEMPLATE: &str = "{artist} - {title}";

#[derive(Debug, Deserialize)]
struct Options {
    path: String,
    template: Option<String>,
    template_file: Option<String>,
    #[serde(default)]
    empty_template: String,
}

pub struct FileSink {
    path: PathBuf,
    template: String,
    empty_template: String,
    priority: i32,
}

pub fn build(options: &PluginOptions) -> Result<Arc<dyn Sink>> {
    let parsed: Options = options.parse()?;

    let template = match (parsed.template, parsed.template_file) {
        (Some(_), Some(_)) => anyhow::bail!("set either template or template_file, not both"),
        (Some(template), None) => template,
        (None, Some(file)) => {
            let file = options.resolve_path(&file)?;
            fs::read_to_string(&file)
                .with_context(|| format!("Failed to read template {}", file.display()))?
        }
        (None, None) => DEFAULT_TEMPLATE.to_string(),
    };

    Ok(Arc::new(FileSink {
        path: options.resolve_path(&parsed.path)?,
        template,
        empty_template: parsed.empty_template,
        priority: options.priority()?,
    }))
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn deliver(&self, _ctx: &Context, track: Option<&Track>) -> Result<()> {
        let text = match track {
            Some(track) => render(&self.template, track),
            None => self.empty_template.clone(),
        };
        write_atomic(&self.path, text.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Replace `path` with `contents` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.persist(path)?;
    Ok(())
}
