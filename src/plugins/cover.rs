//! # Cover Processor
//!
//! Downloads cover art for the current track and points `image_path` at the
//! local copy. The image URL comes from the `url` template when configured,
//! otherwise from `extra.image_url` (set by the `json` source).
//!
//! ```toml
//! [processors.cover]
//! url = "https://covers.example/{artist}/{title}.jpg"  # optional
//! cache_dir = "~/.cache/nowplaying/covers"             # default: <data dir>/covers
//! ```
//!
//! Files are named after a hash of the URL, so each cover is fetched once.
//! Tracks without an applicable URL pass through unchanged.

use anyhow::{Context as _, Result};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::config;
use crate::plugin::{Context, PluginOptions, Processor};
use crate::template::render;
use crate::track::Track;

pub const NAME: &str = "cover";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Options {
    url: Option<String>,
    cache_dir: Option<String>,
}

pub struct CoverProcessor {
    url: Option<String>,
    cache_dir: PathBuf,
    priority: i32,
}

pub fn build(options: &PluginOptions) -> Result<Arc<dyn Processor>> {
    let parsed: Options = options.parse()?;
    let cache_dir = match &parsed.cache_dir {
        Some(dir) => options.resolve_path(dir)?,
        None => config::get_data_dir()?.join("covers"),
    };

    Ok(Arc::new(CoverProcessor {
        url: parsed.url,
        cache_dir,
        priority: options.priority()?,
    }))
}

impl CoverProcessor {
    fn image_url(&self, track: &Track) -> Option<String> {
        let url = match &self.url {
            Some(template) => render(template, track),
            None => track.extra_str("image_url")?,
        };
        let url = url.trim();
        (!url.is_empty()).then(|| url.to_string())
    }

    fn store(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).with_context(|| {
            format!("Failed to create cover cache at {}", self.cache_dir.display())
        })?;

        let mut file = NamedTempFile::new_in(&self.cache_dir)?;
        file.write_all(bytes)?;
        file.persist(path)
            .with_context(|| format!("Failed to save cover to {}", path.display()))?;
        Ok(())
    }
}

impl Processor for CoverProcessor {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn apply(&self, ctx: &Context, track: &Track) -> Result<Option<Track>> {
        let Some(url) = self.image_url(track) else {
            return Ok(None);
        };

        let path = self.cache_dir.join(cache_file_name(&url));
        if path.exists() {
            debug!("Cover cache hit for {url}");
        } else {
            let bytes = ctx.downloader().fetch(url.as_str(), &[("Accept", "image/*")])?;
            self.store(&path, &bytes)?;
            debug!("Saved cover {url} to {}", path.display());
        }

        Ok(Some(
            track.clone().with_image_path(path.to_string_lossy().into_owned()),
        ))
    }
}

/// 64-bit FNV-1a. Names cache files, so the output must never change.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

/// Stable file name for `url`, keeping a short alphanumeric extension.
pub fn cache_file_name(url: &str) -> String {

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "img".to_string());

    format!("{:016x}.{extension}", fnv1a(url.as_bytes()))
}
