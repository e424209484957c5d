//! # Plugin Contracts
//!
//! Every piece of work the engine does is delegated to a plugin of one of
//! three categories:
//!
//! - [`Source`] - finds out what is playing (with an optional cached fallback)
//! - [`Processor`] - enriches a track, or declines to
//! - [`Sink`] - delivers a track, or its absence, to the outside world
//!
//! Plugins take `&self` and must be `Send + Sync` so the engine can be moved
//! onto a scheduler thread; plugins that remember things between cycles keep
//! that state behind a `Mutex`.
//!
//! Plugins are built from configuration by factories registered in a
//! [`PluginRegistry`](crate::registry::PluginRegistry). A factory receives the
//! entry's [`PluginOptions`] and usually deserializes them into its own typed
//! options struct.

use anyhow::{Context as _, Result};
use path_absolutize::Absolutize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::downloader::Downloader;
use crate::track::Track;

/// Priority used when a plugin does not say otherwise.
pub const DEFAULT_PRIORITY: i32 = 50;

/// The three plugin families, each with its own registry and chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Source,
    Processor,
    Sink,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Source => "source",
            Category::Processor => "processor",
            Category::Sink => "sink",
        })
    }
}

/// Shared capabilities handed to plugins on every call.
#[derive(Debug, Clone)]
pub struct Context {
    downloader: Downloader,
}

impl Context {
    pub fn new(downloader: Downloader) -> Self {
        Self { downloader }
    }

    /// The engine-wide HTTP downloader.
    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub(crate) fn set_downloader(&mut self, downloader: Downloader) {
        self.downloader = downloader;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Downloader::default())
    }
}

/// Produces candidate tracks.
pub trait Source: Send + Sync {
    /// Registered type name, used in logs and events.
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Ask the underlying player/service what is playing right now.
    fn grab_current(&self, ctx: &Context) -> Result<Option<Track>>;

    /// Last-known answer, consulted only when no source had a current track.
    fn cached_track(&self, _ctx: &Context) -> Result<Option<Track>> {
        Ok(None)
    }
}

/// Optionally replaces the current track with an enriched copy.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Return `Some(new_track)` to replace the track, `None` to leave it alone.
    fn apply(&self, ctx: &Context, track: &Track) -> Result<Option<Track>>;
}

/// Delivers the current track (or the fact that nothing plays).
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn deliver(&self, ctx: &Context, track: Option<&Track>) -> Result<()>;
}

/// Configuration entry for one plugin instance.
///
/// Holds the raw option table from the configuration file plus the directory
/// relative paths should be resolved against.
#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    table: toml::Table,
    base_dir: Option<PathBuf>,
}

impl PluginOptions {
    pub fn new(table: toml::Table) -> Self {
        Self {
            table,
            base_dir: None,
        }
    }

    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Deserialize the options into a plugin's own options struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        toml::Value::Table(self.table.clone())
            .try_into()
            .context("invalid plugin options")
    }

    /// The `priority` key, or [`DEFAULT_PRIORITY`].
    pub fn priority(&self) -> Result<i32> {
        match self.table.get("priority") {
            None => Ok(DEFAULT_PRIORITY),
            Some(toml::Value::Integer(value)) => i32::try_from(*value)
                .with_context(|| format!("priority {value} is out of range")),
            Some(other) => anyhow::bail!("priority must be an integer, got {}", other.type_str()),
        }
    }

    /// Resolve a configured path: `~` expands to the home directory and
    /// relative paths are taken relative to the configuration file.
    pub fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        let expanded = match path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .context("could not determine home directory")?
                .join(rest),
            None => PathBuf::from(path),
        };

        let absolute = match &self.base_dir {
            Some(base) => expanded.absolutize_from(base)?,
            None => expanded.absolutize()?,
        };
        Ok(absolute.into_owned())
    }
}

impl From<toml::Table> for PluginOptions {
    fn from(table: toml::Table) -> Self {
        Self::new(table)
    }
}
