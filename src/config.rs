//! # Configuration Module
//!
//! This module loads the TOML configuration file and manages the data
//! directory used for the daemon PID file and caches.
//!
//! ## File Locations
//!
//! The configuration file defaults to the platform configuration directory:
//! - Linux: `~/.config/nowplaying/config.toml`
//! - macOS: `~/Library/Application Support/nowplaying/config.toml`
//! - Windows: `%APPDATA%\nowplaying\config.toml`
//!
//! Data (PID file, cover cache) lives under the platform data directory,
//! e.g. `~/.local/share/nowplaying/` on Linux.
//!
//! ## Example
//!
//! ```toml
//! interval = 5.0
//! interval_offset = 0.5
//! download_timeout = 10.0
//!
//! [inputs.mpd]
//! priority = 10
//!
//! [inputs.command]
//! command = "playerctl metadata --format '{{artist}} - {{title}}'"
//!
//! [processors.cover]
//!
//! [[outputs]]
//! type = "file"
//! path = "~/.cache/nowplaying.txt"
//! template = "{artist} - {title}"
//!
//! [[outputs]]
//! type = "stdout"
//! ```
//!
//! `outputs` may also be written as a table of tables (`[outputs.file]`),
//! in which case entries keep file order before being sorted by priority.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::plugin::PluginOptions;

pub const DEFAULT_INTERVAL: f64 = 5.0;
pub const DEFAULT_DOWNLOAD_TIMEOUT: f64 = 10.0;

/// Name of the application directory under the platform config/data dirs.
const APP_DIR: &str = "nowplaying";

/// Returns the platform-appropriate configuration file path.
///
/// The directory is not created; a missing file is reported when loading.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system configuration directory. Please pass --config explicitly."
        )
    })?;

    Ok(config_dir.join(APP_DIR).join("config.toml"))
}

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The nowplaying subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// One `(type name, options)` pair from a plugin section.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    pub type_name: String,
    pub options: PluginOptions,
}

/// The `outputs` section: an ordered array of tables with a `type` key, or
/// a table keyed by type name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutputsSection {
    List(Vec<toml::Table>),
    Map(toml::Table),
}

impl Default for OutputsSection {
    fn default() -> Self {
        OutputsSection::Map(toml::Table::new())
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds between polls
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Shift of the aligned tick, in seconds
    #[serde(default, alias = "intervalOffset")]
    pub interval_offset: f64,

    /// Downloader timeout, in seconds
    #[serde(default = "default_download_timeout", alias = "downloadTimeout")]
    pub download_timeout: f64,

    /// User-Agent sent by the downloader instead of the built-in one
    #[serde(default, alias = "userAgent")]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub inputs: toml::Table,

    #[serde(default)]
    pub processors: toml::Table,

    #[serde(default)]
    pub outputs: OutputsSection,

    /// Directory relative plugin paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_interval() -> f64 {
    DEFAULT_INTERVAL
}

fn default_download_timeout() -> f64 {
    DEFAULT_DOWNLOAD_TIMEOUT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            interval_offset: 0.0,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            user_agent: None,
            inputs: toml::Table::new(),
            processors: toml::Table::new(),
            outputs: OutputsSection::default(),
            base_dir: None,
        }
    }
}

impl Config {
    /// Read and parse a configuration file.
    ///
    /// Relative paths in plugin options are later resolved against the
    /// directory containing `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse configuration text without touching the filesystem.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Source entries in file order.
    pub fn input_entries(&self) -> Result<Vec<PluginEntry>, ConfigError> {
        self.table_entries("inputs", &self.inputs)
    }

    /// Processor entries in file order; may be empty.
    pub fn processor_entries(&self) -> Result<Vec<PluginEntry>, ConfigError> {
        self.table_entries("processors", &self.processors)
    }

    /// Sink entries in file order.
    pub fn output_entries(&self) -> Result<Vec<PluginEntry>, ConfigError> {
        match &self.outputs {
            OutputsSection::Map(table) => self.table_entries("outputs", table),
            OutputsSection::List(tables) => tables
                .iter()
                .enumerate()
                .map(|(index, table)| {
                    let mut options = table.clone();
                    let type_name = match options.remove("type") {
                        Some(toml::Value::String(name)) => name,
                        Some(_) => {
                            return Err(ConfigError::Invalid(format!(
                                "outputs[{index}].type must be a string"
                            )))
                        }
                        None => {
                            return Err(ConfigError::Invalid(format!(
                                "outputs[{index}] is missing a `type` key"
                            )))
                        }
                    };
                    Ok(self.entry(type_name, options))
                })
                .collect(),
        }
    }

    fn table_entries(
        &self,
        section: &str,
        table: &toml::Table,
    ) -> Result<Vec<PluginEntry>, ConfigError> {
        table
            .iter()
            .map(|(type_name, value)| match value {
                toml::Value::Table(options) => Ok(self.entry(type_name.clone(), options.clone())),
                other => Err(ConfigError::Invalid(format!(
                    "{section}.{type_name} must be a table, got {}",
                    other.type_str()
                ))),
            })
            .collect()
    }

    fn entry(&self, type_name: String, options: toml::Table) -> PluginEntry {
        let mut options = PluginOptions::new(options);
        if let Some(base_dir) = &self.base_dir {
            options = options.with_base_dir(base_dir);
        }
        PluginEntry { type_name, options }
    }
}
