//! # Error Types
//!
//! Typed errors for the parts of Now Playing whose failures callers need to
//! tell apart. Plugins and the binary itself use `anyhow` for context-rich
//! errors; those are carried inside [`CycleError`] and [`ConfigError::Plugin`].
//!
//! - [`ConfigError`] - fatal, raised before any cycle runs
//! - [`CycleError`] - aborts one cycle, reported via the `done` event
//! - [`NetworkError`] - raised by the [`Downloader`](crate::downloader::Downloader)
//! - [`EventError`] - unknown event channel names

use std::path::PathBuf;
use thiserror::Error;

use crate::events::EventKind;
use crate::plugin::Category;

/// Errors raised while loading configuration or building the engine.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration entry names a plugin type nobody registered
    #[error("unknown {category} type `{name}`")]
    UnknownType { category: Category, name: String },

    /// A plugin type name was registered twice without override
    #[error("{category} type `{name}` is already registered")]
    DuplicateName { category: Category, name: String },

    /// A required section (`inputs` or `outputs`) is missing or empty
    #[error("configuration section `{0}` must not be empty")]
    EmptySection(&'static str),

    /// The polling interval is out of range or not a number
    #[error("interval must be between 0.001 and 604800 seconds, got {0}")]
    InvalidInterval(f64),

    /// A plugin factory rejected its options
    #[error("failed to build {category} `{name}`")]
    Plugin {
        category: Category,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The configuration file could not be read
    #[error("failed to read configuration file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has the wrong shape
    #[error("failed to parse configuration file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Any other malformed configuration value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that abort a single cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("source `{name}` failed")]
    Source {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("processor `{name}` failed")]
    Processor {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("sink `{name}` failed")]
    Sink {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// An event listener returned an error
    #[error("listener for `{event}` failed")]
    Listener {
        event: EventKind,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors raised by the shared HTTP downloader.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    /// The HTTP client itself could not be constructed
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl NetworkError {
    /// Whether repeating the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Timeout { .. } | NetworkError::Transport { .. } => true,
            NetworkError::Status { status, .. } => *status == 429 || *status >= 500,
            NetworkError::InvalidHeader { .. } | NetworkError::Client(_) => false,
        }
    }
}

/// Errors raised by the event bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}
