//! # Command Source and Sink
//!
//! Glue for players and tools that only speak shell.
//!
//! As a **source**, runs `command` and reads the first non-empty line of its
//! output as `Artist<separator>Title`:
//!
//! ```toml
//! [inputs.command]
//! command = "playerctl metadata --format '{{artist}} - {{title}}'"
//! separator = " - "   # default
//! keep_last = true    # answer cached_track with the last good result
//! ```
//!
//! As a **sink**, runs `command` with the track in the environment
//! (`NOWPLAYING_ARTIST`, `NOWPLAYING_TITLE`, `NOWPLAYING_SOURCE`,
//! `NOWPLAYING_IMAGE`). Track data is never spliced into the command line.
//! When nothing plays, `empty_command` runs instead, if set.
//!
//! Both accept `shell` (default `sh`). A non-zero exit status is an error.

use anyhow::Result;
use log::debug;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};

use super::{run_shell, DEFAULT_SHELL};
use crate::plugin::{Context, PluginOptions, Sink, Source};
use crate::track::Track;

pub const NAME: &str = "command";

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_separator() -> String {
    " - ".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SourceOptions {
    command: String,
    #[serde(default = "default_separator")]
    separator: String,
    #[serde(default = "default_true")]
    keep_last: bool,
    #[serde(default = "default_shell")]
    shell: String,
}

pub struct CommandSource {
    options: SourceOptions,
    priority: i32,
    last: Mutex<Option<Track>>,
}

pub fn build_source(options: &PluginOptions) -> Result<Arc<dyn Source>> {
    let parsed: SourceOptions = options.parse()?;
    if parsed.separator.is_empty() {
        anyhow::bail!("separator must not be empty");
    }

    Ok(Arc::new(CommandSource {
        options: parsed,
        priority: options.priority()?,
        last: Mutex::new(None),
    }))
}

impl Source for CommandSource {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn grab_current(&self, _ctx: &Context) -> Result<Option<Track>> {
        let output = run_shell(&self.options.shell, &self.options.command, &[])?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let track = parse_line(&stdout, &self.options.separator);
        match &track {
            Some(track) if track.is_valid() => {
                if self.options.keep_last {
                    *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(track.clone());
                }
            }
            _ => debug!("`{}` printed no usable track", self.options.command),
        }
        Ok(track)
    }

    fn cached_track(&self, _ctx: &Context) -> Result<Option<Track>> {
        Ok(self.last.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// First non-empty line split at the first `separator`.
pub fn parse_line(output: &str, separator: &str) -> Option<Track> {
    let line = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let (artist, title) = line.split_once(separator)?;
    Some(Track::new(artist.trim(), title.trim()).with_source_id(NAME))
}

#[derive(Debug, Deserialize)]
struct SinkOptions {
    command: String,
    empty_command: Option<String>,
    #[serde(default = "default_shell")]
    shell: String,
}

pub struct CommandSink {
    options: SinkOptions,
    priority: i32,
}

pub fn build_sink(options: &PluginOptions) -> Result<Arc<dyn Sink>> {
    Ok(Arc::new(CommandSink {
        options: options.parse()?,
        priority: options.priority()?,
    }))
}

impl Sink for CommandSink {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn deliver(&self, _ctx: &Context, track: Option<&Track>) -> Result<()> {
        match track {
            Some(track) => {
                let source = track.source_id.as_deref().unwrap_or_default();
                let image = track.image_path.as_deref().unwrap_or_default();
                let env = [
                    ("NOWPLAYING_ARTIST", track.artist.as_str()),
                    ("NOWPLAYING_TITLE", track.title.as_str()),
                    ("NOWPLAYING_SOURCE", source),
                    ("NOWPLAYING_IMAGE", image),
                ];
                run_shell(&self.options.shell, &self.options.command, &env)?;
            }
            None => {
                if let Some(command) = &self.options.empty_command {
                    run_shell(&self.options.shell, command, &[])?;
                }
            }
        }
        Ok(())
    }
}
