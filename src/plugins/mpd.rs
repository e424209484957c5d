//! # MPD Source
//!
//! Asks the Music Player Daemon what is playing through the `mpc`
//! command-line client:
//!
//! ```text
//! $ mpc status -f '[%artist%]<TAB>[%title%]<TAB>[%file%]'
//! Muse	Madness	muse/the-2nd-law/02-madness.flac
//! [playing] #2/13   1:23/4:41 (29%)
//! volume: 80%   repeat: off   random: off   single: off   consume: off
//! ```
//!
//! When MPD is stopped only the volume line is printed. A paused song counts
//! as nothing playing unless `include_paused = true`.
//!
//! ## Options
//!
//! - `host`, `port` - forwarded to `mpc` as `MPD_HOST` / `MPD_PORT`
//! - `mpc` - client binary (default `mpc`)
//! - `include_paused` - report paused songs too (default `false`)
//!
//! An unreachable MPD is reported as "nothing playing"; a missing `mpc`
//! binary is an error.

use anyhow::{Context as _, Result};
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::plugin::{Context, PluginOptions, Source};
use crate::track::Track;

pub const NAME: &str = "mpd";

const FORMAT: &str = "[%artist%]\t[%title%]\t[%file%]";

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Options {
    host: Option<String>,
    port: Option<u16>,
    mpc: String,
    include_paused: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            mpc: "mpc".to_string(),
            include_paused: false,
        }
    }
}

/// Playback state as printed on the `mpc status` state line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
}

/// Parsed `mpc status` output.
#[derive(Debug, Clone, PartialEq)]
pub struct MpdStatus {
    pub state: PlayerState,
    pub artist: String,
    pub title: String,
    pub file: String,
}

pub struct MpdSource {
    options: Options,
    priority: i32,
}

pub fn build(options: &PluginOptions) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(MpdSource {
        options: options.parse()?,
        priority: options.priority()?,
    }))
}

impl MpdSource {
    fn status(&self) -> Result<Option<MpdStatus>> {
        let mut command = Command::new(&self.options.mpc);
        command.args(["status", "-f", FORMAT]);
        if let Some(host) = &self.options.host {
            command.env("MPD_HOST", host);
        }
        if let Some(port) = self.options.port {
            command.env("MPD_PORT", port.to_string());
        }

        let output = command.output().with_context(|| {
            format!(
                "Failed to execute {}. Please install mpc (MPD client)",
                self.options.mpc
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("MPD is not reachable: {}", stderr.trim());
            return Ok(None);
        }

        Ok(Some(parse_status(&String::from_utf8_lossy(&output.stdout))))
    }
}

impl Source for MpdSource {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn grab_current(&self, _ctx: &Context) -> Result<Option<Track>> {
        let Some(status) = self.status()? else {
            return Ok(None);
        };

        match status.state {
            PlayerState::Playing => {}
            PlayerState::Paused if self.options.include_paused => {}
            state => {
                debug!("MPD state is {state:?}");
                return Ok(None);
            }
        }

        Ok(Some(status_to_track(status)))
    }
}

/// Parse `mpc status -f FORMAT` output.
pub fn parse_status(text: &str) -> MpdStatus {
    let lines: Vec<&str> = text.lines().collect();

    // Stopped: the only line is the volume/options line
    let state = match lines.get(1) {
        Some(line) if line.starts_with("[playing]") => PlayerState::Playing,
        Some(line) if line.starts_with("[paused]") => PlayerState::Paused,
        _ => PlayerState::Stopped,
    };

    if state == PlayerState::Stopped {
        return MpdStatus {
            state,
            artist: String::new(),
            title: String::new(),
            file: String::new(),
        };
    }

    let mut fields = lines[0].splitn(3, '\t').map(str::trim);
    MpdStatus {
        state,
        artist: fields.next().unwrap_or_default().to_string(),
        title: fields.next().unwrap_or_default().to_string(),
        file: fields.next().unwrap_or_default().to_string(),
    }
}

/// Untagged files fall back to their file stem as title.
fn status_to_track(status: MpdStatus) -> Track {
    let title = if status.title.is_empty() {
        Path::new(&status.file)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        status.title
    };

    let mut track = Track::new(status.artist, title).with_source_id(NAME);
    if !status.file.is_empty() {
        track = track.with_extra("file", status.file);
    }
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const PLAYING: &str = "Muse\tMadness\tmuse/the-2nd-law/02-madness.flac\n\
        [playing] #2/13   1:23/4:41 (29%)\n\
        volume: 80%   repeat: off   random: off   single: off   consume: off\n";

    const PAUSED: &str = "Muse\tMadness\tmuse/the-2nd-law/02-madness.flac\n\
        [paused]  #2/13   1:23/4:41 (29%)\n\
        volume: 80%   repeat: off   random: off   single: off   consume: off\n";

    const STOPPED: &str =
        "volume: 80%   repeat: off   random: off   single: off   consume: off\n";

    /// Fake `mpc` that prints `output` and records its environment.
    fn fake_mpc(dir: &TempDir, output: &str, exit_code: i32) -> String {
        let path = dir.path().join("mpc");
        let env_log = dir.path().join("env.log");
        let script = format!(
            "#!/bin/sh\necho \"$MPD_HOST:$MPD_PORT\" > '{}'\nprintf '%s' '{}'\nexit {}\n",
            env_log.display(),
            output,
            exit_code
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn source(table: &str) -> Arc<dyn Source> {
        build(&PluginOptions::new(table.parse().unwrap())).unwrap()
    }

    #[test]
    fn test_parse_playing() {
        let status = parse_status(PLAYING);
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.artist, "Muse");
        assert_eq!(status.title, "Madness");
        assert_eq!(status.file, "muse/the-2nd-law/02-madness.flac");
    }

    #[test]
    fn test_parse_paused_and_stopped() {
        assert_eq!(parse_status(PAUSED).state, PlayerState::Paused);

        let stopped = parse_status(STOPPED);
        assert_eq!(stopped.state, PlayerState::Stopped);
        assert!(stopped.file.is_empty());

        assert_eq!(parse_status("").state, PlayerState::Stopped);
    }

    #[test]
    fn test_untagged_file_uses_file_stem() {
        let status = parse_status("\t\tincoming/unknown-song.mp3\n[playing] #1/1   0:01/3:00 (0%)\n");
        let track = status_to_track(status);

        assert_eq!(track.title, "unknown-song");
        assert!(!track.is_valid());
    }

    #[test]
    fn test_grab_current_through_mpc() -> Result<()> {
        let dir = TempDir::new()?;
        let mpc = fake_mpc(&dir, PLAYING, 0);
        let source = source(&format!("mpc = '{mpc}'\nhost = 'jukebox'\nport = 6601"));

        let track = source.grab_current(&Context::default())?.unwrap();

        assert_eq!(track.to_string(), "Muse - Madness");
        assert_eq!(track.source_id.as_deref(), Some("mpd"));
        assert_eq!(track.extra_str("file").as_deref(), Some("muse/the-2nd-law/02-madness.flac"));
        assert_eq!(fs::read_to_string(dir.path().join("env.log"))?.trim(), "jukebox:6601");
        Ok(())
    }

    #[test]
    fn test_paused_is_nothing_playing_by_default() -> Result<()> {
        let dir = TempDir::new()?;
        let mpc = fake_mpc(&dir, PAUSED, 0);

        let strict = source(&format!("mpc = '{mpc}'"));
        assert!(strict.grab_current(&Context::default())?.is_none());

        let lenient = source(&format!("mpc = '{mpc}'\ninclude_paused = true"));
        assert!(lenient.grab_current(&Context::default())?.is_some());
        Ok(())
    }

    #[test]
    fn test_unreachable_mpd_is_nothing_playing() -> Result<()> {
        let dir = TempDir::new()?;
        let mpc = fake_mpc(&dir, "", 1);

        assert!(source(&format!("mpc = '{mpc}'")).grab_current(&Context::default())?.is_none());
        Ok(())
    }

    #[test]
    fn test_missing_mpc_binary_is_an_error() {
        let source = source("mpc = '/nonexistent/bin/mpc'");
        assert!(source.grab_current(&Context::default()).is_err());
    }

    #[test]
    fn test_priority_option() {
        assert_eq!(source("priority = 5").priority(), 5);
        assert_eq!(source("").priority(), crate::plugin::DEFAULT_PRIORITY);
    }
}
