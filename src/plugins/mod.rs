//! # Built-in Plugins
//!
//! | Category  | Type      | Does                                              |
//! |-----------|-----------|---------------------------------------------------|
//! | source    | `mpd`     | asks the Music Player Daemon through `mpc`        |
//! | source    | `command` | runs a shell command printing `Artist - Title`    |
//! | source    | `json`    | polls a JSON endpoint through the downloader      |
//! | processor | `cover`   | downloads cover art into a local cache            |
//! | sink      | `file`    | writes a rendered template to a file              |
//! | sink      | `command` | runs a shell command with the track in its env    |
//! | sink      | `stdout`  | prints the track to standard output               |

use anyhow::{Context as _, Result};
use log::debug;
use std::process::{Command, Output};

use crate::registry::Registries;

pub mod command;
pub mod cover;
pub mod file;
pub mod json;
pub mod mpd;
pub mod stdout;

/// Shell used for `command` plugins unless configured otherwise.
pub const DEFAULT_SHELL: &str = "sh";

/// Register every built-in plugin type.
pub fn register_builtins(registries: &mut Registries) {
    registries.sources.register_override(mpd::NAME, mpd::build);
    registries.sources.register_override(command::NAME, command::build_source);
    registries.sources.register_override(json::NAME, json::build);

    registries.processors.register_override(cover::NAME, cover::build);

    registries.sinks.register_override(file::NAME, file::build);
    registries.sinks.register_override(command::NAME, command::build_sink);
    registries.sinks.register_override(stdout::NAME, stdout::build);
}

/// Run `script` through `shell -c` with extra environment variables.
///
/// A non-zero exit status is an error carrying the command's stderr.
pub(crate) fn run_shell(shell: &str, script: &str, env: &[(&str, &str)]) -> Result<Output> {
    debug!("Running `{script}` with {shell}");

    let output = Command::new(shell)
        .arg("-c")
        .arg(script)
        .envs(env.iter().copied())
        .output()
        .with_context(|| format!("Failed to execute {shell}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "`{script}` exited with {}: {}",
            output.status,
            stderr.trim()
        );
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registries = Registries::with_builtins();

        assert_eq!(registries.sources.names(), vec!["command", "json", "mpd"]);
        assert_eq!(registries.processors.names(), vec!["cover"]);
        assert_eq!(registries.sinks.names(), vec!["command", "file", "stdout"]);
    }

    #[test]
    fn test_run_shell_passes_environment() {
        let output = run_shell(DEFAULT_SHELL, "printf %s \"$GREETING\"", &[("GREETING", "hi")]).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hi");
    }

    #[test]
    fn test_run_shell_reports_failure() {
        let err = run_shell(DEFAULT_SHELL, "echo broken >&2; exit 3", &[]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken"), "got {message}");
    }
}
