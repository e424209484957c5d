//! # Integration Tests for Now Playing
//!
//! End-to-end tests through the public library API and the `nowplaying`
//! binary: configuration loading, full cycles with real built-in plugins,
//! and the CLI commands a user would run.

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use nowplaying::config::Config;
use nowplaying::engine::Engine;
use nowplaying::events::{listener, Event, EventKind};
use nowplaying::plugin::{Context, Sink, Source};
use nowplaying::registry::Registries;
use nowplaying::scheduler::Scheduler;
use nowplaying::track::Track;

/// Source replaying a fixed script of answers, then nothing.
struct Script {
    answers: Mutex<Vec<Option<Track>>>,
}

impl Script {
    fn new(mut answers: Vec<Option<Track>>) -> Arc<Self> {
        answers.reverse();
        Arc::new(Self {
            answers: Mutex::new(answers),
        })
    }
}

impl Source for Script {
    fn name(&self) -> &str {
        "script"
    }

    fn grab_current(&self, _ctx: &Context) -> Result<Option<Track>> {
        Ok(self.answers.lock().unwrap().pop().flatten())
    }
}

#[derive(Default)]
struct Collect {
    seen: Mutex<Vec<Option<Track>>>,
}

impl Sink for Collect {
    fn name(&self) -> &str {
        "collect"
    }

    fn deliver(&self, _ctx: &Context, track: Option<&Track>) -> Result<()> {
        self.seen.lock().unwrap().push(track.cloned());
        Ok(())
    }
}

fn write_config(dir: &Path, text: &str) -> Result<std::path::PathBuf> {
    let path = dir.join("config.toml");
    fs::write(&path, text)?;
    Ok(path)
}

fn nowplaying(args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_nowplaying"))
        .args(args)
        .env_remove("NOWPLAYING_CONFIG")
        .env("RUST_LOG", "off")
        .output()?)
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[test]
    fn test_unchanged_track_is_delivered_once() -> Result<()> {
        let mut engine = Engine::new(Registries::new());
        let sink = Arc::new(Collect::default());
        engine.add_source(Script::new(vec![
            Some(Track::new("Boards of Canada", "Roygbiv")),
            Some(Track::new("Boards of Canada ", " Roygbiv")),
            Some(Track::new("Aphex Twin", "Xtal")),
            None,
        ]));
        engine.add_sink(sink.clone());

        for _ in 0..4 {
            engine.cycle()?;
        }

        let seen = sink.seen.lock().unwrap();
        let titles: Vec<Option<&str>> = seen
            .iter()
            .map(|track| track.as_ref().map(|t| t.title.as_str()))
            .collect();
        assert_eq!(titles, vec![Some("Roygbiv"), Some("Xtal"), None]);
        assert_eq!(seen[0].as_ref().unwrap().source_id.as_deref(), Some("script"));
        assert_eq!(engine.last_track(), None);
        Ok(())
    }

    #[test]
    fn test_observer_sees_committed_track() -> Result<()> {
        let mut engine = Engine::new(Registries::new());
        engine.add_source(Script::new(vec![Some(Track::new("Low", "Lullaby"))]));
        engine.add_sink(Arc::new(Collect::default()));

        let state = engine.state();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let log = observed.clone();
        engine.events_mut().subscribe(
            EventKind::Done,
            listener(move |event: &Event<'_>| {
                if let Event::Done { error: None } = event {
                    log.lock().unwrap().push(state.last_track().map(|t| t.to_string()));
                }
                Ok(())
            }),
        );

        Scheduler::run_once(&mut engine)?;

        assert_eq!(*observed.lock().unwrap(), vec![Some("Low - Lullaby".to_string())]);
        Ok(())
    }

    #[test]
    fn test_config_file_drives_builtin_plugins() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(
            temp_dir.path(),
            r#"
interval = 2
interval_offset = 0.5

[inputs.command]
command = "echo 'Nick Drake - Pink Moon'"

[[outputs]]
type = "file"
path = "np.txt"
template = "{title} by {artist} via {source}"
"#,
        )?;

        let config = Config::load(&config_path)?;
        let mut engine = Engine::new(Registries::with_builtins());
        engine.apply_config(&config)?;
        assert_eq!(engine.scheduler().interval(), 2.0);
        assert_eq!(engine.scheduler().offset(), 0.5);

        engine.cycle()?;

        // Relative paths resolve against the configuration directory
        let written = fs::read_to_string(temp_dir.path().join("np.txt"))?;
        assert_eq!(written, "Pink Moon by Nick Drake via command");
        assert_eq!(engine.last_track().map(|t| t.artist), Some("Nick Drake".to_string()));
        Ok(())
    }

    #[test]
    fn test_rejected_config_keeps_running_engine() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let out = temp_dir.path().join("np.txt");

        let good = Config::from_toml_str(&format!(
            "[inputs.command]\ncommand = \"echo 'A - B'\"\n\n[outputs.file]\npath = {:?}\n",
            out.display().to_string()
        ))?;
        let bad = Config::from_toml_str("[inputs.nope]\n\n[outputs.stdout]\n")?;

        let mut engine = Engine::new(Registries::with_builtins());
        engine.apply_config(&good)?;
        assert!(engine.apply_config(&bad).is_err());

        assert_eq!(engine.sources().len(), 1);
        engine.cycle()?;
        assert_eq!(fs::read_to_string(&out)?, "A - B");
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help_displays_correctly() -> Result<()> {
        let output = nowplaying(&["--help"])?;
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        for command in ["run", "check", "plugins", "daemon", "completion"] {
            assert!(stdout.contains(command), "help is missing `{command}`");
        }
        Ok(())
    }

    #[test]
    fn test_plugins_lists_builtins() -> Result<()> {
        let output = nowplaying(&["plugins"])?;
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("command, json, mpd"));
        assert!(stdout.contains("cover"));
        assert!(stdout.contains("command, file, stdout"));
        Ok(())
    }

    #[test]
    fn test_check_prints_sorted_chains() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(
            temp_dir.path(),
            r#"
[inputs.mpd]
priority = 10

[inputs.command]
command = "true"
priority = 90

[outputs.stdout]
"#,
        )?;

        let output = nowplaying(&["check", "--config", &config_path.to_string_lossy()])?;
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("is valid"));
        let inputs = &stdout[stdout.find("Inputs:").unwrap()..];
        let mpd_at = inputs.find("mpd").unwrap();
        let command_at = inputs.find("command").unwrap();
        assert!(mpd_at < command_at, "lower priority should be listed first:\n{stdout}");
        Ok(())
    }

    #[test]
    fn test_run_once_writes_output_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(
            temp_dir.path(),
            r#"
[inputs.command]
command = "printf 'Portishead - Roads\n'"

[outputs.file]
path = "np.txt"
"#,
        )?;

        let output = nowplaying(&["--config", &config_path.to_string_lossy(), "run", "--once"])?;
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        assert_eq!(fs::read_to_string(temp_dir.path().join("np.txt"))?, "Portishead - Roads");
        Ok(())
    }

    #[test]
    fn test_run_once_fails_when_sink_fails() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(
            temp_dir.path(),
            r#"
[inputs.command]
command = "echo 'Portishead - Roads'"

[outputs.command]
command = "exit 3"
"#,
        )?;

        let output = nowplaying(&["--config", &config_path.to_string_lossy(), "run", "--once"])?;
        assert!(!output.status.success());
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_fatal() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(temp_dir.path(), "[inputs.nope]\n\n[outputs.stdout]\n")?;

        let output = nowplaying(&["check", "--config", &config_path.to_string_lossy()])?;
        assert!(!output.status.success());

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("nope"), "unexpected error output:\n{stderr}");
        Ok(())
    }

    #[test]
    fn test_completion_generation() -> Result<()> {
        let output = nowplaying(&["completion", "zsh"])?;
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_nowplaying"));
        Ok(())
    }
}
