//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Now Playing using Clap
//! derive macros.
//!
//! ## Commands
//!
//! - `run`: Poll players and deliver changes in the foreground
//! - `check`: Validate the configuration and show the resolved chains
//! - `plugins`: List the built-in plugin types
//! - `daemon`: Start, stop or query the background daemon
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! nowplaying run
//! nowplaying --config ./np.toml run --once
//! nowplaying daemon start
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "nowplaying")]
#[command(about = "Now Playing: find out what is playing and tell everyone who asks")]
#[command(version)]
pub struct Args {
    /// Configuration file
    ///
    /// Defaults to `config.toml` in the platform configuration directory,
    /// e.g. ~/.config/nowplaying/config.toml on Linux.
    #[arg(short, long, global = true, env = "NOWPLAYING_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll players and deliver changes in the foreground
    ///
    /// Runs until interrupted with Ctrl-C (SIGINT) or SIGTERM. Each cycle asks
    /// the configured inputs what is playing and, when the answer changed,
    /// runs the processors and hands the result to every output.
    Run {
        /// Run a single cycle and exit
        ///
        /// The exit status is non-zero when the cycle fails.
        #[arg(long)]
        once: bool,
    },

    /// Validate the configuration and show the resolved chains
    ///
    /// Builds every configured plugin without polling anything and prints
    /// inputs, processors and outputs in the order they will run.
    Check,

    /// List the built-in plugin types
    Plugins,

    /// Manage the background daemon
    ///
    /// The daemon runs the same loop as `run`, detached from the terminal,
    /// and records its PID in the data directory.
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Generate shell completions
    ///
    /// Usage: nowplaying completion bash > ~/.local/share/bash-completion/completions/nowplaying
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Daemon management actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonAction {
    /// Start the daemon in the background
    Start,

    /// Stop the running daemon
    Stop,

    /// Check daemon status
    Status,
}
