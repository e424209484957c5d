//! # Shell Completion Module
//!
//! Thin wrapper around `clap_complete`.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! nowplaying completion bash > ~/.local/share/bash-completion/completions/nowplaying
//!
//! # Generate zsh completions
//! nowplaying completion zsh > ~/.config/zsh/completions/_nowplaying
//! ```

use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

use crate::cli::Shell;

/// Generate shell completions for the given shell to stdout
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    write_completions(gen, cmd, &mut io::stdout());
}

/// Generate shell completions into any writer
pub fn write_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

/// Convert our Shell enum to clap_complete's Shell enum
pub fn shell_to_completion_shell(shell: &Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}
