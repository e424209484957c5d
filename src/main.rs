use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use std::path::{Path, PathBuf};

use nowplaying::cli::{self, DaemonAction};
use nowplaying::config::{self, Config};
use nowplaying::engine::Engine;
use nowplaying::plugin::{Processor, Sink, Source};
use nowplaying::registry::Registries;
use nowplaying::scheduler::{CancelToken, Scheduler};
use nowplaying::{completion, daemon};

/// Initialize `env_logger` with `info` (or `debug` with `--verbose`);
/// `RUST_LOG` overrides both.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => config::default_config_path(),
    }
}

/// Load the configuration file and build a ready-to-run engine.
fn load_engine(path: &Path) -> Result<Engine> {
    debug!("Loading configuration from {}", path.display());
    let config = Config::load(path)?;

    let mut engine = Engine::new(Registries::with_builtins());
    engine
        .apply_config(&config)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(engine)
}

fn print_chains(engine: &Engine) {
    println!("Inputs:");
    for source in engine.sources() {
        println!("  {:>4}  {}", source.priority(), source.name());
    }
    println!("Processors:");
    if engine.processors().is_empty() {
        println!("  (none)");
    }
    for processor in engine.processors() {
        println!("  {:>4}  {}", processor.priority(), processor.name());
    }
    println!("Outputs:");
    for sink in engine.sinks() {
        println!("  {:>4}  {}", sink.priority(), sink.name());
    }

    let scheduler = engine.scheduler();
    println!(
        "Polling every {}s (offset {}s)",
        scheduler.interval(),
        scheduler.offset()
    );
}

fn print_plugins(registries: &Registries) {
    println!("Inputs:     {}", registries.sources.names().join(", "));
    println!("Processors: {}", registries.processors.names().join(", "));
    println!("Outputs:    {}", registries.sinks.names().join(", "));
}

fn daemon_command(action: DaemonAction, config: Option<PathBuf>) -> Result<()> {
    match action {
        DaemonAction::Start => {
            if daemon::is_daemon_running()? {
                eprintln!("Daemon is already running");
                return Ok(());
            }

            // Configuration errors are reported here, before detaching
            let mut engine = load_engine(&config_path(config)?)?;
            let scheduler = engine.scheduler();

            match unsafe { libc::fork() } {
                0 => {
                    // Child process - become daemon
                    unsafe { libc::setsid() };
                    let daemon = daemon::Daemon::new()?;
                    daemon.run(&mut engine, scheduler)?;
                    std::process::exit(0);
                }
                pid if pid > 0 => {
                    println!("Starting Now Playing daemon...");
                    std::thread::sleep(std::time::Duration::from_millis(500));

                    if daemon::is_daemon_running()? {
                        println!("Daemon started successfully");
                    } else {
                        eprintln!("Failed to start daemon");
                    }
                }
                _ => {
                    eprintln!("Failed to fork process");
                }
            }
        }
        DaemonAction::Stop => {
            daemon::stop_daemon()?;
            println!("Daemon stopped");
        }
        DaemonAction::Status => {
            if daemon::is_daemon_running()? {
                println!("Daemon is running");
            } else {
                println!("Daemon is not running");
            }
        }
    }
    Ok(())
}

/// Main entry point for Now Playing.
///
/// Parses command-line arguments, initializes logging and routes commands.
/// Configuration errors are fatal and reported before anything is polled.
fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    match args.command {
        cli::Command::Run { once } => {
            let mut engine = load_engine(&config_path(args.config)?)?;

            if once {
                Scheduler::run_once(&mut engine)?;
            } else {
                let token = CancelToken::new();
                daemon::install_signal_handler(token.clone())?;
                info!("Press Ctrl-C to stop");
                engine.scheduler().run(&mut engine, &token);
            }
        }
        cli::Command::Check => {
            let path = config_path(args.config)?;
            let engine = load_engine(&path)?;
            println!("Configuration {} is valid", path.display());
            print_chains(&engine);
        }
        cli::Command::Plugins => {
            print_plugins(&Registries::with_builtins());
        }
        cli::Command::Daemon { action } => {
            daemon_command(action, args.config)?;
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
    }

    Ok(())
}
