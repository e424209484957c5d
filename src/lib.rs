//! Find out what is playing, enrich it, and tell everyone who asks.
//!
//! Now Playing polls a set of *sources* (MPD, shell commands, JSON endpoints)
//! on a fixed schedule. When the answer changes, the track runs through a
//! chain of *processors* (cover art download) and is handed to every *sink*
//! (files, shell commands, stdout).
//!
//! Core modules:
//! - [`engine`] - the cycle: seek, change check, process, deliver, commit
//! - [`scheduler`] - aligned, cancellable polling loop
//! - [`plugin`] - source/processor/sink traits and plugin options
//! - [`registry`] - name → factory registries
//! - [`chain`] - priority-ordered plugin chains
//! - [`events`] - synchronous event bus for observers
//! - [`downloader`] - shared HTTP client for plugins
//! - [`track`] - the track record
//!
//! ### Supporting Modules
//!
//! - [`config`] - TOML configuration and data directory management
//! - [`template`] - placeholder rendering for sinks and processors
//! - [`plugins`] - built-in plugins
//! - [`daemon`] - background process and signal handling
//! - [`cli`] / [`completion`] - command-line interface
//! - [`error`] - typed errors
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use nowplaying::config::Config;
//! use nowplaying::engine::Engine;
//! use nowplaying::events::{listener, Event, EventKind};
//! use nowplaying::registry::Registries;
//! use nowplaying::scheduler::CancelToken;
//!
//! let config = Config::from_toml_str(r#"
//!     interval = 10
//!
//!     [inputs.mpd]
//!
//!     [[outputs]]
//!     type = "file"
//!     path = "/tmp/nowplaying.txt"
//! "#)?;
//!
//! let mut engine = Engine::new(Registries::with_builtins());
//! engine.apply_config(&config)?;
//!
//! // Observers only see `done` and the read-only state handle
//! let state = engine.state();
//! engine.events_mut().subscribe(EventKind::Done, listener(move |event: &Event<'_>| {
//!     if let Event::Done { error: None } = event {
//!         println!("now: {:?}", state.last_track());
//!     }
//!     Ok(())
//! }));
//!
//! let token = CancelToken::new();
//! engine.scheduler().run(&mut engine, &token);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod chain;
pub mod cli;
pub mod completion;
pub mod config;
pub mod daemon;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod events;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod scheduler;
pub mod template;
pub mod track;

#[cfg(test)]
mod test_support;
