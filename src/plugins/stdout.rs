//! # Stdout Sink
//!
//! Prints one line per change, handy with `nowplaying run` in a terminal:
//!
//! ```text
//! ♫ NOW PLAYING: Muse - Madness
//! ■ NOTHING PLAYING
//! ```

use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;

use crate::plugin::{Context, PluginOptions, Sink};
use crate::track::Track;

pub const NAME: &str = "stdout";

pub struct StdoutSink {
    priority: i32,
}

pub fn build(options: &PluginOptions) -> Result<Arc<dyn Sink>> {
    Ok(Arc::new(StdoutSink {
        priority: options.priority()?,
    }))
}

/// The line printed for `track`.
pub fn format_line(track: Option<&Track>) -> String {
    match track {
        Some(track) => format!("♫ NOW PLAYING: {track}"),
        None => "■ NOTHING PLAYING".to_string(),
    }
}

impl Sink for StdoutSink {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn deliver(&self, _ctx: &Context, track: Option<&Track>) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", format_line(track))?;
        stdout.flush()?;
        Ok(())
    }
}
