//! # Background Daemon
//!
//! Runs the scheduler loop until SIGINT or SIGTERM, either in the foreground
//! (`nowplaying run`) or as a forked background process
//! (`nowplaying daemon start`).
//!
//! ## Signals
//!
//! SIGINT and SIGTERM are blocked before any worker thread starts and picked
//! up by a dedicated `sigwait` thread, which cancels the scheduler's
//! [`CancelToken`]. The cycle in progress always finishes; the sleep before
//! the next one is cut short.
//!
//! ## PID File
//!
//! A background daemon records its PID in `<data dir>/nowplaying.pid`.
//! `daemon status` checks that the process still exists and `daemon stop`
//! sends it SIGTERM.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use crate::config;
use crate::engine::Engine;
use crate::scheduler::{CancelToken, Scheduler};

const PID_FILE: &str = "nowplaying.pid";

/// Location of the daemon PID file.
pub fn pid_file_path() -> Result<PathBuf> {
    Ok(config::get_data_dir()?.join(PID_FILE))
}

/// A scheduler loop bound to a PID file.
#[derive(Debug)]
pub struct Daemon {
    pid_file: PathBuf,
}

impl Daemon {
    pub fn new() -> Result<Self> {
        Ok(Self::with_pid_file(pid_file_path()?))
    }

    pub fn with_pid_file(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Write the PID file, run until a shutdown signal arrives, then clean up.
    pub fn run(&self, engine: &mut Engine, scheduler: Scheduler) -> Result<()> {
        let pid = std::process::id();
        fs::write(&self.pid_file, pid.to_string()).with_context(|| {
            format!("Failed to write PID file {}", self.pid_file.display())
        })?;
        info!("Daemon started with PID {pid}");

        let token = CancelToken::new();
        install_signal_handler(token.clone())?;
        scheduler.run(engine, &token);

        if let Err(e) = fs::remove_file(&self.pid_file) {
            warn!("Failed to remove PID file {}: {e}", self.pid_file.display());
        }
        info!("Daemon stopped");
        Ok(())
    }
}

/// Route SIGINT and SIGTERM to `token`.
///
/// Must be called before other threads are spawned so they inherit the
/// blocked signal mask.
pub fn install_signal_handler(token: CancelToken) -> Result<()> {
    // SAFETY: sigset_t is plain data initialized by sigemptyset before use.
    let set = unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        set
    };

    // SAFETY: `set` is a valid, initialized signal set.
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        bail!("Failed to block shutdown signals: {}", io::Error::from_raw_os_error(rc));
    }

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || loop {
            let mut signal: libc::c_int = 0;
            // SAFETY: both pointers refer to live, initialized values.
            let rc = unsafe { libc::sigwait(&set, &mut signal) };
            if rc == 0 {
                info!("Received signal {signal}, shutting down");
                token.cancel();
                break;
            }
            debug!("sigwait failed: {}", io::Error::from_raw_os_error(rc));
        })
        .context("Failed to start signal thread")?;

    Ok(())
}

/// Check if the daemon is running
pub fn is_daemon_running() -> Result<bool> {
    is_running(&pid_file_path()?)
}

/// Stop the running daemon
pub fn stop_daemon() -> Result<()> {
    stop(&pid_file_path()?)
}

/// Whether the process recorded in `pid_file` is alive.
pub fn is_running(pid_file: &Path) -> Result<bool> {
    match read_pid(pid_file)? {
        Some(pid) => Ok(process_exists(pid)),
        None => Ok(false),
    }
}

/// Send SIGTERM to the process recorded in `pid_file` and remove the file.
pub fn stop(pid_file: &Path) -> Result<()> {
    let Some(pid) = read_pid(pid_file)? else {
        bail!("Daemon is not running");
    };

    if process_exists(pid) {
        // SAFETY: kill has no memory-safety preconditions.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to stop daemon (PID {pid})"));
        }
        info!("Daemon stopped (PID: {pid})");
    } else {
        warn!("Removing stale PID file for PID {pid}");
    }

    fs::remove_file(pid_file)?;
    Ok(())
}

fn read_pid(pid_file: &Path) -> Result<Option<libc::pid_t>> {
    if !pid_file.exists() {
        return Ok(None);
    }

    let pid_str = fs::read_to_string(pid_file)?;
    let pid = pid_str
        .trim()
        .parse::<libc::pid_t>()
        .context("Invalid PID in daemon file")?;
    if pid <= 0 {
        bail!("Invalid PID in daemon file: {pid}");
    }
    Ok(Some(pid))
}

fn process_exists(pid: libc::pid_t) -> bool {
    // SAFETY: signal 0 only performs the existence/permission check.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
