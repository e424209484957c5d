//! # Scheduler
//!
//! Drives [`Engine::cycle`] on wall-clock aligned ticks. With `interval = 5`
//! and `offset = 0.5` cycles start at `:00.5`, `:05.5`, `:10.5`, ... no matter
//! how long each cycle takes. A cycle that overruns one or more ticks skips
//! them; the scheduler never runs cycles back to back to catch up.
//!
//! Cycle errors are logged and otherwise ignored, so one bad poll never stops
//! the loop. The loop ends when its [`CancelToken`] is cancelled; the token
//! also cuts the sleep between ticks short.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::DEFAULT_INTERVAL;
use crate::engine::Engine;
use crate::error::{ConfigError, CycleError};

/// Shortest accepted polling interval, in seconds.
pub const MIN_INTERVAL: f64 = 0.001;

/// Longest accepted polling interval (and largest offset), in seconds.
pub const MAX_INTERVAL: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// Shared cancellation flag with an interruptible sleep.
///
/// Clones share the same flag; cancelling any of them cancels all.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Request cancellation. Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            let _ = self.inner.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until cancelled.
    ///
    /// Returns `true` if the token is cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }

        match self.inner.wake_rx.recv_timeout(duration) {
            Ok(()) => {
                // Pass the wake-up on to any other sleeper
                let _ = self.inner.wake_tx.try_send(());
                true
            }
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Aligned periodic driver for an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduler {
    interval: f64,
    offset: f64,
}

impl Scheduler {
    /// # Errors
    ///
    /// - [`ConfigError::InvalidInterval`] unless `interval` lies between
    ///   [`MIN_INTERVAL`] and [`MAX_INTERVAL`] seconds
    /// - [`ConfigError::Invalid`] unless `offset` is at most [`MAX_INTERVAL`]
    ///   seconds either way
    pub fn new(interval: f64, offset: f64) -> Result<Self, ConfigError> {
        if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
            return Err(ConfigError::InvalidInterval(interval));
        }
        if !offset.is_finite() || offset.abs() > MAX_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "interval_offset must be a number of seconds within ±{MAX_INTERVAL}, got {offset}"
            )));
        }
        Ok(Self { interval, offset })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The aligned tick for `now` (seconds since the Unix epoch).
    pub fn first_tick(&self, now: f64) -> f64 {
        (now / self.interval).floor() * self.interval + self.offset
    }

    /// Advance `next` by whole intervals until it lies strictly after `now`.
    pub fn next_tick(&self, next: f64, now: f64) -> f64 {
        if next > now {
            return next;
        }

        let missed = ((now - next) / self.interval).floor();
        let following = next + (missed + 1.0) * self.interval;
        if following <= now {
            // Rounding left us on (or just before) `now`
            following + self.interval
        } else {
            following
        }
    }

    /// Run cycles until `token` is cancelled.
    pub fn run(&self, engine: &mut Engine, token: &CancelToken) {
        info!(
            "Polling every {}s (offset {}s)",
            self.interval, self.offset
        );

        let mut next = self.first_tick(unix_now());

        while !token.is_cancelled() {
            if let Err(error) = engine.cycle() {
                error!("Cycle failed: {:#}", anyhow::Error::new(error));
            }

            let now = unix_now();
            let following = self.next_tick(next, now);
            let skipped = ((following - next) / self.interval).round() as u64;
            if skipped > 1 {
                debug!("Cycle overran; skipping {} tick(s)", skipped - 1);
            }
            next = following;

            let pause = Duration::try_from_secs_f64(next - now)
                .unwrap_or_else(|_| Duration::from_secs_f64(MAX_INTERVAL * 2.0));
            if token.sleep(pause) {
                break;
            }
        }

        info!("Scheduler stopped");
    }

    /// Run a single cycle and hand back its result.
    pub fn run_once(engine: &mut Engine) -> Result<(), CycleError> {
        engine.cycle()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            offset: 0.0,
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{listener, Event, EventKind};
    use crate::plugin::{Context, Sink, Source};
    use crate::registry::Registries;
    use crate::track::Track;
    use anyhow::Result;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Source for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn grab_current(&self, _ctx: &Context) -> Result<Option<Track>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("poll {call} failed");
            }
            Ok(Some(Track::new("Muse", format!("Track {call}"))))
        }
    }

    struct Discard;

    impl Sink for Discard {
        fn name(&self) -> &str {
            "discard"
        }

        fn deliver(&self, _ctx: &Context, _track: Option<&Track>) -> Result<()> {
            Ok(())
        }
    }

    fn engine_with(fail: bool) -> (Engine, Arc<Counting>) {
        let source = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        });
        let mut engine = Engine::new(Registries::new());
        engine.add_source(source.clone());
        engine.add_sink(Arc::new(Discard));
        (engine, source)
    }

    fn cancel_after(engine: &mut Engine, token: &CancelToken, cycles: usize) {
        let token = token.clone();
        let seen = AtomicUsize::new(0);
        engine.events_mut().subscribe(
            EventKind::Done,
            listener(move |_: &Event<'_>| {
                if seen.fetch_add(1, Ordering::SeqCst) + 1 >= cycles {
                    token.cancel();
                }
                Ok(())
            }),
        );
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert!(matches!(Scheduler::new(0.0, 0.0), Err(ConfigError::InvalidInterval(_))));
        assert!(matches!(Scheduler::new(-5.0, 0.0), Err(ConfigError::InvalidInterval(_))));
        assert!(Scheduler::new(f64::NAN, 0.0).is_err());
        assert!(Scheduler::new(f64::INFINITY, 0.0).is_err());
        assert!(Scheduler::new(5.0, f64::NAN).is_err());
        assert!(Scheduler::new(0.25, -1.0).is_ok());
    }

    #[test]
    fn test_interval_bounds() {
        assert!(matches!(Scheduler::new(1e-9, 0.0), Err(ConfigError::InvalidInterval(_))));
        assert!(matches!(Scheduler::new(1e20, 0.0), Err(ConfigError::InvalidInterval(_))));
        assert!(matches!(Scheduler::new(5.0, 1e20), Err(ConfigError::Invalid(_))));
        assert!(matches!(Scheduler::new(5.0, -1e20), Err(ConfigError::Invalid(_))));

        assert!(Scheduler::new(MIN_INTERVAL, 0.0).is_ok());
        assert!(Scheduler::new(MAX_INTERVAL, MAX_INTERVAL).is_ok());
    }

    #[test]
    fn test_next_tick_at_epoch_scale() {
        let now = 1_700_000_000.5;
        let scheduler = Scheduler::new(MIN_INTERVAL, 0.0).unwrap();

        let next = scheduler.next_tick(scheduler.first_tick(now), now);
        assert!(next > now);
        assert!(next - now <= 2.0 * MIN_INTERVAL);

        // A tick far in the past lands just after now in one step
        let next = scheduler.next_tick(0.25, now);
        assert!(next > now);
        assert!(next - now <= 2.0 * MIN_INTERVAL);
    }

    #[test]
    fn test_longest_interval_can_be_cancelled() {
        let (mut engine, source) = engine_with(false);
        let token = CancelToken::new();
        cancel_after(&mut engine, &token, 1);

        let scheduler = Scheduler::new(MAX_INTERVAL, MAX_INTERVAL).unwrap();
        scheduler.run(&mut engine, &token);

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_tick_is_aligned() {
        let scheduler = Scheduler::new(5.0, 0.5).unwrap();
        assert_eq!(scheduler.first_tick(12.3), 10.5);
        assert_eq!(scheduler.first_tick(15.0), 15.5);
    }

    #[test]
    fn test_next_tick_skips_missed_ticks() {
        let scheduler = Scheduler::new(5.0, 0.5).unwrap();

        // On time: one interval ahead
        assert_eq!(scheduler.next_tick(10.5, 11.0), 15.5);
        // Long cycle: land on the first tick after now, no burst
        assert_eq!(scheduler.next_tick(10.5, 23.0), 25.5);
        // Exactly on a tick boundary still moves forward
        assert_eq!(scheduler.next_tick(10.5, 20.5), 25.5);
        // Already in the future: unchanged
        assert_eq!(scheduler.next_tick(30.5, 23.0), 30.5);
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let remote = token.clone();

        let started = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });

        assert!(token.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_sleep_times_out_when_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.sleep(Duration::from_millis(10)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();

        assert!(token.is_cancelled());
        assert!(token.sleep(Duration::from_secs(10)));
        assert!(token.sleep(Duration::from_secs(10)));
    }

    #[test]
    fn test_run_stops_when_cancelled() {
        let (mut engine, source) = engine_with(false);
        let token = CancelToken::new();
        cancel_after(&mut engine, &token, 3);

        Scheduler::new(0.01, 0.0).unwrap().run(&mut engine, &token);

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.last_track().unwrap().title, "Track 2");
    }

    #[test]
    fn test_run_survives_cycle_errors() {
        let (mut engine, source) = engine_with(true);
        let token = CancelToken::new();
        cancel_after(&mut engine, &token, 2);

        Scheduler::new(0.01, 0.0).unwrap().run(&mut engine, &token);

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(engine.last_track().is_none());
    }

    #[test]
    fn test_run_does_nothing_when_already_cancelled() {
        let (mut engine, source) = engine_with(false);
        let token = CancelToken::new();
        token.cancel();

        Scheduler::default().run(&mut engine, &token);

        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_run_once_returns_cycle_error() {
        let (mut engine, _source) = engine_with(true);
        assert!(matches!(
            Scheduler::run_once(&mut engine),
            Err(CycleError::Source { .. })
        ));
    }
}
