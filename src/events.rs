//! # Event Bus
//!
//! Synchronous notifications about what the engine is doing. The channel set
//! is closed (see [`EventKind`]); listeners run on the engine's thread, in the
//! order they subscribed, and the first listener error stops the publish.
//!
//! External observers (a tray icon, a status bar) subscribe to
//! [`EventKind::Done`] and read the engine's
//! [`StateHandle`](crate::engine::StateHandle); this is the only way to
//! observe the engine without changing it.
//!
//! ```
//! use nowplaying::events::{listener, Event, EventBus, EventKind};
//!
//! let mut bus = EventBus::new();
//! bus.subscribe_named("done", listener(|event: &Event<'_>| {
//!     if let Event::Done { error: Some(error) } = event {
//!         eprintln!("cycle failed: {error}");
//!     }
//!     Ok(())
//! }))?;
//!
//! assert_eq!(bus.listener_count(EventKind::Done), 1);
//! assert!(bus.subscribe_named("finished", listener(|_: &Event<'_>| Ok(()))).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{CycleError, EventError};
use crate::track::Track;

/// Names of the fixed event channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    InputStart,
    Input,
    InputEnd,
    ProcessStart,
    Process,
    ProcessEnd,
    OutputStart,
    Output,
    OutputEnd,
    Done,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::Start,
        EventKind::InputStart,
        EventKind::Input,
        EventKind::InputEnd,
        EventKind::ProcessStart,
        EventKind::Process,
        EventKind::ProcessEnd,
        EventKind::OutputStart,
        EventKind::Output,
        EventKind::OutputEnd,
        EventKind::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::InputStart => "inputStart",
            EventKind::Input => "input",
            EventKind::InputEnd => "inputEnd",
            EventKind::ProcessStart => "processStart",
            EventKind::Process => "process",
            EventKind::ProcessEnd => "processEnd",
            EventKind::OutputStart => "outputStart",
            EventKind::Output => "output",
            EventKind::OutputEnd => "outputEnd",
            EventKind::Done => "done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| EventError::UnknownEvent(name.to_string()))
    }
}

/// A notification together with its payload.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// A cycle is starting
    Start,
    /// Source seeking is about to begin
    InputStart,
    /// A source is about to be asked; `cached` marks the fallback pass
    Input { source: &'a str, cached: bool },
    /// Source seeking finished with this (validated) result
    InputEnd { track: Option<&'a Track> },
    ProcessStart { track: &'a Track },
    /// A processor is about to run on `track`
    Process { processor: &'a str, track: &'a Track },
    ProcessEnd { track: &'a Track },
    OutputStart { track: Option<&'a Track> },
    /// A sink is about to receive `track`
    Output { sink: &'a str, track: Option<&'a Track> },
    OutputEnd { track: Option<&'a Track> },
    /// The cycle finished; `error` is set when it was aborted
    Done { error: Option<&'a CycleError> },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start => EventKind::Start,
            Event::InputStart => EventKind::InputStart,
            Event::Input { .. } => EventKind::Input,
            Event::InputEnd { .. } => EventKind::InputEnd,
            Event::ProcessStart { .. } => EventKind::ProcessStart,
            Event::Process { .. } => EventKind::Process,
            Event::ProcessEnd { .. } => EventKind::ProcessEnd,
            Event::OutputStart { .. } => EventKind::OutputStart,
            Event::Output { .. } => EventKind::Output,
            Event::OutputEnd { .. } => EventKind::OutputEnd,
            Event::Done { .. } => EventKind::Done,
        }
    }
}

/// A subscribed callback. Identity (for dedup and unsubscribe) is the `Arc`.
pub type Listener = Arc<dyn Fn(&Event<'_>) -> Result<()> + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Event<'_>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Fixed set of broadcast channels with synchronous delivery.
#[derive(Default)]
pub struct EventBus {
    channels: HashMap<EventKind, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `kind`. Subscribing the same listener twice
    /// has no effect.
    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) {
        let listeners = self.channels.entry(kind).or_default();
        if !listeners.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            listeners.push(listener);
        }
    }

    /// Subscribe by channel name, e.g. `"inputEnd"`.
    pub fn subscribe_named(&mut self, name: &str, listener: Listener) -> Result<(), EventError> {
        let kind = name.parse()?;
        self.subscribe(kind, listener);
        Ok(())
    }

    /// Remove `listener` from `kind`; unknown listeners are ignored.
    pub fn unsubscribe(&mut self, kind: EventKind, listener: &Listener) {
        if let Some(listeners) = self.channels.get_mut(&kind) {
            listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        }
    }

    pub fn unsubscribe_named(&mut self, name: &str, listener: &Listener) -> Result<(), EventError> {
        let kind = name.parse()?;
        self.unsubscribe(kind, listener);
        Ok(())
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.channels.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its channel, in subscription
    /// order. Stops at the first listener error and returns it.
    pub fn publish(&self, event: &Event<'_>) -> Result<(), CycleError> {
        let kind = event.kind();
        let Some(listeners) = self.channels.get(&kind) else {
            return Ok(());
        };

        for listener in listeners {
            listener(event).map_err(|source| CycleError::Listener { event: kind, source })?;
        }
        Ok(())
    }
}
