//! # Engine
//!
//! The engine owns the source, processor and sink chains, the event bus, the
//! plugin [`Context`] and the last delivered track. Each call to
//! [`Engine::cycle`] runs the whole pipeline once:
//!
//! 1. **Seek**: ask every source (in priority order) for the current track;
//!    the first valid answer wins.
//! 2. **Cache fallback**: if nobody answered, ask the same sources, in the
//!    same order, for their cached track.
//! 3. **Change check**: if the result is equivalent to the last delivered
//!    track, stop here. Sinks never see the same song twice in a row.
//! 4. **Process**: run the result through every processor; each may return a
//!    replacement.
//! 5. **Deliver**: hand the result (or its absence) to every sink.
//! 6. **Commit**: remember the delivered track.
//!
//! Any plugin or listener error aborts the cycle on the spot: later steps do
//! not run and nothing is committed. The error is published on the `done`
//! channel and returned to the caller (normally the
//! [`Scheduler`](crate::scheduler::Scheduler), which logs it and carries on).

use log::{debug, info, warn};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use crate::chain::PriorityChain;
use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::{ConfigError, CycleError};
use crate::events::{Event, EventBus};
use crate::plugin::{Context, Processor, Sink, Source};
use crate::registry::Registries;
use crate::scheduler::Scheduler;
use crate::track::{equivalent, validated, Track};

/// Read-only, cloneable view of the engine's last delivered track.
///
/// Safe to read from other threads; only the engine's commit step writes it,
/// and it does so with a single replacement.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    last_track: Arc<RwLock<Option<Track>>>,
}

impl StateHandle {
    /// Copy of the last track delivered to the sinks.
    pub fn last_track(&self) -> Option<Track> {
        self.read().clone()
    }

    fn is_current(&self, track: Option<&Track>) -> bool {
        equivalent(track, self.read().as_ref())
    }

    fn commit(&self, track: Option<Track>) {
        *self
            .last_track
            .write()
            .unwrap_or_else(PoisonError::into_inner) = track;
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Track>> {
        self.last_track.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The pipeline orchestrator.
pub struct Engine {
    registries: Registries,
    sources: PriorityChain<dyn Source>,
    processors: PriorityChain<dyn Processor>,
    sinks: PriorityChain<dyn Sink>,
    events: EventBus,
    context: Context,
    scheduler: Scheduler,
    state: StateHandle,
}

impl Engine {
    /// Create an engine that builds plugins from `registries`.
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            sources: PriorityChain::new(),
            processors: PriorityChain::new(),
            sinks: PriorityChain::new(),
            events: EventBus::new(),
            context: Context::default(),
            scheduler: Scheduler::default(),
            state: StateHandle::default(),
        }
    }

    /// Build all plugins named in `config` and replace the current chains.
    ///
    /// Nothing changes unless the whole configuration is valid.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptySection`] if `inputs` or `outputs` is empty
    /// - [`ConfigError::UnknownType`] for unregistered plugin names
    /// - [`ConfigError::Plugin`] if a plugin rejects its options
    /// - [`ConfigError::InvalidInterval`] / [`ConfigError::Invalid`] for bad
    ///   timing values
    pub fn apply_config(&mut self, config: &Config) -> Result<(), ConfigError> {
        let scheduler = Scheduler::new(config.interval, config.interval_offset)?;

        let download_timeout = Duration::try_from_secs_f64(config.download_timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "download_timeout must be a positive number of seconds, got {}",
                    config.download_timeout
                ))
            })?;

        let inputs = config.input_entries()?;
        if inputs.is_empty() {
            return Err(ConfigError::EmptySection("inputs"));
        }
        let outputs = config.output_entries()?;
        if outputs.is_empty() {
            return Err(ConfigError::EmptySection("outputs"));
        }

        let mut sources = PriorityChain::new();
        for entry in &inputs {
            sources.add(self.registries.sources.build(&entry.type_name, &entry.options)?);
        }
        let mut processors = PriorityChain::new();
        for entry in &config.processor_entries()? {
            processors.add(self.registries.processors.build(&entry.type_name, &entry.options)?);
        }
        let mut sinks = PriorityChain::new();
        for entry in &outputs {
            sinks.add(self.registries.sinks.build(&entry.type_name, &entry.options)?);
        }

        sources.sort();
        processors.sort();
        sinks.sort();

        self.sources = sources;
        self.processors = processors;
        self.sinks = sinks;
        self.scheduler = scheduler;
        self.context
            .set_downloader(Downloader::new(download_timeout, config.user_agent.clone()));

        info!(
            "Configured {} source(s), {} processor(s), {} sink(s)",
            self.sources.len(),
            self.processors.len(),
            self.sinks.len()
        );
        Ok(())
    }

    /// Add a source instance directly and re-sort the chain.
    pub fn add_source(&mut self, source: Arc<dyn Source>) -> bool {
        let added = self.sources.add(source);
        self.sources.sort();
        added
    }

    pub fn add_processor(&mut self, processor: Arc<dyn Processor>) -> bool {
        let added = self.processors.add(processor);
        self.processors.sort();
        added
    }

    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) -> bool {
        let added = self.sinks.add(sink);
        self.sinks.sort();
        added
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn sources(&self) -> &PriorityChain<dyn Source> {
        &self.sources
    }

    pub fn processors(&self) -> &PriorityChain<dyn Processor> {
        &self.processors
    }

    pub fn sinks(&self) -> &PriorityChain<dyn Sink> {
        &self.sinks
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe and unsubscribe listeners.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Timing taken from the last applied configuration.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler
    }

    /// Handle for reading the last delivered track from anywhere.
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn last_track(&self) -> Option<Track> {
        self.state.last_track()
    }

    /// Run one full cycle.
    ///
    /// The outcome is published on the `done` channel before it is returned.
    pub fn cycle(&mut self) -> Result<(), CycleError> {
        let result = self.run_cycle();

        match &result {
            Ok(()) => self.events.publish(&Event::Done { error: None })?,
            Err(error) => {
                if let Err(listener_error) = self.events.publish(&Event::Done { error: Some(error) }) {
                    warn!("Listener failed while reporting a cycle error: {listener_error}");
                }
            }
        }

        result
    }

    fn run_cycle(&self) -> Result<(), CycleError> {
        self.events.publish(&Event::Start)?;

        let found = self.seek()?;
        self.events.publish(&Event::InputEnd {
            track: found.as_ref(),
        })?;

        if self.state.is_current(found.as_ref()) {
            debug!("Nothing changed since the last cycle");
            return Ok(());
        }

        let track = match found {
            Some(track) => Some(self.process(track)?),
            None => None,
        };

        self.deliver(track.as_ref())?;

        match &track {
            Some(track) => info!("Now playing: {track}"),
            None => info!("Nothing playing"),
        }
        self.state.commit(track);
        Ok(())
    }

    /// Source seek followed, if needed, by the cache fallback pass.
    fn seek(&self) -> Result<Option<Track>, CycleError> {
        self.events.publish(&Event::InputStart)?;

        for cached in [false, true] {
            for source in &self.sources {
                let name = source.name();
                self.events.publish(&Event::Input {
                    source: name,
                    cached,
                })?;

                let answer = if cached {
                    source.cached_track(&self.context)
                } else {
                    source.grab_current(&self.context)
                }
                .map_err(|error| CycleError::Source {
                    name: name.to_string(),
                    source: error,
                })?;

                if let Some(mut track) = validated(answer) {
                    debug!("Source `{name}` answered{}: {track}", if cached { " from cache" } else { "" });
                    if track.source_id.is_none() {
                        track.source_id = Some(name.to_string());
                    }
                    return Ok(Some(track));
                }
            }
        }

        debug!("No source knows what is playing");
        Ok(None)
    }

    fn process(&self, mut track: Track) -> Result<Track, CycleError> {
        self.events.publish(&Event::ProcessStart { track: &track })?;

        for processor in &self.processors {
            let name = processor.name();
            self.events.publish(&Event::Process {
                processor: name,
                track: &track,
            })?;

            let replacement = processor
                .apply(&self.context, &track)
                .map_err(|error| CycleError::Processor {
                    name: name.to_string(),
                    source: error,
                })?;

            if let Some(replacement) = replacement {
                debug!("Processor `{name}` replaced the track");
                track = replacement;
            }
        }

        self.events.publish(&Event::ProcessEnd { track: &track })?;
        Ok(track)
    }

    fn deliver(&self, track: Option<&Track>) -> Result<(), CycleError> {
        self.events.publish(&Event::OutputStart { track })?;

        for sink in &self.sinks {
            let name = sink.name();
            self.events.publish(&Event::Output { sink: name, track })?;

            sink.deliver(&self.context, track)
                .map_err(|error| CycleError::Sink {
                    name: name.to_string(),
                    source: error,
                })?;
            debug!("Delivered to sink `{name}`");
        }

        self.events.publish(&Event::OutputEnd { track })?;
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Registries::with_builtins())
    }
}
