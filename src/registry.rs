//! # Plugin Registries
//!
//! A [`PluginRegistry`] maps plugin type names to factories for one
//! [`Category`]. The three registries are bundled in [`Registries`], which is
//! an ordinary value handed to the engine: two engines never share
//! registrations.
//!
//! ```
//! use std::sync::Arc;
//! use nowplaying::plugin::{Context, PluginOptions, Sink};
//! use nowplaying::registry::Registries;
//! use nowplaying::track::Track;
//!
//! struct Quiet;
//!
//! impl Sink for Quiet {
//!     fn name(&self) -> &str { "quiet" }
//!     fn deliver(&self, _ctx: &Context, _track: Option<&Track>) -> anyhow::Result<()> { Ok(()) }
//! }
//!
//! let mut registries = Registries::new();
//! registries.sinks.register("quiet", |_opts: &PluginOptions| {
//!     Ok(Arc::new(Quiet) as Arc<dyn Sink>)
//! })?;
//!
//! let sink = registries.sinks.build("quiet", &PluginOptions::default())?;
//! assert_eq!(sink.name(), "quiet");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::plugin::{Category, PluginOptions, Processor, Sink, Source};
use crate::plugins;

/// Builds a plugin instance from its configuration entry.
pub type Factory<T> = Box<dyn Fn(&PluginOptions) -> Result<Arc<T>> + Send + Sync>;

/// Name → factory mapping for one plugin category.
pub struct PluginRegistry<T: ?Sized> {
    category: Category,
    factories: BTreeMap<String, Factory<T>>,
}

impl<T: ?Sized> PluginRegistry<T> {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            factories: BTreeMap::new(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Register a factory under `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateName`] if `name` is already taken; use
    /// [`register_override`](Self::register_override) to replace a factory on
    /// purpose.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(&PluginOptions) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(ConfigError::DuplicateName {
                category: self.category,
                name: name.to_string(),
            });
        }
        self.register_override(name, factory);
        Ok(())
    }

    /// Register a factory, replacing any existing one with the same name.
    pub fn register_override<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&PluginOptions) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        debug!("Registering {} type `{name}`", self.category);
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build an instance of the plugin registered as `name`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownType`] if nothing is registered under `name`
    /// - [`ConfigError::Plugin`] if the factory rejects the options
    pub fn build(&self, name: &str, options: &PluginOptions) -> Result<Arc<T>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownType {
                category: self.category,
                name: name.to_string(),
            })?;

        factory(options).map_err(|source| ConfigError::Plugin {
            category: self.category,
            name: name.to_string(),
            source,
        })
    }
}

/// The source, processor and sink registries of one engine.
pub struct Registries {
    pub sources: PluginRegistry<dyn Source>,
    pub processors: PluginRegistry<dyn Processor>,
    pub sinks: PluginRegistry<dyn Sink>,
}

impl Registries {
    /// Empty registries.
    pub fn new() -> Self {
        Self {
            sources: PluginRegistry::new(Category::Source),
            processors: PluginRegistry::new(Category::Processor),
            sinks: PluginRegistry::new(Category::Sink),
        }
    }

    /// Registries pre-populated with the plugins shipped in [`crate::plugins`].
    pub fn with_builtins() -> Self {
        let mut registries = Self::new();
        plugins::register_builtins(&mut registries);
        registries
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
