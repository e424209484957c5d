//! # Priority Chains
//!
//! Ordered lists of plugin instances of one category. Lower priority values
//! run first; plugins with equal priority keep the order they were added in.

use std::sync::Arc;

use crate::plugin::{Processor, Sink, Source};

/// Anything that can be ordered in a [`PriorityChain`].
pub trait Prioritized {
    fn priority(&self) -> i32;
}

impl Prioritized for dyn Source {
    fn priority(&self) -> i32 {
        Source::priority(self)
    }
}

impl Prioritized for dyn Processor {
    fn priority(&self) -> i32 {
        Processor::priority(self)
    }
}

impl Prioritized for dyn Sink {
    fn priority(&self) -> i32 {
        Sink::priority(self)
    }
}

/// Stable-sorted sequence of plugin instances.
pub struct PriorityChain<T: ?Sized> {
    plugins: Vec<Arc<T>>,
}

impl<T: ?Sized + Prioritized> PriorityChain<T> {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Append `plugin` unless this exact instance is already in the chain.
    ///
    /// Returns `false` when the instance was already present.
    pub fn add(&mut self, plugin: Arc<T>) -> bool {
        if self.plugins.iter().any(|existing| Arc::ptr_eq(existing, &plugin)) {
            return false;
        }
        self.plugins.push(plugin);
        true
    }

    /// Stable sort by ascending priority.
    pub fn sort(&mut self) {
        self.plugins.sort_by_key(|plugin| plugin.priority());
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl<T: ?Sized + Prioritized> Default for PriorityChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: ?Sized + Prioritized> IntoIterator for &'a PriorityChain<T> {
    type Item = &'a Arc<T>;
    type IntoIter = std::slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.plugins.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Context;
    use crate::track::Track;
    use anyhow::Result;

    struct Named {
        label: &'static str,
        priority: i32,
    }

    impl Sink for Named {
        fn name(&self) -> &str {
            self.label
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn deliver(&self, _ctx: &Context, _track: Option<&Track>) -> Result<()> {
            Ok(())
        }
    }

    fn sink(label: &'static str, priority: i32) -> Arc<dyn Sink> {
        Arc::new(Named { label, priority })
    }

    fn labels(chain: &PriorityChain<dyn Sink>) -> Vec<&str> {
        chain.iter().map(|plugin| plugin.name()).collect()
    }

    #[test]
    fn test_sort_is_stable() {
        let mut chain = PriorityChain::<dyn Sink>::new();
        chain.add(sink("first-50", 50));
        chain.add(sink("only-40", 40));
        chain.add(sink("second-50", 50));

        chain.sort();

        assert_eq!(labels(&chain), vec!["only-40", "first-50", "second-50"]);
    }

    #[test]
    fn test_negative_priorities_run_first() {
        let mut chain = PriorityChain::<dyn Sink>::new();
        chain.add(sink("default", 50));
        chain.add(sink("early", -10));
        chain.add(sink("late", 100));

        chain.sort();

        assert_eq!(labels(&chain), vec!["early", "default", "late"]);
    }

    #[test]
    fn test_add_ignores_same_instance() {
        let mut chain = PriorityChain::<dyn Sink>::new();
        let shared = sink("shared", 50);

        assert!(chain.add(shared.clone()));
        assert!(!chain.add(shared));
        // A different instance with identical settings is still added
        assert!(chain.add(sink("shared", 50)));

        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_empty_chain() {
        let mut chain = PriorityChain::<dyn Sink>::default();
        chain.sort();
        assert!(chain.is_empty());
        assert_eq!(chain.iter().count(), 0);
    }
}
