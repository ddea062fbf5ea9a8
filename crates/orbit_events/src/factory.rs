//! Named dispatcher constructors.
//!
//! A [`DispatcherFactory`] maps an identifier (the "kind") to a function that
//! builds a fresh, empty channel. Configuration selects the default channel
//! implementation by kind, so applications can plug their own dispatchers in
//! next to the built-in ones:
//!
//! | Kind | Implementation |
//! |------|----------------|
//! | `"event_dispatcher"` | [`EventDispatcher`] |
//! | `"traceable"` | [`TraceableEventDispatcher`] |

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::dispatcher::{Dispatcher, EventDispatcher};
use crate::traceable::TraceableEventDispatcher;

/// Shared constructor for a dispatcher kind.
pub type DispatcherConstructor = Arc<dyn Fn() -> Arc<dyn Dispatcher> + Send + Sync>;

/// Registry of dispatcher constructors keyed by kind.
#[derive(Clone)]
pub struct DispatcherFactory {
    constructors: HashMap<String, DispatcherConstructor>,
}

impl Default for DispatcherFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register(EventDispatcher::KIND, || {
            Arc::new(EventDispatcher::new()) as Arc<dyn Dispatcher>
        });
        factory.register(TraceableEventDispatcher::KIND, || {
            Arc::new(TraceableEventDispatcher::new()) as Arc<dyn Dispatcher>
        });
        factory
    }
}

impl DispatcherFactory {
    /// Creates a factory with the built-in kinds registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with no kinds registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registers `constructor` under `kind`, returning the constructor it replaced.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        constructor: impl Fn() -> Arc<dyn Dispatcher> + Send + Sync + 'static,
    ) -> Option<DispatcherConstructor> {
        self.constructors.insert(kind.into(), Arc::new(constructor))
    }

    /// Returns `true` if `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Builds a fresh dispatcher of the given kind.
    #[must_use]
    pub fn create(&self, kind: &str) -> Option<Arc<dyn Dispatcher>> {
        self.constructors.get(kind).map(|constructor| constructor())
    }

    /// Returns the registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for DispatcherFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherFactory")
            .field("kinds", &self.kinds())
            .finish()
    }
}
