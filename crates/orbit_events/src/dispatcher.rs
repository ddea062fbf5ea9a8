//! The [`Dispatcher`] channel trait and its default implementation.
//!
//! A dispatcher maps event names to ordered lists of named listeners.
//! [`Dispatcher::dispatch`] notifies them synchronously on the calling
//! thread.
//!
//! # Ordering
//!
//! Listeners run in registration order (first registered, first notified).
//! Removing a listener keeps the relative order of the others.
//!
//! # Reentrancy
//!
//! A dispatch pass iterates a snapshot of the listener list taken when the
//! pass began, and no lock is held while listeners run. A listener may
//! therefore dispatch again (nested pass) or register further listeners;
//! new registrations take effect from the next pass.
//!
//! # Example
//!
//! ```
//! use orbit_events::{
//!     Dispatcher, DispatcherExt, DispatchOutcome, EventDispatcher, GenericEvent, Propagation,
//! };
//!
//! let dispatcher = EventDispatcher::new();
//! dispatcher
//!     .listen("order.pre_submit", "limit", |event: &GenericEvent<'_>| {
//!         let amount = event.subject_as::<u32>().copied().unwrap_or_default();
//!         Ok(if amount > 100 { Propagation::Stop } else { Propagation::Continue })
//!     })
//!     .unwrap();
//!
//! let outcome = dispatcher.dispatch("order.pre_submit", &GenericEvent::new(&500_u32)).unwrap();
//! assert_eq!(outcome.stopped_by(), Some("limit"));
//! ```

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::event::GenericEvent;
use crate::listener::{
    BoxedListener, ListenerEntry, ListenerError, ListenerId, ListenerRegistrationError,
    ListenerResult, Propagation,
};

// ─────────────────────────────────────────────────────────────────────────────
// DispatchOutcome / DispatchError
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a dispatch pass that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every listener ran and none stopped propagation.
    Completed {
        /// Number of listeners invoked.
        listeners_called: usize,
    },
    /// A listener stopped propagation; later listeners were skipped.
    Stopped {
        /// Name of the listener that stopped propagation.
        listener: String,
        /// Number of listeners invoked, including the stopping one.
        listeners_called: usize,
    },
}

impl DispatchOutcome {
    /// Returns `true` if a listener stopped propagation.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, DispatchOutcome::Stopped { .. })
    }

    /// Returns the name of the listener that stopped propagation, if any.
    #[must_use]
    pub fn stopped_by(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Stopped { listener, .. } => Some(listener),
            DispatchOutcome::Completed { .. } => None,
        }
    }

    /// Returns the number of listeners invoked.
    #[must_use]
    pub fn listeners_called(&self) -> usize {
        match self {
            DispatchOutcome::Completed { listeners_called }
            | DispatchOutcome::Stopped {
                listeners_called, ..
            } => *listeners_called,
        }
    }
}

/// Error returned when a listener fails during dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A listener returned an error; later listeners were skipped.
    #[error("listener '{listener}' failed on event '{event}': {source}")]
    Listener {
        /// The event being dispatched.
        event: String,
        /// Name of the failing listener.
        listener: String,
        /// The listener's error.
        #[source]
        source: ListenerError,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// An event channel: named listeners per event name, synchronous dispatch.
///
/// Implementations are shared as `Arc<dyn Dispatcher>` and use interior
/// mutability for registration.
pub trait Dispatcher: Send + Sync + 'static {
    /// Identifier of this implementation (e.g. `"event_dispatcher"`).
    fn kind(&self) -> &'static str;

    /// Registers a listener for `event` under `name`.
    ///
    /// Names must be unique per event on a dispatcher.
    fn add_listener(
        &self,
        event: &str,
        name: &str,
        listener: BoxedListener,
    ) -> Result<ListenerId, ListenerRegistrationError>;

    /// Removes the listener named `name` from `event`.
    ///
    /// Returns `Ok(false)` if no such listener was registered.
    fn remove_listener(&self, event: &str, name: &str) -> Result<bool, ListenerRegistrationError>;

    /// Returns a snapshot of the listeners registered for `event`, in
    /// registration order.
    fn listeners(&self, event: &str) -> Vec<Arc<ListenerEntry>>;

    /// Returns the event names that have at least one listener, sorted.
    fn event_names(&self) -> Vec<String>;

    /// Notifies every listener registered for `event_name`.
    fn dispatch(
        &self,
        event_name: &str,
        event: &GenericEvent<'_>,
    ) -> Result<DispatchOutcome, DispatchError>;

    /// Returns the number of listeners registered for `event`.
    fn listener_count(&self, event: &str) -> usize {
        self.listeners(event).len()
    }

    /// Returns `true` if any listener is registered for `event`.
    fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Returns `true` if a listener named `name` is registered for `event`.
    fn contains_listener(&self, event: &str, name: &str) -> bool {
        self.listeners(event)
            .iter()
            .any(|entry| entry.name() == name)
    }
}

/// Closure-based registration helpers for every [`Dispatcher`].
pub trait DispatcherExt: Dispatcher {
    /// Registers a listener that decides propagation.
    fn listen<F>(
        &self,
        event: &str,
        name: &str,
        listener: F,
    ) -> Result<ListenerId, ListenerRegistrationError>
    where
        F: Fn(&GenericEvent<'_>) -> ListenerResult + Send + Sync + 'static,
    {
        self.add_listener(event, name, BoxedListener::new(listener))
    }

    /// Registers a listener that only observes.
    fn observe<F>(
        &self,
        event: &str,
        name: &str,
        listener: F,
    ) -> Result<ListenerId, ListenerRegistrationError>
    where
        F: Fn(&GenericEvent<'_>) + Send + Sync + 'static,
    {
        self.add_listener(event, name, BoxedListener::observer(listener))
    }
}

impl<D: Dispatcher + ?Sized> DispatcherExt for D {}

/// Runs `entries` in order against `event`.
///
/// `after_call` is invoked with each listener's result before the outcome is
/// decided, so wrappers can record which listeners ran.
pub(crate) fn run_listeners(
    event_name: &str,
    entries: &[Arc<ListenerEntry>],
    event: &GenericEvent<'_>,
    mut after_call: impl FnMut(&ListenerEntry, &ListenerResult),
) -> Result<DispatchOutcome, DispatchError> {
    let mut listeners_called = 0;

    for entry in entries {
        tracing::trace!(event = event_name, listener = entry.name(), "invoking listener");
        let result = entry.invoke(event);
        listeners_called += 1;
        after_call(entry, &result);

        match result {
            Ok(Propagation::Continue) => {}
            Ok(Propagation::Stop) => {
                return Ok(DispatchOutcome::Stopped {
                    listener: entry.name().to_owned(),
                    listeners_called,
                });
            }
            Err(source) => {
                return Err(DispatchError::Listener {
                    event: event_name.to_owned(),
                    listener: entry.name().to_owned(),
                    source,
                });
            }
        }
    }

    Ok(DispatchOutcome::Completed { listeners_called })
}

// ─────────────────────────────────────────────────────────────────────────────
// EventDispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Default dispatcher.
///
/// # Thread Safety
///
/// Registration takes a write lock on the listener map; dispatch takes a
/// read lock only long enough to clone the listener list for the event.
#[derive(Default)]
pub struct EventDispatcher {
    /// Maps event name to its listeners in registration order.
    listeners: RwLock<HashMap<String, Vec<Arc<ListenerEntry>>>>,
}

impl EventDispatcher {
    /// Identifier of this implementation.
    pub const KIND: &'static str = "event_dispatcher";

    /// Creates a dispatcher with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }
}

impl core::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("events", &self.event_names())
            .finish()
    }
}

impl Dispatcher for EventDispatcher {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn add_listener(
        &self,
        event: &str,
        name: &str,
        listener: BoxedListener,
    ) -> Result<ListenerId, ListenerRegistrationError> {
        let mut listeners = self.listeners.write();
        let entries = listeners.entry(event.to_owned()).or_default();

        // Check for duplicate names
        if entries.iter().any(|entry| entry.name() == name) {
            return Err(ListenerRegistrationError::DuplicateName {
                event: event.to_owned(),
                name: name.to_owned(),
            });
        }

        let entry = ListenerEntry::new(name, listener);
        let id = entry.id();
        entries.push(Arc::new(entry));
        Ok(id)
    }

    fn remove_listener(&self, event: &str, name: &str) -> Result<bool, ListenerRegistrationError> {
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(event) else {
            return Ok(false);
        };

        let before = entries.len();
        entries.retain(|entry| entry.name() != name);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(event);
        }
        Ok(removed)
    }

    fn listeners(&self, event: &str) -> Vec<Arc<ListenerEntry>> {
        self.listeners
            .read()
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn dispatch(
        &self,
        event_name: &str,
        event: &GenericEvent<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        // Snapshot, then release the lock before any listener runs.
        let entries = self.listeners(event_name);
        run_listeners(event_name, &entries, event, |_, _| {})
    }

    fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }
}
