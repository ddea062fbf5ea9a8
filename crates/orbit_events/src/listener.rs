//! Listener types.
//!
//! A listener is a named handler registered against an event name on a
//! [`Dispatcher`](crate::Dispatcher). It receives the [`GenericEvent`] and
//! returns a [`Propagation`] decision, or an error which aborts the pass.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::event::GenericEvent;

/// Error raised by a listener.
pub type ListenerError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Return type of a listener invocation.
pub type ListenerResult = Result<Propagation, ListenerError>;

// ─────────────────────────────────────────────────────────────────────────────
// Propagation
// ─────────────────────────────────────────────────────────────────────────────

/// Decision returned by a listener after handling an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Propagation {
    /// Keep notifying the remaining listeners.
    #[default]
    Continue,
    /// Skip the remaining listeners and report the pass as stopped.
    Stop,
}

impl Propagation {
    /// Returns `true` for [`Propagation::Stop`].
    #[must_use]
    pub fn is_stop(self) -> bool {
        matches!(self, Propagation::Stop)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ListenerId
// ─────────────────────────────────────────────────────────────────────────────

/// Process-unique identifier assigned to a listener at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BoxedListener
// ─────────────────────────────────────────────────────────────────────────────

/// Type-erased listener that receives `&GenericEvent` directly.
///
/// Most users register closures through
/// [`DispatcherExt::listen`](crate::DispatcherExt::listen) or
/// [`DispatcherExt::observe`](crate::DispatcherExt::observe) instead of
/// creating `BoxedListener` directly.
pub struct BoxedListener {
    handler: Box<dyn Fn(&GenericEvent<'_>) -> ListenerResult + Send + Sync>,
}

impl BoxedListener {
    /// Wraps a handler that decides propagation.
    #[must_use]
    pub fn new(
        handler: impl Fn(&GenericEvent<'_>) -> ListenerResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Wraps a handler that only observes; it always continues propagation.
    #[must_use]
    pub fn observer(handler: impl Fn(&GenericEvent<'_>) + Send + Sync + 'static) -> Self {
        Self::new(move |event| {
            handler(event);
            Ok(Propagation::Continue)
        })
    }

    /// Invokes the listener.
    pub fn invoke(&self, event: &GenericEvent<'_>) -> ListenerResult {
        (self.handler)(event)
    }
}

impl fmt::Debug for BoxedListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedListener").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ListenerEntry
// ─────────────────────────────────────────────────────────────────────────────

/// Registered listener together with its metadata.
#[derive(Debug)]
pub struct ListenerEntry {
    id: ListenerId,
    /// Human-readable name, unique per event name on a dispatcher.
    name: String,
    listener: BoxedListener,
}

impl ListenerEntry {
    /// Creates an entry with a fresh [`ListenerId`].
    #[must_use]
    pub fn new(name: impl Into<String>, listener: BoxedListener) -> Self {
        Self {
            id: ListenerId::next(),
            name: name.into(),
            listener,
        }
    }

    /// Returns the listener identifier.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns the listener name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the listener.
    pub fn invoke(&self, event: &GenericEvent<'_>) -> ListenerResult {
        self.listener.invoke(event)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ListenerRegistrationError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while registering or removing listeners.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerRegistrationError {
    /// A listener with this name already exists for the event.
    #[error("listener '{name}' already registered for event '{event}'")]
    DuplicateName {
        /// The event where the duplicate was found.
        event: String,
        /// The duplicate listener name.
        name: String,
    },

    /// The dispatcher does not accept changes to its listeners.
    #[error("dispatcher '{kind}' is immutable: cannot change listener '{name}' for event '{event}'")]
    Immutable {
        /// Kind of the rejecting dispatcher.
        kind: &'static str,
        /// The event the change targeted.
        event: String,
        /// The listener name.
        name: String,
    },
}
