//! Synchronous event dispatch primitives for Orbit (Layer 1).
//!
//! `orbit_events` provides the observer-pattern channel that lifecycle
//! notifications are delivered through:
//!
//! - [`event`] - [`GenericEvent`] payload carrying a borrowed subject and an
//!   extensible argument map
//! - [`listener`] - Named listeners, [`Propagation`] control and registration errors
//! - [`dispatcher`] - The [`Dispatcher`] channel trait and the default
//!   [`EventDispatcher`]
//! - [`traceable`] - A dispatcher that records every dispatch pass
//! - [`immutable`] - A read-only view over another dispatcher
//! - [`factory`] - Named constructors used to pick a channel implementation
//!   by identifier
//!
//! # Design Principles
//!
//! - Listeners execute synchronously, on the calling thread, in registration order
//! - A listener may stop propagation; remaining listeners are skipped
//! - A failing listener aborts the pass and the error is returned to the caller
//! - Each pass iterates a snapshot of the listener list taken when it began,
//!   so listeners may dispatch or register reentrantly
//!
//! # Architecture
//!
//! - **Layer 1** (`orbit_events`): generic event channel (this crate)
//! - **Layer 2** (`orbit_model`): lifecycle phases, per-model channel
//!   ownership and emission around persistence operations
//!
//! # Example
//!
//! ```
//! use orbit_events::{Dispatcher, DispatcherExt, EventDispatcher, GenericEvent};
//!
//! let dispatcher = EventDispatcher::new();
//! dispatcher
//!     .observe("user.created", "audit", |event: &GenericEvent<'_>| {
//!         assert!(event.subject_as::<String>().is_some());
//!     })
//!     .unwrap();
//!
//! let subject = String::from("alice");
//! let outcome = dispatcher
//!     .dispatch("user.created", &GenericEvent::new(&subject))
//!     .unwrap();
//! assert_eq!(outcome.listeners_called(), 1);
//! ```

/// Default dispatcher and the channel trait.
pub mod dispatcher;

/// Generic event payload.
pub mod event;

/// Named dispatcher constructors.
pub mod factory;

/// Read-only dispatcher wrapper.
pub mod immutable;

/// Listener types and registration errors.
pub mod listener;

/// Recording dispatcher.
pub mod traceable;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher, DispatcherExt, EventDispatcher};
pub use event::{ArgumentValue, Arguments, GenericEvent};
pub use factory::{DispatcherConstructor, DispatcherFactory};
pub use immutable::ImmutableEventDispatcher;
pub use listener::{
    BoxedListener, ListenerEntry, ListenerError, ListenerId, ListenerRegistrationError,
    ListenerResult, Propagation,
};
pub use traceable::{DispatchRecord, RecordedOutcome, TraceableEventDispatcher};
