//! Read-only view over another dispatcher.
//!
//! [`ImmutableEventDispatcher`] forwards dispatch to the wrapped channel and
//! rejects every attempt to add or remove listeners with
//! [`ListenerRegistrationError::Immutable`]. Install it once the listener set
//! of a channel is final.

use std::sync::Arc;

use crate::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
use crate::event::GenericEvent;
use crate::listener::{BoxedListener, ListenerEntry, ListenerId, ListenerRegistrationError};

/// Dispatcher that refuses listener changes.
pub struct ImmutableEventDispatcher {
    inner: Arc<dyn Dispatcher>,
}

impl ImmutableEventDispatcher {
    /// Identifier of this implementation.
    pub const KIND: &'static str = "immutable";

    /// Freezes `inner`. Listeners already registered on it keep running.
    #[must_use]
    pub fn new(inner: Arc<dyn Dispatcher>) -> Self {
        Self { inner }
    }

    /// Returns the wrapped dispatcher.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Dispatcher> {
        &self.inner
    }
}

impl Dispatcher for ImmutableEventDispatcher {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn add_listener(
        &self,
        event: &str,
        name: &str,
        _listener: BoxedListener,
    ) -> Result<ListenerId, ListenerRegistrationError> {
        Err(ListenerRegistrationError::Immutable {
            kind: Self::KIND,
            event: event.to_owned(),
            name: name.to_owned(),
        })
    }

    fn remove_listener(&self, event: &str, name: &str) -> Result<bool, ListenerRegistrationError> {
        Err(ListenerRegistrationError::Immutable {
            kind: Self::KIND,
            event: event.to_owned(),
            name: name.to_owned(),
        })
    }

    fn listeners(&self, event: &str) -> Vec<Arc<ListenerEntry>> {
        self.inner.listeners(event)
    }

    fn event_names(&self) -> Vec<String> {
        self.inner.event_names()
    }

    fn dispatch(
        &self,
        event_name: &str,
        event: &GenericEvent<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.inner.dispatch(event_name, event)
    }
}
