//! A dispatcher that records every dispatch pass.
//!
//! [`TraceableEventDispatcher`] behaves exactly like [`EventDispatcher`] and
//! additionally keeps a [`DispatchRecord`] per pass: which listeners ran, in
//! which order, and how the pass ended. Each pass also runs inside a
//! `tracing` span named `dispatch`.
//!
//! Records are appended when a pass finishes, so a nested pass triggered by a
//! listener is recorded before the pass that triggered it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatcher::{DispatchError, DispatchOutcome, Dispatcher, EventDispatcher, run_listeners};
use crate::event::GenericEvent;
use crate::listener::{BoxedListener, ListenerEntry, ListenerId, ListenerRegistrationError};

/// How a recorded pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedOutcome {
    /// All listeners ran.
    Completed,
    /// A listener stopped propagation.
    Stopped {
        /// The stopping listener.
        listener: String,
    },
    /// A listener failed.
    Failed {
        /// The failing listener.
        listener: String,
        /// The error message.
        message: String,
    },
}

/// One recorded dispatch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    /// The dispatched event name.
    pub event: String,
    /// Type name of the event subject.
    pub subject_type: &'static str,
    /// Names of the listeners invoked, in call order.
    pub called: Vec<String>,
    /// How the pass ended.
    pub outcome: RecordedOutcome,
}

/// Recording dispatcher.
///
/// [`TraceableEventDispatcher::new`] keeps every record until
/// [`clear_records`](TraceableEventDispatcher::clear_records) is called, so a
/// long-lived channel grows with every dispatch. Use
/// [`with_limit`](TraceableEventDispatcher::with_limit) to keep only the
/// most recent passes.
#[derive(Default)]
pub struct TraceableEventDispatcher {
    inner: EventDispatcher,
    records: Mutex<VecDeque<DispatchRecord>>,
    limit: Option<usize>,
}

impl TraceableEventDispatcher {
    /// Identifier of this implementation.
    pub const KIND: &'static str = "traceable";

    /// Creates an empty traceable dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a traceable dispatcher that keeps at most `limit` records,
    /// dropping the oldest first.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Returns the record limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns all kept records, in completion order.
    #[must_use]
    pub fn records(&self) -> Vec<DispatchRecord> {
        self.records.lock().iter().cloned().collect()
    }

    fn push_record(&self, record: DispatchRecord) {
        let mut records = self.records.lock();
        if let Some(limit) = self.limit {
            if limit == 0 {
                return;
            }
            while records.len() >= limit {
                records.pop_front();
            }
        }
        records.push_back(record);
    }

    /// Returns the dispatched event names, in completion order.
    #[must_use]
    pub fn dispatched_events(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|record| record.event.clone())
            .collect()
    }

    /// Returns the names of every listener invoked for `event`, across all passes.
    #[must_use]
    pub fn called_listeners(&self, event: &str) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.event == event)
            .flat_map(|record| record.called.iter().cloned())
            .collect()
    }

    /// Forgets all records.
    pub fn clear_records(&self) {
        self.records.lock().clear();
    }
}

impl core::fmt::Debug for TraceableEventDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TraceableEventDispatcher")
            .field("inner", &self.inner)
            .field("records", &self.records.lock().len())
            .field("limit", &self.limit)
            .finish()
    }
}

impl Dispatcher for TraceableEventDispatcher {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn add_listener(
        &self,
        event: &str,
        name: &str,
        listener: BoxedListener,
    ) -> Result<ListenerId, ListenerRegistrationError> {
        self.inner.add_listener(event, name, listener)
    }

    fn remove_listener(&self, event: &str, name: &str) -> Result<bool, ListenerRegistrationError> {
        self.inner.remove_listener(event, name)
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
        let _span = tracing::debug_span!(
            "dispatch",
            event = event_name,
            subject = event.subject_type()
        )
        .entered();

        let entries = self.inner.listeners(event_name);
        let mut called = Vec::with_capacity(entries.len());
        let result = run_listeners(event_name, &entries, event, |entry, _| {
            called.push(entry.name().to_owned());
        });

        let outcome = match &result {
            Ok(DispatchOutcome::Completed { .. }) => RecordedOutcome::Completed,
            Ok(DispatchOutcome::Stopped { listener, .. }) => RecordedOutcome::Stopped {
                listener: listener.clone(),
            },
            Err(DispatchError::Listener {
                listener, source, ..
            }) => RecordedOutcome::Failed {
                listener: listener.clone(),
                message: source.to_string(),
            },
        };
        tracing::debug!(listeners = called.len(), outcome = ?outcome, "dispatch finished");

        self.push_record(DispatchRecord {
            event: event_name.to_owned(),
            subject_type: event.subject_type(),
            called,
            outcome,
        });
        result
    }
}
