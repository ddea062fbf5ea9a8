//! Generic event payload.
//!
//! A [`GenericEvent`] borrows the subject of a notification for the duration
//! of one dispatch pass and carries an [`Arguments`] map with any contextual
//! values the emitter supplies.
//!
//! # Example
//!
//! ```
//! use orbit_events::{Arguments, GenericEvent};
//!
//! #[derive(Debug)]
//! struct Invoice { total: u32 }
//!
//! let invoice = Invoice { total: 42 };
//! let event = GenericEvent::with_arguments(&invoice, Arguments::new().with("currency", "EUR"));
//!
//! assert_eq!(event.subject_as::<Invoice>().map(|i| i.total), Some(42));
//! assert_eq!(event.argument::<&str>("currency"), Some(&"EUR"));
//! assert!(!event.has_argument("connection"));
//! ```

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

/// Shared, type-erased argument value.
pub type ArgumentValue = Arc<dyn Any + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Key/value map of contextual event arguments.
///
/// Values are stored type-erased and read back with [`Arguments::get`], which
/// returns `None` when the key is absent or holds a different type.
#[derive(Clone, Default)]
pub struct Arguments {
    entries: HashMap<String, ArgumentValue>,
}

impl Arguments {
    /// Creates an empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument, consuming and returning the map.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts an argument, returning the previous value stored under `key`.
    pub fn insert<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Option<ArgumentValue> {
        self.entries.insert(key.into(), Arc::new(value))
    }

    /// Inserts an already shared value without re-wrapping it.
    pub fn insert_shared(
        &mut self,
        key: impl Into<String>,
        value: ArgumentValue,
    ) -> Option<ArgumentValue> {
        self.entries.insert(key.into(), value)
    }

    /// Removes an argument.
    pub fn remove(&mut self, key: &str) -> Option<ArgumentValue> {
        self.entries.remove(key)
    }

    /// Returns `true` if an argument is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the argument stored under `key` if it has type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries
            .get(key)
            .and_then(|value| (**value).downcast_ref::<T>())
    }

    /// Returns the type-erased argument stored under `key`.
    #[must_use]
    pub fn get_shared(&self, key: &str) -> Option<&ArgumentValue> {
        self.entries.get(key)
    }

    /// Returns the argument keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GenericEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Payload delivered to listeners for one dispatch pass.
///
/// The subject is borrowed, so listeners always observe the exact instance
/// that triggered the event. A subject is required to build an event.
pub struct GenericEvent<'a> {
    subject: &'a dyn Any,
    subject_type: &'static str,
    arguments: Arguments,
}

impl<'a> GenericEvent<'a> {
    /// Creates an event for `subject` with no arguments.
    #[must_use]
    pub fn new<S: Any>(subject: &'a S) -> Self {
        Self::with_arguments(subject, Arguments::new())
    }

    /// Creates an event for `subject` with the given arguments.
    #[must_use]
    pub fn with_arguments<S: Any>(subject: &'a S, arguments: Arguments) -> Self {
        Self {
            subject,
            subject_type: core::any::type_name::<S>(),
            arguments,
        }
    }

    /// Adds an argument, consuming and returning the event.
    #[must_use]
    pub fn with_argument<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.arguments.insert(key, value);
        self
    }

    /// Returns the type-erased subject.
    #[must_use]
    pub fn subject(&self) -> &'a dyn Any {
        self.subject
    }

    /// Returns the subject if it has type `S`.
    #[must_use]
    pub fn subject_as<S: Any>(&self) -> Option<&'a S> {
        self.subject.downcast_ref::<S>()
    }

    /// Returns the type name of the subject, for diagnostics.
    #[must_use]
    pub fn subject_type(&self) -> &'static str {
        self.subject_type
    }

    /// Returns `true` if an argument is stored under `key`.
    #[must_use]
    pub fn has_argument(&self, key: &str) -> bool {
        self.arguments.contains(key)
    }

    /// Returns the argument stored under `key` if it has type `T`.
    #[must_use]
    pub fn argument<T: Any>(&self, key: &str) -> Option<&T> {
        self.arguments.get(key)
    }

    /// Returns all arguments.
    #[must_use]
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }
}

impl fmt::Debug for GenericEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericEvent")
            .field("subject_type", &self.subject_type)
            .field("arguments", &self.arguments)
            .finish()
    }
}
