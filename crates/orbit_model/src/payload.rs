//! Building the payload of a lifecycle notification.
//!
//! A payload is a [`GenericEvent`] whose subject is the model instance the
//! phase concerns. Persistence phases carry exactly one argument, the
//! [`ConnectionHandle`] under [`CONNECTION`]; structural phases carry none.
//! Anything else is a contract violation reported as [`PayloadError`].

use core::any::Any;

use orbit_events::{Arguments, GenericEvent};

use crate::aware::EventDispatcherAware;
use crate::connection::ConnectionHandle;
use crate::phase::{CONNECTION, Phase};

/// A payload that does not match its phase's argument contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// A required argument is absent.
    #[error("phase '{phase}' requires argument '{key}'")]
    MissingArgument {
        /// The phase being built.
        phase: Phase,
        /// The missing key.
        key: &'static str,
    },

    /// An argument the phase does not define was supplied.
    #[error("phase '{phase}' does not accept argument '{key}'")]
    UnexpectedArgument {
        /// The phase being built.
        phase: Phase,
        /// The extra key.
        key: String,
    },

    /// A required argument holds a value of the wrong type.
    #[error("argument '{key}' of phase '{phase}' must be a {expected}")]
    InvalidArgument {
        /// The phase being built.
        phase: Phase,
        /// The offending key.
        key: &'static str,
        /// Name of the expected type.
        expected: &'static str,
    },
}

/// Checks `arguments` against the contract of `phase`.
pub fn validate(phase: Phase, arguments: &Arguments) -> Result<(), PayloadError> {
    let required = phase.required_arguments();

    for &key in required {
        if !arguments.contains(key) {
            return Err(PayloadError::MissingArgument { phase, key });
        }
    }
    if let Some(key) = arguments.keys().into_iter().find(|key| !required.contains(key)) {
        return Err(PayloadError::UnexpectedArgument {
            phase,
            key: key.to_owned(),
        });
    }
    if phase.requires_connection() && arguments.get::<ConnectionHandle>(CONNECTION).is_none() {
        return Err(PayloadError::InvalidArgument {
            phase,
            key: CONNECTION,
            expected: "ConnectionHandle",
        });
    }
    Ok(())
}

/// Builder for the payload of one emission.
///
/// ```
/// use orbit_model::connection::{ConnectionHandle, MemoryConnection};
/// use orbit_model::payload::{PayloadBuilder, PayloadError};
/// use orbit_model::{EventDispatcherAware, Phase};
///
/// struct Draft;
/// impl EventDispatcherAware for Draft {
///     fn model_name() -> &'static str { "docs::Draft" }
/// }
///
/// let draft = Draft;
/// let conn = ConnectionHandle::new(MemoryConnection::default());
///
/// let event = PayloadBuilder::new(Phase::PreSave, &draft)
///     .with_connection(conn)
///     .build()
///     .unwrap();
/// assert!(event.has_argument("connection"));
///
/// let err = PayloadBuilder::new(Phase::PreSave, &draft).build().unwrap_err();
/// assert!(matches!(err, PayloadError::MissingArgument { key: "connection", .. }));
/// ```
pub struct PayloadBuilder<'a, M> {
    phase: Phase,
    subject: &'a M,
    arguments: Arguments,
}

impl<'a, M: EventDispatcherAware> PayloadBuilder<'a, M> {
    /// Starts a payload for `phase` about `subject`.
    #[must_use]
    pub fn new(phase: Phase, subject: &'a M) -> Self {
        Self {
            phase,
            subject,
            arguments: Arguments::new(),
        }
    }

    /// Attaches the connection the operation runs on.
    #[must_use]
    pub fn with_connection(self, connection: ConnectionHandle) -> Self {
        self.with_argument(CONNECTION, connection)
    }

    /// Attaches an arbitrary argument.
    ///
    /// Only keys in [`Phase::required_arguments`] pass [`build`](Self::build).
    #[must_use]
    pub fn with_argument<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.arguments.insert(key, value);
        self
    }

    /// Validates the arguments and produces the event.
    pub fn build(self) -> Result<GenericEvent<'a>, PayloadError> {
        validate(self.phase, &self.arguments)?;
        Ok(GenericEvent::with_arguments(self.subject, self.arguments))
    }
}
