//! Typed view of a lifecycle notification.

use core::any::type_name;
use core::fmt;

use orbit_events::{Arguments, GenericEvent};

use crate::aware::EventDispatcherAware;
use crate::connection::ConnectionHandle;
use crate::phase::{CONNECTION, Phase};

/// The subject of a notification was not the expected model type.
///
/// Raised when a typed listener lands on a channel shared with another
/// model, e.g. after [`EventDispatcherAware::set_event_dispatcher`] installed
/// one channel for two models.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected subject of type '{expected}', found '{found}'")]
pub struct SubjectMismatch {
    /// Type the listener was registered for.
    pub expected: &'static str,
    /// Type carried by the event.
    pub found: &'static str,
}

/// A lifecycle notification about a model of type `M`.
pub struct ModelEvent<'a, M> {
    phase: Phase,
    subject: &'a M,
    inner: &'a GenericEvent<'a>,
}

impl<'a, M: EventDispatcherAware> ModelEvent<'a, M> {
    /// Wraps a dispatched event, checking the subject type.
    pub fn from_generic(phase: Phase, inner: &'a GenericEvent<'a>) -> Result<Self, SubjectMismatch> {
        let subject = inner.subject_as::<M>().ok_or(SubjectMismatch {
            expected: type_name::<M>(),
            found: inner.subject_type(),
        })?;
        Ok(Self {
            phase,
            subject,
            inner,
        })
    }

    /// Returns the phase being notified.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the instance the phase concerns.
    #[must_use]
    pub fn subject(&self) -> &'a M {
        self.subject
    }

    /// Returns `true` if a listener may cancel the surrounding operation.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.phase.is_pre()
    }

    /// Returns the connection the operation runs on.
    ///
    /// Always `Some` for persistence phases, `None` for structural ones.
    #[must_use]
    pub fn connection(&self) -> Option<&'a ConnectionHandle> {
        self.inner.argument::<ConnectionHandle>(CONNECTION)
    }

    /// Returns `true` if an argument is stored under `key`.
    #[must_use]
    pub fn has_argument(&self, key: &str) -> bool {
        self.inner.has_argument(key)
    }

    /// Returns the argument stored under `key` if it has type `T`.
    #[must_use]
    pub fn argument<T: core::any::Any>(&self, key: &str) -> Option<&'a T> {
        self.inner.argument::<T>(key)
    }

    /// Returns every argument.
    #[must_use]
    pub fn arguments(&self) -> &'a Arguments {
        self.inner.arguments()
    }

    /// Returns the underlying untyped event.
    #[must_use]
    pub fn generic(&self) -> &'a GenericEvent<'a> {
        self.inner
    }
}

impl<M> fmt::Debug for ModelEvent<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEvent")
            .field("phase", &self.phase)
            .field("subject", &type_name::<M>())
            .field("arguments", self.inner.arguments())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;
    use crate::payload::PayloadBuilder;

    struct Post;
    impl EventDispatcherAware for Post {
        fn model_name() -> &'static str {
            "tests::Post"
        }
    }

    struct Comment;
    impl EventDispatcherAware for Comment {
        fn model_name() -> &'static str {
            "tests::Comment"
        }
    }

    #[test]
    fn typed_view_exposes_subject_and_connection() {
        let post = Post;
        let conn = ConnectionHandle::new(MemoryConnection::new("db"));
        let generic = PayloadBuilder::new(Phase::PreDelete, &post)
            .with_connection(conn.clone())
            .build()
            .unwrap();

        let event = ModelEvent::<Post>::from_generic(Phase::PreDelete, &generic).unwrap();
        assert_eq!(event.phase(), Phase::PreDelete);
        assert!(event.is_cancellable());
        assert!(core::ptr::eq(event.subject(), &post));
        assert!(event.connection().unwrap().ptr_eq(&conn));
        assert!(event.has_argument(CONNECTION));
        assert_eq!(event.arguments().len(), 1);
    }

    #[test]
    fn structural_view_has_no_connection() {
        let post = Post;
        let generic = PayloadBuilder::new(Phase::Construct, &post).build().unwrap();
        let event = ModelEvent::<Post>::from_generic(Phase::Construct, &generic).unwrap();
        assert!(event.connection().is_none());
        assert!(!event.is_cancellable());
    }

    #[test]
    fn wrong_subject_type_is_reported() {
        let comment = Comment;
        let generic = PayloadBuilder::new(Phase::Construct, &comment).build().unwrap();
        let err = ModelEvent::<Post>::from_generic(Phase::Construct, &generic).unwrap_err();
        assert!(err.expected.ends_with("Post"));
        assert!(err.found.ends_with("Comment"));
    }
}
