//! Emission of lifecycle notifications.
//!
//! Emission is the single point where model operations notify listeners
//! (see [`ModelContext::emit`]): it resolves the model's channel, builds and validates the payload,
//! dispatches it and folds the outcome into an [`Emission`].
//!
//! | Outcome of the pass | Pre-phase | Post or structural phase |
//! |---------------------|-----------|--------------------------|
//! | Every listener continued | [`Emission::Proceed`] | [`Emission::Proceed`] |
//! | A listener stopped | [`Emission::Cancelled`] | [`Emission::Proceed`] |
//! | A listener failed | [`EmitError::Listener`] | [`EmitError::Listener`] |
//!
//! A stop on a post or structural phase still skips the remaining
//! listeners; it just cannot undo anything.
//!
//! [`ModelContext::emit`]: crate::ModelContext::emit

use orbit_events::{DispatchError, DispatchOutcome, ListenerError};

use crate::aware::EventDispatcherAware;
use crate::connection::ConnectionHandle;
use crate::payload::{PayloadBuilder, PayloadError};
use crate::phase::Phase;
use crate::registry::DispatcherRegistry;

/// Result of notifying one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// The surrounding operation may go ahead.
    Proceed,
    /// A listener on a pre-phase asked to cancel the operation.
    Cancelled {
        /// Name of the cancelling listener.
        listener: String,
    },
}

impl Emission {
    /// Returns `true` if the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Emission::Cancelled { .. })
    }
}

/// Errors raised while emitting a phase.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The payload broke the phase's argument contract.
    #[error("invalid payload for '{model}': {source}")]
    Contract {
        /// Model being notified about.
        model: &'static str,
        /// The violated contract.
        #[source]
        source: PayloadError,
    },

    /// A listener failed. Remaining listeners were skipped.
    #[error("listener '{listener}' failed during {phase} of '{model}': {source}")]
    Listener {
        /// Model being notified about.
        model: &'static str,
        /// The phase being notified.
        phase: Phase,
        /// Name of the failing listener.
        listener: String,
        /// The listener's error.
        #[source]
        source: ListenerError,
    },
}

/// Notifies every listener of `phase` on `M`'s channel.
///
/// Persistence phases need `connection`; structural phases must not get one.
pub(crate) fn emit<M: EventDispatcherAware>(
    registry: &DispatcherRegistry,
    phase: Phase,
    subject: &M,
    connection: Option<&ConnectionHandle>,
) -> Result<Emission, EmitError> {
    let model = M::model_name();

    let mut payload = PayloadBuilder::new(phase, subject);
    if let Some(connection) = connection {
        payload = payload.with_connection(connection.clone());
    }
    let event = payload
        .build()
        .map_err(|source| EmitError::Contract { model, source })?;

    let dispatcher = registry.get::<M>();
    tracing::debug!(
        model,
        phase = phase.name(),
        dispatcher = dispatcher.kind(),
        listeners = dispatcher.listener_count(phase.name()),
        "emitting lifecycle event"
    );

    let outcome = dispatcher
        .dispatch(phase.name(), &event)
        .map_err(|err| match err {
            DispatchError::Listener {
                listener, source, ..
            } => EmitError::Listener {
                model,
                phase,
                listener,
                source,
            },
        })?;

    match outcome {
        DispatchOutcome::Completed { .. } => Ok(Emission::Proceed),
        DispatchOutcome::Stopped { listener, .. } if phase.is_pre() => {
            tracing::debug!(model, phase = phase.name(), listener = %listener, "operation cancelled");
            Ok(Emission::Cancelled { listener })
        }
        DispatchOutcome::Stopped { listener, .. } => {
            tracing::debug!(
                model,
                phase = phase.name(),
                listener = %listener,
                "propagation stopped on a phase that cannot cancel"
            );
            Ok(Emission::Proceed)
        }
    }
}
