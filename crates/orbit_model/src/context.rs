//! The model context.
//!
//! A [`ModelContext`] owns the [`DispatcherRegistry`] and is the entry point
//! for registering listeners and running lifecycle operations. Applications
//! usually build one at startup and share it by reference.
//!
//! # Registering Listeners
//!
//! ```
//! use orbit_model::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Model)]
//! struct Post {
//!     id: Option<i64>,
//!     title: String,
//! }
//!
//! let ctx = ModelContext::new();
//! ctx.listen::<Post, OnPreSave, _>("require-title", |event| {
//!     if event.subject().title.is_empty() {
//!         Ok(Propagation::Stop)
//!     } else {
//!         Ok(Propagation::Continue)
//!     }
//! })
//! .unwrap();
//!
//! let conn = ConnectionHandle::new(MemoryConnection::default());
//! let mut post = ctx.create::<Post>().unwrap();
//! assert!(ctx.save(&mut post, &conn).unwrap().is_cancelled());
//!
//! post.title = "Hello".into();
//! assert_eq!(ctx.save(&mut post, &conn).unwrap(), SaveOutcome::Inserted { key: 1 });
//! ```

use std::sync::Arc;

use orbit_events::{
    BoxedListener, Dispatcher, DispatcherFactory, ListenerId, ListenerRegistrationError,
    ListenerResult, Propagation,
};

use crate::aware::EventDispatcherAware;
use crate::config::{ConfigError, EventsConfig};
use crate::connection::ConnectionHandle;
use crate::emit::{self, EmitError, Emission};
use crate::event::ModelEvent;
use crate::lifecycle::Constructed;
use crate::phase::{IntoPhases, Phase, UnknownPhase};
use crate::registry::DispatcherRegistry;

/// Errors raised when registering a listener by event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The event name is not a lifecycle phase.
    #[error(transparent)]
    UnknownPhase(#[from] UnknownPhase),

    /// The channel rejected the listener.
    #[error(transparent)]
    Listener(#[from] ListenerRegistrationError),
}

// ─────────────────────────────────────────────────────────────────────────────
// ModelContext
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of every model channel and entry point for lifecycle operations.
#[derive(Debug)]
pub struct ModelContext {
    registry: DispatcherRegistry,
    config: EventsConfig,
}

impl Default for ModelContext {
    fn default() -> Self {
        Self {
            registry: DispatcherRegistry::default(),
            config: EventsConfig::default(),
        }
    }
}

impl ModelContext {
    /// Creates a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building a configured context.
    #[must_use]
    pub fn builder() -> ModelContextBuilder {
        ModelContextBuilder::default()
    }

    /// Creates a context from `config` with the built-in dispatcher kinds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDispatcher`] for an unregistered kind.
    pub fn from_config(config: EventsConfig) -> Result<Self, ConfigError> {
        Self::builder().with_config(config).build()
    }

    /// Returns the channel registry.
    #[must_use]
    pub fn registry(&self) -> &DispatcherRegistry {
        &self.registry
    }

    /// Returns the configuration this context was built from.
    #[must_use]
    pub fn config(&self) -> &EventsConfig {
        &self.config
    }

    /// Returns the channel of `M`.
    pub fn dispatcher<M: EventDispatcherAware>(&self) -> Arc<dyn Dispatcher> {
        self.registry.get::<M>()
    }

    /// Replaces the channel of `M`, returning the previous one.
    pub fn set_dispatcher<M: EventDispatcherAware>(
        &self,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Option<Arc<dyn Dispatcher>> {
        self.registry.set::<M>(dispatcher)
    }

    /// Notifies the listeners of `phase` about `subject`.
    ///
    /// Lifecycle operations call this at each of their phases; call it
    /// directly to drive a custom operation. The subject has already been
    /// constructed, so its `Construct` phase precedes whatever is emitted
    /// here.
    pub fn emit<M: EventDispatcherAware>(
        &self,
        phase: Phase,
        subject: &Constructed<M>,
        connection: Option<&ConnectionHandle>,
    ) -> Result<Emission, EmitError> {
        emit::emit(&self.registry, phase, &**subject, connection)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listener registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a typed listener on one or more phases of `M`.
    ///
    /// `P` is a phase marker or a tuple of them. When several phases are
    /// given, each registration is named `"{name}@{phase}"`.
    ///
    /// Listeners return [`Propagation::Stop`] to cancel a pre-phase
    /// operation or an error to abort it.
    ///
    /// # Errors
    ///
    /// Fails if a listener with the same name exists on one of the phases.
    /// Registrations on earlier phases of the tuple are kept.
    pub fn listen<M, P, F>(
        &self,
        name: &str,
        listener: F,
    ) -> Result<&Self, ListenerRegistrationError>
    where
        M: EventDispatcherAware,
        P: IntoPhases,
        F: Fn(&ModelEvent<'_, M>) -> ListenerResult + Send + Sync + 'static,
    {
        let dispatcher = self.registry.get::<M>();
        let phases = P::phases();
        let listener = Arc::new(listener);

        for &phase in &phases {
            let registered_name = if phases.len() > 1 {
                format!("{name}@{phase}")
            } else {
                name.to_owned()
            };
            let listener = Arc::clone(&listener);
            dispatcher.add_listener(
                phase.name(),
                &registered_name,
                BoxedListener::new(move |event| {
                    let event = ModelEvent::<M>::from_generic(phase, event)?;
                    listener(&event)
                }),
            )?;
            tracing::debug!(
                model = M::model_name(),
                phase = phase.name(),
                listener = %registered_name,
                "listener registered"
            );
        }

        Ok(self)
    }

    /// Registers a typed listener that only observes.
    pub fn observe<M, P, F>(
        &self,
        name: &str,
        listener: F,
    ) -> Result<&Self, ListenerRegistrationError>
    where
        M: EventDispatcherAware,
        P: IntoPhases,
        F: Fn(&ModelEvent<'_, M>) + Send + Sync + 'static,
    {
        self.listen::<M, P, _>(name, move |event| {
            listener(event);
            Ok(Propagation::Continue)
        })
    }

    /// Registers a typed listener by event name (e.g. `"model.pre_save"`).
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnknownPhase`] for names outside the
    /// catalogue.
    pub fn listen_name<M, F>(
        &self,
        event: &str,
        name: &str,
        listener: F,
    ) -> Result<ListenerId, RegistrationError>
    where
        M: EventDispatcherAware,
        F: Fn(&ModelEvent<'_, M>) -> ListenerResult + Send + Sync + 'static,
    {
        let phase: Phase = event.parse()?;
        let id = self.registry.get::<M>().add_listener(
            phase.name(),
            name,
            BoxedListener::new(move |event| {
                let event = ModelEvent::<M>::from_generic(phase, event)?;
                listener(&event)
            }),
        )?;
        Ok(id)
    }

    /// Removes the listener named `name` from `phase` of `M`.
    pub fn remove_listener<M: EventDispatcherAware>(
        &self,
        phase: Phase,
        name: &str,
    ) -> Result<bool, ListenerRegistrationError> {
        self.registry.get::<M>().remove_listener(phase.name(), name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ModelContextBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for a [`ModelContext`].
///
/// ```
/// use std::sync::Arc;
/// use orbit_events::{Dispatcher, ImmutableEventDispatcher, EventDispatcher};
/// use orbit_model::{EventsConfig, ModelContext};
///
/// let ctx = ModelContext::builder()
///     .register_dispatcher("frozen", || {
///         Arc::new(ImmutableEventDispatcher::new(Arc::new(EventDispatcher::new())))
///             as Arc<dyn Dispatcher>
///     })
///     .with_config(EventsConfig::new().with_dispatcher("frozen"))
///     .build()
///     .unwrap();
/// assert_eq!(ctx.registry().default_kind(), "frozen");
/// ```
#[derive(Debug, Default)]
pub struct ModelContextBuilder {
    config: EventsConfig,
    factory: DispatcherFactory,
}

impl ModelContextBuilder {
    /// Uses `config`.
    #[must_use]
    pub fn with_config(mut self, config: EventsConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the default dispatcher kind.
    #[must_use]
    pub fn with_dispatcher(mut self, kind: impl Into<String>) -> Self {
        self.config.dispatcher = kind.into();
        self
    }

    /// Registers an additional dispatcher kind.
    #[must_use]
    pub fn register_dispatcher(
        mut self,
        kind: impl Into<String>,
        constructor: impl Fn() -> Arc<dyn Dispatcher> + Send + Sync + 'static,
    ) -> Self {
        self.factory.register(kind, constructor);
        self
    }

    /// Builds the context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDispatcher`] if the configured kind is
    /// not registered.
    pub fn build(self) -> Result<ModelContext, ConfigError> {
        let registry = DispatcherRegistry::new(self.factory, self.config.dispatcher.clone())?;
        tracing::info!(
            dispatcher = %self.config.dispatcher,
            kinds = ?registry.factory().kinds(),
            "model context initialized"
        );
        Ok(ModelContext {
            registry,
            config: self.config,
        })
    }
}
