//! The event capability every generated model class carries.

use core::any::Any;
use std::sync::Arc;

use orbit_events::{Dispatcher, ListenerId, ListenerResult};

use crate::context::{ModelContext, RegistrationError};
use crate::event::ModelEvent;
use crate::phase::Phase;

/// Capability contract of a model whose lifecycle emits events.
///
/// Usually implemented by `#[derive(Model)]`. Models are identified by their
/// fully-qualified name, so same-named types in different modules get
/// independent channels.
///
/// # Example
///
/// ```
/// use orbit_model::{EventDispatcherAware, ModelContext, Phase};
///
/// #[derive(Default)]
/// struct Draft;
///
/// impl EventDispatcherAware for Draft {
///     fn model_name() -> &'static str {
///         concat!(module_path!(), "::Draft")
///     }
/// }
///
/// assert_eq!(Draft::EVENT_PRE_SAVE, "model.pre_save");
/// assert_eq!(Draft::EVENT_PRE_SAVE, Phase::PreSave.name());
///
/// let ctx = ModelContext::new();
/// let first = Draft::event_dispatcher(&ctx);
/// let second = Draft::event_dispatcher(&ctx);
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// ```
pub trait EventDispatcherAware: Any {
    /// Event name of [`Phase::Construct`].
    const EVENT_CONSTRUCT: &'static str = Phase::Construct.name();
    /// Event name of [`Phase::PostHydrate`].
    const EVENT_POST_HYDRATE: &'static str = Phase::PostHydrate.name();
    /// Event name of [`Phase::PreSave`].
    const EVENT_PRE_SAVE: &'static str = Phase::PreSave.name();
    /// Event name of [`Phase::PostSave`].
    const EVENT_POST_SAVE: &'static str = Phase::PostSave.name();
    /// Event name of [`Phase::PreInsert`].
    const EVENT_PRE_INSERT: &'static str = Phase::PreInsert.name();
    /// Event name of [`Phase::PostInsert`].
    const EVENT_POST_INSERT: &'static str = Phase::PostInsert.name();
    /// Event name of [`Phase::PreUpdate`].
    const EVENT_PRE_UPDATE: &'static str = Phase::PreUpdate.name();
    /// Event name of [`Phase::PostUpdate`].
    const EVENT_POST_UPDATE: &'static str = Phase::PostUpdate.name();
    /// Event name of [`Phase::PreDelete`].
    const EVENT_PRE_DELETE: &'static str = Phase::PreDelete.name();
    /// Event name of [`Phase::PostDelete`].
    const EVENT_POST_DELETE: &'static str = Phase::PostDelete.name();

    /// Fully-qualified name of the model (e.g. `"blog::Post"`).
    fn model_name() -> &'static str;

    /// Dispatcher kind this model asks for, if any.
    ///
    /// Unknown kinds fall back to the configured default.
    fn dispatcher_kind() -> Option<&'static str> {
        None
    }

    /// Returns this model's channel, creating it on first access.
    ///
    /// The channel is the raw [`Dispatcher`]: listeners added to it directly
    /// are registered under whatever event name is given, lifecycle phase or
    /// not. Use [`EventDispatcherAware::add_event_listener`] or
    /// [`ModelContext::listen_name`] to have the name checked against the
    /// phase catalogue.
    fn event_dispatcher(ctx: &ModelContext) -> Arc<dyn Dispatcher>
    where
        Self: Sized,
    {
        ctx.registry().get::<Self>()
    }

    /// Registers a typed listener on this model's channel by event name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnknownPhase`] if `event` is not a
    /// lifecycle phase.
    fn add_event_listener<F>(
        ctx: &ModelContext,
        event: &str,
        name: &str,
        listener: F,
    ) -> Result<ListenerId, RegistrationError>
    where
        Self: Sized,
        F: Fn(&ModelEvent<'_, Self>) -> ListenerResult + Send + Sync + 'static,
    {
        ctx.listen_name::<Self, F>(event, name, listener)
    }

    /// Replaces this model's channel, returning the previous one.
    ///
    /// Listeners on the previous channel stop receiving this model's events.
    fn set_event_dispatcher(
        ctx: &ModelContext,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Option<Arc<dyn Dispatcher>>
    where
        Self: Sized,
    {
        ctx.registry().set::<Self>(dispatcher)
    }
}
