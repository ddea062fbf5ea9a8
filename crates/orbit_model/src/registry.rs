//! Per-model channel ownership.
//!
//! The [`DispatcherRegistry`] holds at most one channel per model. The first
//! access creates it from the [`DispatcherFactory`]; later accesses return the
//! same `Arc` until it is replaced with [`DispatcherRegistry::set`] or dropped
//! with [`DispatcherRegistry::reset`].

use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use orbit_events::{Dispatcher, DispatcherFactory, EventDispatcher};
use parking_lot::RwLock;

use crate::aware::EventDispatcherAware;
use crate::config::ConfigError;

// ─────────────────────────────────────────────────────────────────────────────
// ModelId
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId {
    type_id: TypeId,
    name: &'static str,
}

impl ModelId {
    /// Returns the identity of `M`.
    #[must_use]
    pub fn of<M: EventDispatcherAware>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: M::model_name(),
        }
    }

    /// Returns the Rust type identity.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully-qualified model name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DispatcherRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the lazily created channel of every model.
pub struct DispatcherRegistry {
    factory: DispatcherFactory,
    default_kind: String,
    channels: RwLock<HashMap<ModelId, Arc<dyn Dispatcher>>>,
}

impl DispatcherRegistry {
    /// Creates a registry that builds channels of `default_kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownDispatcher`] if `factory` has no
    /// constructor for `default_kind`.
    pub fn new(
        factory: DispatcherFactory,
        default_kind: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let default_kind = default_kind.into();
        if !factory.contains(&default_kind) {
            return Err(ConfigError::UnknownDispatcher {
                kind: default_kind,
                registered: factory.kinds().into_iter().map(str::to_owned).collect(),
            });
        }
        Ok(Self {
            factory,
            default_kind,
            channels: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the kind used for models that declare none.
    #[must_use]
    pub fn default_kind(&self) -> &str {
        &self.default_kind
    }

    /// Returns the factory channels are built from.
    #[must_use]
    pub fn factory(&self) -> &DispatcherFactory {
        &self.factory
    }

    /// Returns the channel of `M`, creating it on first access.
    ///
    /// Never fails: a kind declared by `M` that the factory does not know is
    /// logged and replaced with the default kind.
    pub fn get<M: EventDispatcherAware>(&self) -> Arc<dyn Dispatcher> {
        let id = ModelId::of::<M>();
        if let Some(channel) = self.lookup(id) {
            return channel;
        }

        let mut channels = self.channels.write();
        let channel = channels
            .entry(id)
            .or_insert_with(|| self.create(id, M::dispatcher_kind()));
        Arc::clone(channel)
    }

    /// Replaces the channel of `M`, returning the previous one.
    pub fn set<M: EventDispatcherAware>(
        &self,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Option<Arc<dyn Dispatcher>> {
        let id = ModelId::of::<M>();
        tracing::debug!(model = id.name(), kind = dispatcher.kind(), "dispatcher replaced");
        self.channels.write().insert(id, dispatcher)
    }

    /// Drops the channel of `M` so the next access creates a fresh one.
    pub fn reset<M: EventDispatcherAware>(&self) -> Option<Arc<dyn Dispatcher>> {
        self.channels.write().remove(&ModelId::of::<M>())
    }

    /// Returns `true` if `M` already has a channel.
    #[must_use]
    pub fn contains<M: EventDispatcherAware>(&self) -> bool {
        self.channels.read().contains_key(&ModelId::of::<M>())
    }

    /// Returns the names of models with a channel, sorted.
    #[must_use]
    pub fn models(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.channels.read().keys().map(ModelId::name).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of channels held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    /// Returns `true` if no channel has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Drops every channel.
    pub fn clear(&self) {
        self.channels.write().clear();
    }

    fn lookup(&self, id: ModelId) -> Option<Arc<dyn Dispatcher>> {
        self.channels.read().get(&id).cloned()
    }

    fn create(&self, id: ModelId, declared: Option<&'static str>) -> Arc<dyn Dispatcher> {
        let kind = match declared {
            Some(kind) if self.factory.contains(kind) => kind,
            Some(kind) => {
                tracing::warn!(
                    model = id.name(),
                    kind,
                    fallback = %self.default_kind,
                    "model declares an unknown dispatcher kind; using the default"
                );
                self.default_kind.as_str()
            }
            None => self.default_kind.as_str(),
        };

        tracing::debug!(model = id.name(), kind, "dispatcher created");
        self.factory
            .create(kind)
            .unwrap_or_else(|| Arc::new(EventDispatcher::new()))
    }
}

impl Default for DispatcherRegistry {
    fn default() -> Self {
        Self {
            factory: DispatcherFactory::new(),
            default_kind: EventDispatcher::KIND.to_owned(),
            channels: RwLock::new(HashMap::new()),
        }
    }
}

impl fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherRegistry")
            .field("default_kind", &self.default_kind)
            .field("models", &self.models())
            .finish_non_exhaustive()
    }
}
