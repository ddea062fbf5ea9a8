//! Observable lifecycle events for persistent data models.
//!
//! - [`orbit_events`] - The synchronous event channel
//! - [`orbit_model`] - Lifecycle phases, per-model channels and the
//!   operations that emit them

pub use orbit_events;
pub use orbit_model;

pub use orbit_model::{
    Constructed, EventDispatcherAware, EventsConfig, Model, ModelContext, ModelEvent, Phase,
    Record,
};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use orbit_events::{Dispatcher, DispatcherExt, GenericEvent};
    pub use orbit_model::prelude::*;
}
