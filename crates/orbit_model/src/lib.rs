//! Lifecycle events for persistent models (Layer 2).
//!
//! `orbit_model` fires a named notification at each point of a model's life:
//! construction, hydration from storage, and before and after every save,
//! insert, update and delete. Listeners observe the instance and the
//! connection; listeners on a pre-phase may cancel the operation.
//!
//! - [`phase`] - The closed [`Phase`] catalogue and its marker types
//! - [`aware`] - [`EventDispatcherAware`], the capability every model carries
//! - [`registry`] - One lazily created channel per model
//! - [`payload`] - Payload construction and argument contracts
//! - [`event`] - [`ModelEvent`], the typed view typed listeners receive
//! - [`emit`] - Dispatching a phase and folding the outcome
//! - [`record`] and [`connection`] - The row mapping and storage seam
//! - [`lifecycle`] - Construct, hydrate, save and delete with their phases
//! - [`context`] - [`ModelContext`], owner of the registry
//! - [`config`] and [`telemetry`] - Configuration and subscriber setup
//!
//! # Example
//!
//! ```
//! use orbit_model::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Model)]
//! #[model(table = "posts")]
//! struct Post {
//!     id: Option<i64>,
//!     title: String,
//! }
//!
//! let ctx = ModelContext::new();
//! ctx.observe::<Post, OnPostInsert, _>("announce", |event| {
//!     tracing::info!(id = ?event.subject().id, "post published");
//! })
//! .unwrap();
//!
//! let conn = ConnectionHandle::new(MemoryConnection::default());
//! let mut post = ctx.create::<Post>().unwrap();
//! post.title = "Hello".into();
//! ctx.save(&mut post, &conn).unwrap();
//!
//! let found = ctx.find::<Post>(1, &conn).unwrap().unwrap();
//! assert_eq!(found.title, "Hello");
//! ```

extern crate self as orbit_model;

pub mod aware;
pub mod config;
pub mod connection;
pub mod context;
pub mod emit;
pub mod event;
pub mod lifecycle;
pub mod payload;
pub mod phase;
pub mod record;
pub mod registry;
pub mod telemetry;

pub use aware::EventDispatcherAware;
pub use config::{ConfigError, EventsConfig};
pub use connection::{Connection, ConnectionHandle, MemoryConnection, Row, StorageError, StorageOp};
pub use context::{ModelContext, ModelContextBuilder, RegistrationError};
pub use emit::{EmitError, Emission};
pub use event::{ModelEvent, SubjectMismatch};
pub use lifecycle::{Constructed, DeleteOutcome, LifecycleError, SaveOutcome};
pub use model_macros::Model;
pub use payload::{PayloadBuilder, PayloadError};
pub use phase::{
    CONNECTION, IntoPhases, OnConstruct, OnPostDelete, OnPostHydrate, OnPostInsert, OnPostSave,
    OnPostUpdate, OnPreDelete, OnPreInsert, OnPreSave, OnPreUpdate, Phase, PhaseFamily,
    PhaseMarker, UnknownPhase,
};
pub use record::Record;
pub use registry::{DispatcherRegistry, ModelId};

/// Commonly used items for defining models and listening to them.
pub mod prelude {
    pub use crate::{
        ConnectionHandle, Constructed, DeleteOutcome, EventDispatcherAware, MemoryConnection,
        Model, ModelContext, ModelEvent, Phase, Record, SaveOutcome,
    };
    pub use crate::phase::{
        OnConstruct, OnPostDelete, OnPostHydrate, OnPostInsert, OnPostSave, OnPostUpdate,
        OnPreDelete, OnPreInsert, OnPreSave, OnPreUpdate,
    };
    pub use orbit_events::{ListenerResult, Propagation};
}
