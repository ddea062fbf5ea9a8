//! Lifecycle operations and the phases they emit.
//!
//! | Operation | Phases, in order |
//! |-----------|------------------|
//! | [`ModelContext::construct`], [`ModelContext::create`] | `Construct` |
//! | [`ModelContext::hydrate`], [`ModelContext::find`] | `Construct`, `PostHydrate` |
//! | [`ModelContext::reload`] | `PostHydrate` |
//! | [`ModelContext::save`] of a new model | `PreSave`, `PreInsert`, *insert*, `PostInsert`, `PostSave` |
//! | [`ModelContext::save`] of a stored model | `PreSave`, `PreUpdate`, *update*, `PostUpdate`, `PostSave` |
//! | [`ModelContext::delete`] | `PreDelete`, *delete*, `PostDelete` |
//!
//! Every operation after construction takes a [`Constructed`] model, which
//! only the constructing operations hand out, so `Construct` is always the
//! first phase an instance goes through.
//!
//! A cancelled pre-phase skips every later phase and the storage write.
//! A failing post-phase listener is returned as an error, but the write it
//! follows has already happened and is not undone.

use core::ops::{Deref, DerefMut};

use crate::aware::EventDispatcherAware;
use crate::connection::{ConnectionHandle, Row, StorageError};
use crate::context::ModelContext;
use crate::emit::{self, EmitError, Emission};
use crate::phase::Phase;
use crate::record::Record;

// ─────────────────────────────────────────────────────────────────────────────
// Constructed
// ─────────────────────────────────────────────────────────────────────────────

/// A model whose `Construct` phase has fired.
///
/// Obtained from [`ModelContext::construct`], [`ModelContext::create`],
/// [`ModelContext::hydrate`] or [`ModelContext::find`]. Dereferences to the
/// model, so fields are read and written as usual.
///
/// A bare model cannot be saved:
///
/// ```compile_fail
/// use orbit_model::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize, Model)]
/// struct Post {
///     id: Option<i64>,
/// }
///
/// let ctx = ModelContext::new();
/// let conn = ConnectionHandle::new(MemoryConnection::default());
/// ctx.save(&mut Post::default(), &conn).unwrap();
/// ```
#[derive(Debug)]
pub struct Constructed<M>(M);

impl<M> Constructed<M> {
    /// Unwraps the model. The plain value takes no further part in
    /// lifecycle operations.
    #[must_use]
    pub fn into_inner(self) -> M {
        self.0
    }
}

impl<M> Deref for Constructed<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.0
    }
}

impl<M> DerefMut for Constructed<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.0
    }
}

impl<M> AsRef<M> for Constructed<M> {
    fn as_ref(&self) -> &M {
        &self.0
    }
}

/// Result of [`ModelContext::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The model was inserted under `key`.
    Inserted {
        /// The assigned primary key.
        key: i64,
    },
    /// The row under `key` was updated.
    Updated {
        /// The model's primary key.
        key: i64,
    },
    /// A listener cancelled the save; nothing was written.
    Cancelled {
        /// The pre-phase that was cancelled.
        phase: Phase,
        /// Name of the cancelling listener.
        listener: String,
    },
}

impl SaveOutcome {
    /// Returns `true` if a listener cancelled the save.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SaveOutcome::Cancelled { .. })
    }

    /// Returns the key written, if the save went ahead.
    #[must_use]
    pub fn key(&self) -> Option<i64> {
        match self {
            SaveOutcome::Inserted { key } | SaveOutcome::Updated { key } => Some(*key),
            SaveOutcome::Cancelled { .. } => None,
        }
    }
}

/// Result of [`ModelContext::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The row under `key` was removed.
    Deleted {
        /// The removed key.
        key: i64,
    },
    /// A listener cancelled the delete; nothing was removed.
    Cancelled {
        /// Name of the cancelling listener.
        listener: String,
    },
}

impl DeleteOutcome {
    /// Returns `true` if a listener cancelled the delete.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeleteOutcome::Cancelled { .. })
    }
}

/// Errors raised by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Notifying a phase failed.
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// The connection failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The operation needs a stored model.
    #[error("'{model}' has no primary key; it was never saved")]
    NotPersisted {
        /// The model type.
        model: &'static str,
    },
}

impl ModelContext {
    /// Finishes constructing `model`. Fires `Construct`.
    pub fn construct<M: EventDispatcherAware>(
        &self,
        model: M,
    ) -> Result<Constructed<M>, EmitError> {
        emit::emit(self.registry(), Phase::Construct, &model, None)?;
        Ok(Constructed(model))
    }

    /// Constructs a default `M`. Fires `Construct`.
    pub fn create<M: EventDispatcherAware + Default>(&self) -> Result<Constructed<M>, EmitError> {
        self.construct(M::default())
    }

    /// Builds a model from a storage row.
    ///
    /// `Construct` fires on the empty instance before any field is
    /// populated; `PostHydrate` fires after. The row is applied to that same
    /// instance with [`Record::apply_row`].
    pub fn hydrate<M: Record>(&self, row: Row) -> Result<Constructed<M>, LifecycleError> {
        let mut model = self.create::<M>()?;
        self.populate(&mut model, row)?;
        Ok(model)
    }

    /// Loads the model stored under `key`.
    pub fn find<M: Record>(
        &self,
        key: i64,
        connection: &ConnectionHandle,
    ) -> Result<Option<Constructed<M>>, LifecycleError> {
        match connection.fetch(M::TABLE, key)? {
            Some(row) => self.hydrate(row).map(Some),
            None => Ok(None),
        }
    }

    /// Re-reads `model` from storage. Fires `PostHydrate` once.
    ///
    /// Fields the row mapping skips keep their current values.
    pub fn reload<M: Record>(
        &self,
        model: &mut Constructed<M>,
        connection: &ConnectionHandle,
    ) -> Result<(), LifecycleError> {
        let key = stored_key(model)?;
        let row = connection
            .fetch(M::TABLE, key)?
            .ok_or_else(|| StorageError::RowNotFound {
                table: M::TABLE.to_owned(),
                key,
            })?;
        self.populate(model, row)
    }

    /// Inserts or updates `model`.
    ///
    /// New models are inserted and receive their key. A cancelled pre-phase
    /// returns [`SaveOutcome::Cancelled`] without writing.
    pub fn save<M: Record>(
        &self,
        model: &mut Constructed<M>,
        connection: &ConnectionHandle,
    ) -> Result<SaveOutcome, LifecycleError> {
        let _span = tracing::debug_span!("save", model = M::model_name()).entered();

        if let Emission::Cancelled { listener } =
            self.emit(Phase::PreSave, model, Some(connection))?
        {
            return Ok(SaveOutcome::Cancelled {
                phase: Phase::PreSave,
                listener,
            });
        }

        let outcome = match model.primary_key() {
            None => {
                if let Emission::Cancelled { listener } =
                    self.emit(Phase::PreInsert, model, Some(connection))?
                {
                    return Ok(SaveOutcome::Cancelled {
                        phase: Phase::PreInsert,
                        listener,
                    });
                }
                let key = connection.insert(M::TABLE, M::PRIMARY_KEY, model.to_row()?)?;
                model.set_primary_key(key);
                self.emit(Phase::PostInsert, model, Some(connection))?;
                SaveOutcome::Inserted { key }
            }
            Some(key) => {
                if let Emission::Cancelled { listener } =
                    self.emit(Phase::PreUpdate, model, Some(connection))?
                {
                    return Ok(SaveOutcome::Cancelled {
                        phase: Phase::PreUpdate,
                        listener,
                    });
                }
                connection.update(M::TABLE, key, model.to_row()?)?;
                self.emit(Phase::PostUpdate, model, Some(connection))?;
                SaveOutcome::Updated { key }
            }
        };

        self.emit(Phase::PostSave, model, Some(connection))?;
        Ok(outcome)
    }

    /// Deletes the stored row of `model`.
    pub fn delete<M: Record>(
        &self,
        model: &Constructed<M>,
        connection: &ConnectionHandle,
    ) -> Result<DeleteOutcome, LifecycleError> {
        let key = stored_key(model)?;
        let _span = tracing::debug_span!("delete", model = M::model_name(), key).entered();

        if let Emission::Cancelled { listener } =
            self.emit(Phase::PreDelete, model, Some(connection))?
        {
            return Ok(DeleteOutcome::Cancelled { listener });
        }

        if !connection.delete(M::TABLE, key)? {
            return Err(StorageError::RowNotFound {
                table: M::TABLE.to_owned(),
                key,
            }
            .into());
        }
        self.emit(Phase::PostDelete, model, Some(connection))?;
        Ok(DeleteOutcome::Deleted { key })
    }

    fn populate<M: Record>(
        &self,
        model: &mut Constructed<M>,
        row: Row,
    ) -> Result<(), LifecycleError> {
        model.0.apply_row(row)?;
        self.emit(Phase::PostHydrate, model, None)?;
        Ok(())
    }
}

fn stored_key<M: Record>(model: &Constructed<M>) -> Result<i64, LifecycleError> {
    model.primary_key().ok_or(LifecycleError::NotPersisted {
        model: M::model_name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, MemoryConnection, StorageOp};
    use crate::phase::{OnConstruct, OnPostHydrate, OnPostSave, OnPreInsert, OnPreSave, OnPreUpdate};
    use orbit_events::{Propagation, TraceableEventDispatcher};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        id: Option<i64>,
        title: String,
    }

    impl EventDispatcherAware for Post {
        fn model_name() -> &'static str {
            "tests::Post"
        }
    }

    impl Record for Post {
        const TABLE: &'static str = "post";
        const PRIMARY_KEY: &'static str = "id";

        fn primary_key(&self) -> Option<i64> {
            self.id
        }

        fn set_primary_key(&mut self, key: i64) {
            self.id = Some(key);
        }
    }

    fn memory() -> (ConnectionHandle, Arc<MemoryConnection>) {
        let memory = Arc::new(MemoryConnection::new("test"));
        (ConnectionHandle::from_arc(memory.clone()), memory)
    }

    fn traced(ctx: &ModelContext) -> Arc<TraceableEventDispatcher> {
        let traced = Arc::new(TraceableEventDispatcher::new());
        ctx.set_dispatcher::<Post>(traced.clone());
        traced
    }

    #[test]
    fn first_save_inserts_with_its_bracket() {
        let ctx = ModelContext::new();
        let trace = traced(&ctx);
        let (conn, memory) = memory();

        let mut post = ctx
            .construct(Post {
                id: None,
                title: "hello".into(),
            })
            .unwrap();
        let outcome = ctx.save(&mut post, &conn).unwrap();
        assert_eq!(outcome, SaveOutcome::Inserted { key: 1 });
        assert_eq!(post.id, Some(1));
        assert_eq!(
            trace.dispatched_events(),
            vec![
                "model.construct",
                "model.pre_save",
                "model.pre_insert",
                "model.post_insert",
                "model.post_save"
            ]
        );
        assert_eq!(memory.row_count("post"), 1);
    }

    #[test]
    fn struct_literal_is_constructed_before_any_other_phase() {
        let ctx = ModelContext::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ctx.observe::<Post, (OnConstruct, OnPreSave, OnPostSave), _>("order", move |event| {
            sink.lock().push(event.phase());
        })
        .unwrap();
        let (conn, _) = memory();

        let mut post = ctx
            .construct(Post {
                id: None,
                title: "literal".into(),
            })
            .unwrap();
        ctx.save(&mut post, &conn).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![Phase::Construct, Phase::PreSave, Phase::PostSave]
        );
        assert_eq!(post.into_inner().title, "literal");
    }

    #[test]
    fn second_save_updates() {
        let ctx = ModelContext::new();
        let (conn, memory) = memory();
        let mut post = ctx.create::<Post>().unwrap();
        ctx.save(&mut post, &conn).unwrap();

        let trace = traced(&ctx);
        post.title = "edited".into();
        assert_eq!(ctx.save(&mut post, &conn).unwrap(), SaveOutcome::Updated { key: 1 });
        assert_eq!(
            trace.dispatched_events(),
            vec![
                "model.pre_save",
                "model.pre_update",
                "model.post_update",
                "model.post_save"
            ]
        );
        assert_eq!(memory.fetch("post", 1).unwrap().unwrap()["title"], "edited");
    }

    #[test]
    fn cancelled_insert_writes_nothing() {
        let ctx = ModelContext::new();
        ctx.listen::<Post, OnPreInsert, _>("veto", |_| Ok(Propagation::Stop))
            .unwrap();
        let (conn, memory) = memory();

        let mut post = ctx.create::<Post>().unwrap();
        let outcome = ctx.save(&mut post, &conn).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Cancelled {
                phase: Phase::PreInsert,
                listener: "veto".into()
            }
        );
        assert!(post.id.is_none());
        assert!(memory.operations().is_empty());
    }

    #[test]
    fn cancelled_update_keeps_stored_row() {
        let ctx = ModelContext::new();
        let (conn, memory) = memory();
        let mut post = ctx.create::<Post>().unwrap();
        ctx.save(&mut post, &conn).unwrap();

        ctx.listen::<Post, OnPreUpdate, _>("freeze", |_| Ok(Propagation::Stop))
            .unwrap();
        post.title = "never stored".into();
        assert!(ctx.save(&mut post, &conn).unwrap().is_cancelled());
        assert_eq!(memory.fetch("post", 1).unwrap().unwrap()["title"], "");
        assert_eq!(memory.operations().len(), 1);
    }

    #[test]
    fn hydrate_fires_construct_before_fields_then_post_hydrate() {
        let ctx = ModelContext::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        ctx.observe::<Post, (OnConstruct, OnPostHydrate), _>("order", move |event| {
            sink.lock().push((event.phase(), event.subject().title.clone()));
        })
        .unwrap();

        let mut row = Row::new();
        row.insert("id".into(), 3.into());
        row.insert("title".into(), "stored".into());
        let post = ctx.hydrate::<Post>(row).unwrap();

        assert_eq!(post.id, Some(3));
        assert_eq!(
            *seen.lock(),
            vec![
                (Phase::Construct, String::new()),
                (Phase::PostHydrate, "stored".to_owned())
            ]
        );
    }

    #[test]
    fn find_missing_row_is_none() {
        let ctx = ModelContext::new();
        let (conn, _) = memory();
        assert!(ctx.find::<Post>(42, &conn).unwrap().is_none());
    }

    #[test]
    fn reload_requires_a_stored_model() {
        let ctx = ModelContext::new();
        let (conn, _) = memory();
        let mut post = ctx.create::<Post>().unwrap();
        assert!(matches!(
            ctx.reload(&mut post, &conn),
            Err(LifecycleError::NotPersisted { model: "tests::Post" })
        ));
    }

    #[test]
    fn reload_of_deleted_row_fails() {
        let ctx = ModelContext::new();
        let (conn, _) = memory();
        let mut post = ctx.create::<Post>().unwrap();
        ctx.save(&mut post, &conn).unwrap();
        conn.delete("post", 1).unwrap();

        let err = ctx.reload(&mut post, &conn).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Storage(StorageError::RowNotFound { key: 1, .. })
        ));
    }

    #[test]
    fn delete_fires_bracket_and_removes_row() {
        let ctx = ModelContext::new();
        let (conn, memory) = memory();
        let mut post = ctx.create::<Post>().unwrap();
        ctx.save(&mut post, &conn).unwrap();

        let trace = traced(&ctx);
        assert_eq!(ctx.delete(&post, &conn).unwrap(), DeleteOutcome::Deleted { key: 1 });
        assert_eq!(
            trace.dispatched_events(),
            vec!["model.pre_delete", "model.post_delete"]
        );
        assert_eq!(
            memory.operations().last(),
            Some(&StorageOp::Delete {
                table: "post".into(),
                key: 1
            })
        );
    }

    #[test]
    fn delete_of_unsaved_model_fires_nothing() {
        let ctx = ModelContext::new();
        let (conn, _) = memory();
        let post = ctx.create::<Post>().unwrap();
        let trace = traced(&ctx);
        assert!(matches!(
            ctx.delete(&post, &conn),
            Err(LifecycleError::NotPersisted { .. })
        ));
        assert!(trace.records().is_empty());
    }

    #[test]
    fn save_outcome_key() {
        assert_eq!(SaveOutcome::Inserted { key: 2 }.key(), Some(2));
        assert_eq!(SaveOutcome::Updated { key: 5 }.key(), Some(5));
        assert_eq!(
            SaveOutcome::Cancelled {
                phase: Phase::PreSave,
                listener: "x".into()
            }
            .key(),
            None
        );
    }
}
