//! End-to-end tests for lifecycle event emission.

use std::sync::{Arc, Mutex};

use orbit_events::{RecordedOutcome, TraceableEventDispatcher};
use orbit_model::prelude::*;
use orbit_model::{Connection, EmitError, EventsConfig, LifecycleError, StorageOp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Model)]
struct Post {
    id: Option<i64>,
    title: String,
    body: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Model)]
struct Thread {
    id: Option<i64>,
    topic: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Model)]
struct Draft {
    id: Option<i64>,
    text: String,
    #[serde(skip)]
    edits: u32,
}

#[derive(Debug, Default, Serialize, Deserialize, Model)]
struct AuditEntry {
    id: Option<i64>,
    message: String,
}

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn memory() -> (ConnectionHandle, Arc<MemoryConnection>) {
    let memory = Arc::new(MemoryConnection::new("test"));
    (ConnectionHandle::from_arc(memory.clone()), memory)
}

/// Records every phase of `M` into `log` as `"{label}:{phase}"`.
fn record_all<M: EventDispatcherAware>(ctx: &ModelContext, label: &'static str, log: &Log) {
    let sink = Arc::clone(log);
    ctx.observe::<M, (
        OnConstruct,
        OnPostHydrate,
        OnPreSave,
        OnPostSave,
        OnPreInsert,
        OnPostInsert,
        OnPreUpdate,
        OnPostUpdate,
        OnPreDelete,
        OnPostDelete,
    ), _>(label, move |event| {
        sink.lock()
            .unwrap()
            .push(format!("{label}:{}", event.phase()));
    })
    .unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase sequences
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_lifecycle_emits_every_phase_in_order() {
    let ctx = ModelContext::new();
    let seen = log();
    record_all::<Post>(&ctx, "post", &seen);
    let (conn, _) = memory();

    let mut post = ctx.create::<Post>().unwrap();
    post.title = "Hello".into();
    ctx.save(&mut post, &conn).unwrap();
    post.body = "World".into();
    ctx.save(&mut post, &conn).unwrap();
    let loaded = ctx.find::<Post>(post.id.unwrap(), &conn).unwrap().unwrap();
    ctx.delete(&loaded, &conn).unwrap();

    assert_eq!(
        entries(&seen),
        vec![
            "post:model.construct",
            "post:model.pre_save",
            "post:model.pre_insert",
            "post:model.post_insert",
            "post:model.post_save",
            "post:model.pre_save",
            "post:model.pre_update",
            "post:model.post_update",
            "post:model.post_save",
            "post:model.construct",
            "post:model.post_hydrate",
            "post:model.pre_delete",
            "post:model.post_delete",
        ]
    );
}

#[test]
fn reload_fires_post_hydrate_exactly_once() {
    let ctx = ModelContext::new();
    let (conn, _) = memory();
    let mut post = ctx.create::<Post>().unwrap();
    ctx.save(&mut post, &conn).unwrap();

    let seen = log();
    record_all::<Post>(&ctx, "post", &seen);
    ctx.reload(&mut post, &conn).unwrap();
    assert_eq!(entries(&seen), vec!["post:model.post_hydrate"]);
}

#[test]
fn listeners_run_in_registration_order() {
    let ctx = ModelContext::new();
    let seen = log();
    for name in ["first", "second", "third"] {
        let sink = Arc::clone(&seen);
        ctx.observe::<Post, OnPreSave, _>(name, move |_| {
            sink.lock().unwrap().push(name.to_owned());
        })
        .unwrap();
    }

    let (conn, _) = memory();
    ctx.save(&mut ctx.create::<Post>().unwrap(), &conn).unwrap();
    assert_eq!(entries(&seen), vec!["first", "second", "third"]);
}

#[test]
fn struct_literal_goes_through_construct_first() {
    let ctx = ModelContext::new();
    let seen = log();
    record_all::<Post>(&ctx, "post", &seen);
    let (conn, _) = memory();

    let mut post = ctx
        .construct(Post {
            id: None,
            title: "a-title".into(),
            body: String::new(),
        })
        .unwrap();
    ctx.save(&mut post, &conn).unwrap();

    let phases = entries(&seen);
    assert_eq!(phases.first().map(String::as_str), Some("post:model.construct"));
    assert_eq!(phases.len(), 5);
    assert_eq!(post.into_inner().title, "a-title");
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn listener_receives_the_same_instance_and_connection() {
    let ctx = ModelContext::new();
    let (conn, _) = memory();
    let subject_addr = Arc::new(Mutex::new(Vec::new()));
    let expected_conn = conn.clone();

    let sink = Arc::clone(&subject_addr);
    ctx.listen::<Post, (OnPreSave, OnPostSave), _>("identity", move |event| {
        assert!(event.connection().unwrap().ptr_eq(&expected_conn));
        sink.lock()
            .unwrap()
            .push(core::ptr::from_ref(event.subject()) as usize);
        Ok(Propagation::Continue)
    })
    .unwrap();

    let mut post = ctx.create::<Post>().unwrap();
    ctx.save(&mut post, &conn).unwrap();

    let addr = core::ptr::from_ref(&*post) as usize;
    assert_eq!(*subject_addr.lock().unwrap(), vec![addr, addr]);
}

#[test]
fn post_insert_sees_the_assigned_key() {
    let ctx = ModelContext::new();
    let keys = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&keys);
    ctx.observe::<Post, (OnPreInsert, OnPostInsert), _>("keys", move |event| {
        sink.lock().unwrap().push(event.subject().id);
    })
    .unwrap();

    let (conn, _) = memory();
    ctx.save(&mut ctx.create::<Post>().unwrap(), &conn).unwrap();
    assert_eq!(*keys.lock().unwrap(), vec![None, Some(1)]);
}

#[test]
fn structural_phases_carry_no_connection() {
    let ctx = ModelContext::new();
    let checked = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&checked);
    ctx.observe::<Post, (OnConstruct, OnPostHydrate), _>("no-conn", move |event| {
        assert!(event.connection().is_none());
        assert!(event.arguments().is_empty());
        *sink.lock().unwrap() += 1;
    })
    .unwrap();

    let (conn, _) = memory();
    let mut post = ctx.create::<Post>().unwrap();
    ctx.save(&mut post, &conn).unwrap();
    ctx.reload(&mut post, &conn).unwrap();
    assert_eq!(*checked.lock().unwrap(), 2);
}

#[test]
fn emitting_a_persistence_phase_without_connection_is_a_contract_error() {
    let ctx = ModelContext::new();
    let post = ctx.create::<Post>().unwrap();
    let err = ctx.emit(Phase::PostSave, &post, None).unwrap_err();
    assert!(matches!(err, EmitError::Contract { model, .. } if model.ends_with("::Post")));
}

#[test]
fn loading_a_row_keeps_skipped_fields() {
    let ctx = ModelContext::new();
    let (conn, _) = memory();

    let mut draft = ctx
        .construct(Draft {
            id: None,
            text: "v1".into(),
            edits: 3,
        })
        .unwrap();
    ctx.save(&mut draft, &conn).unwrap();

    let mut other = ctx.find::<Draft>(1, &conn).unwrap().unwrap();
    assert_eq!((other.text.as_str(), other.edits), ("v1", 0));
    other.text = "v2".into();
    ctx.save(&mut other, &conn).unwrap();

    ctx.reload(&mut draft, &conn).unwrap();
    assert_eq!(draft.text, "v2");
    assert_eq!(draft.edits, 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation and failure
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn pre_save_cancellation_skips_later_listeners_and_write() {
    let ctx = ModelContext::new();
    let seen = log();
    ctx.listen::<Post, OnPreSave, _>("validate", |event| {
        if event.subject().title.is_empty() {
            Ok(Propagation::Stop)
        } else {
            Ok(Propagation::Continue)
        }
    })
    .unwrap();
    record_all::<Post>(&ctx, "later", &seen);

    let (conn, memory) = memory();
    let mut post = ctx.create::<Post>().unwrap();
    let outcome = ctx.save(&mut post, &conn).unwrap();

    assert_eq!(
        outcome,
        SaveOutcome::Cancelled {
            phase: Phase::PreSave,
            listener: "validate".into()
        }
    );
    assert!(entries(&seen).is_empty());
    assert!(memory.operations().is_empty());
    assert!(post.id.is_none());
}

#[test]
fn pre_delete_cancellation_keeps_row() {
    let ctx = ModelContext::new();
    let (conn, memory) = memory();
    let mut post = ctx.create::<Post>().unwrap();
    ctx.save(&mut post, &conn).unwrap();

    ctx.listen::<Post, OnPreDelete, _>("protect", |_| Ok(Propagation::Stop))
        .unwrap();
    let outcome = ctx.delete(&post, &conn).unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Cancelled {
            listener: "protect".into()
        }
    );
    assert_eq!(memory.row_count("post"), 1);
}

#[test]
fn failing_pre_listener_aborts_before_write() {
    let ctx = ModelContext::new();
    ctx.listen::<Post, OnPreInsert, _>("quota", |_| Err("quota exceeded".into()))
        .unwrap();

    let (conn, memory) = memory();
    let err = ctx.save(&mut ctx.create::<Post>().unwrap(), &conn).unwrap_err();
    match err {
        LifecycleError::Emit(EmitError::Listener {
            phase, listener, ..
        }) => {
            assert_eq!(phase, Phase::PreInsert);
            assert_eq!(listener, "quota");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(memory.operations().is_empty());
}

#[test]
fn failing_post_listener_leaves_the_write_in_place() {
    let ctx = ModelContext::new();
    let post_save_ran = Arc::new(Mutex::new(false));
    ctx.listen::<Post, OnPostInsert, _>("notifier", |_| Err("smtp down".into()))
        .unwrap();
    let flag = Arc::clone(&post_save_ran);
    ctx.observe::<Post, OnPostSave, _>("after", move |_| *flag.lock().unwrap() = true)
        .unwrap();

    let (conn, memory) = memory();
    let mut post = ctx.create::<Post>().unwrap();
    let err = ctx.save(&mut post, &conn).unwrap_err();

    assert!(err.to_string().contains("smtp down"));
    assert_eq!(post.id, Some(1));
    assert_eq!(
        memory.operations(),
        vec![StorageOp::Insert {
            table: "post".into(),
            key: 1
        }]
    );
    assert!(!*post_save_ran.lock().unwrap());
}

#[test]
fn stop_on_post_phase_only_skips_remaining_listeners() {
    let ctx = ModelContext::new();
    let seen = log();
    ctx.listen::<Post, OnPostSave, _>("short-circuit", |_| Ok(Propagation::Stop))
        .unwrap();
    let sink = Arc::clone(&seen);
    ctx.observe::<Post, OnPostSave, _>("skipped", move |_| {
        sink.lock().unwrap().push("skipped".into());
    })
    .unwrap();

    let (conn, _) = memory();
    let outcome = ctx.save(&mut ctx.create::<Post>().unwrap(), &conn).unwrap();
    assert_eq!(outcome, SaveOutcome::Inserted { key: 1 });
    assert!(entries(&seen).is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn models_do_not_hear_each_others_events() {
    let ctx = ModelContext::new();
    let seen = log();
    record_all::<Post>(&ctx, "post", &seen);
    record_all::<Thread>(&ctx, "thread", &seen);

    let (conn, _) = memory();
    let mut thread = ctx.create::<Thread>().unwrap();
    ctx.save(&mut thread, &conn).unwrap();

    assert!(entries(&seen).iter().all(|entry| entry.starts_with("thread:")));
    assert_eq!(entries(&seen).len(), 5);
}

#[test]
fn replaced_channel_receives_subsequent_events() {
    let ctx = ModelContext::new();
    let old_seen = log();
    record_all::<Post>(&ctx, "old", &old_seen);

    let traced = Arc::new(TraceableEventDispatcher::new());
    Post::set_event_dispatcher(&ctx, traced.clone());

    let (conn, _) = memory();
    ctx.save(&mut ctx.create::<Post>().unwrap(), &conn).unwrap();

    assert!(entries(&old_seen).is_empty());
    assert_eq!(traced.dispatched_events()[0], Post::EVENT_CONSTRUCT);
    assert_eq!(traced.records().len(), 5);
    assert!(
        traced
            .records()
            .iter()
            .all(|record| record.outcome == RecordedOutcome::Completed
                && record.subject_type.ends_with("Post"))
    );
}

#[test]
fn configured_default_kind_builds_traceable_channels() {
    let config = EventsConfig::from_json_str(r#"{ "dispatcher": "traceable" }"#).unwrap();
    let ctx = ModelContext::from_config(config).unwrap();
    ctx.listen::<Post, OnPreUpdate, _>("readonly", |_| Ok(Propagation::Stop))
        .unwrap();

    let (conn, _) = memory();
    let mut post = ctx.create::<Post>().unwrap();
    assert_eq!(ctx.save(&mut post, &conn).unwrap(), SaveOutcome::Inserted { key: 1 });
    assert!(ctx.save(&mut post, &conn).unwrap().is_cancelled());

    let dispatcher = Post::event_dispatcher(&ctx);
    assert_eq!(dispatcher.kind(), TraceableEventDispatcher::KIND);
    assert_eq!(dispatcher.listener_count(Post::EVENT_PRE_UPDATE), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Reentrancy
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn listener_may_persist_another_model() {
    let ctx = Arc::new(ModelContext::new());
    let (conn, memory) = memory();

    let inner_ctx = Arc::downgrade(&ctx);
    ctx.listen::<Post, OnPostInsert, _>("audit", move |event| {
        let Some(ctx) = inner_ctx.upgrade() else {
            return Ok(Propagation::Continue);
        };
        let conn = event.connection().ok_or("missing connection")?;
        let mut entry = ctx.create::<AuditEntry>()?;
        entry.message = format!("post {:?} created", event.subject().id);
        ctx.save(&mut entry, conn)?;
        Ok(Propagation::Continue)
    })
    .unwrap();

    ctx.save(&mut ctx.create::<Post>().unwrap(), &conn).unwrap();

    assert_eq!(memory.row_count("post"), 1);
    assert_eq!(memory.row_count("audit_entry"), 1);
    let stored = memory.fetch("audit_entry", 1).unwrap().unwrap();
    assert_eq!(stored["message"], "post Some(1) created");
}

#[test]
fn listener_may_register_during_dispatch() {
    let ctx = Arc::new(ModelContext::new());
    let seen = log();

    let inner_ctx = Arc::downgrade(&ctx);
    let sink = Arc::clone(&seen);
    ctx.observe::<Post, OnConstruct, _>("installer", move |_| {
        let Some(ctx) = inner_ctx.upgrade() else {
            return;
        };
        let sink = Arc::clone(&sink);
        // Registered during the pass, so only later passes call it.
        let _ = ctx.observe::<Post, OnConstruct, _>("late", move |_| {
            sink.lock().unwrap().push("late".into());
        });
    })
    .unwrap();

    ctx.create::<Post>().unwrap();
    assert!(entries(&seen).is_empty());
    ctx.create::<Post>().unwrap();
    assert_eq!(entries(&seen), vec!["late"]);
}
