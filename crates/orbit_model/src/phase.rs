//! The lifecycle phase catalogue.
//!
//! [`Phase`] is the closed set of points in a model's life where a
//! notification fires. Phases come in two families:
//!
//! - **Structural**: [`Phase::Construct`] fires once right after an instance
//!   is constructed, before hydration populates any field;
//!   [`Phase::PostHydrate`] fires after an instance was populated from a
//!   storage row.
//! - **Persistence**: `PreSave`/`PostSave` bracket a save; inside it,
//!   `PreInsert`/`PostInsert` or `PreUpdate`/`PostUpdate` bracket the branch
//!   actually taken; `PreDelete`/`PostDelete` bracket a delete.
//!
//! For a single save, `PreSave` fires before the branch's pre-phase and the
//! branch's post-phase fires before `PostSave`.
//!
//! # Marker Types
//!
//! Each phase also has a marker type (e.g. [`OnPreSave`]) so one listener can
//! be registered on several phases with tuple syntax:
//!
//! ```ignore
//! ctx.observe::<Post, (OnPreSave, OnPostSave), _>("audit", |event| {
//!     tracing::info!(phase = %event.phase(), "save step");
//! })?;
//! ```

use core::fmt;
use core::str::FromStr;

use variadics_please::all_tuples;

/// Argument key under which persistence phases carry the storage connection.
pub const CONNECTION: &str = "connection";

const CONNECTION_ONLY: &[&str] = &[CONNECTION];

// ─────────────────────────────────────────────────────────────────────────────
// Phase
// ─────────────────────────────────────────────────────────────────────────────

/// Phase family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseFamily {
    /// Construction and hydration.
    Structural,
    /// Around save, insert, update and delete.
    Persistence,
}

/// A named point in a model's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Right after construction, before hydration.
    Construct,
    /// After fields were populated from a storage row.
    PostHydrate,
    /// Before a save (insert or update).
    PreSave,
    /// After a save completed.
    PostSave,
    /// Before the insert branch of a save.
    PreInsert,
    /// After the insert branch of a save.
    PostInsert,
    /// Before the update branch of a save.
    PreUpdate,
    /// After the update branch of a save.
    PostUpdate,
    /// Before a delete.
    PreDelete,
    /// After a delete.
    PostDelete,
}

impl Phase {
    /// Every phase, in catalogue order.
    pub const ALL: [Phase; 10] = [
        Phase::Construct,
        Phase::PostHydrate,
        Phase::PreSave,
        Phase::PostSave,
        Phase::PreInsert,
        Phase::PostInsert,
        Phase::PreUpdate,
        Phase::PostUpdate,
        Phase::PreDelete,
        Phase::PostDelete,
    ];

    /// Returns the event name listeners register against.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Construct => "model.construct",
            Phase::PostHydrate => "model.post_hydrate",
            Phase::PreSave => "model.pre_save",
            Phase::PostSave => "model.post_save",
            Phase::PreInsert => "model.pre_insert",
            Phase::PostInsert => "model.post_insert",
            Phase::PreUpdate => "model.pre_update",
            Phase::PostUpdate => "model.post_update",
            Phase::PreDelete => "model.pre_delete",
            Phase::PostDelete => "model.post_delete",
        }
    }

    /// Returns the family this phase belongs to.
    #[must_use]
    pub const fn family(self) -> PhaseFamily {
        match self {
            Phase::Construct | Phase::PostHydrate => PhaseFamily::Structural,
            _ => PhaseFamily::Persistence,
        }
    }

    /// Returns `true` for phases that fire before a storage operation.
    ///
    /// Only these phases can cancel the operation they precede.
    #[must_use]
    pub const fn is_pre(self) -> bool {
        matches!(
            self,
            Phase::PreSave | Phase::PreInsert | Phase::PreUpdate | Phase::PreDelete
        )
    }

    /// Returns the argument keys a payload for this phase must carry.
    ///
    /// Persistence phases require [`CONNECTION`]; structural phases require
    /// nothing and accept nothing.
    #[must_use]
    pub const fn required_arguments(self) -> &'static [&'static str] {
        match self.family() {
            PhaseFamily::Structural => &[],
            PhaseFamily::Persistence => CONNECTION_ONLY,
        }
    }

    /// Returns `true` if payloads for this phase carry the connection.
    #[must_use]
    pub const fn requires_connection(self) -> bool {
        matches!(self.family(), PhaseFamily::Persistence)
    }

    /// Returns the matching pre/post phase of a persistence bracket.
    #[must_use]
    pub const fn counterpart(self) -> Option<Phase> {
        match self {
            Phase::Construct | Phase::PostHydrate => None,
            Phase::PreSave => Some(Phase::PostSave),
            Phase::PostSave => Some(Phase::PreSave),
            Phase::PreInsert => Some(Phase::PostInsert),
            Phase::PostInsert => Some(Phase::PreInsert),
            Phase::PreUpdate => Some(Phase::PostUpdate),
            Phase::PostUpdate => Some(Phase::PreUpdate),
            Phase::PreDelete => Some(Phase::PostDelete),
            Phase::PostDelete => Some(Phase::PreDelete),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an event name outside the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle phase '{0}'")]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.name() == name)
            .ok_or_else(|| UnknownPhase(name.to_owned()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase Markers
// ─────────────────────────────────────────────────────────────────────────────

/// Marker type identifying a single [`Phase`] at the type level.
pub trait PhaseMarker: 'static {
    /// The phase this marker stands for.
    const PHASE: Phase;
}

/// Marker for [`Phase::Construct`].
pub struct OnConstruct;
impl PhaseMarker for OnConstruct {
    const PHASE: Phase = Phase::Construct;
}

/// Marker for [`Phase::PostHydrate`].
pub struct OnPostHydrate;
impl PhaseMarker for OnPostHydrate {
    const PHASE: Phase = Phase::PostHydrate;
}

/// Marker for [`Phase::PreSave`].
///
/// Listeners may cancel the save by returning
/// [`Propagation::Stop`](orbit_events::Propagation::Stop).
pub struct OnPreSave;
impl PhaseMarker for OnPreSave {
    const PHASE: Phase = Phase::PreSave;
}

/// Marker for [`Phase::PostSave`].
pub struct OnPostSave;
impl PhaseMarker for OnPostSave {
    const PHASE: Phase = Phase::PostSave;
}

/// Marker for [`Phase::PreInsert`].
pub struct OnPreInsert;
impl PhaseMarker for OnPreInsert {
    const PHASE: Phase = Phase::PreInsert;
}

/// Marker for [`Phase::PostInsert`].
pub struct OnPostInsert;
impl PhaseMarker for OnPostInsert {
    const PHASE: Phase = Phase::PostInsert;
}

/// Marker for [`Phase::PreUpdate`].
pub struct OnPreUpdate;
impl PhaseMarker for OnPreUpdate {
    const PHASE: Phase = Phase::PreUpdate;
}

/// Marker for [`Phase::PostUpdate`].
pub struct OnPostUpdate;
impl PhaseMarker for OnPostUpdate {
    const PHASE: Phase = Phase::PostUpdate;
}

/// Marker for [`Phase::PreDelete`].
pub struct OnPreDelete;
impl PhaseMarker for OnPreDelete {
    const PHASE: Phase = Phase::PreDelete;
}

/// Marker for [`Phase::PostDelete`].
pub struct OnPostDelete;
impl PhaseMarker for OnPostDelete {
    const PHASE: Phase = Phase::PostDelete;
}

/// Types that can be converted into a list of phases.
///
/// Implemented for single markers and tuples of up to ten markers.
pub trait IntoPhases {
    /// Returns the phases for this type, in declaration order.
    fn phases() -> Vec<Phase>;
}

impl<P: PhaseMarker> IntoPhases for P {
    fn phases() -> Vec<Phase> {
        vec![P::PHASE]
    }
}

macro_rules! impl_into_phases_for_tuple {
    ($($P:ident),*) => {
        impl<$($P: PhaseMarker),*> IntoPhases for ($($P,)*) {
            fn phases() -> Vec<Phase> {
                vec![$($P::PHASE),*]
            }
        }
    };
}

all_tuples!(impl_into_phases_for_tuple, 2, 10, P);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_is_closed_and_named() {
        assert_eq!(Phase::ALL.len(), 10);
        for phase in Phase::ALL {
            assert!(phase.name().starts_with("model."));
            assert_eq!(phase.name().parse::<Phase>(), Ok(phase));
            assert_eq!(phase.to_string(), phase.name());
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "model.pre_flight".parse::<Phase>().unwrap_err();
        assert_eq!(err, UnknownPhase("model.pre_flight".into()));
        assert_eq!(err.to_string(), "unknown lifecycle phase 'model.pre_flight'");
    }

    #[test]
    fn structural_phases_take_no_arguments() {
        for phase in [Phase::Construct, Phase::PostHydrate] {
            assert_eq!(phase.family(), PhaseFamily::Structural);
            assert!(phase.required_arguments().is_empty());
            assert!(!phase.requires_connection());
            assert!(!phase.is_pre());
            assert!(phase.counterpart().is_none());
        }
    }

    #[test]
    fn persistence_phases_require_connection() {
        for phase in &Phase::ALL[2..] {
            assert_eq!(phase.family(), PhaseFamily::Persistence);
            assert_eq!(phase.required_arguments(), &[CONNECTION]);
            assert!(phase.requires_connection());
        }
    }

    #[test]
    fn pre_phases_pair_with_post_phases() {
        let pre: Vec<Phase> = Phase::ALL.into_iter().filter(|p| p.is_pre()).collect();
        assert_eq!(
            pre,
            vec![Phase::PreSave, Phase::PreInsert, Phase::PreUpdate, Phase::PreDelete]
        );
        for phase in pre {
            let post = phase.counterpart().expect("pre phase has a post phase");
            assert!(!post.is_pre());
            assert_eq!(post.counterpart(), Some(phase));
        }
    }

    #[test]
    fn markers_convert_to_phases() {
        assert_eq!(OnConstruct::phases(), vec![Phase::Construct]);
        assert_eq!(
            <(OnPreSave, OnPreInsert, OnPostInsert, OnPostSave)>::phases(),
            vec![
                Phase::PreSave,
                Phase::PreInsert,
                Phase::PostInsert,
                Phase::PostSave
            ]
        );
    }
}
