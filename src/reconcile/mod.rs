//! Reconcile Module - pure decision logic
//!
//! `decide()` compares the declared state with what the controller holds and
//! returns a [`Plan`]. It never talks to a backend, so the same inputs give
//! the same plan whichever transport produced them.
//!
//! Comparison is existence-based: an object either exists under a name or it
//! does not. No field of an existing object is diffed.

mod executor;
mod fetcher;

pub use executor::ActionExecutor;
pub use fetcher::{normalize, StateFetcher};

use crate::domain::ports::{DesiredState, ManagedObject, State};
use crate::error::{Error, Result};
use crate::objects::ObjectType;
use serde::Serialize;

/// Data-free tag of a decision, comparable across backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    None,
    Create,
    Delete,
    Rename,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::None => write!(f, "none"),
            ActionKind::Create => write!(f, "create"),
            ActionKind::Delete => write!(f, "delete"),
            ActionKind::Rename => write!(f, "rename"),
        }
    }
}

/// What to do to reach the desired state
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    None,
    Create,
    /// Remove the existing object
    Delete { target: ManagedObject },
    /// Rename `source` to the desired name
    Rename { source: ManagedObject },
}

impl Decision {
    pub fn kind(&self) -> ActionKind {
        match self {
            Decision::None => ActionKind::None,
            Decision::Create => ActionKind::Create,
            Decision::Delete { .. } => ActionKind::Delete,
            Decision::Rename { .. } => ActionKind::Rename,
        }
    }
}

/// Decision plus the resulting change flag
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub decision: Decision,
    pub changed: bool,
}

impl Plan {
    pub fn new(decision: Decision) -> Self {
        let changed = decision != Decision::None;
        Self { decision, changed }
    }

    /// Plan for objects that are sent on every run
    pub fn action_only() -> Self {
        Self::new(Decision::Create)
    }
}

/// Compute the plan for one object.
///
/// * `current` - object currently named `desired.name`
/// * `source` - object currently named `desired.from_name`, when one is given
pub fn decide(
    object: ObjectType,
    desired: &DesiredState,
    current: Option<&ManagedObject>,
    source: Option<&ManagedObject>,
) -> Result<Plan> {
    // rename and create/delete are mutually exclusive
    if let Some(from_name) = &desired.from_name {
        return decide_rename(object, from_name, current, source).map(Plan::new);
    }

    let decision = match (desired.state, current) {
        (State::Present, None) => Decision::Create,
        (State::Absent, Some(target)) => Decision::Delete {
            target: target.clone(),
        },
        _ => Decision::None,
    };
    Ok(Plan::new(decision))
}

fn decide_rename(
    object: ObjectType,
    from_name: &str,
    current: Option<&ManagedObject>,
    source: Option<&ManagedObject>,
) -> Result<Decision> {
    match (source, current) {
        (None, None) => Err(Error::Validation(format!(
            "Error renaming: {} {} does not exist",
            object.label(),
            from_name
        ))),
        // already renamed by an earlier run
        (None, Some(_)) => Ok(Decision::None),
        // target name is taken
        (Some(_), Some(_)) => Ok(Decision::None),
        (Some(source), None) => Ok(Decision::Rename {
            source: source.clone(),
        }),
    }
}
