//! DTO definitions for phase control and inspection.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_name, phase::{GroupOrdering, PhaseGroup}};

/// Request to move the event to a phase of the active group.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetPhaseRequest {
    /// Phase to set or start.
    #[validate(custom(function = "validate_name"))]
    pub phase: String,
    /// Only set the phase: skip its start effects and keep the timer.
    #[serde(default)]
    pub raw: bool,
    /// Proceed even when required locations are unset.
    #[serde(default)]
    pub force: bool,
    /// Seconds remaining once the phase is current, at most one week.
    #[serde(default)]
    #[validate(range(max = 604800))]
    pub timer: Option<u64>,
}

/// Request to activate a phase group, optionally at a given phase.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartGroupRequest {
    /// Group to activate.
    #[validate(custom(function = "validate_name"))]
    pub group: String,
    /// Phase of the group to jump to instead of its next one.
    #[serde(default)]
    #[validate(custom(function = "validate_name"))]
    pub phase: Option<String>,
    /// Seconds remaining once the group is running, at most one week.
    #[serde(default)]
    #[validate(range(max = 604800))]
    pub timer: Option<u64>,
    /// When jumping to `phase`, only set it.
    #[serde(default)]
    pub raw: bool,
    /// Proceed even when required locations are unset.
    #[serde(default)]
    pub force: bool,
}

/// Request to skip ahead in the active group.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SkipRequest {
    /// Number of phases to start in a row.
    #[serde(default = "default_skip_count")]
    #[validate(range(min = 1, max = 100))]
    pub count: u32,
}

fn default_skip_count() -> u32 {
    1
}

/// Request to change the countdown of the current phase.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TimerRequest {
    /// Seconds left before the phase runs out, at most one week.
    #[validate(range(max = 604800))]
    pub seconds: u64,
}

/// Registered phase group as listed to clients.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct GroupSummary {
    /// Group name.
    pub name: String,
    /// Whether the group stops after its last phase or starts over.
    pub ordering: GroupOrdering,
    /// Phase names in run order.
    pub phases: Vec<String>,
    /// Locations any phase of the group requires.
    pub required_locations: Vec<String>,
}

impl From<&PhaseGroup> for GroupSummary {
    fn from(group: &PhaseGroup) -> Self {
        Self {
            name: group.name().to_owned(),
            ordering: group.ordering(),
            phases: group.phases().iter().map(|p| p.name().to_owned()).collect(),
            required_locations: group.required_event_locations(),
        }
    }
}
