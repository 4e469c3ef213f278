//! Ordered collections of phases and the rules that pick the next one.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{PhaseError, PhaseRef};

/// Niladic callback run once when a group is started (not when it is merely set).
pub type StartScript = Box<dyn Fn() -> super::HookResult + Send + Sync>;

/// Strategy deciding what happens once the cursor walks past the last phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrdering {
    /// Run each phase once, front to back, then report exhaustion.
    Queue,
    /// Wrap back to the first phase when the list runs out.
    Loop,
}

/// Resolve the cursor for the next lookup. A looping group rewinds to the
/// front once the cursor walks off the end.
pub fn normalize_cursor(ordering: GroupOrdering, len: usize, cursor: usize) -> usize {
    match ordering {
        GroupOrdering::Queue => cursor,
        GroupOrdering::Loop if cursor >= len => 0,
        GroupOrdering::Loop => cursor,
    }
}

/// Index of the phase the group would hand out next, if any.
pub fn next_index(ordering: GroupOrdering, len: usize, cursor: usize) -> Option<usize> {
    let cursor = normalize_cursor(ordering, len, cursor);
    (cursor < len).then_some(cursor)
}

/// Named, ordered list of phases plus a cursor pointing at the next one.
pub struct PhaseGroup {
    name: String,
    ordering: GroupOrdering,
    phases: Vec<PhaseRef>,
    cursor: usize,
    start_script: Option<StartScript>,
}

impl PhaseGroup {
    /// Build a group with an explicit ordering strategy.
    pub fn new(name: impl Into<String>, ordering: GroupOrdering, phases: Vec<PhaseRef>) -> Self {
        Self {
            name: name.into(),
            ordering,
            phases,
            cursor: 0,
            start_script: None,
        }
    }

    /// Phases run once, in the given order.
    pub fn queue(name: impl Into<String>, phases: Vec<PhaseRef>) -> Self {
        Self::new(name, GroupOrdering::Queue, phases)
    }

    /// Phases run in the given order, forever.
    pub fn looping(name: impl Into<String>, phases: Vec<PhaseRef>) -> Self {
        Self::new(name, GroupOrdering::Loop, phases)
    }

    /// A one-shot group holding a single phase, named after it.
    pub fn single(phase: PhaseRef) -> Self {
        let name = phase.name().to_owned();
        Self::queue(name, vec![phase])
    }

    /// Attach a script run when the group is started.
    pub fn with_start_script<F>(mut self, script: F) -> Self
    where
        F: Fn() -> super::HookResult + Send + Sync + 'static,
    {
        self.start_script = Some(Box::new(script));
        self
    }

    /// Identifier used by operators and the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordering strategy of the group.
    pub fn ordering(&self) -> GroupOrdering {
        self.ordering
    }

    /// Phases in run order.
    pub fn phases(&self) -> &[PhaseRef] {
        &self.phases
    }

    /// Look a phase of this group up by name.
    pub fn phase(&self, name: &str) -> Option<&PhaseRef> {
        self.phases.iter().find(|phase| phase.name() == name)
    }

    /// Whether `name` is one of this group's phases.
    pub fn contains(&self, name: &str) -> bool {
        self.phase(name).is_some()
    }

    /// Phase the group would hand out next.
    ///
    /// A looping group rewinds its cursor here when it has run past the end.
    pub fn next_phase(&mut self) -> Option<PhaseRef> {
        self.cursor = normalize_cursor(self.ordering, self.phases.len(), self.cursor);
        self.peek_next()
    }

    /// Same lookup as [`Self::next_phase`] without rewinding the cursor.
    pub fn peek_next(&self) -> Option<PhaseRef> {
        next_index(self.ordering, self.phases.len(), self.cursor)
            .and_then(|index| self.phases.get(index).cloned())
    }

    /// Record `phase` as the one now running.
    ///
    /// When `phase` is the natural next phase the cursor advances by one;
    /// otherwise the cursor jumps to the slot right after `phase`, skipping
    /// whatever sat in between without running it.
    pub fn set_current_phase(&mut self, phase: &PhaseRef) -> Result<(), PhaseError> {
        let is_next = self
            .next_phase()
            .is_some_and(|next| next.name() == phase.name());
        if is_next {
            self.cursor += 1;
            return Ok(());
        }

        let index = self
            .phases
            .iter()
            .position(|candidate| candidate.name() == phase.name())
            .ok_or_else(|| PhaseError::UnknownPhaseInGroup {
                group: self.name.clone(),
                phase: phase.name().to_owned(),
            })?;
        self.cursor = index + 1;
        Ok(())
    }

    /// Deduplicated union of every phase's required locations, first-seen order.
    pub fn required_event_locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = Vec::new();
        for phase in &self.phases {
            for location in phase.spec().required_locations() {
                if !locations.contains(location) {
                    locations.push(location.clone());
                }
            }
        }
        locations
    }

    /// Run the start script, if any.
    pub(crate) fn run_start_script(&self) -> super::HookResult {
        match &self.start_script {
            Some(script) => script(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for PhaseGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseGroup")
            .field("name", &self.name)
            .field("ordering", &self.ordering)
            .field(
                "phases",
                &self.phases.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
