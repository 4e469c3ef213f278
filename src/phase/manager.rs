//! The phase state machine: which group is active, which phase within it, and
//! how many seconds of that phase have elapsed.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};
use utoipa::ToSchema;

use super::{EventBar, HookError, HookResult, PhaseDuration, PhaseGroup, PhaseRef, Player};
use crate::{
    dao::{
        document_store::DocumentStore,
        models::PhaseProgressDocument,
        storage::StorageError,
    },
    world::WorldManager,
};

/// Failures surfaced by [`PhaseManager`] operations.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// A transition was requested while no group is active.
    #[error("no phase group is active")]
    NoPhaseGroup,
    /// No group is registered under that name.
    #[error("unknown phase group `{0}`")]
    UnknownGroup(String),
    /// No registered group contains a phase with that name.
    #[error("unknown phase `{0}`")]
    UnknownPhase(String),
    /// The phase exists but not in the group it was looked up in.
    #[error("phase `{phase}` is not part of group `{group}`")]
    UnknownPhaseInGroup { group: String, phase: String },
    /// The operation needs a current phase.
    #[error("no phase is currently running")]
    NoCurrentPhase,
    /// The timer of a phase without a countdown cannot be changed.
    #[error("phase `{0}` has no countdown")]
    InfiniteDuration(String),
    /// A phase hook or group start script failed. The transition it belonged
    /// to was still completed and saved.
    #[error("`{hook}` of `{target}` failed")]
    Hook {
        target: String,
        hook: &'static str,
        #[source]
        source: HookError,
    },
    /// Saving or loading progress failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a single [`PhaseManager::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// No phase is current; nothing happened.
    Idle,
    /// The current phase keeps running.
    Continued { phase: String, seconds_passed: u64 },
    /// The current phase ran out and another one was started.
    Advanced { from: String, to: String },
    /// The current phase ran out but its group has nothing left to start.
    Exhausted { phase: String },
}

/// Serializable view of the manager, as exposed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PhaseSnapshot {
    /// Active group, if any.
    pub group: Option<String>,
    /// Current phase, if any.
    pub phase: Option<String>,
    /// Duration of the current phase.
    pub duration: Option<PhaseDuration>,
    /// Seconds elapsed in the current phase.
    pub seconds_passed: u64,
    /// Seconds left before auto-advance; `null` without a countdown.
    pub seconds_remaining: Option<u64>,
    /// Phase the active group would start next.
    pub next_phase: Option<String>,
    /// Phases of the active group, in run order.
    pub phases: Vec<String>,
}

/// Keeps the first hook failure of a transition while letting the rest of it run.
#[derive(Default)]
struct HookFailures(Option<PhaseError>);

impl HookFailures {
    fn record(&mut self, target: &str, hook: &'static str, result: HookResult) {
        if let Err(source) = result {
            error!(target_name = target, hook, error = %source, "hook failed");
            self.keep(PhaseError::Hook {
                target: target.to_owned(),
                hook,
                source,
            });
        }
    }

    fn keep(&mut self, err: PhaseError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }

    fn into_result(self) -> Result<(), PhaseError> {
        self.0.map_or(Ok(()), Err)
    }
}

/// Owns the registered groups and the mutable `(group, phase, seconds)` triple.
///
/// Every mutation goes through `&mut self`; callers sharing the manager across
/// tasks serialize access behind a single lock.
pub struct PhaseManager {
    store: Arc<dyn DocumentStore>,
    worlds: Arc<dyn WorldManager>,
    bar: Option<Arc<dyn EventBar>>,
    groups: IndexMap<String, PhaseGroup>,
    current_group: Option<String>,
    current_phase: Option<PhaseRef>,
    seconds_passed: u64,
}

impl PhaseManager {
    /// Idle manager persisting into `store` and importing worlds through `worlds`.
    pub fn new(store: Arc<dyn DocumentStore>, worlds: Arc<dyn WorldManager>) -> Self {
        Self {
            store,
            worlds,
            bar: None,
            groups: IndexMap::new(),
            current_group: None,
            current_phase: None,
            seconds_passed: 0,
        }
    }

    /// Push titles to `bar` on every tick and timer change.
    pub fn with_bar(mut self, bar: Arc<dyn EventBar>) -> Self {
        self.bar = Some(bar);
        self
    }

    /// Register a group. A group registered under an existing name replaces it.
    pub fn register(&mut self, group: PhaseGroup) {
        let name = group.name().to_owned();
        debug!(group = %name, phases = group.phases().len(), "registering phase group");
        if self.groups.insert(name.clone(), group).is_some() {
            warn!(group = %name, "phase group registered twice, keeping the latest");
        }
    }

    /// Restore the saved `(phase, seconds)` pair through the set path.
    ///
    /// The first registered group containing the saved phase becomes current.
    /// Missing, unreadable or unknown progress leaves the manager idle.
    pub fn recover(&mut self) -> Result<Option<PhaseRef>, PhaseError> {
        let root = match self.store.root() {
            Ok(root) => root,
            Err(err @ StorageError::Corrupt { .. }) => {
                warn!(error = %err, "saved phase progress is unreadable, starting idle");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let progress = match PhaseProgressDocument::from_root(root) {
            Ok(Some(progress)) => progress,
            Ok(None) => {
                info!("no saved phase progress");
                return Ok(None);
            }
            Err(err) => {
                warn!(error = %err, "saved phase progress is malformed, starting idle");
                return Ok(None);
            }
        };

        let Some(name) = progress.phase else {
            info!("saved phase progress is idle");
            return Ok(None);
        };

        let Some((group, phase)) = self.groups.values().find_map(|group| {
            group
                .phase(&name)
                .map(|phase| (group.name().to_owned(), phase.clone()))
        }) else {
            warn!(phase = %name, "saved phase is not registered, starting idle");
            return Ok(None);
        };

        info!(phase = %name, group = %group, seconds = progress.seconds, "recovering phase");
        self.current_group = Some(group);
        self.seconds_passed = progress.seconds;
        self.transition(phase.clone(), false)?;
        Ok(Some(phase))
    }

    /// Make `name` the active group without touching the current phase.
    pub fn set_phase_group(&mut self, name: &str) -> Result<(), PhaseError> {
        if !self.groups.contains_key(name) {
            return Err(PhaseError::UnknownGroup(name.to_owned()));
        }
        self.current_group = Some(name.to_owned());
        info!(group = name, "phase group set");
        Ok(())
    }

    /// Activate `name`, run its start script once, then start its next phase.
    pub fn start_phase_group(&mut self, name: &str) -> Result<Option<PhaseRef>, PhaseError> {
        self.set_phase_group(name)?;
        let mut failures = HookFailures::default();
        if let Some(group) = self.groups.get(name) {
            failures.record(name, "start_script", group.run_start_script());
        }
        info!(group = name, "phase group started");

        let started = self.start_next_phase()?;
        failures.into_result()?;
        Ok(started)
    }

    /// Silently make `name` current: end hooks, set hooks and world setup run,
    /// start effects do not and the counter is kept.
    pub fn set_phase(&mut self, name: &str) -> Result<(), PhaseError> {
        let phase = self.resolve_in_current_group(name)?;
        self.transition(phase, false)
    }

    /// Start `name`: like [`Self::set_phase`] plus start effects and a counter reset.
    pub fn start_phase(&mut self, name: &str) -> Result<(), PhaseError> {
        let phase = self.resolve_in_current_group(name)?;
        self.transition(phase, true)
    }

    /// Start the phase the active group hands out next.
    ///
    /// `Ok(None)` means there is nothing to start: no active group, or the
    /// group is exhausted.
    pub fn start_next_phase(&mut self) -> Result<Option<PhaseRef>, PhaseError> {
        let Some(group_name) = self.current_group.clone() else {
            return Ok(None);
        };
        let next = self
            .groups
            .get_mut(&group_name)
            .and_then(PhaseGroup::next_phase);

        let Some(next) = next else {
            info!(group = %group_name, "phase group has no more phases");
            return Ok(None);
        };
        self.transition(next.clone(), true)?;
        Ok(Some(next))
    }

    /// Advance time by one second.
    ///
    /// The counter is incremented and saved even when a hook fails; the first
    /// hook failure is returned after the bookkeeping is done.
    pub fn tick(&mut self) -> Result<TickReport, PhaseError> {
        let Some(phase) = self.current_phase.clone() else {
            return Ok(TickReport::Idle);
        };

        let mut failures = HookFailures::default();
        self.refresh_bar(&phase);
        failures.record(phase.name(), "on_tick", phase.on_tick(self.seconds_passed));
        self.seconds_passed += 1;
        trace!(phase = %phase.name(), seconds = self.seconds_passed, "tick");

        let finished = phase
            .duration()
            .as_seconds()
            .is_some_and(|duration| self.seconds_passed >= duration);

        let report = if finished {
            self.advance_from(&phase, &mut failures)?
        } else {
            TickReport::Continued {
                phase: phase.name().to_owned(),
                seconds_passed: self.seconds_passed,
            }
        };

        self.persist()?;
        failures.into_result()?;
        Ok(report)
    }

    /// Move the countdown so that `seconds` remain, refreshing the bar right away.
    pub fn set_seconds_remaining(&mut self, seconds: u64) -> Result<(), PhaseError> {
        let phase = self
            .current_phase
            .clone()
            .ok_or(PhaseError::NoCurrentPhase)?;
        let duration = phase
            .duration()
            .as_seconds()
            .ok_or_else(|| PhaseError::InfiniteDuration(phase.name().to_owned()))?;

        self.seconds_passed = duration.saturating_sub(seconds);
        info!(phase = %phase.name(), remaining = seconds, "phase timer changed");
        self.refresh_bar(&phase);
        self.persist()?;
        Ok(())
    }

    /// Forward a join to the current phase.
    pub fn player_joined(&self, player: &Player) -> Result<(), PhaseError> {
        let Some(phase) = &self.current_phase else {
            return Ok(());
        };
        let mut failures = HookFailures::default();
        failures.record(phase.name(), "on_join_server", phase.on_join_server(player));
        failures.into_result()
    }

    /// Forward a leave to the current phase.
    pub fn player_left(&self, player: &Player) -> Result<(), PhaseError> {
        let Some(phase) = &self.current_phase else {
            return Ok(());
        };
        let mut failures = HookFailures::default();
        failures.record(phase.name(), "on_leave_server", phase.on_leave_server(player));
        failures.into_result()
    }

    /// Phase currently running.
    pub fn current_phase(&self) -> Option<&PhaseRef> {
        self.current_phase.as_ref()
    }

    /// Group currently active.
    pub fn current_group(&self) -> Option<&PhaseGroup> {
        self.current_group
            .as_deref()
            .and_then(|name| self.groups.get(name))
    }

    /// Registered group by name.
    pub fn group(&self, name: &str) -> Option<&PhaseGroup> {
        self.groups.get(name)
    }

    /// Registered groups, in registration order.
    pub fn groups(&self) -> impl Iterator<Item = &PhaseGroup> {
        self.groups.values()
    }

    /// Any registered phase by name.
    pub fn find_phase(&self, name: &str) -> Option<PhaseRef> {
        self.groups
            .values()
            .find_map(|group| group.phase(name).cloned())
    }

    /// Phase the active group would start next, without moving its cursor.
    pub fn next_phase(&self) -> Option<PhaseRef> {
        self.current_group().and_then(PhaseGroup::peek_next)
    }

    /// Phases of the active group.
    pub fn phases_in_current_group(&self) -> &[PhaseRef] {
        self.current_group()
            .map(PhaseGroup::phases)
            .unwrap_or_default()
    }

    /// Seconds elapsed in the current phase.
    pub fn seconds_passed(&self) -> u64 {
        self.seconds_passed
    }

    /// Seconds before the current phase auto-advances; `None` without a countdown.
    pub fn seconds_remaining(&self) -> Option<u64> {
        let phase = self.current_phase.as_ref()?;
        remaining(phase.duration(), self.seconds_passed)
    }

    /// Read the progress document back to check the store is still usable.
    pub fn check_store(&self) -> Result<(), StorageError> {
        self.store.root().map(|_| ())
    }

    /// Serializable view of the current state.
    pub fn snapshot(&self) -> PhaseSnapshot {
        PhaseSnapshot {
            group: self.current_group.clone(),
            phase: self.current_phase.as_ref().map(|p| p.name().to_owned()),
            duration: self.current_phase.as_ref().map(|p| p.duration()),
            seconds_passed: self.seconds_passed,
            seconds_remaining: self.seconds_remaining(),
            next_phase: self.next_phase().map(|p| p.name().to_owned()),
            phases: self
                .phases_in_current_group()
                .iter()
                .map(|p| p.name().to_owned())
                .collect(),
        }
    }

    fn resolve_in_current_group(&self, name: &str) -> Result<PhaseRef, PhaseError> {
        let group = self.current_group().ok_or(PhaseError::NoPhaseGroup)?;
        if let Some(phase) = group.phase(name) {
            return Ok(phase.clone());
        }
        if self.find_phase(name).is_none() {
            return Err(PhaseError::UnknownPhase(name.to_owned()));
        }
        Err(PhaseError::UnknownPhaseInGroup {
            group: group.name().to_owned(),
            phase: name.to_owned(),
        })
    }

    /// Shared set/start path. The phase must belong to the active group; that
    /// is checked before any hook runs.
    fn transition(&mut self, phase: PhaseRef, start: bool) -> Result<(), PhaseError> {
        let group_name = self.current_group.clone().ok_or(PhaseError::NoPhaseGroup)?;
        let group = self
            .groups
            .get_mut(&group_name)
            .ok_or_else(|| PhaseError::UnknownGroup(group_name.clone()))?;
        if !group.contains(phase.name()) {
            return Err(PhaseError::UnknownPhaseInGroup {
                group: group_name,
                phase: phase.name().to_owned(),
            });
        }

        let mut failures = HookFailures::default();
        if let Some(previous) = self.current_phase.take() {
            failures.record(previous.name(), "on_end", previous.on_end());
            if let Some(listener) = previous.spec().listener() {
                listener.unregister();
            }
        }

        group.set_current_phase(&phase)?;
        self.current_phase = Some(phase.clone());
        if start {
            self.seconds_passed = 0;
        }

        failures.record(phase.name(), "on_set", phase.on_set());
        self.setup_worlds(&phase);
        if start {
            failures.record(phase.name(), "on_start", phase.on_start());
        }
        if let Some(listener) = phase.spec().listener() {
            listener.register();
        }

        let action = if start { "start" } else { "set" };
        info!(
            phase = %phase.name(),
            group = %group_name,
            seconds = self.seconds_passed,
            action,
            "phase transition"
        );
        self.persist()?;
        failures.into_result()
    }

    /// Start next phases until one with a non-zero length is running or the
    /// group runs dry.
    fn advance_from(
        &mut self,
        finished: &PhaseRef,
        failures: &mut HookFailures,
    ) -> Result<TickReport, PhaseError> {
        let from = finished.name().to_owned();
        // A looping group made only of zero-length phases would never settle.
        let limit = self.phases_in_current_group().len().max(1);
        let mut last_started: Option<PhaseRef> = None;

        for _ in 0..limit {
            let started = match self.start_next_phase() {
                Ok(started) => started,
                Err(err @ PhaseError::Hook { .. }) => {
                    failures.keep(err);
                    self.current_phase.clone()
                }
                Err(err) => return Err(err),
            };

            match started {
                Some(next) if next.duration().is_zero() => {
                    debug!(phase = %next.name(), "skipping zero-length phase");
                    last_started = Some(next);
                }
                Some(next) => {
                    return Ok(TickReport::Advanced {
                        from,
                        to: next.name().to_owned(),
                    });
                }
                None => break,
            }
        }

        Ok(match last_started {
            Some(to) => TickReport::Advanced {
                from,
                to: to.name().to_owned(),
            },
            None => TickReport::Exhausted { phase: from },
        })
    }

    fn setup_worlds(&self, phase: &PhaseRef) {
        for event_world in phase.spec().worlds() {
            let world = match self.worlds.import_world(event_world.name()) {
                Ok(world) => world,
                Err(err) => {
                    error!(
                        phase = %phase.name(),
                        world = %event_world.name(),
                        error = %err,
                        "world import failed, skipping its setup"
                    );
                    continue;
                }
            };
            if let Err(err) = event_world.setup_world(&world) {
                error!(
                    phase = %phase.name(),
                    world = %event_world.name(),
                    error = %err,
                    "world setup failed"
                );
            }
        }
    }

    fn refresh_bar(&self, phase: &PhaseRef) {
        if let Some(bar) = &self.bar {
            let title = phase.event_bar_title(remaining(phase.duration(), self.seconds_passed));
            bar.set_title(&title);
        }
    }

    fn persist(&self) -> Result<(), StorageError> {
        let progress = PhaseProgressDocument {
            phase: self.current_phase.as_ref().map(|p| p.name().to_owned()),
            seconds: self.seconds_passed,
        };
        self.store.save(&progress.to_root())
    }
}

fn remaining(duration: PhaseDuration, seconds_passed: u64) -> Option<u64> {
    duration
        .as_seconds()
        .map(|seconds| seconds.saturating_sub(seconds_passed))
}
