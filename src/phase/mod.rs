//! Phase engine: the [`Phase`] abstraction, ordered [`PhaseGroup`]s and the
//! [`PhaseManager`] that ticks time and moves the event between them.

mod bar;
pub mod configured;
pub mod group;
pub mod manager;
#[cfg(test)]
pub(crate) mod testing;

use std::{collections::BTreeMap, error::Error, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::world::EventWorld;

pub use self::bar::{DEFAULT_TITLE, EventBar, format_clock};
pub use self::group::{GroupOrdering, PhaseGroup};
pub use self::manager::{PhaseError, PhaseManager, PhaseSnapshot, TickReport};

/// Error raised by a phase hook. The manager hands it back to the caller untouched.
pub type HookError = Box<dyn Error + Send + Sync>;
/// Outcome of a single phase hook invocation.
pub type HookResult = Result<(), HookError>;
/// Shared handle to a phase; the same phase may be listed in several groups.
pub type PhaseRef = Arc<dyn Phase>;
/// One-shot callback fired when the phase timer reaches a given second.
pub type PhaseAction = Box<dyn Fn() -> HookResult + Send + Sync>;

/// How long a phase runs before the manager advances to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDuration {
    /// Runs for the given number of whole seconds.
    Seconds(u64),
    /// Never auto-advances; only an explicit transition leaves the phase.
    Infinite,
}

impl PhaseDuration {
    /// Whether the phase waits for an explicit transition.
    pub fn is_infinite(self) -> bool {
        matches!(self, PhaseDuration::Infinite)
    }

    /// Whether the phase is skipped as soon as a tick resolves it.
    pub fn is_zero(self) -> bool {
        matches!(self, PhaseDuration::Seconds(0))
    }

    /// Finite length in seconds, if any.
    pub fn as_seconds(self) -> Option<u64> {
        match self {
            PhaseDuration::Seconds(seconds) => Some(seconds),
            PhaseDuration::Infinite => None,
        }
    }
}

impl From<Option<u64>> for PhaseDuration {
    fn from(value: Option<u64>) -> Self {
        value.map_or(PhaseDuration::Infinite, PhaseDuration::Seconds)
    }
}

/// Player reference forwarded to the active phase on join/leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Player {
    /// Stable player identifier assigned by the host server.
    pub id: Uuid,
    /// Display name at the time of the event.
    pub name: String,
}

/// Event handling scoped to a phase. Registered when the phase becomes current
/// and unregistered when it ends.
pub trait PhaseListener: Send + Sync {
    /// Attach the listener to the host's event dispatch.
    fn register(&self);
    /// Detach the listener from the host's event dispatch.
    fn unregister(&self);
}

/// Static description of a phase: identity, timing, dependencies and
/// scheduled actions.
///
/// Built once at startup; nothing on it can be changed or removed afterwards.
pub struct PhaseSpec {
    name: String,
    duration: PhaseDuration,
    worlds: Vec<Arc<dyn EventWorld>>,
    required_locations: Vec<String>,
    listener: Option<Arc<dyn PhaseListener>>,
    actions: BTreeMap<u64, PhaseAction>,
}

impl PhaseSpec {
    /// Describe a phase with the given name and duration.
    pub fn new(name: impl Into<String>, duration: PhaseDuration) -> Self {
        Self {
            name: name.into(),
            duration,
            worlds: Vec::new(),
            required_locations: Vec::new(),
            listener: None,
            actions: BTreeMap::new(),
        }
    }

    /// Describe a phase that only ends on an explicit transition.
    pub fn infinite(name: impl Into<String>) -> Self {
        Self::new(name, PhaseDuration::Infinite)
    }

    /// Declare a world that must be imported and set up whenever the phase is set.
    pub fn with_world(mut self, world: Arc<dyn EventWorld>) -> Self {
        self.worlds.push(world);
        self
    }

    /// Declare a named location operators must set before moving into this phase.
    pub fn with_required_location(mut self, location: impl Into<String>) -> Self {
        self.required_locations.push(location.into());
        self
    }

    /// Attach a listener that lives exactly as long as the phase is current.
    pub fn with_listener(mut self, listener: Arc<dyn PhaseListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Schedule `action` to fire when the phase timer reaches `seconds`.
    pub fn with_action<F>(mut self, seconds: u64, action: F) -> Self
    where
        F: Fn() -> HookResult + Send + Sync + 'static,
    {
        self.actions.insert(seconds, Box::new(action));
        self
    }

    /// Persistence key and display identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured duration.
    pub fn duration(&self) -> PhaseDuration {
        self.duration
    }

    /// Worlds imported before the phase hooks run.
    pub fn worlds(&self) -> &[Arc<dyn EventWorld>] {
        &self.worlds
    }

    /// Names of the locations required by this phase.
    pub fn required_locations(&self) -> &[String] {
        &self.required_locations
    }

    /// Listener registered while the phase is current.
    pub fn listener(&self) -> Option<&Arc<dyn PhaseListener>> {
        self.listener.as_ref()
    }

    /// Seconds at which an action is scheduled, ascending.
    pub fn scheduled_seconds(&self) -> impl Iterator<Item = u64> + '_ {
        self.actions.keys().copied()
    }

    /// Fire the action scheduled for `seconds`, if there is one.
    pub fn run_action(&self, seconds: u64) -> HookResult {
        match self.actions.get(&seconds) {
            Some(action) => action(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for PhaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseSpec")
            .field("name", &self.name)
            .field("duration", &self.duration)
            .field(
                "worlds",
                &self.worlds.iter().map(|w| w.name()).collect::<Vec<_>>(),
            )
            .field("required_locations", &self.required_locations)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A stage of the event.
///
/// `on_set` runs every time the phase becomes current, including silent jumps
/// and recovery after a restart, so it must be safe to repeat. `on_start` runs
/// only when the phase is started and is the place for one-shot,
/// player-visible effects.
pub trait Phase: Send + Sync {
    /// Static description of the phase.
    fn spec(&self) -> &PhaseSpec;

    /// Idempotent setup run whenever the phase becomes current.
    fn on_set(&self) -> HookResult {
        Ok(())
    }

    /// One-shot effects run only on the start path.
    fn on_start(&self) -> HookResult;

    /// Cleanup run when another phase replaces this one.
    fn on_end(&self) -> HookResult {
        Ok(())
    }

    /// A player joined the server while this phase is current.
    fn on_join_server(&self, _player: &Player) -> HookResult {
        Ok(())
    }

    /// A player left the server while this phase is current.
    fn on_leave_server(&self, _player: &Player) -> HookResult {
        Ok(())
    }

    /// Called once per tick with the seconds elapsed before this tick.
    fn on_tick(&self, seconds_passed: u64) -> HookResult {
        self.spec().run_action(seconds_passed)
    }

    /// Title pushed to the event bar. `None` means the phase has no countdown.
    fn event_bar_title(&self, seconds_remaining: Option<u64>) -> String;

    /// Shorthand for `spec().name()`.
    fn name(&self) -> &str {
        self.spec().name()
    }

    /// Shorthand for `spec().duration()`.
    fn duration(&self) -> PhaseDuration {
        self.spec().duration()
    }
}

impl fmt::Debug for dyn Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Phase").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn duration_from_optional_seconds() {
        assert_eq!(PhaseDuration::from(None), PhaseDuration::Infinite);
        assert_eq!(PhaseDuration::from(Some(5)), PhaseDuration::Seconds(5));
        assert!(PhaseDuration::Seconds(0).is_zero());
        assert!(!PhaseDuration::Infinite.is_zero());
        assert_eq!(PhaseDuration::Infinite.as_seconds(), None);
    }

    #[test]
    fn run_action_fires_only_at_scheduled_second() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let spec = PhaseSpec::new("countdown", PhaseDuration::Seconds(10)).with_action(3, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        for second in 0..10 {
            spec.run_action(second).unwrap();
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(spec.scheduled_seconds().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn run_action_propagates_failure() {
        let spec = PhaseSpec::infinite("lobby").with_action(0, || Err("boom".into()));
        let err = spec.run_action(0).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
