//! Recording doubles shared by the phase engine tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use dashmap::DashMap;

use super::{
    EventBar, HookResult, Phase, PhaseDuration, PhaseListener, PhaseRef, PhaseSpec, Player,
};
use crate::world::{EventWorld, World, WorldError, WorldManager};

/// Ordered log of hook calls shared between doubles.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Phase logging every hook as `<name>.<hook>` (ticks as `<name>.tick:<n>`).
pub struct RecordingPhase {
    spec: PhaseSpec,
    log: CallLog,
    failing: Option<&'static str>,
}

impl RecordingPhase {
    pub fn new(name: &str, duration: PhaseDuration) -> Self {
        Self::with_log(name, duration, CallLog::new())
    }

    pub fn with_log(name: &str, duration: PhaseDuration, log: CallLog) -> Self {
        Self::from_spec(PhaseSpec::new(name, duration), log)
    }

    pub fn from_spec(spec: PhaseSpec, log: CallLog) -> Self {
        Self {
            spec,
            log,
            failing: None,
        }
    }

    pub fn shared(name: &str, duration: PhaseDuration) -> PhaseRef {
        Arc::new(Self::new(name, duration))
    }

    pub fn shared_with_locations(name: &str, locations: &[&str]) -> PhaseRef {
        let spec = locations
            .iter()
            .fold(PhaseSpec::infinite(name), |spec, location| {
                spec.with_required_location(*location)
            });
        Arc::new(Self::from_spec(spec, CallLog::new()))
    }

    /// Make `hook` (`set`, `start`, `end`, `tick`, `join`, `leave`) fail after logging.
    pub fn failing_on(mut self, hook: &'static str) -> Self {
        self.failing = Some(hook);
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    fn record(&self, hook: &str, entry: String) -> HookResult {
        self.log.push(entry);
        if self.failing == Some(hook) {
            return Err(format!("{} failed in {hook}", self.spec.name()).into());
        }
        Ok(())
    }
}

impl Phase for RecordingPhase {
    fn spec(&self) -> &PhaseSpec {
        &self.spec
    }

    fn on_set(&self) -> HookResult {
        self.record("set", format!("{}.set", self.name()))
    }

    fn on_start(&self) -> HookResult {
        self.record("start", format!("{}.start", self.name()))
    }

    fn on_end(&self) -> HookResult {
        self.record("end", format!("{}.end", self.name()))
    }

    fn on_join_server(&self, player: &Player) -> HookResult {
        self.record("join", format!("{}.join:{}", self.name(), player.name))
    }

    fn on_leave_server(&self, player: &Player) -> HookResult {
        self.record("leave", format!("{}.leave:{}", self.name(), player.name))
    }

    fn on_tick(&self, seconds_passed: u64) -> HookResult {
        self.record("tick", format!("{}.tick:{seconds_passed}", self.name()))?;
        self.spec.run_action(seconds_passed)
    }

    fn event_bar_title(&self, seconds_remaining: Option<u64>) -> String {
        match seconds_remaining {
            Some(seconds) => format!("{} {seconds}", self.name()),
            None => self.name().to_owned(),
        }
    }
}

/// Bar remembering every title it was handed.
#[derive(Debug, Default)]
pub struct RecordingBar(Mutex<Vec<String>>);

impl RecordingBar {
    pub fn titles(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<String> {
        self.titles().pop()
    }
}

impl EventBar for RecordingBar {
    fn set_title(&self, title: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(title.to_owned());
    }
}

/// Listener logging `<label>.register` / `<label>.unregister`.
pub struct RecordingListener {
    label: String,
    log: CallLog,
}

impl RecordingListener {
    pub fn new(label: &str, log: CallLog) -> Self {
        Self {
            label: label.to_owned(),
            log,
        }
    }
}

impl PhaseListener for RecordingListener {
    fn register(&self) {
        self.log.push(format!("{}.register", self.label));
    }

    fn unregister(&self) {
        self.log.push(format!("{}.unregister", self.label));
    }
}

/// World logging `world:<name>` when set up.
pub struct RecordingWorld {
    name: String,
    log: CallLog,
}

impl RecordingWorld {
    pub fn shared(name: &str, log: CallLog) -> Arc<dyn EventWorld> {
        Arc::new(Self {
            name: name.to_owned(),
            log,
        })
    }
}

impl EventWorld for RecordingWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_world(&self, world: &World) -> Result<(), WorldError> {
        self.log.push(format!("world:{}", world.name()));
        Ok(())
    }
}

/// In-memory world manager; names listed as missing fail to import.
#[derive(Debug, Default)]
pub struct StubWorldManager {
    missing: HashSet<String>,
    loaded: DashMap<String, Arc<World>>,
}

impl StubWorldManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(names: &[&str]) -> Self {
        Self {
            missing: names.iter().map(|name| (*name).to_owned()).collect(),
            loaded: DashMap::new(),
        }
    }
}

impl WorldManager for StubWorldManager {
    fn import_world(&self, name: &str) -> Result<Arc<World>, WorldError> {
        if self.missing.contains(name) {
            return Err(WorldError::NotFound {
                name: name.to_owned(),
                root: "memory".into(),
            });
        }
        Ok(self
            .loaded
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(World::new(name)))
            .clone())
    }
}
