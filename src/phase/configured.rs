//! Phases and groups built from the event definition in the configuration file.

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    DEFAULT_TITLE, HookResult, Phase, PhaseDuration, PhaseGroup, PhaseRef, PhaseSpec,
    format_clock,
};
use crate::{
    config::{EventDefinition, PhaseDefinition},
    world::{ConfiguredWorld, EventWorld},
};

/// Sink for player-facing announcements.
pub trait Announcer: Send + Sync {
    /// Broadcast `message` to every player.
    fn announce(&self, message: &str);
}

/// Inconsistencies found while turning an event definition into phase groups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// Two phases share a name.
    #[error("phase `{0}` is defined more than once")]
    DuplicatePhase(String),
    /// Two groups share a name.
    #[error("phase group `{0}` is defined more than once")]
    DuplicateGroup(String),
    /// A phase names a world missing from the definition.
    #[error("phase `{phase}` uses undefined world `{world}`")]
    UnknownWorld { phase: String, world: String },
    /// A group names a phase missing from the definition.
    #[error("phase group `{group}` lists undefined phase `{phase}`")]
    UnknownPhase { group: String, phase: String },
}

/// A phase whose behaviour is entirely described by configuration: it makes
/// announcements on start, on end and at scheduled seconds, and shows a title
/// with the countdown on the event bar.
pub struct ConfiguredPhase {
    spec: PhaseSpec,
    title: Option<String>,
    start_announcement: Option<String>,
    end_announcement: Option<String>,
    announcer: Arc<dyn Announcer>,
}

impl ConfiguredPhase {
    /// Build the phase from its definition; `worlds` must already be resolved.
    pub fn new(
        definition: &PhaseDefinition,
        worlds: Vec<Arc<dyn EventWorld>>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        let mut spec = PhaseSpec::new(&definition.name, PhaseDuration::from(definition.duration));
        for world in worlds {
            spec = spec.with_world(world);
        }
        for location in &definition.locations {
            spec = spec.with_required_location(location.clone());
        }
        for (second, message) in &definition.announcements {
            let announcer = announcer.clone();
            let message = message.clone();
            spec = spec.with_action(*second, move || {
                announcer.announce(&message);
                Ok(())
            });
        }

        Self {
            spec,
            title: definition.title.clone(),
            start_announcement: definition.start_announcement.clone(),
            end_announcement: definition.end_announcement.clone(),
            announcer,
        }
    }
}

impl Phase for ConfiguredPhase {
    fn spec(&self) -> &PhaseSpec {
        &self.spec
    }

    fn on_start(&self) -> HookResult {
        if let Some(message) = &self.start_announcement {
            self.announcer.announce(message);
        }
        Ok(())
    }

    fn on_end(&self) -> HookResult {
        if let Some(message) = &self.end_announcement {
            self.announcer.announce(message);
        }
        Ok(())
    }

    fn event_bar_title(&self, seconds_remaining: Option<u64>) -> String {
        let title = self.title.as_deref().unwrap_or(DEFAULT_TITLE);
        match seconds_remaining {
            Some(seconds) => format!("{title} {}", format_clock(seconds)),
            None => title.to_owned(),
        }
    }
}

/// Every location name the event mentions: declared ones first, then those
/// only referenced by phases.
pub fn declared_locations(definition: &EventDefinition) -> Vec<String> {
    let mut names = definition.locations.clone();
    for phase in &definition.phases {
        for location in &phase.locations {
            if !names.contains(location) {
                names.push(location.clone());
            }
        }
    }
    names
}

/// Build the phase groups described by `definition`.
///
/// A phase listed in several groups is shared between them.
pub fn build_groups(
    definition: &EventDefinition,
    announcer: Arc<dyn Announcer>,
) -> Result<Vec<PhaseGroup>, DefinitionError> {
    let worlds: IndexMap<&str, Arc<dyn EventWorld>> = definition
        .worlds
        .iter()
        .map(|world| {
            let handle: Arc<dyn EventWorld> =
                Arc::new(ConfiguredWorld::new(&world.name, world.rules.clone()));
            (world.name.as_str(), handle)
        })
        .collect();

    let mut phases: IndexMap<&str, PhaseRef> = IndexMap::new();
    for phase in &definition.phases {
        if phases.contains_key(phase.name.as_str()) {
            return Err(DefinitionError::DuplicatePhase(phase.name.clone()));
        }
        let phase_worlds = phase
            .worlds
            .iter()
            .map(|name| {
                worlds
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| DefinitionError::UnknownWorld {
                        phase: phase.name.clone(),
                        world: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let built: PhaseRef = Arc::new(ConfiguredPhase::new(phase, phase_worlds, announcer.clone()));
        phases.insert(phase.name.as_str(), built);
    }

    let mut groups: Vec<PhaseGroup> = Vec::with_capacity(definition.groups.len());
    for group in &definition.groups {
        if groups.iter().any(|existing| existing.name() == group.name) {
            return Err(DefinitionError::DuplicateGroup(group.name.clone()));
        }
        let members = group
            .phases
            .iter()
            .map(|name| {
                phases
                    .get(name.as_str())
                    .cloned()
                    .ok_or_else(|| DefinitionError::UnknownPhase {
                        group: group.name.clone(),
                        phase: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut built = PhaseGroup::new(&group.name, group.ordering, members);
        if let Some(message) = group.start_announcement.clone() {
            let announcer = announcer.clone();
            built = built.with_start_script(move || {
                announcer.announce(&message);
                Ok(())
            });
        }
        debug!(group = %group.name, phases = group.phases.len(), "built phase group");
        groups.push(built);
    }

    for name in phases.keys() {
        if !definition.groups.iter().any(|g| g.phases.iter().any(|p| p == name)) {
            warn!(phase = %name, "phase is not part of any group and can never run");
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{Mutex, PoisonError},
    };

    use super::*;
    use crate::config::{GroupDefinition, WorldDefinition};
    use crate::phase::GroupOrdering;

    #[derive(Default)]
    struct RecordingAnnouncer(Mutex<Vec<String>>);

    impl RecordingAnnouncer {
        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    impl Announcer for RecordingAnnouncer {
        fn announce(&self, message: &str) {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.to_owned());
        }
    }

    fn phase(name: &str, duration: Option<u64>) -> PhaseDefinition {
        PhaseDefinition {
            name: name.into(),
            duration,
            worlds: Vec::new(),
            locations: Vec::new(),
            title: None,
            start_announcement: None,
            end_announcement: None,
            announcements: BTreeMap::new(),
        }
    }

    fn group(name: &str, phases: &[&str]) -> GroupDefinition {
        GroupDefinition {
            name: name.into(),
            ordering: GroupOrdering::Queue,
            phases: phases.iter().map(|p| (*p).to_owned()).collect(),
            start_announcement: None,
        }
    }

    #[test]
    fn configured_phase_announces_and_titles() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let mut definition = phase("match", Some(90));
        definition.title = Some("Match".into());
        definition.start_announcement = Some("go".into());
        definition.end_announcement = Some("stop".into());
        definition.announcements.insert(60, "half a minute".into());

        let built = ConfiguredPhase::new(&definition, Vec::new(), announcer.clone());
        built.on_start().unwrap();
        for second in 0..90 {
            built.on_tick(second).unwrap();
        }
        built.on_end().unwrap();

        assert_eq!(announcer.messages(), vec!["go", "half a minute", "stop"]);
        assert_eq!(built.event_bar_title(Some(75)), "Match 1:15");
        assert_eq!(built.duration(), PhaseDuration::Seconds(90));
    }

    #[test]
    fn untitled_infinite_phase_shows_default_title() {
        let built = ConfiguredPhase::new(
            &phase("lobby", None),
            Vec::new(),
            Arc::new(RecordingAnnouncer::default()),
        );
        assert_eq!(built.event_bar_title(None), DEFAULT_TITLE);
    }

    #[test]
    fn groups_share_phases_and_run_start_announcement() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let mut looping = group("rounds", &["fight", "rest"]);
        looping.ordering = GroupOrdering::Loop;
        looping.start_announcement = Some("rounds begin".into());
        let definition = EventDefinition {
            worlds: vec![WorldDefinition {
                name: "arena".into(),
                rules: IndexMap::new(),
                always_loaded: false,
            }],
            locations: vec!["spawn".into()],
            phases: vec![
                PhaseDefinition {
                    worlds: vec!["arena".into()],
                    locations: vec!["arena_center".into()],
                    ..phase("fight", Some(60))
                },
                phase("rest", Some(10)),
            ],
            groups: vec![group("practice", &["fight"]), looping],
        };

        let groups = build_groups(&definition, announcer.clone()).unwrap();
        assert_eq!(groups.len(), 2);
        assert!(Arc::ptr_eq(&groups[0].phases()[0], &groups[1].phases()[0]));
        assert_eq!(groups[1].ordering(), GroupOrdering::Loop);
        assert_eq!(groups[0].phases()[0].spec().worlds()[0].name(), "arena");

        groups[1].run_start_script().unwrap();
        assert_eq!(announcer.messages(), vec!["rounds begin"]);
        assert_eq!(
            declared_locations(&definition),
            vec!["spawn".to_string(), "arena_center".into()]
        );
    }

    #[test]
    fn inconsistent_definitions_are_rejected() {
        let announcer: Arc<dyn Announcer> = Arc::new(RecordingAnnouncer::default());

        let duplicate = EventDefinition {
            phases: vec![phase("a", None), phase("a", Some(3))],
            ..EventDefinition::default()
        };
        assert_eq!(
            build_groups(&duplicate, announcer.clone()).unwrap_err(),
            DefinitionError::DuplicatePhase("a".into())
        );

        let missing_world = EventDefinition {
            phases: vec![PhaseDefinition {
                worlds: vec!["void".into()],
                ..phase("a", None)
            }],
            ..EventDefinition::default()
        };
        assert!(matches!(
            build_groups(&missing_world, announcer.clone()),
            Err(DefinitionError::UnknownWorld { .. })
        ));

        let missing_phase = EventDefinition {
            phases: vec![phase("a", None)],
            groups: vec![group("g", &["a", "b"])],
            ..EventDefinition::default()
        };
        assert_eq!(
            build_groups(&missing_phase, announcer.clone()).unwrap_err(),
            DefinitionError::UnknownPhase {
                group: "g".into(),
                phase: "b".into()
            }
        );

        let duplicate_group = EventDefinition {
            phases: vec![phase("a", None)],
            groups: vec![group("g", &["a"]), group("g", &["a"])],
            ..EventDefinition::default()
        };
        assert_eq!(
            build_groups(&duplicate_group, announcer).unwrap_err(),
            DefinitionError::DuplicateGroup("g".into())
        );
    }
}
