//! Shared application state: the phase manager, locations, SSE hub and the
//! startup sequence assembling them.

mod sse;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::document_store::DocumentStore,
    error::StartupError,
    phase::{
        PhaseError, PhaseManager,
        configured::{self, Announcer},
    },
    services::sse_events::{BroadcastEventBar, SseAnnouncer},
    world::{LocationRegistry, WorldManager},
};

pub use self::sse::SseHub;

/// Shared handle to the [`AppState`].
pub type SharedState = Arc<AppState>;

/// Capacity of the public SSE channel.
const PUBLIC_SSE_CAPACITY: usize = 64;

/// Backends the application state is assembled from.
pub struct Backends {
    /// Store for the `(phase, seconds)` progress document.
    pub progress: Arc<dyn DocumentStore>,
    /// Store for operator-set locations.
    pub locations: Arc<dyn DocumentStore>,
    /// Resolves the worlds phases depend on.
    pub worlds: Arc<dyn WorldManager>,
}

/// Central application state: the phase manager behind its lock, the named
/// locations, the public SSE hub and the operator token.
pub struct AppState {
    phases: Mutex<PhaseManager>,
    locations: LocationRegistry,
    sse: SseHub,
    admin_token: String,
}

impl AppState {
    /// Assemble the state from already built parts.
    pub fn new(
        phases: PhaseManager,
        locations: LocationRegistry,
        sse: SseHub,
        admin_token: impl Into<String>,
    ) -> SharedState {
        Arc::new(Self {
            phases: Mutex::new(phases),
            locations,
            sse,
            admin_token: admin_token.into(),
        })
    }

    /// Build the phase groups described by `config`, register them, and
    /// restore the saved progress.
    ///
    /// A hook failing during recovery is logged; the recovered phase stays current.
    pub fn bootstrap(config: &AppConfig, backends: Backends) -> Result<SharedState, StartupError> {
        let sse = SseHub::new(PUBLIC_SSE_CAPACITY);
        let announcer: Arc<dyn Announcer> = Arc::new(SseAnnouncer::new(sse.clone()));
        let groups = configured::build_groups(config.event(), announcer)?;

        let mut manager = PhaseManager::new(backends.progress, backends.worlds)
            .with_bar(Arc::new(BroadcastEventBar::new(sse.clone())));
        for group in groups {
            manager.register(group);
        }

        match manager.recover() {
            Ok(Some(phase)) => info!(phase = %phase.name(), "phase progress recovered"),
            Ok(None) => info!("no phase to recover, waiting for an operator"),
            Err(err @ PhaseError::Hook { .. }) => {
                warn!(error = %err, "hook failed while recovering phase progress")
            }
            Err(err) => return Err(StartupError::Recovery(err)),
        }

        let locations = LocationRegistry::new(configured::declared_locations(config.event()))
            .with_store(backends.locations)?;

        Ok(Self::new(manager, locations, sse, config.admin_token()))
    }

    /// Lock guarding every phase manager mutation.
    pub fn phases(&self) -> &Mutex<PhaseManager> {
        &self.phases
    }

    /// Named locations declared by the event.
    pub fn locations(&self) -> &LocationRegistry {
        &self.locations
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Token operator routes must present.
    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::{AppState, Backends, SharedState};
    use crate::{
        config::AppConfig, dao::document_store::MemoryDocumentStore,
        phase::testing::StubWorldManager,
    };

    pub const TEST_TOKEN: &str = "test-token";

    /// State built from `config_json` on in-memory stores.
    pub fn state_with(config_json: &str) -> SharedState {
        let config = AppConfig::from_json(config_json).unwrap();
        AppState::bootstrap(
            &config,
            Backends {
                progress: Arc::new(MemoryDocumentStore::new()),
                locations: Arc::new(MemoryDocumentStore::new()),
                worlds: Arc::new(StubWorldManager::new()),
            },
        )
        .unwrap()
    }

    /// Lobby-to-game queue plus a looping group whose phase requires a location.
    pub fn test_state() -> SharedState {
        state_with(
            r#"{
                "admin_token": "test-token",
                "event": {
                    "locations": ["arena_center"],
                    "phases": [
                        {"name": "lobby"},
                        {"name": "countdown", "duration": 10},
                        {"name": "match", "duration": 600},
                        {"name": "duel", "duration": 60, "locations": ["arena_center"]}
                    ],
                    "groups": [
                        {"name": "lobby_to_game", "phases": ["lobby", "countdown", "match"]},
                        {"name": "duels", "ordering": "loop", "phases": ["duel"]}
                    ]
                }
            }"#,
        )
    }
}
