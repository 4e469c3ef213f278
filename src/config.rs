//! Application-level configuration loading: storage paths, tick cadence, the
//! operator token and the event definition (worlds, locations, phases, groups).

use std::{
    collections::BTreeMap,
    env,
    fs::{self, OpenOptions},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};
use uuid::Uuid;

use crate::phase::GroupOrdering;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "EVENT_CONDUCTOR_CONFIG_PATH";
const DEFAULT_DATA_PATH: &str = "data/phases.json";
const DEFAULT_LOCATIONS_PATH: &str = "data/locations.json";
const DEFAULT_WORLDS_DIR: &str = "worlds";
const DEFAULT_WORLDS_PATH: &str = "data/worlds.json";
/// File name of the generated admin token, written next to the progress file.
const GENERATED_TOKEN_FILE: &str = "admin_token";
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    data_path: PathBuf,
    locations_path: PathBuf,
    worlds_dir: PathBuf,
    worlds_path: PathBuf,
    tick_interval: Duration,
    admin_token: String,
    admin_token_generated: bool,
    event: EventDefinition,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in event on any failure.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        phases = app_config.event.phases.len(),
                        groups = app_config.event.groups.len(),
                        "loaded event definition from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// File holding the persisted phase progress.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// File holding operator-set locations.
    pub fn locations_path(&self) -> &Path {
        &self.locations_path
    }

    /// Directory containing one sub-directory per importable world.
    pub fn worlds_dir(&self) -> &Path {
        &self.worlds_dir
    }

    /// File recording which worlds were imported.
    pub fn worlds_path(&self) -> &Path {
        &self.worlds_path
    }

    /// Period of the phase tick.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Token expected in the `X-Admin-Token` header of operator routes.
    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Write a generated admin token to a file only the current user can read.
    ///
    /// Returns the file path, or `None` when the token came from the config.
    pub fn write_generated_token(&self) -> io::Result<Option<PathBuf>> {
        if !self.admin_token_generated {
            return Ok(None);
        }
        let dir = self
            .data_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let path = dir.join(GENERATED_TOKEN_FILE);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        writeln!(file, "{}", self.admin_token)?;
        Ok(Some(path))
    }

    /// Worlds, locations, phases and groups making up the event.
    pub fn event(&self) -> &EventDefinition {
        &self.event
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

/// Declarative description of the event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventDefinition {
    /// Worlds phases may depend on.
    pub worlds: Vec<WorldDefinition>,
    /// Named locations operators are expected to set.
    pub locations: Vec<String>,
    /// Every phase of the event; names are unique.
    pub phases: Vec<PhaseDefinition>,
    /// Groups ordering the phases.
    pub groups: Vec<GroupDefinition>,
}

/// A world and the rules applied to it whenever a phase using it is set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldDefinition {
    /// Directory name under the worlds folder.
    pub name: String,
    /// Rule name to value, applied in order.
    #[serde(default)]
    pub rules: IndexMap<String, String>,
    /// Import at every startup, even before a phase needs it.
    #[serde(default)]
    pub always_loaded: bool,
}

/// A data-driven phase.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhaseDefinition {
    /// Unique phase name.
    pub name: String,
    /// Length in seconds; absent or `null` for a phase that never auto-advances.
    #[serde(default)]
    pub duration: Option<u64>,
    /// Worlds imported and set up when the phase is set.
    #[serde(default)]
    pub worlds: Vec<String>,
    /// Locations that must be set before the phase can run.
    #[serde(default)]
    pub locations: Vec<String>,
    /// Title shown on the event bar, followed by the countdown when there is one.
    #[serde(default)]
    pub title: Option<String>,
    /// Announced when the phase starts.
    #[serde(default)]
    pub start_announcement: Option<String>,
    /// Announced when the phase ends.
    #[serde(default)]
    pub end_announcement: Option<String>,
    /// Announcements keyed by the elapsed second they fire at.
    #[serde(default)]
    pub announcements: BTreeMap<u64, String>,
}

/// An ordered group of phases referenced by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupDefinition {
    /// Unique group name.
    pub name: String,
    /// `queue` (default) or `loop`.
    #[serde(default = "default_ordering")]
    pub ordering: GroupOrdering,
    /// Phase names in run order.
    pub phases: Vec<String>,
    /// Announced once when the group is started.
    #[serde(default)]
    pub start_announcement: Option<String>,
}

fn default_ordering() -> GroupOrdering {
    GroupOrdering::Queue
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_path: PathBuf,
    locations_path: PathBuf,
    worlds_dir: PathBuf,
    worlds_path: PathBuf,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "tick_interval_ms")]
    tick_interval: Duration,
    admin_token: Option<String>,
    event: Option<EventDefinition>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            locations_path: PathBuf::from(DEFAULT_LOCATIONS_PATH),
            worlds_dir: PathBuf::from(DEFAULT_WORLDS_DIR),
            worlds_path: PathBuf::from(DEFAULT_WORLDS_PATH),
            tick_interval: DEFAULT_TICK_INTERVAL,
            admin_token: None,
            event: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let (admin_token, admin_token_generated) =
            match value.admin_token.filter(|token| !token.trim().is_empty()) {
                Some(token) => (token, false),
                None => {
                    warn!("no admin token configured; generated one for this run");
                    (Uuid::new_v4().to_string(), true)
                }
            };
        let tick_interval = if value.tick_interval.is_zero() {
            warn!("tick interval must be positive; using the default");
            DEFAULT_TICK_INTERVAL
        } else {
            value.tick_interval
        };
        Self {
            data_path: value.data_path,
            locations_path: value.locations_path,
            worlds_dir: value.worlds_dir,
            worlds_path: value.worlds_path,
            tick_interval,
            admin_token,
            admin_token_generated,
            event: value.event.unwrap_or_else(default_event),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in event shipped with the binary: a lobby, a countdown and a match.
fn default_event() -> EventDefinition {
    let phase = |name: &str, duration: Option<u64>, title: &str| PhaseDefinition {
        name: name.into(),
        duration,
        worlds: Vec::new(),
        locations: Vec::new(),
        title: Some(title.into()),
        start_announcement: None,
        end_announcement: None,
        announcements: BTreeMap::new(),
    };

    let mut countdown = phase("countdown", Some(10), "Starting in");
    countdown.announcements = BTreeMap::from([(5, "Five seconds left!".to_string())]);
    let mut game = phase("match", Some(600), "Match");
    game.start_announcement = Some("The match has started!".into());
    game.end_announcement = Some("The match is over.".into());

    EventDefinition {
        worlds: Vec::new(),
        locations: Vec::new(),
        phases: vec![phase("lobby", None, "Lobby"), countdown, game],
        groups: vec![GroupDefinition {
            name: "lobby_to_game".into(),
            ordering: GroupOrdering::Queue,
            phases: vec!["lobby".into(), "countdown".into(), "match".into()],
            start_announcement: None,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_fields_are_missing() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.data_path(), Path::new(DEFAULT_DATA_PATH));
        assert_eq!(config.worlds_dir(), Path::new(DEFAULT_WORLDS_DIR));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.worlds_path(), Path::new(DEFAULT_WORLDS_PATH));
        assert!(Uuid::parse_str(config.admin_token()).is_ok());
        assert_eq!(config.event().groups[0].name, "lobby_to_game");
    }

    #[test]
    fn parses_full_document() {
        let config = AppConfig::from_json(
            r#"{
                "data_path": "/tmp/progress.json",
                "tick_interval_ms": 250,
                "admin_token": "secret",
                "event": {
                    "worlds": [{"name": "arena", "rules": {"pvp": "true"}, "always_loaded": true}],
                    "locations": ["spawn"],
                    "phases": [
                        {"name": "warmup", "duration": 30, "worlds": ["arena"],
                         "locations": ["spawn"], "announcements": {"10": "twenty left"}},
                        {"name": "podium"}
                    ],
                    "groups": [{"name": "finale", "ordering": "loop", "phases": ["warmup", "podium"]}]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.admin_token(), "secret");
        let event = config.event();
        assert_eq!(event.worlds[0].rules.get("pvp").map(String::as_str), Some("true"));
        assert!(event.worlds[0].always_loaded);
        assert_eq!(event.phases[0].duration, Some(30));
        assert_eq!(event.phases[0].announcements.get(&10).map(String::as_str), Some("twenty left"));
        assert_eq!(event.phases[1].duration, None);
        assert_eq!(event.groups[0].ordering, GroupOrdering::Loop);
    }

    #[test]
    fn zero_tick_interval_falls_back() {
        let config = AppConfig::from_json(r#"{"tick_interval_ms": 0}"#).unwrap();
        assert_eq!(config.tick_interval(), DEFAULT_TICK_INTERVAL);
    }

    #[test]
    fn unreadable_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, "not json").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.event().phases.len(), 3);

        let missing = AppConfig::load_from(&dir.path().join("missing.json"));
        assert_eq!(missing.locations_path(), Path::new(DEFAULT_LOCATIONS_PATH));
    }

    #[test]
    fn generated_token_is_written_to_private_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("state").join("phases.json");
        let raw = format!(r#"{{"data_path": {}}}"#, serde_json::json!(data_path));
        let config = AppConfig::from_json(&raw).unwrap();

        let path = config.write_generated_token().unwrap().unwrap();
        assert_eq!(path, dir.path().join("state").join(GENERATED_TOKEN_FILE));
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), config.admin_token());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let configured = AppConfig::from_json(r#"{"admin_token": "secret"}"#).unwrap();
        assert_eq!(configured.write_generated_token().unwrap(), None);
    }
}
