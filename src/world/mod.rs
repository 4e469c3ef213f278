//! Game worlds a phase depends on and the manager that imports them.

pub mod location;

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use dashmap::DashMap;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use self::location::{LocationRegistry, SafeLocation};
use crate::dao::{
    document_store::DocumentStore,
    models::WorldsDocument,
    storage::{StorageError, StorageResult},
};

/// Failures raised while importing or configuring a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// No world directory with that name exists.
    #[error("world `{name}` not found under `{root}`")]
    NotFound { name: String, root: String },
    /// Reading the world from disk failed.
    #[error("failed to import world `{name}`")]
    Import {
        name: String,
        #[source]
        source: std::io::Error,
    },
    /// Saving the list of imported worlds failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A loaded world and the rules currently applied to it.
#[derive(Debug)]
pub struct World {
    name: String,
    rules: DashMap<String, String>,
}

impl World {
    /// Fresh handle with no rules applied.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: DashMap::new(),
        }
    }

    /// World name as known to the host.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply a rule, replacing any previous value.
    pub fn set_rule(&self, key: impl Into<String>, value: impl Into<String>) {
        self.rules.insert(key.into(), value.into());
    }

    /// Current value of a rule.
    pub fn rule(&self, key: &str) -> Option<String> {
        self.rules.get(key).map(|entry| entry.value().clone())
    }
}

/// A named world a phase needs. Setup must be idempotent: it runs on every
/// set, including recovery after a restart.
pub trait EventWorld: Send + Sync {
    /// Name the world manager imports.
    fn name(&self) -> &str;

    /// Apply this world's configuration to the loaded handle.
    fn setup_world(&self, world: &World) -> Result<(), WorldError>;
}

/// Resolves world names to loaded worlds.
pub trait WorldManager: Send + Sync {
    /// Load `name` (or return the already loaded handle).
    fn import_world(&self, name: &str) -> Result<Arc<World>, WorldError>;
}

/// World manager backed by one directory per world under a root folder.
///
/// With a store attached, the imported worlds and the always-loaded list are
/// saved on every change and imported again on startup.
pub struct DirectoryWorldManager {
    root: PathBuf,
    loaded: DashMap<String, Arc<World>>,
    always_loaded: Mutex<Vec<String>>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl DirectoryWorldManager {
    /// Manage worlds stored under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: DashMap::new(),
            always_loaded: Mutex::new(Vec::new()),
            store: None,
        }
    }

    /// Persist bookkeeping to `store` and import again every world it lists.
    ///
    /// Listed worlds whose directory is gone are skipped with a warning.
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> StorageResult<Self> {
        let saved: WorldsDocument = serde_json::from_value(store.root()?)
            .map_err(|source| StorageError::corrupt("decoding worlds".into(), source))?;

        for name in saved.worlds.iter().chain(&saved.always_loaded_worlds) {
            if let Err(err) = self.load(name) {
                warn!(world = %name, error = %err, "previously imported world is unavailable");
            }
        }
        *self.always_loaded_list() = saved.always_loaded_worlds;
        self.store = Some(store);
        Ok(self)
    }

    /// Root folder holding world directories.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the worlds imported so far.
    pub fn loaded_worlds(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Import `name` now, if it exists, and on every later startup.
    ///
    /// Returns whether the world could be imported right away.
    pub fn register_always_loaded(&self, name: &str) -> Result<bool, WorldError> {
        {
            let mut always = self.always_loaded_list();
            if !always.iter().any(|existing| existing == name) {
                always.push(name.to_owned());
            }
        }
        let imported = match self.load(name) {
            Ok(_) => true,
            Err(WorldError::NotFound { .. }) => {
                warn!(world = name, "always-loaded world does not exist yet");
                false
            }
            Err(err) => return Err(err),
        };
        self.persist()?;
        Ok(imported)
    }

    fn always_loaded_list(&self) -> MutexGuard<'_, Vec<String>> {
        self.always_loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Import without saving. Returns the handle and whether it was new.
    fn load(&self, name: &str) -> Result<(Arc<World>, bool), WorldError> {
        if let Some(world) = self.loaded.get(name) {
            return Ok((world.clone(), false));
        }

        let path = self.root.join(name);
        let not_found = || WorldError::NotFound {
            name: name.to_owned(),
            root: self.root.display().to_string(),
        };
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(not_found()),
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(source) => {
                return Err(WorldError::Import {
                    name: name.to_owned(),
                    source,
                });
            }
        }

        let world = self
            .loaded
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(World::new(name)))
            .clone();
        info!(world = name, path = %path.display(), "imported world");
        Ok((world, true))
    }

    fn persist(&self) -> StorageResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        // Held through the save so concurrent imports land in order.
        let always = self.always_loaded_list();
        let document = WorldsDocument {
            worlds: self.loaded_worlds(),
            always_loaded_worlds: always.clone(),
        };
        let value = serde_json::to_value(&document)
            .map_err(|source| StorageError::corrupt("encoding worlds".into(), source))?;
        store.save(&value)
    }
}

impl WorldManager for DirectoryWorldManager {
    fn import_world(&self, name: &str) -> Result<Arc<World>, WorldError> {
        let (world, imported) = self.load(name)?;
        if imported {
            self.persist()?;
        }
        Ok(world)
    }
}

/// World whose setup applies a fixed rule set loaded from configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredWorld {
    name: String,
    rules: IndexMap<String, String>,
}

impl ConfiguredWorld {
    /// Describe a world and the rules applied on setup.
    pub fn new(name: impl Into<String>, rules: IndexMap<String, String>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }
}

impl EventWorld for ConfiguredWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_world(&self, world: &World) -> Result<(), WorldError> {
        for (key, value) in &self.rules {
            world.set_rule(key.clone(), value.clone());
        }
        debug!(world = %self.name, rules = self.rules.len(), "world rules applied");
        Ok(())
    }
}
