//! Operator-set named locations (spawn points, arenas, podiums).

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::dao::{
    document_store::DocumentStore,
    models::LocationsDocument,
    storage::{StorageError, StorageResult},
};

/// A position in a named world. Stored by world name so it survives the world
/// being unloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SafeLocation {
    /// Name of the world the position belongs to.
    pub world: String,
    /// East-west coordinate.
    pub x: f64,
    /// Height.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
    /// Horizontal facing in degrees.
    #[serde(default)]
    pub yaw: f32,
    /// Vertical facing in degrees, `-90` looking straight up.
    #[serde(default)]
    pub pitch: f32,
}

/// Registry of every location the event declares, and the ones operators set.
pub struct LocationRegistry {
    slots: DashMap<String, Option<SafeLocation>>,
    store: Option<Arc<dyn DocumentStore>>,
    /// Held from the in-memory update until the document is saved, so saves
    /// land in update order.
    writes: Mutex<()>,
}

impl LocationRegistry {
    /// Registry declaring `names`, none of them set, without persistence.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: names.into_iter().map(|name| (name.into(), None)).collect(),
            store: None,
            writes: Mutex::new(()),
        }
    }

    /// Persist every change to `store` and restore previously set locations from it.
    ///
    /// Saved entries for names the event no longer declares are dropped with a warning.
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> StorageResult<Self> {
        let root = store.root()?;
        let saved: LocationsDocument = serde_json::from_value(root)
            .map_err(|source| StorageError::corrupt("decoding locations".into(), source))?;
        for (name, location) in saved.locations {
            match self.slots.get_mut(&name) {
                Some(mut slot) => *slot = Some(location),
                None => warn!(location = %name, "ignoring saved location that is no longer declared"),
            }
        }
        self.store = Some(store);
        Ok(self)
    }

    /// Whether `name` is a declared location.
    pub fn is_declared(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Whether `name` is declared and has been set.
    pub fn is_set(&self, name: &str) -> bool {
        self.slots
            .get(name)
            .is_some_and(|slot| slot.value().is_some())
    }

    /// Current value of a location.
    pub fn get(&self, name: &str) -> Option<SafeLocation> {
        self.slots.get(name).and_then(|slot| slot.value().clone())
    }

    /// Set a declared location. Returns `Ok(false)` when `name` is not declared.
    pub fn set(&self, name: &str, location: SafeLocation) -> StorageResult<bool> {
        let _writing = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let Some(mut slot) = self.slots.get_mut(name) else {
                return Ok(false);
            };
            *slot = Some(location);
        }
        info!(location = name, "location set");
        self.persist()?;
        Ok(true)
    }

    /// The subset of `names` that is not set yet, in the given order.
    pub fn unset<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|name| !self.is_set(name))
            .cloned()
            .collect()
    }

    /// Every declared location name with its value, sorted by name.
    pub fn entries(&self) -> Vec<(String, Option<SafeLocation>)> {
        let mut entries: Vec<_> = self
            .slots
            .iter()
            .map(|slot| (slot.key().clone(), slot.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn persist(&self) -> StorageResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let document = LocationsDocument {
            locations: self
                .entries()
                .into_iter()
                .filter_map(|(name, location)| location.map(|loc| (name, loc)))
                .collect(),
        };
        let value = serde_json::to_value(&document)
            .map_err(|source| StorageError::corrupt("encoding locations".into(), source))?;
        store.save(&value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dao::document_store::{JsonFileStore, MemoryDocumentStore};

    fn spot(world: &str) -> SafeLocation {
        SafeLocation {
            world: world.into(),
            x: 1.0,
            y: 64.0,
            z: -3.5,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    #[test]
    fn only_declared_locations_can_be_set() {
        let registry = LocationRegistry::new(["spawn", "arena"]);
        assert!(registry.set("spawn", spot("lobby")).unwrap());
        assert!(!registry.set("moon", spot("space")).unwrap());
        assert!(registry.is_set("spawn"));
        assert!(!registry.is_set("arena"));
        assert!(!registry.is_declared("moon"));
    }

    #[test]
    fn unset_preserves_order() {
        let registry = LocationRegistry::new(["a", "b", "c"]);
        registry.set("b", spot("w")).unwrap();
        let wanted = vec!["c".to_string(), "b".into(), "a".into()];
        assert_eq!(registry.unset(&wanted), vec!["c".to_string(), "a".into()]);
    }

    #[test]
    fn locations_round_trip_through_store() {
        let store = Arc::new(MemoryDocumentStore::new());
        let registry = LocationRegistry::new(["spawn"])
            .with_store(store.clone())
            .unwrap();
        registry.set("spawn", spot("lobby")).unwrap();
        assert_eq!(store.save_count(), 1);

        let restored = LocationRegistry::new(["spawn"])
            .with_store(store.clone())
            .unwrap();
        assert_eq!(restored.get("spawn"), Some(spot("lobby")));
    }

    #[test]
    fn concurrent_sets_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        let names: Vec<String> = (0..8).map(|i| format!("spot_{i}")).collect();
        let registry = Arc::new(
            LocationRegistry::new(names.clone())
                .with_store(Arc::new(JsonFileStore::new(&path)))
                .unwrap(),
        );

        let writers: Vec<_> = names
            .iter()
            .cloned()
            .map(|name| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let mut location = spot("arena");
                        location.x = f64::from(round);
                        assert!(registry.set(&name, location).unwrap());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let reloaded = LocationRegistry::new(names.clone())
            .with_store(Arc::new(JsonFileStore::new(&path)))
            .unwrap();
        for name in &names {
            assert_eq!(reloaded.get(name).map(|l| l.x), Some(49.0));
        }
    }

    #[test]
    fn undeclared_saved_locations_are_dropped() {
        let store = Arc::new(MemoryDocumentStore::with_document(json!({
            "locations": {"old": {"world": "w", "x": 0.0, "y": 0.0, "z": 0.0}}
        })));
        let registry = LocationRegistry::new(["spawn"]).with_store(store).unwrap();
        assert!(!registry.is_declared("old"));
        assert_eq!(registry.entries().len(), 1);
    }
}
