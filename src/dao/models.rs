//! Shapes of the JSON documents the stores persist.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::world::SafeLocation;

/// Persisted progress of the phase manager: which phase is current and how
/// many seconds of it have elapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgressDocument {
    /// Name of the current phase, `null` while idle.
    pub phase: Option<String>,
    /// Seconds elapsed in the current phase.
    pub seconds: u64,
}

impl PhaseProgressDocument {
    /// Decode the progress document from a store root.
    ///
    /// Returns `Ok(None)` when nothing was ever saved (no `phase` key).
    pub fn from_root(root: Value) -> serde_json::Result<Option<Self>> {
        if root.get("phase").is_none() {
            return Ok(None);
        }
        serde_json::from_value(root).map(Some)
    }

    /// Encode into the document written to the store.
    pub fn to_root(&self) -> Value {
        serde_json::json!({
            "phase": self.phase,
            "seconds": self.seconds,
        })
    }
}

/// Persisted operator-set locations keyed by location name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationsDocument {
    /// Locations that have been set, in insertion order.
    #[serde(default)]
    pub locations: IndexMap<String, SafeLocation>,
}

/// Persisted world bookkeeping: worlds imported so far and worlds imported at
/// every startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldsDocument {
    /// Worlds imported at least once, sorted by name.
    #[serde(default)]
    pub worlds: Vec<String>,
    /// Worlds imported again whenever the manager starts.
    #[serde(default)]
    pub always_loaded_worlds: Vec<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn progress_document_shape() {
        let doc = PhaseProgressDocument {
            phase: Some("countdown".into()),
            seconds: 7,
        };
        assert_eq!(doc.to_root(), json!({"phase": "countdown", "seconds": 7}));

        let idle = PhaseProgressDocument {
            phase: None,
            seconds: 0,
        };
        assert_eq!(idle.to_root(), json!({"phase": null, "seconds": 0}));
    }

    #[test]
    fn empty_root_means_nothing_saved() {
        assert_eq!(PhaseProgressDocument::from_root(json!({})).unwrap(), None);
    }

    #[test]
    fn decodes_saved_progress() {
        let decoded =
            PhaseProgressDocument::from_root(json!({"phase": "b", "seconds": 12})).unwrap();
        assert_eq!(
            decoded,
            Some(PhaseProgressDocument {
                phase: Some("b".into()),
                seconds: 12
            })
        );
    }

    #[test]
    fn negative_seconds_are_rejected() {
        assert!(PhaseProgressDocument::from_root(json!({"phase": "b", "seconds": -3})).is_err());
    }
}
