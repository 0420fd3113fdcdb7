//! Persists the rule store's state to local storage.
//!
//! Subscribed to the store as a [`StateObserver`]: after every mutation
//! the full state is written as one JSON entry under a fixed key. At
//! start-up the entry is read back and handed to `RuleStore::hydrate`.

use std::sync::Arc;

use aml_rule_store::{StateObserver, StoreState};
use log::{error, warn};

use crate::local_storage::{LocalStorage, StorageError};

/// Key holding the state snapshot.
pub const STATE_KEY: &str = "aml_rules";

pub struct SnapshotPersister {
    storage: Arc<LocalStorage>,
    key: String,
}

impl SnapshotPersister {
    pub fn new(storage: Arc<LocalStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Persister for the default [`STATE_KEY`].
    pub fn with_default_key(storage: Arc<LocalStorage>) -> Self {
        Self::new(storage, STATE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Writes `state` as a single entry.
    pub fn save(&self, state: &StoreState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state).map_err(|e| StorageError::Serialize {
            key: self.key.clone(),
            source: e,
        })?;
        self.storage.set_item(&self.key, &json)
    }

    /// Reads the persisted snapshot.
    ///
    /// A snapshot that no longer parses is logged and treated as absent,
    /// so a format change never blocks start-up.
    pub fn load(&self) -> Result<Option<StoreState>, StorageError> {
        let raw = match self.storage.get_item(&self.key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Ignoring unreadable snapshot under {}: {}", self.key, e);
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<bool, StorageError> {
        self.storage.remove_item(&self.key)
    }
}

impl StateObserver for SnapshotPersister {
    fn state_changed(&self, state: &StoreState) {
        if let Err(e) = self.save(state) {
            error!("Failed to persist rule state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aml_rule_store::{Rule, RuleId, RuleStatus, RuleType};

    fn state() -> StoreState {
        StoreState {
            rules: vec![Rule {
                id: RuleId::new(11),
                name: "Related party loop".into(),
                status: RuleStatus::Enabled,
                threshold: 3.0,
                rule_type: RuleType::RelatedParty,
                created_at: "2024-06-01T10:00:00Z".parse().unwrap(),
                updated_at: "2024-06-03T10:00:00Z".parse().unwrap(),
                last_modified_by: "lead-analyst".into(),
            }],
            loading: false,
            error: Some("previous failure".into()),
        }
    }

    #[test]
    fn saved_state_loads_back_equal() {
        let persister = SnapshotPersister::with_default_key(Arc::new(LocalStorage::in_memory().unwrap()));
        persister.save(&state()).unwrap();

        assert_eq!(persister.load().unwrap(), Some(state()));
    }

    #[test]
    fn missing_snapshot_loads_as_none() {
        let persister = SnapshotPersister::with_default_key(Arc::new(LocalStorage::in_memory().unwrap()));
        assert_eq!(persister.load().unwrap(), None);
    }

    #[test]
    fn corrupt_snapshot_loads_as_none() {
        let storage = Arc::new(LocalStorage::in_memory().unwrap());
        storage.set_item(STATE_KEY, "{not json").unwrap();

        let persister = SnapshotPersister::with_default_key(storage);
        assert_eq!(persister.load().unwrap(), None);
    }

    #[test]
    fn observer_writes_under_its_key() {
        let storage = Arc::new(LocalStorage::in_memory().unwrap());
        let persister = SnapshotPersister::new(storage.clone(), "custom");

        persister.state_changed(&state());

        let raw = storage.get_item("custom").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["rules"][0]["status"], "启用");
        assert_eq!(value["loading"], false);
        assert_eq!(storage.get_item(STATE_KEY).unwrap(), None);
    }
}
