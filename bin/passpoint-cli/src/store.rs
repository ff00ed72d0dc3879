//! JSON file backed network-config store

use parking_lot::Mutex;
use passpoint_common::CollaboratorError;
use passpoint_core::{CollabResult, NetworkConfigStore, PersistedState};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persists the registry to a single JSON file
pub struct JsonFileStore {
    path: PathBuf,
    removed: Mutex<Vec<String>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file; a missing file is an empty registry
    pub fn load(&self) -> anyhow::Result<PersistedState> {
        if !self.path.exists() {
            debug!("State file {} not found, starting empty", self.path.display());
            return Ok(PersistedState::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Descriptor keys dropped during this run
    pub fn removed_descriptors(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

impl NetworkConfigStore for JsonFileStore {
    fn remove_descriptor(&self, key: &str) {
        info!("Removing network descriptor {}", key);
        self.removed.lock().push(key.to_string());
    }

    fn persist(&self, _immediate: bool, state: &PersistedState) -> CollabResult<()> {
        let data = serde_json::to_string_pretty(state)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;

        // Write then rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;

        debug!(
            "Persisted {} profiles to {}",
            state.profiles.len(),
            self.path.display()
        );
        Ok(())
    }
}
