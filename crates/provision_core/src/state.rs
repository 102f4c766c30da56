use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;
use crate::resource::{Attributes, ResourceKind};

pub const STATE_SCHEMA_VERSION: &str = "v1";

/// What the engine remembers about one applied resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub fingerprint: String,
    pub attributes: Attributes,
    pub applied_at: DateTime<Utc>,
}

/// On-disk run state, persisted after every successful resource apply so a
/// failed run keeps its upstream resources recorded and reconcilable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionState {
    pub schema_version: String,
    pub resources: BTreeMap<String, ResourceRecord>,
    pub exports: BTreeMap<String, String>,
}

impl Default for ProvisionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionState {
    pub fn new() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION.to_string(),
            resources: BTreeMap::new(),
            exports: BTreeMap::new(),
        }
    }

    /// Loads state from `path`; a missing file is a fresh state, not an
    /// error, so first runs need no setup step.
    pub fn load(path: &Path) -> Result<Self, ProvisionError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = fs::read_to_string(path)
            .map_err(|error| ProvisionError::State(format!("failed to read {path:?}: {error}")))?;
        let state: Self = serde_json::from_str(&contents)
            .map_err(|error| ProvisionError::State(format!("failed to parse {path:?}: {error}")))?;
        if state.schema_version != STATE_SCHEMA_VERSION {
            return Err(ProvisionError::State(format!(
                "unsupported state schema '{}' in {path:?} (expected '{STATE_SCHEMA_VERSION}')",
                state.schema_version
            )));
        }
        Ok(state)
    }

    /// Writes to a scratch file next to `path` and renames it into place,
    /// so an interrupted save never truncates the authoritative state.
    pub fn save(&self, path: &Path) -> Result<(), ProvisionError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|error| ProvisionError::State(format!("failed to encode state: {error}")))?;
        let staged = path.with_extension("json.tmp");
        fs::write(&staged, contents).map_err(|error| {
            ProvisionError::State(format!("failed to write {staged:?}: {error}"))
        })?;
        fs::rename(&staged, path).map_err(|error| {
            ProvisionError::State(format!("failed to move state into {path:?}: {error}"))
        })?;
        Ok(())
    }
}
