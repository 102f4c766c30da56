use std::sync::{Arc, OnceLock};

use crate::error::ProvisionError;

/// Deferred value fulfilled by the engine once the owning resource has
/// applied. Reads before fulfillment surface `ProvisionError::Unresolved`
/// instead of a placeholder value.
///
/// Clones share the same slot, so a handle given out at declaration time
/// observes the value the apply phase later produces.
#[derive(Debug, Clone)]
pub struct Output<T> {
    name: String,
    slot: Arc<OnceLock<T>>,
}

impl<T: Clone> Output<T> {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(OnceLock::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fulfills the slot. Returns `false` when a value was already set;
    /// the first value wins.
    pub fn fulfill(&self, value: T) -> bool {
        self.slot.set(value).is_ok()
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn resolve(&self) -> Result<T, ProvisionError> {
        self.slot
            .get()
            .cloned()
            .ok_or_else(|| ProvisionError::Unresolved(self.name.clone()))
    }
}
