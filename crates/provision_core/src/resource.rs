use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ProvisionError;
use crate::state::ResourceRecord;

/// Attributes a resource exposes after apply, keyed by attribute name.
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ImageRepository,
    ComputeFunction,
    Endpoint,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageRepository => "image_repository",
            Self::ComputeFunction => "compute_function",
            Self::Endpoint => "endpoint",
        }
    }
}

/// One unit of infrastructure with a stable identity.
///
/// `fingerprint` hashes the desired state and may consult the platform
/// (e.g. the image digest behind a tag); equality with the recorded
/// fingerprint makes the resource a no-op for the run. `apply` performs
/// the actual create/update and returns the resolved attributes.
pub trait Resource {
    fn name(&self) -> &str;

    fn kind(&self) -> ResourceKind;

    /// Names of resources that must be applied before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn fingerprint(&self) -> Result<String, ProvisionError>;

    fn apply(&self, deps: &DependencyView<'_>) -> Result<Attributes, ProvisionError>;
}

/// Read access to the attributes of already-applied resources, handed to
/// `Resource::apply` so dependents can consume upstream handles.
pub struct DependencyView<'a> {
    records: &'a BTreeMap<String, ResourceRecord>,
}

impl<'a> DependencyView<'a> {
    pub fn new(records: &'a BTreeMap<String, ResourceRecord>) -> Self {
        Self { records }
    }

    pub fn attribute(&self, resource: &str, key: &str) -> Result<&'a str, ProvisionError> {
        self.records
            .get(resource)
            .and_then(|record| record.attributes.get(key))
            .map(String::as_str)
            .ok_or_else(|| ProvisionError::Unresolved(format!("{resource}.{key}")))
    }
}

/// Sha256 over a stable JSON encoding of the desired-state inputs.
pub fn fingerprint_of(inputs: impl Serialize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_json(inputs));
    format!("{:x}", hasher.finalize())
}

pub fn stable_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of fingerprint inputs should not fail")
}
