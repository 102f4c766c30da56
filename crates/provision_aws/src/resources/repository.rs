use std::sync::Arc;

use provision_core::error::ProvisionError;
use provision_core::resource::{fingerprint_of, Attributes, DependencyView, Resource, ResourceKind};
use provision_core::spec::ServiceSpec;

use crate::adapters::registry::ContainerRegistry;

use super::{repository_resource_name, ATTR_REPOSITORY_NAME, ATTR_REPOSITORY_URL};

/// Declares the container registry repository for one service. The
/// repository name is the service name itself, so the same service always
/// maps to the same repository and re-deployment never orphans images.
pub struct ImageRepositoryResource {
    resource_name: String,
    repository_name: String,
    registry: Arc<dyn ContainerRegistry>,
}

impl ImageRepositoryResource {
    pub fn new(spec: &ServiceSpec, registry: Arc<dyn ContainerRegistry>) -> Self {
        Self {
            resource_name: repository_resource_name(spec.name()),
            repository_name: spec.name().to_string(),
            registry,
        }
    }
}

impl Resource for ImageRepositoryResource {
    fn name(&self) -> &str {
        &self.resource_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::ImageRepository
    }

    fn fingerprint(&self) -> Result<String, ProvisionError> {
        Ok(fingerprint_of((
            ResourceKind::ImageRepository.as_str(),
            &self.repository_name,
        )))
    }

    fn apply(&self, _deps: &DependencyView<'_>) -> Result<Attributes, ProvisionError> {
        let info = self
            .registry
            .ensure_repository(&self.repository_name)
            .map_err(|message| ProvisionError::apply(self.resource_name.as_str(), message))?;
        Ok(Attributes::from([
            (ATTR_REPOSITORY_URL.to_string(), info.url),
            (ATTR_REPOSITORY_NAME.to_string(), info.name),
        ]))
    }
}
