use std::sync::Arc;

use provision_core::error::ProvisionError;
use provision_core::resource::{fingerprint_of, Attributes, DependencyView, Resource, ResourceKind};
use provision_core::spec::ServiceSpec;

use crate::adapters::endpoint::FunctionEndpoint;

use super::{
    endpoint_resource_name, function_resource_name, ATTR_FUNCTION_NAME, ATTR_INVOCATION_URL,
};

/// Declares the public HTTP trigger bound to the compute function.
///
/// The fingerprint deliberately excludes the image digest and tag:
/// endpoint identity is keyed by function name, so image-only redeploys
/// leave the invocation URL untouched.
pub struct EndpointResource {
    resource_name: String,
    function_resource: String,
    endpoints: Arc<dyn FunctionEndpoint>,
}

impl EndpointResource {
    pub fn new(spec: &ServiceSpec, endpoints: Arc<dyn FunctionEndpoint>) -> Self {
        Self {
            resource_name: endpoint_resource_name(spec.name()),
            function_resource: function_resource_name(spec.name()),
            endpoints,
        }
    }
}

impl Resource for EndpointResource {
    fn name(&self) -> &str {
        &self.resource_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Endpoint
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.function_resource.clone()]
    }

    fn fingerprint(&self) -> Result<String, ProvisionError> {
        Ok(fingerprint_of((
            ResourceKind::Endpoint.as_str(),
            &self.function_resource,
        )))
    }

    fn apply(&self, deps: &DependencyView<'_>) -> Result<Attributes, ProvisionError> {
        let function_name = deps.attribute(&self.function_resource, ATTR_FUNCTION_NAME)?;
        let url = self
            .endpoints
            .ensure_url(function_name)
            .map_err(|message| ProvisionError::apply(self.resource_name.as_str(), message))?;
        Ok(Attributes::from([(ATTR_INVOCATION_URL.to_string(), url)]))
    }
}
