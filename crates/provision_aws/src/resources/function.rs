use std::collections::BTreeMap;
use std::sync::Arc;

use provision_core::error::ProvisionError;
use provision_core::resource::{fingerprint_of, Attributes, DependencyView, Resource, ResourceKind};
use provision_core::spec::ServiceSpec;

use crate::adapters::functions::{FunctionDeployment, FunctionRuntime};
use crate::adapters::registry::ContainerRegistry;
use crate::adapters::secrets::SecretResolver;

use super::{
    function_resource_name, repository_resource_name, ATTR_FUNCTION_ARN, ATTR_FUNCTION_NAME,
    ATTR_IMAGE_REF, ATTR_REPOSITORY_URL,
};

// Fixed runtime policy; static configuration, not computed.
pub const MEMORY_SIZE_MB: i32 = 1024;
pub const TIMEOUT_SECONDS: i32 = 30;
pub const RESERVED_CONCURRENCY: i32 = 10;

/// Declares the container Lambda function for one service.
///
/// The fingerprint folds in the image digest currently pushed under the
/// tag (looked up by repository name, which is derivable before the
/// repository resource applies). New code pushed under an unchanged
/// `latest` tag changes the digest and forces a redeploy; comparing the
/// tag string alone would silently skip it.
pub struct ComputeFunctionResource {
    resource_name: String,
    repository_resource: String,
    repository_name: String,
    function_name: String,
    image_tag: String,
    env_vars: Vec<String>,
    registry: Arc<dyn ContainerRegistry>,
    runtime: Arc<dyn FunctionRuntime>,
    secrets: Arc<dyn SecretResolver>,
}

impl ComputeFunctionResource {
    pub fn new(
        spec: &ServiceSpec,
        registry: Arc<dyn ContainerRegistry>,
        runtime: Arc<dyn FunctionRuntime>,
        secrets: Arc<dyn SecretResolver>,
    ) -> Self {
        Self {
            resource_name: function_resource_name(spec.name()),
            repository_resource: repository_resource_name(spec.name()),
            repository_name: spec.name().to_string(),
            function_name: spec.name().to_string(),
            image_tag: spec.image_tag().to_string(),
            env_vars: spec.env_vars().to_vec(),
            registry,
            runtime,
            secrets,
        }
    }

    /// Binding resolution is per-variable fail-fast: the first variable
    /// the resolver has no value for aborts this resource, named in the
    /// error, and never reaches the platform as an empty binding.
    fn resolve_bindings(&self) -> Result<BTreeMap<String, String>, ProvisionError> {
        let mut bindings = BTreeMap::new();
        for name in &self.env_vars {
            let value = self
                .secrets
                .resolve(name)
                .map_err(|message| ProvisionError::apply(self.resource_name.as_str(), message))?
                .ok_or_else(|| ProvisionError::MissingSecret(name.clone()))?;
            bindings.insert(name.clone(), value);
        }
        Ok(bindings)
    }
}

impl Resource for ComputeFunctionResource {
    fn name(&self) -> &str {
        &self.resource_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeFunction
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.repository_resource.clone()]
    }

    fn fingerprint(&self) -> Result<String, ProvisionError> {
        let digest = self
            .registry
            .image_digest(&self.repository_name, &self.image_tag)
            .map_err(|message| ProvisionError::apply(self.resource_name.as_str(), message))?;
        // Names only; secret values never feed the fingerprint or state.
        let mut env_names = self.env_vars.clone();
        env_names.sort();
        Ok(fingerprint_of((
            ResourceKind::ComputeFunction.as_str(),
            &self.function_name,
            &self.repository_name,
            &self.image_tag,
            &digest,
            &env_names,
            MEMORY_SIZE_MB,
            TIMEOUT_SECONDS,
            RESERVED_CONCURRENCY,
        )))
    }

    fn apply(&self, deps: &DependencyView<'_>) -> Result<Attributes, ProvisionError> {
        let repository_url = deps.attribute(&self.repository_resource, ATTR_REPOSITORY_URL)?;
        let image_ref = format!("{repository_url}:{}", self.image_tag);
        let env_bindings = self.resolve_bindings()?;

        let info = self
            .runtime
            .deploy(&FunctionDeployment {
                function_name: self.function_name.clone(),
                image_ref: image_ref.clone(),
                env_bindings,
                memory_size_mb: MEMORY_SIZE_MB,
                timeout_seconds: TIMEOUT_SECONDS,
                reserved_concurrency: RESERVED_CONCURRENCY,
            })
            .map_err(|message| ProvisionError::apply(self.resource_name.as_str(), message))?;

        Ok(Attributes::from([
            (ATTR_FUNCTION_NAME.to_string(), info.name),
            (ATTR_FUNCTION_ARN.to_string(), info.arn),
            (ATTR_IMAGE_REF.to_string(), image_ref),
        ]))
    }
}
