use std::sync::Arc;

use provision_core::engine::Engine;
use provision_core::error::ProvisionError;
use provision_core::output::Output;
use provision_core::spec::ServiceSpec;

use crate::adapters::endpoint::FunctionEndpoint;
use crate::adapters::functions::FunctionRuntime;
use crate::adapters::registry::ContainerRegistry;
use crate::adapters::secrets::SecretResolver;
use crate::resources::endpoint::EndpointResource;
use crate::resources::function::ComputeFunctionResource;
use crate::resources::repository::ImageRepositoryResource;
use crate::resources::{
    endpoint_resource_name, repository_resource_name, ATTR_INVOCATION_URL, ATTR_REPOSITORY_URL,
};

pub const API_URL_EXPORT: &str = "api_url";
pub const ECR_REPOSITORY_URL_EXPORT: &str = "ecr_repository_url";

/// Seams the service recipe provisions through; tests swap these for
/// in-memory implementations.
pub struct ServiceAdapters {
    pub registry: Arc<dyn ContainerRegistry>,
    pub runtime: Arc<dyn FunctionRuntime>,
    pub endpoints: Arc<dyn FunctionEndpoint>,
    pub secrets: Arc<dyn SecretResolver>,
}

/// One Lambda-backed service: image repository → container function →
/// public endpoint, declared in dependency order against the engine.
///
/// Declaring registers intents and exports only; the platform is touched
/// when the engine's apply phase runs. The URL accessors hand back
/// deferred outputs that resolve once their resource has applied.
pub struct LambdaService {
    api_url: Output<String>,
    ecr_repository_url: Output<String>,
}

impl LambdaService {
    pub fn declare(
        engine: &mut Engine,
        spec: &ServiceSpec,
        adapters: &ServiceAdapters,
    ) -> Result<Self, ProvisionError> {
        engine.declare(Box::new(ImageRepositoryResource::new(
            spec,
            Arc::clone(&adapters.registry),
        )))?;
        engine.declare(Box::new(ComputeFunctionResource::new(
            spec,
            Arc::clone(&adapters.registry),
            Arc::clone(&adapters.runtime),
            Arc::clone(&adapters.secrets),
        )))?;
        engine.declare(Box::new(EndpointResource::new(
            spec,
            Arc::clone(&adapters.endpoints),
        )))?;

        let ecr_repository_url = engine.export(
            ECR_REPOSITORY_URL_EXPORT,
            repository_resource_name(spec.name()),
            ATTR_REPOSITORY_URL,
        )?;
        let api_url = engine.export(
            API_URL_EXPORT,
            endpoint_resource_name(spec.name()),
            ATTR_INVOCATION_URL,
        )?;

        Ok(Self {
            api_url,
            ecr_repository_url,
        })
    }

    pub fn get_url(&self) -> Output<String> {
        self.api_url.clone()
    }

    pub fn get_ecr_repository_url(&self) -> Output<String> {
        self.ecr_repository_url.clone()
    }
}
