use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use provision_aws::adapters::endpoint::FunctionEndpoint;
use provision_aws::adapters::functions::{FunctionDeployment, FunctionInfo, FunctionRuntime};
use provision_aws::adapters::registry::{ContainerRegistry, RepositoryInfo};
use provision_aws::adapters::secrets::SecretResolver;
use provision_aws::service::ServiceAdapters;

pub struct InMemoryRegistry {
    repositories: Mutex<BTreeSet<String>>,
    digests: Mutex<BTreeMap<String, String>>,
    ensure_calls: Mutex<usize>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            repositories: Mutex::new(BTreeSet::new()),
            digests: Mutex::new(BTreeMap::new()),
            ensure_calls: Mutex::new(0),
        }
    }

    /// Simulates CI pushing an image: the digest behind `tag` changes.
    pub fn push_image(&self, repository: &str, tag: &str, digest: &str) {
        self.digests
            .lock()
            .expect("lock should not be poisoned")
            .insert(format!("{repository}:{tag}"), digest.to_string());
    }

    pub fn ensure_calls(&self) -> usize {
        *self.ensure_calls.lock().expect("lock should not be poisoned")
    }
}

impl ContainerRegistry for InMemoryRegistry {
    fn ensure_repository(&self, name: &str) -> Result<RepositoryInfo, String> {
        *self.ensure_calls.lock().expect("lock should not be poisoned") += 1;
        self.repositories
            .lock()
            .expect("lock should not be poisoned")
            .insert(name.to_string());
        Ok(RepositoryInfo {
            name: name.to_string(),
            url: format!("123456789012.dkr.ecr.eu-west-1.amazonaws.com/{name}"),
        })
    }

    fn image_digest(&self, repository: &str, tag: &str) -> Result<Option<String>, String> {
        Ok(self
            .digests
            .lock()
            .expect("lock should not be poisoned")
            .get(&format!("{repository}:{tag}"))
            .cloned())
    }
}

pub struct InMemoryRuntime {
    deployments: Mutex<Vec<FunctionDeployment>>,
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self {
            deployments: Mutex::new(Vec::new()),
        }
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments
            .lock()
            .expect("lock should not be poisoned")
            .len()
    }

    pub fn last_deployment(&self) -> Option<FunctionDeployment> {
        self.deployments
            .lock()
            .expect("lock should not be poisoned")
            .last()
            .cloned()
    }
}

impl FunctionRuntime for InMemoryRuntime {
    fn deploy(&self, deployment: &FunctionDeployment) -> Result<FunctionInfo, String> {
        self.deployments
            .lock()
            .expect("lock should not be poisoned")
            .push(deployment.clone());
        Ok(FunctionInfo {
            name: deployment.function_name.clone(),
            arn: format!(
                "arn:aws:lambda:eu-west-1:123456789012:function:{}",
                deployment.function_name
            ),
        })
    }
}

pub struct InMemoryEndpoint;

impl FunctionEndpoint for InMemoryEndpoint {
    fn ensure_url(&self, function_name: &str) -> Result<String, String> {
        Ok(format!(
            "https://{function_name}.lambda-url.eu-west-1.on.aws/"
        ))
    }
}

pub struct StaticSecretResolver {
    values: BTreeMap<String, String>,
}

impl StaticSecretResolver {
    pub fn with(values: &[(&str, &str)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl SecretResolver for StaticSecretResolver {
    fn resolve(&self, name: &str) -> Result<Option<String>, String> {
        Ok(self.values.get(name).cloned())
    }
}

pub struct TestStack {
    pub registry: Arc<InMemoryRegistry>,
    pub runtime: Arc<InMemoryRuntime>,
    pub endpoints: Arc<InMemoryEndpoint>,
}

impl Default for TestStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TestStack {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(InMemoryRegistry::new()),
            runtime: Arc::new(InMemoryRuntime::new()),
            endpoints: Arc::new(InMemoryEndpoint),
        }
    }

    pub fn adapters(&self, secrets: StaticSecretResolver) -> ServiceAdapters {
        ServiceAdapters {
            registry: Arc::clone(&self.registry) as Arc<dyn ContainerRegistry>,
            runtime: Arc::clone(&self.runtime) as Arc<dyn FunctionRuntime>,
            endpoints: Arc::clone(&self.endpoints) as Arc<dyn FunctionEndpoint>,
            secrets: Arc::new(secrets),
        }
    }
}
