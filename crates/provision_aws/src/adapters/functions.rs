use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use aws_sdk_lambda::types::{
    Architecture, Environment, FunctionCode, LastUpdateStatus, PackageType,
};
use tracing::{debug, info};

use super::run_blocking;

const UPDATE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const UPDATE_POLL_ATTEMPTS: usize = 60;

/// Creation retries absorb IAM eventual consistency on a freshly created
/// execution role.
const CREATE_RETRY_INTERVAL: Duration = Duration::from_secs(3);
const CREATE_RETRY_ATTEMPTS: usize = 5;

const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

fn lambda_trust_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "lambda.amazonaws.com" },
            "Action": "sts:AssumeRole",
        }],
    })
    .to_string()
}

/// Everything the runtime needs to create or update one container
/// function. Binding values are resolved secrets; they pass through to
/// the platform and are never recorded anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDeployment {
    pub function_name: String,
    pub image_ref: String,
    pub env_bindings: BTreeMap<String, String>,
    pub memory_size_mb: i32,
    pub timeout_seconds: i32,
    pub reserved_concurrency: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub arn: String,
}

/// Compute runtime seam. `deploy` is idempotent per function name:
/// create when absent, update code and configuration when present.
pub trait FunctionRuntime {
    fn deploy(&self, deployment: &FunctionDeployment) -> Result<FunctionInfo, String>;
}

pub struct LambdaFunctions {
    lambda: aws_sdk_lambda::Client,
    iam: aws_sdk_iam::Client,
}

impl LambdaFunctions {
    pub fn new(lambda: aws_sdk_lambda::Client, iam: aws_sdk_iam::Client) -> Self {
        Self { lambda, iam }
    }

    fn function_arn(&self, function_name: &str) -> Result<Option<String>, String> {
        let client = self.lambda.clone();
        let name = function_name.to_string();
        run_blocking(async move {
            match client.get_function().function_name(&name).send().await {
                Ok(output) => Ok(output
                    .configuration()
                    .and_then(|configuration| configuration.function_arn())
                    .map(str::to_string)),
                Err(error) => {
                    let service_error = error.into_service_error();
                    if service_error.is_resource_not_found_exception() {
                        Ok(None)
                    } else {
                        Err(format!("failed to get function '{name}': {service_error}"))
                    }
                }
            }
        })
    }

    /// Adopts or creates the `{function}-execution` role with the basic
    /// execution managed policy and returns its ARN.
    fn ensure_execution_role(&self, function_name: &str) -> Result<String, String> {
        let client = self.iam.clone();
        let role_name = format!("{function_name}-execution");
        run_blocking(async move {
            match client.get_role().role_name(&role_name).send().await {
                Ok(output) => {
                    let role = output
                        .role()
                        .ok_or_else(|| format!("IAM returned no role entry for '{role_name}'"))?;
                    debug!(role = role_name.as_str(), "adopted existing execution role");
                    return Ok(role.arn().to_string());
                }
                Err(error) => {
                    let service_error = error.into_service_error();
                    if !service_error.is_no_such_entity_exception() {
                        return Err(format!(
                            "failed to get role '{role_name}': {service_error}"
                        ));
                    }
                }
            }

            let created = client
                .create_role()
                .role_name(&role_name)
                .assume_role_policy_document(lambda_trust_policy())
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to create role '{role_name}': {}",
                        error.into_service_error()
                    )
                })?;
            client
                .attach_role_policy()
                .role_name(&role_name)
                .policy_arn(BASIC_EXECUTION_POLICY_ARN)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to attach execution policy to '{role_name}': {}",
                        error.into_service_error()
                    )
                })?;
            info!(role = role_name.as_str(), "created execution role");
            let role = created
                .role()
                .ok_or_else(|| format!("IAM returned no role for '{role_name}'"))?;
            Ok(role.arn().to_string())
        })
    }

    fn create_function(
        &self,
        deployment: &FunctionDeployment,
        role_arn: &str,
    ) -> Result<String, String> {
        let client = self.lambda.clone();
        let deployment = deployment.clone();
        let role_arn = role_arn.to_string();
        run_blocking(async move {
            let variables: HashMap<String, String> = deployment.env_bindings.into_iter().collect();
            let mut attempt = 0usize;
            loop {
                attempt += 1;
                let result = client
                    .create_function()
                    .function_name(&deployment.function_name)
                    .package_type(PackageType::Image)
                    .code(
                        FunctionCode::builder()
                            .image_uri(&deployment.image_ref)
                            .build(),
                    )
                    .role(&role_arn)
                    .memory_size(deployment.memory_size_mb)
                    .timeout(deployment.timeout_seconds)
                    .architectures(Architecture::X8664)
                    .environment(
                        Environment::builder()
                            .set_variables(Some(variables.clone()))
                            .build(),
                    )
                    .send()
                    .await;
                match result {
                    Ok(output) => {
                        return output
                            .function_arn()
                            .map(str::to_string)
                            .ok_or_else(|| "Lambda returned no function ARN".to_string());
                    }
                    Err(error) => {
                        let service_error = error.into_service_error();
                        // A just-created role may not be assumable yet.
                        if service_error.is_invalid_parameter_value_exception()
                            && attempt < CREATE_RETRY_ATTEMPTS
                        {
                            tokio::time::sleep(CREATE_RETRY_INTERVAL).await;
                            continue;
                        }
                        return Err(format!(
                            "failed to create function '{}': {service_error}",
                            deployment.function_name
                        ));
                    }
                }
            }
        })
    }

    fn update_function(&self, deployment: &FunctionDeployment) -> Result<(), String> {
        let client = self.lambda.clone();
        let deployment = deployment.clone();
        run_blocking(async move {
            client
                .update_function_code()
                .function_name(&deployment.function_name)
                .image_uri(&deployment.image_ref)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to update code of '{}': {}",
                        deployment.function_name,
                        error.into_service_error()
                    )
                })?;
            wait_until_updated(&client, &deployment.function_name).await?;

            let variables: HashMap<String, String> = deployment.env_bindings.into_iter().collect();
            client
                .update_function_configuration()
                .function_name(&deployment.function_name)
                .memory_size(deployment.memory_size_mb)
                .timeout(deployment.timeout_seconds)
                .environment(
                    Environment::builder()
                        .set_variables(Some(variables))
                        .build(),
                )
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to update configuration of '{}': {}",
                        deployment.function_name,
                        error.into_service_error()
                    )
                })?;
            wait_until_updated(&client, &deployment.function_name).await
        })
    }

    fn put_concurrency(&self, function_name: &str, reserved: i32) -> Result<(), String> {
        let client = self.lambda.clone();
        let name = function_name.to_string();
        run_blocking(async move {
            client
                .put_function_concurrency()
                .function_name(&name)
                .reserved_concurrent_executions(reserved)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| {
                    format!(
                        "failed to set concurrency of '{name}': {}",
                        error.into_service_error()
                    )
                })
        })
    }
}

impl FunctionRuntime for LambdaFunctions {
    fn deploy(&self, deployment: &FunctionDeployment) -> Result<FunctionInfo, String> {
        let role_arn = self.ensure_execution_role(&deployment.function_name)?;
        let arn = match self.function_arn(&deployment.function_name)? {
            Some(arn) => {
                info!(
                    function = deployment.function_name.as_str(),
                    image = deployment.image_ref.as_str(),
                    "updating existing function"
                );
                self.update_function(deployment)?;
                arn
            }
            None => {
                info!(
                    function = deployment.function_name.as_str(),
                    image = deployment.image_ref.as_str(),
                    "creating function"
                );
                self.create_function(deployment, &role_arn)?
            }
        };
        self.put_concurrency(&deployment.function_name, deployment.reserved_concurrency)?;
        Ok(FunctionInfo {
            name: deployment.function_name.clone(),
            arn,
        })
    }
}

/// Lambda rejects configuration changes while a prior update is in
/// flight, so each mutation waits for the function to settle.
async fn wait_until_updated(
    client: &aws_sdk_lambda::Client,
    function_name: &str,
) -> Result<(), String> {
    for _ in 0..UPDATE_POLL_ATTEMPTS {
        let output = client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|error| {
                format!(
                    "failed to poll '{function_name}' while updating: {}",
                    error.into_service_error()
                )
            })?;
        match output.last_update_status() {
            Some(LastUpdateStatus::InProgress) => {
                tokio::time::sleep(UPDATE_POLL_INTERVAL).await;
            }
            Some(LastUpdateStatus::Failed) => {
                let reason = output.last_update_status_reason().unwrap_or("unknown");
                return Err(format!("update of '{function_name}' failed: {reason}"));
            }
            _ => return Ok(()),
        }
    }
    Err(format!(
        "update of '{function_name}' did not settle in time"
    ))
}
