use aws_sdk_lambda::types::FunctionUrlAuthType;
use tracing::info;

use super::run_blocking;

const PUBLIC_INVOKE_STATEMENT_ID: &str = "FunctionURLAllowPublicAccess";

/// Public HTTP trigger seam. `ensure_url` adopts an existing function URL
/// so the invocation URL stays stable across image-only redeployments.
pub trait FunctionEndpoint {
    fn ensure_url(&self, function_name: &str) -> Result<String, String>;
}

pub struct LambdaFunctionUrls {
    client: aws_sdk_lambda::Client,
}

impl LambdaFunctionUrls {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

impl FunctionEndpoint for LambdaFunctionUrls {
    fn ensure_url(&self, function_name: &str) -> Result<String, String> {
        let client = self.client.clone();
        let name = function_name.to_string();
        run_blocking(async move {
            match client
                .get_function_url_config()
                .function_name(&name)
                .send()
                .await
            {
                Ok(output) => {
                    info!(function = name.as_str(), "adopted existing function URL");
                    return Ok(output.function_url().to_string());
                }
                Err(error) => {
                    let service_error = error.into_service_error();
                    if !service_error.is_resource_not_found_exception() {
                        return Err(format!(
                            "failed to get function URL of '{name}': {service_error}"
                        ));
                    }
                }
            }

            let created = client
                .create_function_url_config()
                .function_name(&name)
                .auth_type(FunctionUrlAuthType::None)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to create function URL for '{name}': {}",
                        error.into_service_error()
                    )
                })?;

            if let Err(error) = client
                .add_permission()
                .function_name(&name)
                .statement_id(PUBLIC_INVOKE_STATEMENT_ID)
                .action("lambda:InvokeFunctionUrl")
                .principal("*")
                .function_url_auth_type(FunctionUrlAuthType::None)
                .send()
                .await
            {
                let service_error = error.into_service_error();
                // An existing statement means a previous run already
                // opened public invoke; adopt it.
                if !service_error.is_resource_conflict_exception() {
                    return Err(format!(
                        "failed to grant public invoke on '{name}': {service_error}"
                    ));
                }
            }

            info!(function = name.as_str(), "created public function URL");
            Ok(created.function_url().to_string())
        })
    }
}
