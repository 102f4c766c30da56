pub mod endpoint;
pub mod function;
pub mod repository;

// Attribute keys each resource exposes after apply.
pub const ATTR_REPOSITORY_URL: &str = "repository_url";
pub const ATTR_REPOSITORY_NAME: &str = "repository_name";
pub const ATTR_FUNCTION_NAME: &str = "function_name";
pub const ATTR_FUNCTION_ARN: &str = "function_arn";
pub const ATTR_IMAGE_REF: &str = "image_ref";
pub const ATTR_INVOCATION_URL: &str = "invocation_url";

/// Engine-graph names derive deterministically from the service name so
/// re-runs resolve to the same resources.
pub fn repository_resource_name(service: &str) -> String {
    format!("{service}-repository")
}

pub fn function_resource_name(service: &str) -> String {
    format!("{service}-function")
}

pub fn endpoint_resource_name(service: &str) -> String {
    format!("{service}-endpoint")
}
