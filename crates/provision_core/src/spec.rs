use std::collections::BTreeSet;

use crate::error::ProvisionError;

pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Derived child names (function, role, endpoint suffixes) must stay inside
/// Lambda's 64-character function-name limit.
pub const MAX_SERVICE_NAME_LENGTH: usize = 48;

/// Validated description of one Lambda-backed service.
///
/// Immutable once constructed; `new` is the sole validation point, so a
/// spec in hand is always safe to derive resource names from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    name: String,
    env_vars: Vec<String>,
    image_tag: String,
}

impl ServiceSpec {
    pub fn new(
        name: impl Into<String>,
        env_vars: Vec<String>,
        image_tag: Option<String>,
    ) -> Result<Self, ProvisionError> {
        let name = name.into().trim().to_string();
        validate_service_name(&name)?;

        let mut seen = BTreeSet::new();
        for var in &env_vars {
            if var.trim().is_empty() {
                return Err(ProvisionError::configuration(
                    "environment variable names must be non-empty strings",
                ));
            }
            if var.trim() != var {
                return Err(ProvisionError::Configuration(format!(
                    "environment variable name '{var}' has leading or trailing whitespace"
                )));
            }
            if !seen.insert(var.clone()) {
                return Err(ProvisionError::Configuration(format!(
                    "duplicate environment variable name '{var}'"
                )));
            }
        }

        let image_tag = match image_tag {
            Some(tag) if !tag.trim().is_empty() => tag.trim().to_string(),
            _ => DEFAULT_IMAGE_TAG.to_string(),
        };

        Ok(Self {
            name,
            env_vars,
            image_tag,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared variable names, in declaration order. Order is preserved
    /// for display only; bindings form a mapping in the deployed runtime.
    pub fn env_vars(&self) -> &[String] {
        &self.env_vars
    }

    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }
}

fn validate_service_name(name: &str) -> Result<(), ProvisionError> {
    if name.is_empty() {
        return Err(ProvisionError::configuration(
            "service name cannot be empty",
        ));
    }
    if name.len() > MAX_SERVICE_NAME_LENGTH {
        return Err(ProvisionError::Configuration(format!(
            "service name '{name}' exceeds {MAX_SERVICE_NAME_LENGTH} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ProvisionError::Configuration(format!(
            "service name '{name}' must contain only lowercase letters, digits, and hyphens"
        )));
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return Err(ProvisionError::Configuration(format!(
            "service name '{name}' must not start, end, or double up on hyphens"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn accepts_valid_spec_and_defaults_image_tag() {
        let spec = ServiceSpec::new("viral-vault", vars(&["NOTION_API_KEY"]), None)
            .expect("spec should pass");

        assert_eq!(spec.name(), "viral-vault");
        assert_eq!(spec.image_tag(), "latest");
        assert_eq!(spec.env_vars(), &["NOTION_API_KEY".to_string()]);
    }

    #[test]
    fn blank_image_tag_falls_back_to_latest() {
        let spec = ServiceSpec::new("viral-vault", Vec::new(), Some("  ".to_string()))
            .expect("spec should pass");
        assert_eq!(spec.image_tag(), "latest");
    }

    #[test]
    fn rejects_empty_name() {
        let error = ServiceSpec::new("  ", Vec::new(), None).expect_err("spec should fail");
        assert_eq!(
            error,
            ProvisionError::configuration("service name cannot be empty")
        );
    }

    #[test]
    fn rejects_uppercase_and_unsafe_characters() {
        for name in ["Viral-Vault", "viral_vault", "viral vault", "viral/vault"] {
            ServiceSpec::new(name, Vec::new(), None).expect_err("spec should fail");
        }
    }

    #[test]
    fn rejects_hyphen_abuse() {
        for name in ["-viral", "viral-", "viral--vault"] {
            ServiceSpec::new(name, Vec::new(), None).expect_err("spec should fail");
        }
    }

    #[test]
    fn rejects_name_longer_than_limit() {
        let name = "a".repeat(MAX_SERVICE_NAME_LENGTH + 1);
        let error = ServiceSpec::new(name, Vec::new(), None).expect_err("spec should fail");
        assert!(matches!(error, ProvisionError::Configuration(_)));
    }

    #[test]
    fn rejects_duplicate_env_var_names() {
        let error = ServiceSpec::new("viral-vault", vars(&["A", "B", "A"]), None)
            .expect_err("spec should fail");
        assert_eq!(
            error,
            ProvisionError::Configuration("duplicate environment variable name 'A'".to_string())
        );
    }

    #[test]
    fn rejects_empty_env_var_names() {
        let error =
            ServiceSpec::new("viral-vault", vars(&["A", ""]), None).expect_err("spec should fail");
        assert!(matches!(error, ProvisionError::Configuration(_)));
    }
}
