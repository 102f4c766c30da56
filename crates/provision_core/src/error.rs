use thiserror::Error;

/// Error taxonomy for a provisioning run.
///
/// `Configuration` fails fast before any resource is declared.
/// `MissingSecret` and `Apply` surface during the apply phase and leave
/// already-applied resources recorded in state. `Unresolved` marks a read
/// of an output or attribute before its resource has applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no value resolved for environment variable '{0}'")]
    MissingSecret(String),

    #[error("'{0}' is not resolved; outputs are readable only after apply")]
    Unresolved(String),

    #[error("failed to apply resource '{resource}': {message}")]
    Apply { resource: String, message: String },

    #[error("state file error: {0}")]
    State(String),
}

impl ProvisionError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn apply(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Apply {
            resource: resource.into(),
            message: message.into(),
        }
    }
}
