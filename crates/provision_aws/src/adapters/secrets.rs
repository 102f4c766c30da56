/// Secret/config seam: a value per declared variable name, or an explicit
/// not-found. Implementations never invent defaults for secrets.
pub trait SecretResolver {
    fn resolve(&self, name: &str) -> Result<Option<String>, String>;
}

/// Resolves variables from the deploying process environment, the same
/// place CI injects them. Empty values count as not found so a blank
/// export cannot silently reach the deployed function.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretResolver;

impl SecretResolver for EnvSecretResolver {
    fn resolve(&self, name: &str) -> Result<Option<String>, String> {
        match std::env::var(name) {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(error) => Err(format!("environment variable '{name}' is unreadable: {error}")),
        }
    }
}
