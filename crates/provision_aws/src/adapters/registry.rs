use aws_sdk_ecr::types::ImageIdentifier;
use tracing::info;

use super::run_blocking;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub name: String,
    pub url: String,
}

/// Container registry seam. `ensure_repository` must adopt an existing
/// repository with the derived name rather than fail or duplicate.
pub trait ContainerRegistry {
    fn ensure_repository(&self, name: &str) -> Result<RepositoryInfo, String>;

    /// Digest currently pushed under `tag`, or `None` when the repository
    /// or tag does not exist yet.
    fn image_digest(&self, repository: &str, tag: &str) -> Result<Option<String>, String>;
}

pub struct EcrRegistry {
    client: aws_sdk_ecr::Client,
}

impl EcrRegistry {
    pub fn new(client: aws_sdk_ecr::Client) -> Self {
        Self { client }
    }

    fn describe_repository(&self, name: &str) -> Result<Option<RepositoryInfo>, String> {
        let client = self.client.clone();
        let repository_name = name.to_string();
        run_blocking(async move {
            match client
                .describe_repositories()
                .repository_names(&repository_name)
                .send()
                .await
            {
                Ok(output) => {
                    let repository = output
                        .repositories()
                        .first()
                        .ok_or_else(|| format!("ECR returned no entry for '{repository_name}'"))?;
                    Ok(Some(repository_info(
                        repository.repository_name(),
                        repository.repository_uri(),
                        &repository_name,
                    )?))
                }
                Err(error) => {
                    let service_error = error.into_service_error();
                    if service_error.is_repository_not_found_exception() {
                        Ok(None)
                    } else {
                        Err(format!(
                            "failed to describe repository '{repository_name}': {service_error}"
                        ))
                    }
                }
            }
        })
    }
}

impl ContainerRegistry for EcrRegistry {
    fn ensure_repository(&self, name: &str) -> Result<RepositoryInfo, String> {
        if let Some(existing) = self.describe_repository(name)? {
            info!(repository = name, "adopted existing ECR repository");
            return Ok(existing);
        }

        let client = self.client.clone();
        let repository_name = name.to_string();
        let created = run_blocking(async move {
            match client
                .create_repository()
                .repository_name(&repository_name)
                .send()
                .await
            {
                Ok(output) => {
                    let repository = output
                        .repository()
                        .ok_or_else(|| format!("ECR returned no repository for '{repository_name}'"))?;
                    Ok(Some(repository_info(
                        repository.repository_name(),
                        repository.repository_uri(),
                        &repository_name,
                    )?))
                }
                Err(error) => {
                    let service_error = error.into_service_error();
                    if service_error.is_repository_already_exists_exception() {
                        // Lost a creation race; adopt what exists.
                        Ok(None)
                    } else {
                        Err(format!(
                            "failed to create repository '{repository_name}': {service_error}"
                        ))
                    }
                }
            }
        })?;

        match created {
            Some(info) => {
                info!(repository = name, "created ECR repository");
                Ok(info)
            }
            None => self
                .describe_repository(name)?
                .ok_or_else(|| format!("repository '{name}' exists but cannot be described")),
        }
    }

    fn image_digest(&self, repository: &str, tag: &str) -> Result<Option<String>, String> {
        let client = self.client.clone();
        let repository_name = repository.to_string();
        let image_tag = tag.to_string();
        run_blocking(async move {
            match client
                .describe_images()
                .repository_name(&repository_name)
                .image_ids(ImageIdentifier::builder().image_tag(&image_tag).build())
                .send()
                .await
            {
                Ok(output) => Ok(output
                    .image_details()
                    .first()
                    .and_then(|detail| detail.image_digest())
                    .map(str::to_string)),
                Err(error) => {
                    let service_error = error.into_service_error();
                    if service_error.is_image_not_found_exception()
                        || service_error.is_repository_not_found_exception()
                    {
                        Ok(None)
                    } else {
                        Err(format!(
                            "failed to look up digest for '{repository_name}:{image_tag}': {service_error}"
                        ))
                    }
                }
            }
        })
    }
}

fn repository_info(
    name: Option<&str>,
    uri: Option<&str>,
    requested: &str,
) -> Result<RepositoryInfo, String> {
    let url = uri
        .ok_or_else(|| format!("repository '{requested}' has no URI"))?
        .to_string();
    Ok(RepositoryInfo {
        name: name.unwrap_or(requested).to_string(),
        url,
    })
}
