//! Making sure the default model exists in the runtime.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::client::{ModelEntry, OllamaClient};
use crate::error::RuntimeError;

/// Source of the models a runtime already knows about.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelEntry>, RuntimeError>;
}

#[async_trait]
impl ModelRegistry for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelEntry>, RuntimeError> {
        OllamaClient::list_models(self).await
    }
}

/// Something that can create a model from a Modelfile.
#[async_trait]
pub trait ModelCreator: Send + Sync {
    async fn create_model(&self, name: &str, modelfile: &Path) -> Result<(), RuntimeError>;
}

/// Creates models by running `ollama create` against the supervised runtime.
#[derive(Debug, Clone)]
pub struct OllamaCli {
    executable: PathBuf,
    host: String,
}

impl OllamaCli {
    /// `host` is the `host:port` the runtime listens on.
    pub fn new(executable: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            host: host.into(),
        }
    }
}

#[async_trait]
impl ModelCreator for OllamaCli {
    async fn create_model(&self, name: &str, modelfile: &Path) -> Result<(), RuntimeError> {
        info!("Creating model '{}' from {:?}", name, modelfile);

        let status = Command::new(&self.executable)
            .arg("create")
            .arg(name)
            .arg("-f")
            .arg(modelfile)
            .env("OLLAMA_HOST", &self.host)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| RuntimeError::Provisioning {
                model: name.to_string(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(RuntimeError::Provisioning {
                model: name.to_string(),
                reason: format!("ollama create exited with {}", status),
            });
        }
        Ok(())
    }
}

/// What [`ModelProvisioner::ensure_model`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    AlreadyPresent,
    Created,
}

/// Ensures a named model exists, creating it when the registry lacks it.
pub struct ModelProvisioner<R, C> {
    registry: R,
    creator: C,
}

impl<R: ModelRegistry, C: ModelCreator> ModelProvisioner<R, C> {
    pub fn new(registry: R, creator: C) -> Self {
        Self { registry, creator }
    }

    /// Create `model` from `modelfile` unless the registry already lists it.
    ///
    /// A failed registry query counts as "absent": creating again is
    /// preferred over refusing to start.
    pub async fn ensure_model(
        &self,
        model: &str,
        modelfile: &Path,
    ) -> Result<ProvisionOutcome, RuntimeError> {
        let present = match self.registry.list_models().await {
            Ok(models) => models.iter().any(|m| m.matches(model)),
            Err(e) => {
                warn!("Could not list models ({}), assuming '{}' is missing", e, model);
                false
            }
        };

        if present {
            info!("Model '{}' already present", model);
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        self.creator.create_model(model, modelfile).await?;
        info!("Model '{}' created", model);
        Ok(ProvisionOutcome::Created)
    }
}
