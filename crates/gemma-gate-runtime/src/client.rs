//! HTTP client for the Ollama API.

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Client for the supervised Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

/// Request to the generate API. Streaming is never requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
        }
    }
}

/// Response from the generate API, relayed to gateway callers as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub response: String,
    #[serde(default)]
    pub eval_count: i64,
}

/// Response from the tags API (list models).
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

/// One model known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelEntry {
    pub name: String,
}

impl ModelEntry {
    /// Model names are compared case-insensitively.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl OllamaClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the models the runtime has registered.
    pub async fn list_models(&self) -> Result<Vec<ModelEntry>, RuntimeError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Api(format!("status {}: {}", status.as_u16(), text)));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models)
    }

    /// Send a non-streaming generation request.
    ///
    /// No timeout is applied; the call lasts as long as the runtime takes.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, RuntimeError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Api(format!("status {}: {}", status.as_u16(), text)));
        }

        Ok(response.json().await?)
    }
}
