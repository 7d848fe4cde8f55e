use async_trait::async_trait;
use gemma_gate_runtime::{GenerationRequest, GenerationResponse, OllamaClient, RuntimeError};

/// Backend the `/chat` route forwards to.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, RuntimeError>;
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, RuntimeError> {
        OllamaClient::generate(self, request).await
    }
}
