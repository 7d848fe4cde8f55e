use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::Method,
    routing::any,
    Json, Router,
};
use gemma_gate_runtime::{GenerationRequest, GenerationResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::generator::Generator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Model used when a request does not name one
    default_model: Arc<str>,
    /// Where chat requests are forwarded
    generator: Arc<dyn Generator>,
}

impl AppState {
    pub fn new(default_model: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        let default_model: String = default_model.into();
        Self {
            default_model: Arc::from(default_model),
            generator,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Body of `/healthz`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", any(healthz))
        .route("/chat", any(chat))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        model: state.default_model().to_string(),
    })
}

async fn chat(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<GenerationResponse>, GatewayError> {
    if method != Method::POST {
        return Err(GatewayError::MethodNotAllowed);
    }

    let request = decode_chat(&body)?;

    let model = request
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.default_model().to_string());

    debug!("Forwarding chat request to model '{}'", model);

    let generation = GenerationRequest::new(model, request.prompt);
    let response = state.generator.generate(&generation).await.map_err(|e| {
        warn!("Generation failed: {}", e);
        GatewayError::Forwarding(e.to_string())
    })?;

    Ok(Json(response))
}

/// Decode the first JSON value in `body`; anything after it is ignored and
/// `null` yields an empty request.
fn decode_chat(body: &[u8]) -> Result<ChatRequest, GatewayError> {
    match serde_json::Deserializer::from_slice(body)
        .into_iter::<Option<ChatRequest>>()
        .next()
    {
        Some(Ok(request)) => Ok(request.unwrap_or_default()),
        Some(Err(e)) => Err(GatewayError::BadRequest(e.to_string())),
        None => Err(GatewayError::BadRequest("EOF".to_string())),
    }
}
