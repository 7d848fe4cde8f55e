//! # gemma-gate HTTP gateway
//!
//! A deliberately small HTTP front for the supervised Ollama runtime.
//!
//! ## Endpoints
//!
//! - `/healthz` (any method) - always `{"ok":true,"model":"<default model>"}`
//! - `POST /chat` - `{"prompt": "...", "model"?: "..."}` forwarded to the
//!   runtime's generate API; the `{"response", "eval_count"}` reply is
//!   relayed unchanged
//!
//! Errors are plain text: 405 for non-POST chat calls, 400 for bodies that
//! do not decode, 500 when forwarding fails.
//!
//! ## Usage
//!
//! ```ignore
//! use gemma_gate_gateway::{router, serve, AppState};
//!
//! let state = AppState::new("gemma2b-local", Arc::new(OllamaClient::new("http://127.0.0.1:11434")));
//! serve(listener, router(state), shutdown).await?;
//! ```

mod error;
mod generator;
mod routes;

pub use error::GatewayError;
pub use generator::Generator;
pub use routes::{router, AppState, ChatRequest, HealthResponse};

use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// Once `shutdown` completes no new connections are accepted; in-flight
/// requests are allowed to finish before this returns.
pub async fn serve<F>(listener: TcpListener, app: axum::Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Gateway listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Gateway stopped");
    Ok(())
}
