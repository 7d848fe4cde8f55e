//! Local Ollama runtime for gemma-gate.
//!
//! This crate provides everything needed to bring a self-contained Ollama
//! instance up in the working directory: downloading and unpacking the
//! runtime, supervising the `ollama serve` process, waiting for it to accept
//! connections and making sure the default model has been created.

mod client;
mod config;
mod error;
pub mod fetch;
mod modelfile;
pub mod paths;
pub mod probe;
mod provision;
mod supervisor;

pub use client::{GenerationRequest, GenerationResponse, ModelEntry, OllamaClient};
pub use config::{GateConfig, GateConfigBuilder};
pub use error::RuntimeError;
pub use fetch::{DownloadReport, Downloader};
pub use modelfile::{default_modelfile, ensure_modelfile};
pub use paths::Layout;
pub use provision::{ModelCreator, ModelProvisioner, ModelRegistry, OllamaCli, ProvisionOutcome};
pub use supervisor::{RuntimeProcess, RuntimeSupervisor};

/// Default port for the gateway's HTTP API.
pub const DEFAULT_GATEWAY_PORT: u16 = 8088;

/// Default port for the supervised Ollama instance.
pub const DEFAULT_RUNTIME_PORT: u16 = 11434;

/// Default model name served by the gateway.
pub const DEFAULT_MODEL_NAME: &str = "gemma2b-local";

/// Default weights referenced by a freshly written Modelfile.
pub const DEFAULT_WEIGHTS_PATH: &str = "G:\\\\models\\\\gemma-2-2b-it-Q4_K_M.gguf";
