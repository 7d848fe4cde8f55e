//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::paths::Layout;
use crate::{DEFAULT_GATEWAY_PORT, DEFAULT_MODEL_NAME, DEFAULT_RUNTIME_PORT, DEFAULT_WEIGHTS_PATH};

const RELEASE_BASE_URL: &str = "https://github.com/ollama/ollama/releases/latest/download";

/// Configuration shared by every gemma-gate component.
///
/// Built once at startup and handed to constructors; nothing reads globals.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Root of the bin/, .ollama/ and Modelfile layout
    pub work_dir: PathBuf,
    /// Model used when a chat request names none
    pub default_model: String,
    /// Port the HTTP gateway listens on
    pub gateway_port: u16,
    /// Host the runtime binds to
    pub runtime_host: String,
    /// Port the runtime binds to
    pub runtime_port: u16,
    /// Release archive for the current platform
    pub release_url: String,
    /// Expected SHA-256 of the release archive, if known
    pub release_sha256: Option<String>,
    /// Weights referenced by a newly written Modelfile
    pub weights_path: String,
    /// Download attempts before giving up
    pub download_attempts: u32,
    /// Fixed delay between download attempts
    pub download_retry_delay: Duration,
    /// Delay between readiness probes
    pub probe_interval: Duration,
    /// Overall readiness deadline
    pub probe_timeout: Duration,
    /// How long a terminated runtime gets to exit before it is killed
    pub shutdown_grace: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            default_model: DEFAULT_MODEL_NAME.to_string(),
            gateway_port: DEFAULT_GATEWAY_PORT,
            runtime_host: "127.0.0.1".to_string(),
            runtime_port: DEFAULT_RUNTIME_PORT,
            release_url: default_release_url(),
            release_sha256: None,
            weights_path: DEFAULT_WEIGHTS_PATH.to_string(),
            download_attempts: 3,
            download_retry_delay: Duration::from_secs(2),
            probe_interval: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(90),
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

impl GateConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let work_dir = std::env::var("GEMMA_GATE_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);

        let default_model =
            std::env::var("GEMMA_GATE_MODEL").unwrap_or(defaults.default_model);

        let gateway_port = std::env::var("GEMMA_GATE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.gateway_port);

        let runtime_port = std::env::var("GEMMA_GATE_RUNTIME_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.runtime_port);

        let release_url =
            std::env::var("GEMMA_GATE_RELEASE_URL").unwrap_or(defaults.release_url);

        let release_sha256 = std::env::var("GEMMA_GATE_RELEASE_SHA256")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| v.to_lowercase());

        let weights_path = std::env::var("GEMMA_GATE_WEIGHTS").unwrap_or(defaults.weights_path);

        Self {
            work_dir,
            default_model,
            gateway_port,
            runtime_port,
            release_url,
            release_sha256,
            weights_path,
            ..defaults
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::default()
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.work_dir)
    }

    /// `host:port` the runtime listens on, as passed in `OLLAMA_HOST`.
    pub fn runtime_addr(&self) -> String {
        format!("{}:{}", self.runtime_host, self.runtime_port)
    }

    /// Base URL of the runtime's HTTP API.
    pub fn runtime_url(&self) -> String {
        format!("http://{}", self.runtime_addr())
    }
}

/// Release archive name published for the platform this binary targets.
pub fn release_archive_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "ollama-windows-amd64.zip"
    } else if cfg!(target_os = "macos") {
        "ollama-darwin.tgz"
    } else if cfg!(target_arch = "aarch64") {
        "ollama-linux-arm64.tgz"
    } else {
        "ollama-linux-amd64.tgz"
    }
}

fn default_release_url() -> String {
    format!("{}/{}", RELEASE_BASE_URL, release_archive_name())
}

/// Builder for gateway configuration.
#[derive(Debug, Default)]
pub struct GateConfigBuilder {
    config: GateConfig,
}

impl GateConfigBuilder {
    /// Start from an existing configuration instead of the defaults.
    pub fn from_config(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.work_dir = path.into();
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn gateway_port(mut self, port: u16) -> Self {
        self.config.gateway_port = port;
        self
    }

    pub fn runtime_port(mut self, port: u16) -> Self {
        self.config.runtime_port = port;
        self
    }

    pub fn release_url(mut self, url: impl Into<String>) -> Self {
        self.config.release_url = url.into();
        self
    }

    pub fn release_sha256(mut self, digest: impl Into<String>) -> Self {
        self.config.release_sha256 = Some(digest.into());
        self
    }

    pub fn weights_path(mut self, path: impl Into<String>) -> Self {
        self.config.weights_path = path.into();
        self
    }

    pub fn download_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.config.download_attempts = attempts;
        self.config.download_retry_delay = delay;
        self
    }

    pub fn probe(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.probe_interval = interval;
        self.config.probe_timeout = timeout;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    pub fn build(self) -> GateConfig {
        self.config
    }
}
