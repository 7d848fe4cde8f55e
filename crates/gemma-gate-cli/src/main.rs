//! gemma-gate - local Ollama bootstrapper and chat gateway.

use clap::Parser;
use gemma_gate_runtime::{GateConfig, GateConfigBuilder};
use std::path::PathBuf;

mod lifecycle;
mod shutdown;

/// Install and start a local Ollama runtime, then serve /healthz and /chat
#[derive(Parser, Debug)]
#[command(name = "gemma-gate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding bin/, .ollama/ and the Modelfile (default: current directory)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Gateway port (default: 8088)
    #[arg(long)]
    port: Option<u16>,

    /// Model served when a request names none (default: gemma2b-local)
    #[arg(long)]
    model: Option<String>,
}

impl Cli {
    /// Layer command-line overrides on top of the environment configuration.
    fn into_config(self, base: GateConfig) -> GateConfig {
        let mut builder = GateConfigBuilder::from_config(base);
        if let Some(dir) = self.work_dir {
            builder = builder.work_dir(dir);
        }
        if let Some(port) = self.port {
            builder = builder.gateway_port(port);
        }
        if let Some(model) = self.model {
            builder = builder.default_model(model);
        }
        builder.build()
    }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = cli.into_config(GateConfig::from_env());

    tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))?
        .block_on(lifecycle::run(config))
}
