//! Startup sequence and orderly shutdown.

use std::path::Path;
use std::sync::Arc;

use gemma_gate_gateway::{router, serve, AppState};
use gemma_gate_runtime::{
    ensure_modelfile, probe, GateConfig, ModelProvisioner, OllamaCli, OllamaClient,
    RuntimeProcess, RuntimeSupervisor,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::shutdown::{wait_for_signal, ShutdownWatcher};

/// Bring the runtime up, serve the gateway until a termination signal, then
/// tear everything down.
///
/// Every failure after the runtime was launched terminates it before the
/// error is returned.
pub(crate) async fn run(config: GateConfig) -> miette::Result<()> {
    run_until(config, wait_for_signal()).await
}

/// [`run`] with an explicit shutdown trigger.
pub(crate) async fn run_until<F>(config: GateConfig, shutdown: F) -> miette::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let supervisor = RuntimeSupervisor::new(config.clone());
    let layout = supervisor.layout().clone();

    layout
        .ensure_dirs()
        .map_err(|e| miette::miette!("Failed to create data directories: {}", e))?;

    let exe = supervisor
        .ensure_runtime_binary()
        .await
        .map_err(|e| miette::miette!("Failed to install Ollama: {}", e))?;

    let modelfile = layout.modelfile_path();
    if ensure_modelfile(&modelfile, &config.weights_path)
        .map_err(|e| miette::miette!("Failed to write Modelfile: {}", e))?
    {
        info!("Created {}", modelfile.display());
    }

    let runtime = Arc::new(
        supervisor
            .launch(&exe)
            .map_err(|e| miette::miette!("Failed to start Ollama: {}", e))?,
    );

    let result = serve_with_runtime(&config, &exe, &modelfile, &runtime, shutdown).await;

    // The gateway has stopped accepting requests by now.
    let process = Arc::clone(&runtime);
    if let Err(e) = tokio::task::spawn_blocking(move || process.terminate()).await {
        warn!("Failed to stop runtime: {}", e);
    }
    result
}

async fn serve_with_runtime<F>(
    config: &GateConfig,
    exe: &Path,
    modelfile: &Path,
    runtime: &Arc<RuntimeProcess>,
    shutdown: F,
) -> miette::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    probe::wait_for_port(
        &config.runtime_host,
        config.runtime_port,
        config.probe_timeout,
        config.probe_interval,
    )
    .await
    .map_err(|e| miette::miette!("Ollama did not become ready: {}", e))?;

    let client = OllamaClient::new(config.runtime_url());
    let provisioner =
        ModelProvisioner::new(client.clone(), OllamaCli::new(exe, config.runtime_addr()));
    provisioner
        .ensure_model(&config.default_model, modelfile)
        .await
        .map_err(|e| miette::miette!("Failed to create model: {}", e))?;

    let listener = TcpListener::bind(("0.0.0.0", config.gateway_port))
        .await
        .map_err(|e| miette::miette!("Failed to bind port {}: {}", config.gateway_port, e))?;

    let app = router(AppState::new(
        config.default_model.clone(),
        Arc::new(client),
    ));

    let (watcher, stop) = ShutdownWatcher::spawn(shutdown);

    info!(
        "READY: http://127.0.0.1:{} (POST /chat), runtime PID {}",
        config.gateway_port,
        runtime.pid()
    );

    let served = serve(listener, app, async move {
        let _ = stop.await;
    })
    .await;
    watcher.cancel();

    served.map_err(|e| miette::miette!("Gateway failed: {}", e))
}
