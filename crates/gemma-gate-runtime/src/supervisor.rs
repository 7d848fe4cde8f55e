//! Provisioning and process management for `ollama serve`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::RuntimeError;
use crate::fetch::{self, Downloader};
use crate::paths::{ollama_binary_name, Layout};

/// Installs and starts the Ollama runtime described by a [`GateConfig`].
pub struct RuntimeSupervisor {
    config: GateConfig,
    layout: Layout,
    downloader: Downloader,
}

impl RuntimeSupervisor {
    pub fn new(config: GateConfig) -> Self {
        let layout = config.layout();
        let downloader = Downloader::from_config(&config);
        Self {
            config,
            layout,
            downloader,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Make sure the runtime executable is at its expected path.
    ///
    /// Downloads and unpacks the release archive if it is missing. If the
    /// archive puts the executable somewhere else under `bin/`, it is moved
    /// into place.
    pub async fn ensure_runtime_binary(&self) -> Result<PathBuf, RuntimeError> {
        let exe = self.layout.ollama_path();
        if exe.is_file() {
            debug!("Using existing runtime at {:?}", exe);
            return Ok(exe);
        }

        let url = &self.config.release_url;
        info!("{} not found, downloading from {}", exe.display(), url);

        self.layout.ensure_dirs()?;
        let archive = self.layout.archive_path(url);
        self.downloader.download(url, &archive).await?;

        let bin_dir = self.layout.bin_dir();
        fetch::extract(&archive, &bin_dir)?;
        let _ = fs::remove_file(&archive);

        if !exe.is_file() {
            let found = fetch::locate(&bin_dir, ollama_binary_name()).ok_or_else(|| {
                RuntimeError::MissingExecutable {
                    name: ollama_binary_name().to_string(),
                    dir: bin_dir.clone(),
                }
            })?;
            debug!("Moving {:?} to {:?}", found, exe);
            fs::rename(&found, &exe)?;
        }

        fetch::mark_executable(&exe)?;
        info!("Runtime installed at {:?}", exe);
        Ok(exe)
    }

    /// Environment overrides isolating the runtime to this working directory.
    pub fn runtime_env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("OLLAMA_HOST", self.config.runtime_addr()),
            (
                "OLLAMA_MODELS",
                self.layout.models_dir().to_string_lossy().into_owned(),
            ),
        ]
    }

    /// Start `ollama serve` with the isolated host and model directory.
    pub fn launch(&self, executable: &Path) -> Result<RuntimeProcess, RuntimeError> {
        info!(
            "Starting {} serve on {}",
            executable.display(),
            self.config.runtime_addr()
        );
        RuntimeProcess::spawn(
            executable,
            ["serve"],
            self.runtime_env(),
            self.config.shutdown_grace,
        )
    }
}

/// Handle to the spawned runtime process.
///
/// [`terminate`](Self::terminate) can be called any number of times from any
/// holder; only the first call has an effect.
pub struct RuntimeProcess {
    pid: u32,
    child: Mutex<Option<Child>>,
    grace: Duration,
}

impl RuntimeProcess {
    /// Spawn `program` with extra environment variables, inheriting stdout/stderr.
    pub fn spawn<I, S, K, V>(
        program: &Path,
        args: I,
        envs: impl IntoIterator<Item = (K, V)>,
        grace: Duration,
    ) -> Result<Self, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        let child = Command::new(program)
            .args(args)
            .envs(envs)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| RuntimeError::Launch(format!("{}: {}", program.display(), e)))?;

        let pid = child.id();
        info!("Runtime process started with PID: {}", pid);

        Ok(Self {
            pid,
            child: Mutex::new(Some(child)),
            grace,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the process is still running.
    pub fn is_running(&self) -> bool {
        let mut guard = self.lock();
        match guard.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                debug!("Runtime exited with status: {:?}", status);
                // Reaped; the PID may be reused from here on.
                *guard = None;
                false
            }
            Some(Err(_)) | None => false,
        }
    }

    /// Stop the process. Errors are logged and otherwise ignored.
    pub fn terminate(&self) {
        let Some(mut child) = self.lock().take() else {
            return;
        };

        info!("Stopping runtime (PID: {})", self.pid);

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            unsafe {
                libc::kill(self.pid as i32, libc::SIGTERM);
            }

            let start = Instant::now();
            while start.elapsed() < self.grace {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Runtime exited with status: {:?}", status);
                        return;
                    }
                    Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                    Err(_) => break,
                }
            }
        }
        #[cfg(not(unix))]
        let _ = self.grace;

        // Force kill if still running
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Runtime exited with status: {:?}", status);
            }
            Ok(None) => {
                warn!("Runtime didn't exit gracefully, killing...");
                let _ = child.kill();
                let _ = child.wait();
            }
            Err(e) => {
                warn!("Error checking runtime status: {}", e);
                let _ = child.kill();
            }
        }
    }
}

impl Drop for RuntimeProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
