//! Filesystem layout of a gemma-gate working directory.

use std::path::PathBuf;

/// Name of the Ollama executable on this platform.
pub fn ollama_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "ollama.exe"
    } else {
        "ollama"
    }
}

/// Directories and files gemma-gate keeps under its working directory.
///
/// ```text
/// <work_dir>/
///   bin/ollama[.exe]
///   .ollama/        model storage (OLLAMA_MODELS)
///   Modelfile
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the runtime executable.
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Directory the runtime stores models in.
    pub fn models_dir(&self) -> PathBuf {
        self.root.join(".ollama")
    }

    /// Expected path of the runtime executable.
    pub fn ollama_path(&self) -> PathBuf {
        self.bin_dir().join(ollama_binary_name())
    }

    pub fn modelfile_path(&self) -> PathBuf {
        self.root.join("Modelfile")
    }

    /// Where a downloaded release archive is staged.
    pub fn archive_path(&self, url: &str) -> PathBuf {
        let name = url.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or("ollama.zip");
        self.root.join(name)
    }

    /// Ensure the bin and model directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.bin_dir())?;
        std::fs::create_dir_all(self.models_dir())?;
        Ok(())
    }
}
