//! The Ollama Modelfile gemma-gate creates its model from.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::error::RuntimeError;

/// Render the default Modelfile for the given weights.
pub fn default_modelfile(weights_path: &str) -> String {
    format!(
        "FROM {weights_path}\n\n\
         TEMPLATE \"\"\"<|user|>\n{{{{ .Prompt }}}}\n\n<|assistant|>\"\"\"\n\n\
         PARAMETER num_ctx 4096\n\
         PARAMETER temperature 0.7\n"
    )
}

/// Write the default Modelfile unless one already exists.
///
/// Returns `true` if a new file was written. An existing file is never
/// touched, even if its contents differ from the default.
pub fn ensure_modelfile(path: &Path, weights_path: &str) -> Result<bool, RuntimeError> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("Keeping existing Modelfile at {:?}", path);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    file.write_all(default_modelfile(weights_path).as_bytes())?;
    info!("Wrote default Modelfile to {:?}", path);
    Ok(true)
}
