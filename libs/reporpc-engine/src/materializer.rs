//! Code Materializer
//!
//! Writes submitted source to disk so an interpreter can run it.
//! Every request gets its own file name inside the project's script
//! directory; two requests to the same project never share a path.

use crate::error::ExecError;
use reporpc_common::ProjectBinding;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Per-request path: `run.py` becomes `run_<id>.py` in the script dir
pub fn request_path(binding: &ProjectBinding, request_id: &Uuid) -> PathBuf {
    let file_name = Path::new(&binding.file_name);
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string());
    let name = match file_name.extension() {
        Some(ext) => format!("{}_{}.{}", stem, request_id.simple(), ext.to_string_lossy()),
        None => format!("{}_{}", stem, request_id.simple()),
    };
    binding.script_dir.join(name)
}

/// Create or truncate `path`, write `code` exactly, flush to disk.
/// The parent directory must already exist.
pub async fn materialize(path: &Path, code: &str) -> Result<(), ExecError> {
    let io_err = |source| ExecError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    file.write_all(code.as_bytes()).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;

    tracing::debug!(path = %path.display(), bytes = code.len(), "Materialized source");
    Ok(())
}

/// A materialized source file, removed when dropped
#[derive(Debug)]
pub struct MaterializedFile {
    path: PathBuf,
}

impl MaterializedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MaterializedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove materialized source");
        }
    }
}

/// Write `code` to a fresh per-request file for `binding`.
/// The returned path is absolute, since the child runs in another working directory.
pub async fn materialize_for(
    binding: &ProjectBinding,
    code: &str,
) -> Result<MaterializedFile, ExecError> {
    let relative = request_path(binding, &Uuid::new_v4());
    let path = std::path::absolute(&relative).map_err(|source| ExecError::Io {
        path: relative.clone(),
        source,
    })?;

    materialize(&path, code).await?;
    Ok(MaterializedFile { path })
}
