use std::io;
use std::path::{Path, PathBuf};

/// Resolves the on-disk directory holding a project's uploaded files,
/// creating it on first use.
#[derive(Debug, Clone)]
pub struct PathResolver {
    files_root: PathBuf,
}

impl PathResolver {
    pub fn new(files_root: impl AsRef<Path>) -> Self {
        Self {
            files_root: files_root.as_ref().to_path_buf(),
        }
    }

    /// Deterministic join of the storage root and `project_id`. Creates the
    /// directory (and any missing parents) if absent. Idempotent; only
    /// filesystem errors surface.
    pub fn resolve(&self, project_id: &str) -> io::Result<PathBuf> {
        let dir = self.files_root.join(project_id);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }
}
