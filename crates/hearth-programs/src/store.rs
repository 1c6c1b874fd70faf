//! On-disk program artifacts
//!
//! Compiled-language programs may leave artifacts on disk, keyed by program
//! address under the programs directory: a compiled assembly
//! `{address}.dll` and a generated-sources directory `arduino/{address}/`.
//! Removal is best-effort; the files may never have existed.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use hearth_core::ProgramAddress;

/// Locates and cleans up per-program artifacts on disk
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at the programs directory
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The programs directory
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path of the program's compiled assembly
    pub fn compiled_artifact(&self, address: ProgramAddress) -> PathBuf {
        self.base.join(format!("{}.dll", address))
    }

    /// Path of the program's generated-sources directory
    pub fn sketch_dir(&self, address: ProgramAddress) -> PathBuf {
        self.base.join("arduino").join(address.to_string())
    }

    /// Delete the program's artifacts, swallowing missing files
    pub fn remove_artifacts(&self, address: ProgramAddress) {
        remove_path(&self.compiled_artifact(address), |p| {
            std::fs::remove_file(p)
        });
        remove_path(&self.sketch_dir(address), |p| std::fs::remove_dir_all(p));
    }
}

fn remove_path<F>(path: &Path, remove: F)
where
    F: Fn(&Path) -> io::Result<()>,
{
    match remove(path) {
        Ok(()) => debug!(path = %path.display(), "Removed program artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove program artifact"
        ),
    }
}
