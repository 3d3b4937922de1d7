use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{ReelError, ReelResult};

/// Job-owned scratch namespace for intermediates. Everything inside is removed when the job
/// ends, whatever the outcome.
#[derive(Debug)]
pub struct Staging {
    dir: tempfile::TempDir,
}

impl Staging {
    /// Create a fresh namespace, under `parent` when given (the system temp dir otherwise).
    pub fn new(parent: Option<&Path>) -> ReelResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("reelforge-");
        let dir = match parent {
            Some(p) => {
                std::fs::create_dir_all(p)
                    .with_context(|| format!("create staging parent '{}'", p.display()))?;
                builder.tempdir_in(p)
            }
            None => builder.tempdir(),
        }
        .context("create staging directory")?;
        tracing::debug!(dir = %dir.path().display(), "staging created");
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Path for an intermediate named `name` inside the namespace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Delete an intermediate once its consuming stage finished.
    pub fn release(&self, path: &Path) {
        if !path.starts_with(self.dir.path()) {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => tracing::trace!(file = %path.display(), "released intermediate"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "could not release intermediate"),
        }
    }

    /// Files currently present in the namespace.
    pub fn live_files(&self) -> ReelResult<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(self.dir.path()).context("list staging directory")? {
            let entry = entry.context("read staging entry")?;
            out.push(entry.path());
        }
        out.sort();
        Ok(out)
    }

    /// Move a finished file out of the namespace to `dest`. Returns its size.
    pub fn persist(&self, staged: &Path, dest: &Path) -> ReelResult<u64> {
        crate::encode::ffmpeg::ensure_parent_dir(dest)?;
        if std::fs::rename(staged, dest).is_err() {
            // Cross-device moves fall back to copy + delete.
            std::fs::copy(staged, dest).with_context(|| {
                format!("copy '{}' to '{}'", staged.display(), dest.display())
            })?;
            self.release(staged);
        }
        let size = std::fs::metadata(dest)
            .with_context(|| format!("stat output '{}'", dest.display()))?
            .len();
        Ok(size)
    }

    /// Remove the namespace and everything in it.
    pub fn close(self) -> ReelResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| ReelError::internal(format!("remove staging '{}': {e}", path.display())))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/staging.rs"]
mod tests;
