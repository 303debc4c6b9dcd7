//! Staged artifact naming and atomic placement.
//!
//! The native backend recognizes kernel sources by path alone, so the name
//! is a pure function of the handle (and rank in distributed runs):
//! `<staging>/<handle>.cu`, or `<staging>/<handle>-<rank>.cu`. Writes go to
//! a process-unique temp file first and are renamed into place, so no
//! reader ever observes a partially written source.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::distributed::DistributedContext;
use crate::error::{JitError, Result};
use crate::registry::KernelHandle;

/// Source suffix the backend recognizes, identical on both platforms.
pub const SOURCE_EXT: &str = "cu";

/// Recognized path for a handle's staged source.
pub fn staged_path(dir: &Path, handle: KernelHandle, context: &DistributedContext) -> PathBuf {
    if context.is_distributed() {
        dir.join(format!("{}-{}.{}", handle.index(), context.rank, SOURCE_EXT))
    } else {
        dir.join(format!("{}.{}", handle.index(), SOURCE_EXT))
    }
}

/// Write `contents` to `path` atomically.
///
/// The temp file is created in the destination directory so the final
/// rename never crosses a filesystem boundary. One-time setup work: any
/// I/O failure is fatal and propagated without retry.
pub fn write_staged(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| staging_err(path, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| staging_err(path, e))?;
    tmp.persist(path).map_err(|e| staging_err(path, e.error))?;

    debug!(path = %path.display(), bytes = contents.len(), "staged kernel source");
    Ok(())
}

fn staging_err(path: &Path, source: std::io::Error) -> JitError {
    JitError::Staging {
        path: path.to_path_buf(),
        source,
    }
}
