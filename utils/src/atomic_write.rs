//! Atomic file write helper.
//!
//! Uses the temp file + rename pattern so a concurrent reader (or a crash
//! mid-write) never observes a half-written file. The temp file is created
//! in the destination's parent directory so the rename stays on one
//! filesystem.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

/// Write `bytes` to `path` atomically, creating parent directories as
/// needed. The destination is replaced in a single rename.
pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file atomically");
    Ok(())
}
