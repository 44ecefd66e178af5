//! Saving export artifacts through a transient file.
//!
//! The artifact is written to a temporary file in the destination directory
//! and then persisted under the destination name, so a failed write never
//! leaves a truncated export behind. The temporary file is gone once this
//! returns, whether the save succeeded or not.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::info;

pub const DEFAULT_EXPORT_FILE: &str = "databuddy_export.csv";

pub fn save_artifact(bytes: &[u8], dest: &Path) -> std::io::Result<PathBuf> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut transient = NamedTempFile::new_in(&dir)?;
    transient.write_all(bytes)?;
    transient.flush()?;
    transient.persist(dest).map_err(|e| e.error)?;
    info!(target: "databuddy", "export saved to {} ({} bytes)", dest.display(), bytes.len());
    Ok(dest.to_path_buf())
}
