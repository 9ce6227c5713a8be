//! Unified diff between a rendered configuration and the artifact on disk,
//! for `cadence diff`.

use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::error::SyncError;
use crate::writer::read_existing;

/// Difference between the rendered text and the current artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Compare `rendered` with the artifact at `path`.
///
/// A missing artifact diffs against empty text. Returns `None` when the
/// bytes are identical. No files are written.
pub fn diff_artifact(path: &Path, rendered: &str) -> Result<Option<ArtifactDiff>, SyncError> {
    let existing = read_existing(path)?.unwrap_or_default();
    if existing == rendered.as_bytes() {
        return Ok(None);
    }
    let existing = String::from_utf8_lossy(&existing);

    let old_header = format!("a/{}", path.display());
    let new_header = format!("b/{}", path.display());
    let unified = TextDiff::from_lines(&*existing, rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(ArtifactDiff {
        path: path.to_path_buf(),
        unified_diff: unified,
    }))
}
