//! Change-detecting atomic writer.
//!
//! ## `write_artifact` protocol
//!
//! 1. Render content (already done by caller).
//! 2. Compare byte-for-byte with the artifact on disk; skip if identical.
//! 3. Write to `<path>.cadence.tmp`.
//! 4. Run the validate command against the temp file, if configured.
//! 5. Rename to the final path (atomic on POSIX).
//!
//! A failure at any step leaves the previous artifact untouched.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::command::CommandSpec;
use crate::error::{io_err, SyncError};

/// Outcome of writing the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Content differed (or the file did not exist) and was promoted.
    Written { path: PathBuf, digest: String },
    /// Rendered content matches the artifact on disk; nothing touched.
    Unchanged { path: PathBuf, digest: String },
    /// Dry run: the artifact *would* have been written.
    WouldWrite { path: PathBuf, digest: String },
}

impl WriteResult {
    /// `true` only when the artifact on disk was replaced.
    pub fn changed(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. }
            | WriteResult::Unchanged { path, .. }
            | WriteResult::WouldWrite { path, .. } => path,
        }
    }

    /// SHA-256 of the rendered content, hex encoded.
    pub fn digest(&self) -> &str {
        match self {
            WriteResult::Written { digest, .. }
            | WriteResult::Unchanged { digest, .. }
            | WriteResult::WouldWrite { digest, .. } => digest,
        }
    }
}

/// Hex SHA-256 of `content`.
pub fn digest(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

/// Temp sibling used for staging: `<path>.cadence.tmp`.
pub fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.cadence.tmp", path.display()))
}

/// Write `content` to `path` if it differs from what is there.
pub async fn write_artifact(
    path: &Path,
    content: &str,
    validate: Option<&CommandSpec>,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let digest = digest(content);

    if let Some(existing) = read_existing(path)? {
        if existing == content.as_bytes() {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
                digest,
            });
        }
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
            digest,
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let tmp = tmp_path(path);
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;

    if let Some(command) = validate {
        if let Err(e) = command.validate(&tmp).await {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
    }

    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
        digest,
    })
}

/// Current artifact bytes, or `None` if there is no artifact yet.
pub(crate) fn read_existing(path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}
