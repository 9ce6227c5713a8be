//! Error types for cadence-renderer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A template failed to parse. `origin` is the user template path, or
    /// `embedded` for the built-in set.
    #[error("template {origin} does not compile: {source}")]
    Compile {
        origin: String,
        #[source]
        source: tera::Error,
    },

    /// The compiled template failed against a concrete snapshot, e.g. an
    /// undefined variable or a filter type mismatch.
    #[error("rendering {template} failed: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: tera::Error,
    },

    #[error("cannot read template {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
