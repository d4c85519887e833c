use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the asset and template core.
///
/// Bootstrap code (config, manifest loading, server start-up) uses
/// `anyhow` instead; these variants are the ones request handling needs to
/// tell apart.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The file is absent from every candidate base directory.
    #[error("file {path} not found in {searched:?}")]
    NotFound {
        path: String,
        searched: Vec<PathBuf>,
    },

    /// Reading the file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template source did not compile.
    #[error("failed to compile template {path}: {message}")]
    Template { path: String, message: String },

    /// Rendering a compiled template failed.
    #[error("failed to render template {name}: {message}")]
    Render { name: String, message: String },
}

impl AssetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }
}
