//! Error type for configuration persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading, saving, or parsing `config.ron`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing under the config directory failed.
    #[error("config file I/O failed at {path}: {source}")]
    Io {
        /// The file or directory the operation touched.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file contents are not valid RON for this settings layout.
    #[error("config file is malformed: {0}")]
    Malformed(#[source] ron::error::SpannedError),

    /// The in-memory settings could not be rendered as RON.
    #[error("config could not be rendered to RON: {0}")]
    Render(#[source] ron::Error),
}
