//! Error taxonomy shared by every pipeline stage

use std::path::{Path, PathBuf};

/// Result alias used across the callvis crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong between loading a call graph and handing
/// an artifact back to the caller.
///
/// Variants carry owned strings rather than source errors so a single
/// failed computation can be cloned out to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// No usable call graph for the requested entry package.
    #[error("analysis unavailable for {entry}: {reason}")]
    AnalysisUnavailable { entry: String, reason: String },

    /// The focus target names neither a function nor a package.
    #[error("focus target not found: {0}")]
    FocusNotFound(String),

    /// A recognized option carried a value that does not parse.
    #[error("invalid value {value:?} for option {key}: {reason}")]
    InvalidOption {
        key: String,
        value: String,
        reason: String,
    },

    /// The layout engine could not be started.
    #[error("layout engine unavailable: {0}")]
    RendererUnavailable(String),

    /// The layout engine ran but did not produce an image.
    #[error("layout engine failed: {0}")]
    RendererFailed(String),

    /// A pipeline task died before producing a result.
    #[error("pipeline task failed: {0}")]
    Internal(String),

    /// Filesystem failure while writing or reading an artifact.
    #[error("I/O error on {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl Error {
    pub fn analysis_unavailable(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::AnalysisUnavailable {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_option(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidOption {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Errors a caller can fix by retrying with different options.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::FocusNotFound(_) | Error::InvalidOption { .. })
    }
}
