use std::io;
use std::path::{Path, PathBuf};

/// All errors produced while packaging a bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// A declared include pattern does not exist under the root.
    #[error("source not found: {}", path.display())]
    MissingSource { path: PathBuf },

    /// An include pattern resolves outside the declared root.
    #[error("'{}' resolves outside the bundle root", path.display())]
    EscapesRoot { path: PathBuf },

    /// Two manifest entries map to the same virtual path.
    #[error("duplicate virtual path: {path}")]
    DuplicateVirtualPath { path: String },

    /// A source file or directory name is not valid UTF-8 and cannot be
    /// mirrored into the virtual filesystem unchanged.
    #[error("'{}' has a name that is not valid UTF-8", path.display())]
    NonUtf8Name { path: PathBuf },

    /// Filesystem read/write failure.
    #[error("cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A content patch rule could not be applied.
    #[error("cannot patch '{file}': {reason}")]
    Patch { file: String, reason: String },

    /// No runtime blob is cached and downloading is not allowed.
    #[error("runtime blob not found at {}", path.display())]
    MissingRuntime { path: PathBuf },

    /// Downloading the runtime blob failed.
    #[error("cannot download {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The runtime blob does not match its pinned digest.
    #[error("runtime checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The build configuration is unreadable or invalid.
    #[error("invalid config '{}': {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, BundleError>;

/// Shorthand constructors.
impl BundleError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn missing_source(path: &Path) -> Self {
        Self::MissingSource {
            path: path.to_path_buf(),
        }
    }

    pub fn patch(file: &str, reason: impl Into<String>) -> Self {
        Self::Patch {
            file: file.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config(path: &Path, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True for failures detected before any output is written.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingSource { .. }
                | Self::EscapesRoot { .. }
                | Self::NonUtf8Name { .. }
                | Self::MissingRuntime { .. }
                | Self::Config { .. }
        )
    }
}
