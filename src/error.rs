//! Error types for seed.
//!
//! Every core operation returns `SeedResult<T>`. The binary wraps these in
//! `anyhow` at the edge and turns any failure into a non-zero exit.

use crate::deps::SourceKind;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for seed operations
pub type SeedResult<T> = Result<T, SeedError>;

/// All errors that can occur while fetching, caching or vendoring a package
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Invalid package spec '{raw}': {reason}")]
    InvalidSpec { raw: String, reason: String },

    #[error("Ref '{reference}' not found for {package}")]
    RefNotFound { package: String, reference: String },

    #[error("Failed to fetch {package}: {reason}")]
    NetworkFailure { package: String, reason: String },

    #[error("No {kind} fetcher configured for {package}")]
    NoFetcher { package: String, kind: SourceKind },

    #[error("{key} is not in the cache (expected {})", .path.display())]
    CacheMiss { key: String, path: PathBuf },

    #[error("Corrupt archive {}: {reason}", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("Cannot rename archive root to {}: the name is already taken", .path.display())]
    RenameConflict { path: PathBuf },

    #[error("Filesystem error at {}: {source}", .path.display())]
    FilesystemFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid manifest {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },
}

impl SeedError {
    pub fn invalid_spec(raw: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    /// Wraps an I/O error with the path it happened at.
    pub fn fs(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::FilesystemFailure {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Adapter for `map_err`.
    pub fn at(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::FilesystemFailure { path, source }
    }

    /// Short category name, used in the install summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSpec { .. } => "invalid spec",
            Self::RefNotFound { .. } => "ref not found",
            Self::NetworkFailure { .. } => "network",
            Self::NoFetcher { .. } => "no fetcher",
            Self::CacheMiss { .. } => "cache miss",
            Self::CorruptArchive { .. } => "corrupt archive",
            Self::RenameConflict { .. } => "rename conflict",
            Self::FilesystemFailure { .. } => "filesystem",
            Self::Manifest { .. } => "manifest",
        }
    }
}

impl From<walkdir::Error> for SeedError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        let source = match err.into_io_error() {
            Some(io_err) => io_err,
            None => io::Error::other("filesystem loop detected"),
        };
        Self::FilesystemFailure { path, source }
    }
}
