//! Error types for the butterfly-osm toolkit
//!
//! Every variant is fatal for the run that raised it: the tile tools process a
//! fixed dataset once per invocation, so nothing here is retried or skipped.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for butterfly-osm tile operations
#[derive(Debug, Error)]
pub enum Error {
    /// A tile path could not be decoded into `(level, index)`
    #[error("Malformed tile path '{path}': {reason}")]
    Format { path: String, reason: String },

    /// Tile level outside the supported hierarchy
    #[error("Unknown tile level {0} (supported levels are 0-3)")]
    Lookup(u32),

    /// Invalid user input: bbox, polygons, configuration
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The selection matched no tiles
    #[error("No tiles matched the selection, nothing to write")]
    EmptyInput,

    /// File I/O failure, reported with the offending path
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output exists and overwriting was not requested
    #[error("File already exists: {} (use --overwrite to replace it)", .0.display())]
    OutputExists(PathBuf),

    /// Tile bytes too short or otherwise unreadable
    #[error("Malformed tile '{path}': {reason}")]
    MalformedTile { path: String, reason: String },

    /// Archive layout disagrees with what was written
    #[error("Archive consistency check failed: {0}")]
    Consistency(String),

    /// Traffic extract generation failed; the tile extract is left in place
    #[error("Traffic extract generation failed: {0}")]
    Traffic(Box<Error>),
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Error::Consistency(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

/// Attach a path to `std::io::Result`s
pub trait IoResultExt<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::io(path, source))
    }
}

/// Convenience result type for butterfly-osm operations
pub type Result<T> = std::result::Result<T, Error>;
