//! Structural failures that abort an inlining run.
//!
//! Per-resource problems (missing files, failed fetches, optimizer errors) never surface
//! here; they are logged and the original reference is kept.

use std::path::PathBuf;

/// Result type used across the crate for operations that can abort a run.
pub type BuildResult<T> = Result<T, InlineError>;

/// Fatal errors raised by the inlining pipeline.
#[derive(Debug, thiserror::Error)]
pub enum InlineError {
  /// The entry document could not be located under the search root.
  #[error("file \"{name}\" not found in any subfolder of {}", root.display())]
  EntryNotFound {
    /// File name that was searched for.
    name: String,
    /// Directory the search started from.
    root: PathBuf,
  },
  /// An override lookup resolved to a location outside the project root.
  #[error("override for \"{reference}\" escapes the project root via {}", path.display())]
  OverrideEscape {
    /// Reference that triggered the lookup.
    reference: String,
    /// Canonical location the override pointed at.
    path: PathBuf,
  },
  /// Optimise-only mode was requested without an assets directory.
  #[error("missing assets directory (pass --assets-dir, e.g. --assets-dir=assets)")]
  MissingAssetsDir,
  /// The assets directory for optimise-only mode does not exist.
  #[error("assets directory not found: {}", .0.display())]
  AssetsDirNotFound(PathBuf),
  /// Reading a required file failed.
  #[error("failed to read {}: {source}", path.display())]
  Read {
    /// Path that could not be read.
    path: PathBuf,
    /// Underlying I/O error.
    source: std::io::Error,
  },
  /// Writing an output file failed.
  #[error("failed to write {}: {source}", path.display())]
  Write {
    /// Path that could not be written.
    path: PathBuf,
    /// Underlying I/O error.
    source: std::io::Error,
  },
  /// Any other I/O failure on a structural path.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
