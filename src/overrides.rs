//! Substitute assets dropped into the reserved override directory.
//!
//! A reference is redirected when the override directory contains either the same
//! project-relative path or a file with the same basename. Lookups are sandboxed to the
//! project root.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::asset_paths::{
  OverrideCandidate, generate_override_candidates, reference_basename, resolve_local,
  url_basename,
};
use crate::error::{BuildResult, InlineError};

/// Resolves override files for local and remote references.
#[derive(Debug, Clone)]
pub struct OverrideResolver {
  project_root: PathBuf,
  override_root: PathBuf,
  override_dir_name: String,
}

impl OverrideResolver {
  /// Create a resolver for `<project_root>/<override_dir_name>`.
  pub fn new(project_root: impl Into<PathBuf>, override_dir_name: &str) -> Self {
    let project_root = project_root.into();
    Self {
      override_root: project_root.join(override_dir_name),
      project_root,
      override_dir_name: override_dir_name.to_string(),
    }
  }

  /// Directory searched for substitutes.
  pub fn override_root(&self) -> &Path {
    &self.override_root
  }

  /// Find an override for a decoded local reference relative to `base_dir`.
  ///
  /// The preserved relative path is tried first and only when the reference stays inside
  /// the project root; the basename is tried second.
  pub async fn resolve_local(&self, decoded: &str, base_dir: &Path) -> BuildResult<Option<PathBuf>> {
    let resolved = resolve_local(decoded, base_dir, &self.project_root);
    let basename = reference_basename(decoded);
    let candidates = generate_override_candidates(
      &self.override_root,
      &self.project_root,
      Some(&resolved),
      basename.as_deref(),
    );
    self.first_existing(decoded, candidates).await
  }

  /// Find an override for a remote URL by its basename.
  pub async fn resolve_remote(&self, url: &str) -> BuildResult<Option<PathBuf>> {
    let basename = url_basename(url);
    let candidates = generate_override_candidates(
      &self.override_root,
      &self.project_root,
      None,
      basename.as_deref(),
    );
    self.first_existing(url, candidates).await
  }

  async fn first_existing(
    &self,
    reference: &str,
    candidates: Vec<OverrideCandidate>,
  ) -> BuildResult<Option<PathBuf>> {
    for candidate in candidates {
      let is_file = tokio::fs::metadata(&candidate.path)
        .await
        .is_ok_and(|meta| meta.is_file());
      if !is_file {
        continue;
      }

      let path = self.ensure_sandboxed(reference, &candidate.path).await?;
      info!(
        "override used for {reference} -> {}/{}",
        self.override_dir_name,
        candidate.label()
      );
      return Ok(Some(path));
    }
    Ok(None)
  }

  /// Reject candidates that canonicalise outside the project root (e.g. through symlinks).
  async fn ensure_sandboxed(&self, reference: &str, candidate: &Path) -> BuildResult<PathBuf> {
    let canonical = tokio::fs::canonicalize(candidate).await?;
    let root = tokio::fs::canonicalize(&self.project_root).await?;
    if canonical.starts_with(&root) {
      Ok(canonical)
    } else {
      Err(InlineError::OverrideEscape {
        reference: reference.to_string(),
        path: canonical,
      })
    }
  }
}
