use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use super::normalize::to_forward_slashes;

/// How an override candidate was derived from the original reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOrigin {
  /// Same project-relative path inside the override directory.
  RelativePath(String),
  /// Same file name directly inside the override directory.
  Basename(String),
}

/// A location inside the override directory that may substitute a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideCandidate {
  /// Absolute location to probe.
  pub path: PathBuf,
  /// Which lookup rule produced the candidate.
  pub origin: CandidateOrigin,
}

impl OverrideCandidate {
  /// Override-directory relative label used in diagnostics.
  pub fn label(&self) -> &str {
    match &self.origin {
      CandidateOrigin::RelativePath(value) | CandidateOrigin::Basename(value) => value,
    }
  }
}

/// Generate the ordered override candidates for a reference.
///
/// `resolved` is the reference joined onto its base directory and normalised. When it lies
/// inside `project_root` the preserved relative path comes first; a path that escapes the
/// root (or cannot be expressed relative to it) only contributes the basename candidate.
pub fn generate_override_candidates(
  override_root: &Path,
  project_root: &Path,
  resolved: Option<&Path>,
  basename: Option<&str>,
) -> Vec<OverrideCandidate> {
  let mut builder = CandidateBuilder::new(override_root);

  if let Some(relative) = resolved.and_then(|path| project_relative(path, project_root)) {
    builder.add_relative_candidate(&relative);
  }
  if let Some(name) = basename {
    builder.add_basename_candidate(name);
  }

  builder.finish()
}

/// Relative path of `path` under `project_root` when it contains only normal segments.
pub fn project_relative(path: &Path, project_root: &Path) -> Option<PathBuf> {
  let relative = path.strip_prefix(project_root).ok()?;
  if relative.as_os_str().is_empty() {
    return None;
  }
  relative
    .components()
    .all(|component| matches!(component, Component::Normal(_)))
    .then(|| relative.to_path_buf())
}

struct CandidateBuilder<'a> {
  override_root: &'a Path,
  seen: BTreeSet<PathBuf>,
  result: Vec<OverrideCandidate>,
}

impl<'a> CandidateBuilder<'a> {
  fn new(override_root: &'a Path) -> Self {
    Self {
      override_root,
      seen: BTreeSet::new(),
      result: Vec::new(),
    }
  }

  fn add_relative_candidate(&mut self, relative: &Path) {
    let label = to_forward_slashes(relative);
    self.push(
      self.override_root.join(relative),
      CandidateOrigin::RelativePath(label),
    );
  }

  fn add_basename_candidate(&mut self, name: &str) {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
      return;
    }
    self.push(
      self.override_root.join(name),
      CandidateOrigin::Basename(name.to_string()),
    );
  }

  fn finish(self) -> Vec<OverrideCandidate> {
    self.result
  }

  fn push(&mut self, path: PathBuf, origin: CandidateOrigin) {
    if self.seen.insert(path.clone()) {
      self.result.push(OverrideCandidate { path, origin });
    }
  }
}
