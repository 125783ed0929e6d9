//! Project layout and entry document discovery.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildResult, InlineError};

/// Filesystem conventions shared by every component of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
  /// Reserved directory under the project root holding substitute assets.
  pub override_dir_name: String,
  /// Directory the single-file output is written to.
  pub output_dir: PathBuf,
  /// Directory names skipped while searching for the entry document.
  pub skipped_dir_names: Vec<String>,
}

impl Default for ProjectLayout {
  fn default() -> Self {
    crate::config::InlineConfig::default().to_layout()
  }
}

impl ProjectLayout {
  /// Output path for an entry document.
  pub fn output_path(&self, entry: &Path) -> PathBuf {
    match entry.file_name() {
      Some(name) => self.output_dir.join(name),
      None => self.output_dir.join("index.html"),
    }
  }

  fn is_skipped_dir(&self, name: &str) -> bool {
    self.skipped_dir_names.iter().any(|skipped| skipped == name)
  }
}

/// Located entry document and the directory it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDocument {
  /// Directory containing the entry document; becomes the project root.
  pub base_dir: PathBuf,
  /// Full path of the entry document.
  pub path: PathBuf,
}

/// Locate the entry document by name, depth-first beneath `search_root`.
///
/// A `file_name` that already points at an existing file (absolute or relative to the
/// working directory) is used directly. Directory entries are visited in sorted order so
/// the first match is deterministic.
pub fn find_entry_document(
  layout: &ProjectLayout,
  file_name: &str,
  search_root: &Path,
) -> BuildResult<EntryDocument> {
  let direct = Path::new(file_name);
  let found = if direct.components().count() > 1 && direct.is_file() {
    Some(direct.to_path_buf())
  } else {
    find_file_recursive(layout, file_name, search_root)?
  };

  let path = found.ok_or_else(|| InlineError::EntryNotFound {
    name: file_name.to_string(),
    root: search_root.to_path_buf(),
  })?;
  let path = fs::canonicalize(&path).map_err(|source| InlineError::Read {
    path: path.clone(),
    source,
  })?;
  let base_dir = path
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("/"));

  Ok(EntryDocument { base_dir, path })
}

fn find_file_recursive(
  layout: &ProjectLayout,
  file_name: &str,
  dir: &Path,
) -> BuildResult<Option<PathBuf>> {
  let mut entries: Vec<_> = match fs::read_dir(dir) {
    Ok(entries) => entries.flatten().collect(),
    Err(source) => {
      return Err(InlineError::Read {
        path: dir.to_path_buf(),
        source,
      });
    }
  };
  entries.sort_by_key(|entry| entry.file_name());

  for entry in entries {
    let Ok(file_type) = entry.file_type() else {
      continue;
    };
    let name = entry.file_name();
    let name = name.to_string_lossy();

    if file_type.is_dir() {
      if layout.is_skipped_dir(&name) {
        continue;
      }
      // Unreadable subdirectories are skipped rather than failing the search.
      if let Ok(Some(found)) = find_file_recursive(layout, file_name, &entry.path()) {
        return Ok(Some(found));
      }
    } else if name == file_name {
      return Ok(Some(entry.path()));
    }
  }

  Ok(None)
}

/// Collect every file beneath `dir`, skipping any directory named `skip_dir_name`.
pub fn walk_files(dir: &Path, skip_dir_name: &str) -> std::io::Result<Vec<PathBuf>> {
  let mut out = Vec::new();
  let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
  entries.sort_by_key(|entry| entry.file_name());

  for entry in entries {
    let path = entry.path();
    if entry.file_type()?.is_dir() {
      if entry.file_name() == skip_dir_name {
        continue;
      }
      out.extend(walk_files(&path, skip_dir_name)?);
    } else {
      out.push(path);
    }
  }

  Ok(out)
}
