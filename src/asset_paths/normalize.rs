use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Strip the query and fragment from a local reference and percent-decode what remains.
///
/// Invalid UTF-8 after decoding falls back to the undecoded (but still stripped) value.
pub fn decode_local_path(reference: &str) -> String {
  let clean = strip_query_and_fragment(reference.trim());
  match percent_decode_str(clean).decode_utf8() {
    Ok(decoded) => decoded.into_owned(),
    Err(_) => clean.to_string(),
  }
}

/// Remove everything from the first `#` or `?` onwards.
pub fn strip_query_and_fragment(reference: &str) -> &str {
  let end = reference.find(['#', '?']).unwrap_or(reference.len());
  &reference[..end]
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` never climbs above the filesystem root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        let popped = match out.components().next_back() {
          Some(Component::Normal(_)) => out.pop(),
          Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
          _ => false,
        };
        if !popped {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Join a decoded local reference onto its base directory.
///
/// A leading `/` is treated as web-root relative and resolves against `project_root`.
pub fn resolve_local(decoded: &str, base_dir: &Path, project_root: &Path) -> PathBuf {
  let joined = match decoded.strip_prefix('/') {
    Some(rooted) if !rooted.starts_with('/') => project_root.join(rooted),
    _ => base_dir.join(decoded),
  };
  normalize_lexically(&joined)
}

/// Final path segment of a local reference, if it names a file.
pub fn reference_basename(decoded: &str) -> Option<String> {
  let unified = decoded.replace('\\', "/");
  let name = unified.rsplit('/').next()?;
  match name {
    "" | "." | ".." => None,
    other => Some(other.to_string()),
  }
}

/// Final path segment of a remote URL's path component.
pub fn url_basename(url: &str) -> Option<String> {
  let parsed = url::Url::parse(url).ok()?;
  let segment = parsed.path_segments()?.next_back()?;
  let decoded = percent_decode_str(segment).decode_utf8().ok()?;
  reference_basename(&decoded)
}

/// Render a relative path with forward slashes regardless of platform.
pub fn to_forward_slashes(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_query_hash_and_decodes() {
    assert_eq!(decode_local_path("img/my%20photo.png?v=3#frag"), "img/my photo.png");
    assert_eq!(decode_local_path("a.css#x?y"), "a.css");
    assert_eq!(decode_local_path("bad%ff.png"), "bad%ff.png");
  }

  #[test]
  fn normalises_parent_segments() {
    assert_eq!(
      normalize_lexically(Path::new("/project/css/../img/./a.png")),
      PathBuf::from("/project/img/a.png")
    );
    assert_eq!(normalize_lexically(Path::new("/../../etc")), PathBuf::from("/etc"));
    assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
  }

  #[test]
  fn resolves_root_relative_references_against_project_root() {
    let root = Path::new("/project");
    let base = Path::new("/project/css");
    assert_eq!(resolve_local("/img/a.png", base, root), PathBuf::from("/project/img/a.png"));
    assert_eq!(resolve_local("../img/a.png", base, root), PathBuf::from("/project/img/a.png"));
    assert_eq!(resolve_local("b.png", base, root), PathBuf::from("/project/css/b.png"));
  }

  #[test]
  fn extracts_basenames() {
    assert_eq!(reference_basename("a/b/c.png").as_deref(), Some("c.png"));
    assert_eq!(reference_basename("a\\win\\d.png").as_deref(), Some("d.png"));
    assert_eq!(reference_basename("a/.."), None);
    assert_eq!(reference_basename("dir/"), None);
    assert_eq!(
      url_basename("https://cdn.example.com/lib/my%20logo.png?x=1").as_deref(),
      Some("my logo.png")
    );
    assert_eq!(url_basename("https://example.com/"), None);
  }
}
