use std::sync::OnceLock;

use regex::Regex;

/// Lexical category of a reference found in document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
  /// An embedded `data:` payload carrying its own encoding.
  DataPayload,
  /// An absolute `http(s)` or protocol-relative URL.
  Remote,
  /// A path resolved against the referencing document's directory.
  Local,
  /// Something that must never be resolved (`blob:`, `mailto:`, fragments, ...).
  Ignored,
}

struct ReferencePatterns {
  data: Regex,
  remote: Regex,
  blob: Regex,
  scheme: Regex,
}

fn reference_patterns() -> &'static ReferencePatterns {
  static PATTERNS: OnceLock<ReferencePatterns> = OnceLock::new();
  PATTERNS.get_or_init(|| ReferencePatterns {
    data: Regex::new(r"(?i)^data:").expect("invalid data URI regex"),
    remote: Regex::new(r"(?i)^(?:https?:)?//").expect("invalid http(s) regex"),
    blob: Regex::new(r"(?i)^blob:").expect("invalid blob regex"),
    // Two or more letters so Windows drive letters stay local paths.
    scheme: Regex::new(r"(?i)^[a-z][a-z0-9+.\-]+:").expect("invalid scheme regex"),
  })
}

/// Classify a raw reference.
///
/// `blob:` URLs only exist inside a running page and are deliberately never resolved.
pub fn classify_reference(value: &str) -> ReferenceKind {
  let value = value.trim();
  let patterns = reference_patterns();

  if value.is_empty() || value.starts_with('#') || value.starts_with('?') {
    return ReferenceKind::Ignored;
  }
  if patterns.data.is_match(value) {
    return ReferenceKind::DataPayload;
  }
  if patterns.remote.is_match(value) {
    return ReferenceKind::Remote;
  }
  if patterns.blob.is_match(value) || patterns.scheme.is_match(value) {
    return ReferenceKind::Ignored;
  }
  ReferenceKind::Local
}

/// Absolute URL to fetch for a remote reference, upgrading protocol-relative forms to https.
pub fn remote_fetch_url(value: &str) -> String {
  let value = value.trim();
  if value.starts_with("//") {
    format!("https:{value}")
  } else {
    value.to_string()
  }
}
