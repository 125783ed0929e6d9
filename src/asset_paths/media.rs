use std::path::Path;

/// Extension to MIME mapping for every media type the inliner knows how to embed.
pub const MEDIA_TYPES: &[(&str, &str)] = &[
  ("png", "image/png"),
  ("jpg", "image/jpeg"),
  ("jpeg", "image/jpeg"),
  ("gif", "image/gif"),
  ("svg", "image/svg+xml"),
  ("webp", "image/webp"),
  ("mp4", "video/mp4"),
  ("webm", "video/webm"),
  ("mp3", "audio/mpeg"),
  ("m4a", "audio/mp4"),
  ("wav", "audio/wav"),
  ("ogg", "audio/ogg"),
  ("woff", "font/woff"),
  ("woff2", "font/woff2"),
  ("ttf", "font/ttf"),
  ("otf", "font/otf"),
  ("json", "application/json"),
  ("wasm", "application/wasm"),
  ("glb", "model/gltf-binary"),
  ("txt", "text/plain"),
  ("js", "text/javascript"),
  ("css", "text/css"),
  ("html", "text/html"),
];

/// Media type used when the extension is unknown.
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Extensions that the optimise-only mode rewrites in place.
pub const OPTIMIZABLE_EXTENSIONS: &[&str] = &[
  "jpg", "jpeg", "png", "webp", "gif", "mp3", "m4a", "wav", "ogg", "mp4", "webm", "woff",
  "woff2", "ttf", "otf", "glb",
];

/// Derive the media type from a path's extension (case-insensitive).
pub fn media_type_for_path(path: &Path) -> &'static str {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| media_type_for_extension(ext))
    .unwrap_or(FALLBACK_MEDIA_TYPE)
}

/// Look up a media type by bare extension, without the leading dot.
pub fn media_type_for_extension(extension: &str) -> &'static str {
  let extension = extension.trim_start_matches('.').to_ascii_lowercase();
  MEDIA_TYPES
    .iter()
    .find(|(ext, _)| *ext == extension)
    .map(|(_, mime)| *mime)
    .unwrap_or(FALLBACK_MEDIA_TYPE)
}

/// Whether optimise-only mode should consider this file.
pub fn is_optimizable_path(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| {
      let ext = ext.to_ascii_lowercase();
      OPTIMIZABLE_EXTENSIONS.contains(&ext.as_str())
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_extensions_case_insensitively() {
    assert_eq!(media_type_for_path(Path::new("a/B.PNG")), "image/png");
    assert_eq!(media_type_for_extension(".jpeg"), "image/jpeg");
    assert_eq!(media_type_for_path(Path::new("noext")), FALLBACK_MEDIA_TYPE);
    assert_eq!(media_type_for_path(Path::new("x.bin")), FALLBACK_MEDIA_TYPE);
  }

  #[test]
  fn recognises_optimizable_files() {
    assert!(is_optimizable_path(Path::new("clip.MP4")));
    assert!(!is_optimizable_path(Path::new("vector.svg")));
    assert!(!is_optimizable_path(Path::new("script.js")));
  }
}
