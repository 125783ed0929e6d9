//! HTML attribute rewriting, the final payload re-scan and optional HTML minification.

use std::path::Path;
use std::sync::OnceLock;

use futures::future::try_join_all;
use regex::Regex;

use crate::context::RunContext;
use crate::error::{BuildResult, InlineError};
use crate::replace::replace_all;

/// Media attributes: name in group 1, value in group 2 (`"`) or 3 (`'`).
fn media_attribute_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)\s(src|poster|data-src|background)=(?:"([^"]*)"|'([^']*)')"#)
      .expect("invalid media attribute regex")
  })
}

fn srcset_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)\s(srcset)=(?:"([^"]*)"|'([^']*)')"#).expect("invalid srcset regex")
  })
}

/// Any base64 embedded payload left in the document.
fn embedded_payload_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)data:[^"'()\s<>]+?(?:;charset=[^;,]+)?;base64,[A-Za-z0-9+/=%_-]+"#)
      .expect("invalid payload regex")
  })
}

/// Raw-text elements whose bodies minification must not touch.
fn protected_element_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<pre\b[^>]*>.*?</pre\s*>|<textarea\b[^>]*>.*?</textarea\s*>",
    )
    .expect("invalid protected element regex")
  })
}

fn comment_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("invalid comment regex"))
}

fn inter_tag_whitespace_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r">\s+<").expect("invalid whitespace regex"))
}

/// Inline `src`, `poster`, `data-src` and `background` attribute values.
pub async fn inline_html_media_attrs(ctx: &RunContext, html: &str, base_dir: &Path) -> BuildResult<String> {
  replace_all(html, media_attribute_pattern(), |m| async move {
    let attribute = m.group(1).unwrap_or_default();
    let Some((group, value)) = m.first_group(&[2, 3]) else {
      return Ok(m.whole.clone());
    };
    let replaced = ctx.process_uri(value, base_dir).await?;
    Ok(match group {
      2 => format!(" {attribute}=\"{replaced}\""),
      _ => format!(" {attribute}='{replaced}'"),
    })
  })
  .await
}

/// One `srcset` candidate: URL plus its optional width or density descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate {
  /// Candidate URL.
  pub url: String,
  /// Descriptor such as `2x` or `640w`; empty when absent.
  pub descriptor: String,
}

/// Split a `srcset` value into its candidates.
///
/// URLs end at whitespace rather than at the first comma, so embedded payloads (which
/// contain a comma) survive intact.
pub fn split_srcset(value: &str) -> Vec<SrcsetCandidate> {
  let mut out = Vec::new();
  let mut rest = value;
  loop {
    rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    if rest.is_empty() {
      break;
    }

    let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let raw_url = &rest[..url_end];
    rest = &rest[url_end..];

    let url = raw_url.trim_end_matches(',');
    if url.len() < raw_url.len() {
      out.push(SrcsetCandidate {
        url: url.to_string(),
        descriptor: String::new(),
      });
      continue;
    }

    let descriptor_end = rest.find(',').unwrap_or(rest.len());
    out.push(SrcsetCandidate {
      url: url.to_string(),
      descriptor: rest[..descriptor_end].trim().to_string(),
    });
    rest = &rest[descriptor_end..];
  }
  out
}

/// Inline every candidate URL of every `srcset` attribute.
pub async fn inline_srcset(ctx: &RunContext, html: &str, base_dir: &Path) -> BuildResult<String> {
  replace_all(html, srcset_pattern(), |m| async move {
    let attribute = m.group(1).unwrap_or("srcset");
    let Some((group, value)) = m.first_group(&[2, 3]) else {
      return Ok(m.whole.clone());
    };
    let candidates = split_srcset(value);
    let resolved = try_join_all(candidates.iter().map(|candidate| async move {
      let url = ctx.process_uri(&candidate.url, base_dir).await?;
      Ok::<_, InlineError>(if candidate.descriptor.is_empty() {
        url
      } else {
        format!("{url} {}", candidate.descriptor)
      })
    }))
    .await?;
    let joined = resolved.join(", ");
    Ok(match group {
      2 => format!(" {attribute}=\"{joined}\""),
      _ => format!(" {attribute}='{joined}'"),
    })
  })
  .await
}

/// Re-run the payload optimisation over every embedded payload in the document.
pub async fn reencode_all_payloads(ctx: &RunContext, html: &str) -> BuildResult<String> {
  replace_all(html, embedded_payload_pattern(), |m| async move {
    Ok(ctx.reencode(&m.whole).await)
  })
  .await
}

/// Strip comments and inter-tag whitespace when `html.minify` is enabled.
///
/// `<script>`, `<style>`, `<pre>` and `<textarea>` elements are copied byte for byte.
pub fn maybe_minify_html(ctx: &RunContext, html: &str) -> String {
  if !ctx.config().html.minify {
    return html.to_string();
  }
  minify_html(html)
}

fn minify_html(html: &str) -> String {
  let mut out = String::with_capacity(html.len());
  let mut cursor = 0;
  for element in protected_element_pattern().find_iter(html) {
    out.push_str(&minify_gap(&html[cursor..element.start()], cursor > 0, true));
    out.push_str(element.as_str());
    cursor = element.end();
  }
  out.push_str(&minify_gap(&html[cursor..], cursor > 0, false));
  out
}

fn minify_gap(gap: &str, after_element: bool, before_element: bool) -> String {
  let without_comments = comment_pattern().replace_all(gap, "");
  let mut text = inter_tag_whitespace_pattern()
    .replace_all(&without_comments, "><")
    .into_owned();

  if before_element {
    let trimmed = text.trim_end();
    if trimmed.is_empty() || trimmed.ends_with('>') {
      text.truncate(trimmed.len());
    }
  }
  if after_element {
    let trimmed = text.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('<') {
      text = trimmed.to_string();
    }
  }
  text
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  use tempfile::tempdir;

  use crate::config::InlineConfig;
  use crate::optimizers::OptimizerSet;
  use crate::payload::encode_payload;

  fn context(root: &Path) -> RunContext {
    RunContext::new(root, InlineConfig::default()).with_optimizers(OptimizerSet::empty())
  }

  #[tokio::test]
  async fn inlines_media_attributes() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("clip.mp4"), b"V").unwrap();
    fs::write(dir.path().join("still.jpg"), b"J").unwrap();
    let ctx = context(dir.path());

    let html = r#"<video src="clip.mp4" poster='still.jpg'></video><img data-src="gone.png">"#;
    let out = inline_html_media_attrs(&ctx, html, dir.path()).await.unwrap();
    assert_eq!(
      out,
      format!(
        r#"<video src="{}" poster='{}'></video><img data-src="gone.png">"#,
        encode_payload("video/mp4", b"V"),
        encode_payload("image/jpeg", b"J")
      )
    );
  }

  #[test]
  fn splits_srcset_candidates() {
    let candidates = split_srcset(" a.png 1x, b.png 2x,c.png, data:image/png;base64,AAAA 3x");
    let pairs: Vec<(&str, &str)> = candidates
      .iter()
      .map(|c| (c.url.as_str(), c.descriptor.as_str()))
      .collect();
    assert_eq!(pairs, vec![
      ("a.png", "1x"),
      ("b.png", "2x"),
      ("c.png", ""),
      ("data:image/png;base64,AAAA", "3x"),
    ]);
    assert!(split_srcset(" , ").is_empty());
  }

  #[tokio::test]
  async fn inlines_srcset_preserving_descriptors() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("small.png"), b"S").unwrap();
    fs::write(dir.path().join("large.png"), b"L").unwrap();
    let ctx = context(dir.path());

    let html = r#"<img srcset="small.png 1x, large.png 2x">"#;
    let out = inline_srcset(&ctx, html, dir.path()).await.unwrap();
    let expected = format!(
      r#"<img srcset="{} 1x, {} 2x">"#,
      encode_payload("image/png", b"S"),
      encode_payload("image/png", b"L")
    );
    assert_eq!(out, expected);

    // A second pass over already inlined candidates is stable.
    assert_eq!(inline_srcset(&ctx, &out, dir.path()).await.unwrap(), expected);
  }

  #[tokio::test]
  async fn rescan_leaves_unshrinkable_payloads_alone() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path());
    let payload = encode_payload("image/png", b"unchanged");
    let html = format!(r#"<div style="background:url({payload})"></div><p>data: not a payload</p>"#);
    assert_eq!(reencode_all_payloads(&ctx, &html).await.unwrap(), html);
  }

  #[test]
  fn minification_keeps_raw_text_bodies() {
    let html = "<div>\n  <!-- note -->\n  <p>a</p>\n</div>\n<script>\n  if (a < b) { x = '>  <'; }\n</script>\n<pre>\n  keep  me\n</pre>";
    assert_eq!(
      minify_html(html),
      "<div><p>a</p></div><script>\n  if (a < b) { x = '>  <'; }\n</script><pre>\n  keep  me\n</pre>"
    );
  }

  #[test]
  fn minification_is_opt_in() {
    let ctx = context(Path::new("/project"));
    assert_eq!(maybe_minify_html(&ctx, "<a>\n</a>"), "<a>\n</a>");
  }
}
