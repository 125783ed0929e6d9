//! Stylesheet inlining and CSS reference rewriting.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::asset_paths::{ReferenceKind, classify_reference, decode_local_path, remote_fetch_url};
use crate::context::RunContext;
use crate::error::BuildResult;
use crate::optimizers::SourceLoader;
use crate::replace::{RegexMatch, replace_all};

/// `url(...)` in double-quoted, single-quoted or bare form (groups 1-3).
fn css_url_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"']*))\s*\)"#).expect("invalid url() regex")
  })
}

/// `@import url(...)` (groups 1-3) or `@import "..."` / `@import '...'` (groups 4-5).
fn css_import_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r#"(?i)@import\s+(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"']*))\s*\)|"([^"]+)"|'([^']+)')"#,
    )
    .expect("invalid @import regex")
  })
}

fn css_escape_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r#"\\([()'"\s/\\])"#).expect("invalid css escape regex"))
}

fn link_tag_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)<link\b[^>]*>").expect("invalid link regex"))
}

fn stylesheet_rel_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)\srel=["']?stylesheet["']?"#).expect("invalid rel regex")
  })
}

fn href_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)\shref=(?:"([^"]+)"|'([^']+)')"#).expect("invalid href regex")
  })
}

fn css_href_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)\.css(?:[?#].*)?$").expect("invalid .css regex"))
}

fn media_attribute_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)\smedia=(?:"([^"]*)"|'([^']*)')"#).expect("invalid media regex")
  })
}

/// `<style>` blocks: opening tag, body and closing tag.
fn style_block_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style>)").expect("invalid style block regex")
  })
}

/// `style="..."` / `style='...'` attributes.
fn style_attribute_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)\s(style)=(?:"([^"]*)"|'([^']*)')"#).expect("invalid style attribute regex")
  })
}

/// Remove CSS escapes in front of characters that commonly appear in paths.
fn unescape_css_path(raw: &str) -> String {
  css_escape_pattern().replace_all(raw, "$1").into_owned()
}

/// Rewrite every `url(...)` and `@import` reference in a stylesheet, keeping the original
/// quoting of each.
pub async fn process_css_content(ctx: &RunContext, css: &str, base_dir: &Path) -> BuildResult<String> {
  let css = replace_all(css, css_url_pattern(), |m| rewrite_url(ctx, m, base_dir)).await?;
  replace_all(&css, css_import_pattern(), |m| rewrite_import(ctx, m, base_dir)).await
}

async fn rewrite_url(ctx: &RunContext, m: RegexMatch, base_dir: &Path) -> BuildResult<String> {
  let Some((group, raw)) = m.first_group(&[1, 2, 3]) else {
    return Ok(m.whole.clone());
  };
  let reference = unescape_css_path(raw.trim());
  if reference.is_empty() {
    return Ok(m.whole.clone());
  }
  let replaced = ctx.process_uri(&reference, base_dir).await?;
  Ok(match group {
    1 => format!("url(\"{replaced}\")"),
    2 => format!("url('{replaced}')"),
    _ => format!("url({replaced})"),
  })
}

async fn rewrite_import(ctx: &RunContext, m: RegexMatch, base_dir: &Path) -> BuildResult<String> {
  let Some((group, raw)) = m.first_group(&[1, 2, 3, 4, 5]) else {
    return Ok(m.whole.clone());
  };
  let reference = unescape_css_path(raw.trim());
  if reference.is_empty() {
    return Ok(m.whole.clone());
  }
  let replaced = ctx.process_uri(&reference, base_dir).await?;
  Ok(match group {
    1 => format!("@import url(\"{replaced}\")"),
    2 => format!("@import url('{replaced}')"),
    3 => format!("@import url({replaced})"),
    4 => format!("@import \"{replaced}\""),
    _ => format!("@import '{replaced}'"),
  })
}

/// Minify CSS when `css.minify` is enabled; any minifier failure keeps the input.
pub async fn maybe_minify_css(ctx: &RunContext, css: String) -> String {
  if !ctx.config().css.minify {
    return css;
  }
  match ctx.bundler().minify(&css, SourceLoader::Css).await {
    Ok(minified) => minified,
    Err(err) => {
      warn!("css minification failed, keeping original: {err:#}");
      css
    }
  }
}

/// Replace `<link rel="stylesheet">` elements with `<style>` blocks holding the processed
/// stylesheet. Links to missing local files are removed.
pub async fn inline_css_links(ctx: &RunContext, html: &str, base_dir: &Path) -> BuildResult<String> {
  replace_all(html, link_tag_pattern(), |m| inline_link(ctx, m, base_dir)).await
}

/// Opening `<style>` tag for an inlined link, carrying over its `media` query.
fn style_open_tag(link: &str) -> String {
  match media_attribute_pattern().captures(link) {
    Some(caps) => match (caps.get(1), caps.get(2)) {
      (Some(media), _) => format!("<style media=\"{}\">", media.as_str()),
      (None, Some(media)) => format!("<style media='{}'>", media.as_str()),
      (None, None) => "<style>".to_string(),
    },
    None => "<style>".to_string(),
  }
}

async fn inline_link(ctx: &RunContext, m: RegexMatch, base_dir: &Path) -> BuildResult<String> {
  let tag = m.whole;
  if !stylesheet_rel_pattern().is_match(&tag) {
    return Ok(tag);
  }
  let Some(href) = href_pattern()
    .captures(&tag)
    .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
    .map(|href| href.as_str().trim().to_string())
  else {
    return Ok(tag);
  };
  if !css_href_pattern().is_match(&href) {
    return Ok(tag);
  }

  match classify_reference(&href) {
    ReferenceKind::Local => {}
    ReferenceKind::Remote => {
      let url = remote_fetch_url(&href);
      let Some(css) = ctx.fetch_text(&url).await else {
        debug!("leaving remote stylesheet {url}");
        return Ok(tag);
      };
      let css = process_css_content(ctx, &css, ctx.project_root()).await?;
      let css = maybe_minify_css(ctx, css).await;
      return Ok(format!("{}{css}</style>", style_open_tag(&tag)));
    }
    ReferenceKind::DataPayload | ReferenceKind::Ignored => return Ok(tag),
  }

  let decoded = decode_local_path(&href);
  let path = ctx.locate_local(&decoded, base_dir).await?;
  let css = match tokio::fs::read_to_string(&path).await {
    Ok(css) => css,
    Err(err) if err.kind() == ErrorKind::NotFound => {
      warn!("stylesheet not found, dropping link: {}", path.display());
      return Ok(String::new());
    }
    Err(err) => {
      warn!("failed to read stylesheet {}: {err}", path.display());
      return Ok(tag);
    }
  };

  let css_dir = path.parent().unwrap_or(base_dir);
  let css = process_css_content(ctx, &css, css_dir).await?;
  let css = maybe_minify_css(ctx, css).await;
  Ok(format!("{}{css}</style>", style_open_tag(&tag)))
}

/// Rewrite CSS references inside `<style>` blocks and `style` attributes.
pub async fn inline_styles_everywhere(ctx: &RunContext, html: &str, base_dir: &Path) -> BuildResult<String> {
  let html = replace_all(html, style_block_pattern(), |m| async move {
    let open = m.group(1).unwrap_or_default();
    let body = m.group(2).unwrap_or_default();
    let close = m.group(3).unwrap_or_default();
    let css = process_css_content(ctx, body, base_dir).await?;
    let css = maybe_minify_css(ctx, css).await;
    Ok(format!("{open}{css}{close}"))
  })
  .await?;

  replace_all(&html, style_attribute_pattern(), |m| async move {
    let Some((group, declarations)) = m.first_group(&[2, 3]) else {
      return Ok(m.whole.clone());
    };
    let attribute = m.group(1).unwrap_or("style");
    let css = process_css_content(ctx, declarations, base_dir).await?;
    Ok(match group {
      2 => format!(" {attribute}=\"{css}\""),
      _ => format!(" {attribute}='{css}'"),
    })
  })
  .await
}
