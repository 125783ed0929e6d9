//! Script inlining and asset rewriting inside JavaScript string literals.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use super::modules::mirror_module_graph;
use crate::asset_paths::{ReferenceKind, classify_reference, decode_local_path, remote_fetch_url};
use crate::context::RunContext;
use crate::error::BuildResult;
use crate::optimizers::{ModuleFormat, SourceLoader};
use crate::replace::{RegexMatch, replace_all};

const ASSET_EXTENSIONS: &str =
  "png|jpe?g|gif|svg|webp|mp4|webm|mp3|m4a|wav|ogg|json|txt|wasm|glb|woff2?|ttf|otf";

/// String and template literals holding an asset path or an embedded payload. Groups 1, 2
/// and 3 carry the body for `"`, `'` and backtick quoting respectively.
fn js_literal_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    let body = format!(
      r#"[^"'`]*?\.(?:{ASSET_EXTENSIONS})(?:\?[^"'`#]*)?(?:#[^"'`]*)?|data:[^"'`]+?"#
    );
    Regex::new(&format!(r#"(?i)"({body})"|'({body})'|`({body})`"#))
      .expect("invalid js literal regex")
  })
}

/// `<script ... src="..." ...>` with an optional empty closing tag.
fn script_tag_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)<script([^>]*?)\s+src=["']([^"']+)["']([^>]*)>(?:\s*</script>)?"#)
      .expect("invalid script regex")
  })
}

fn module_type_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)\stype=["']module["']"#).expect("invalid module type regex")
  })
}

/// Rewrite asset paths and embedded payloads found in string literals.
pub async fn process_js_content(ctx: &RunContext, js: &str, base_dir: &Path) -> BuildResult<String> {
  replace_all(js, js_literal_pattern(), |m| async move {
    let Some((group, reference)) = m.first_group(&[1, 2, 3]) else {
      return Ok(m.whole.clone());
    };
    let quote = match group {
      1 => '"',
      2 => '\'',
      _ => '`',
    };
    let replaced = ctx.process_uri(reference, base_dir).await?;
    Ok(format!("{quote}{replaced}{quote}"))
  })
  .await
}

/// Minify JavaScript when `js.minify` is enabled; any minifier failure keeps the input.
pub async fn maybe_minify_js(ctx: &RunContext, js: String) -> String {
  if !ctx.config().js.minify {
    return js;
  }
  match ctx.bundler().minify(&js, SourceLoader::Js).await {
    Ok(minified) => minified,
    Err(err) => {
      warn!("js minification failed, keeping original: {err:#}");
      js
    }
  }
}

/// Replace external `<script src>` elements with inline scripts.
///
/// Local scripts are bundled first; if bundling fails the file itself is inlined. Remote
/// scripts are only inlined when fetching is enabled.
pub async fn inline_js_scripts(ctx: &RunContext, html: &str, base_dir: &Path) -> BuildResult<String> {
  replace_all(html, script_tag_pattern(), |m| inline_script(ctx, m, base_dir)).await
}

async fn inline_script(ctx: &RunContext, m: RegexMatch, base_dir: &Path) -> BuildResult<String> {
  let pre = m.group(1).unwrap_or_default();
  let src = m.group(2).unwrap_or_default().trim();
  let post = m.group(3).unwrap_or_default();
  let external = || format!("<script{pre} src=\"{src}\"{post}></script>");

  match classify_reference(src) {
    ReferenceKind::Local => {}
    ReferenceKind::Remote => {
      let url = remote_fetch_url(src);
      let Some(js) = ctx.fetch_text(&url).await else {
        debug!("leaving remote script {url}");
        return Ok(external());
      };
      let js = process_js_content(ctx, &js, ctx.project_root()).await?;
      let js = maybe_minify_js(ctx, js).await;
      return Ok(format!("<script{pre}{post}>{js}</script>"));
    }
    ReferenceKind::DataPayload | ReferenceKind::Ignored => return Ok(external()),
  }

  let decoded = decode_local_path(src);
  let path = ctx.locate_local(&decoded, base_dir).await?;
  match tokio::fs::metadata(&path).await {
    Ok(meta) if meta.is_file() => {}
    Ok(_) => return Ok(external()),
    Err(err) => {
      if err.kind() != ErrorKind::NotFound {
        warn!("failed to inspect script {}: {err}", path.display());
      } else {
        warn!("script not found: {}", path.display());
      }
      return Ok(external());
    }
  }
  let script_dir = path.parent().unwrap_or(base_dir);

  let is_module = module_type_pattern().is_match(pre) || module_type_pattern().is_match(post);
  let format = if is_module {
    ModuleFormat::Esm
  } else {
    ModuleFormat::Iife
  };

  // Modules are rewritten one by one in a mirror so nested literals keep their own base.
  let mirror = mirror_module_graph(ctx, &path).await?;
  let entry = mirror.as_ref().map_or(path.as_path(), |mirror| mirror.entry());
  let bundled = ctx
    .bundler()
    .bundle(entry, format, ctx.config().js.minify)
    .await;

  match bundled {
    Ok(bundled) => {
      let js = match &mirror {
        Some(_) => bundled,
        None => process_js_content(ctx, &bundled, script_dir).await?,
      };
      let pre = module_type_pattern().replace_all(pre, "");
      let post = module_type_pattern().replace_all(post, "");
      let marker = if format == ModuleFormat::Esm {
        " type=\"module\""
      } else {
        ""
      };
      Ok(format!("<script{pre}{post}{marker}>{js}</script>"))
    }
    Err(err) => {
      warn!(
        "bundling {} failed, inlining the file as is: {err:#}",
        path.display()
      );
      let js = match tokio::fs::read_to_string(&path).await {
        Ok(js) => js,
        Err(err) => {
          warn!("failed to read script {}: {err}", path.display());
          return Ok(external());
        }
      };
      let js = process_js_content(ctx, &js, script_dir).await?;
      let js = maybe_minify_js(ctx, js).await;
      Ok(format!("<script{pre}{post}>{js}</script>"))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use std::path::PathBuf;
  use std::sync::{Arc, Mutex};

  use anyhow::anyhow;
  use async_trait::async_trait;
  use tempfile::tempdir;

  use crate::config::InlineConfig;
  use crate::optimizers::{OptimizerSet, ScriptBundler};
  use crate::payload::encode_payload;
  use crate::test_support::{Route, direct_client, serve};

  /// Bundles by reading the entry verbatim and records the requested formats.
  #[derive(Default)]
  struct EchoBundler {
    formats: Mutex<Vec<(PathBuf, ModuleFormat)>>,
  }

  #[async_trait]
  impl ScriptBundler for EchoBundler {
    async fn bundle(&self, entry: &Path, format: ModuleFormat, _minify: bool) -> anyhow::Result<String> {
      self.formats.lock().unwrap().push((entry.to_path_buf(), format));
      Ok(format!("/*bundled*/{}", tokio::fs::read_to_string(entry).await?))
    }

    async fn minify(&self, source: &str, _loader: SourceLoader) -> anyhow::Result<String> {
      Ok(source.to_string())
    }
  }

  struct FailingBundler;

  #[async_trait]
  impl ScriptBundler for FailingBundler {
    async fn bundle(&self, _entry: &Path, _format: ModuleFormat, _minify: bool) -> anyhow::Result<String> {
      Err(anyhow!("esbuild is not installed"))
    }

    async fn minify(&self, _source: &str, _loader: SourceLoader) -> anyhow::Result<String> {
      Err(anyhow!("esbuild is not installed"))
    }
  }

  /// Splices `import './x.js';` lines with the imported file, resolved next to the importer.
  struct ImportInliner;

  #[async_trait]
  impl ScriptBundler for ImportInliner {
    async fn bundle(&self, entry: &Path, _format: ModuleFormat, _minify: bool) -> anyhow::Result<String> {
      let source = tokio::fs::read_to_string(entry).await?;
      let dir = entry.parent().unwrap_or(Path::new("."));
      let mut lines = Vec::new();
      for line in source.lines() {
        match line.strip_prefix("import '").and_then(|rest| rest.strip_suffix("';")) {
          Some(specifier) => {
            let imported = tokio::fs::read_to_string(dir.join(specifier)).await?;
            lines.push(imported.trim().to_string());
          }
          None => lines.push(line.to_string()),
        }
      }
      Ok(lines.join("\n"))
    }

    async fn minify(&self, source: &str, _loader: SourceLoader) -> anyhow::Result<String> {
      Ok(source.to_string())
    }
  }

  fn context(root: &Path, bundler: Arc<dyn ScriptBundler>) -> RunContext {
    RunContext::new(root, InlineConfig::default())
      .with_optimizers(OptimizerSet::empty())
      .with_bundler(bundler)
  }

  #[tokio::test]
  async fn rewrites_asset_literals_in_every_quote_style() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("icon.png"), b"I").unwrap();
    let ctx = context(dir.path(), Arc::new(EchoBundler::default()));
    let payload = encode_payload("image/png", b"I");

    let js = "load(\"icon.png\"); load('icon.png?v=1'); load(`icon.png`); log('not a path');";
    let out = process_js_content(&ctx, js, dir.path()).await.unwrap();
    assert_eq!(
      out,
      format!("load(\"{payload}\"); load('{payload}'); load(`{payload}`); log('not a path');")
    );
  }

  #[tokio::test]
  async fn missing_assets_in_scripts_stay_as_written() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path(), Arc::new(EchoBundler::default()));
    let js = "const a = 'sprites/gone.webp';";
    assert_eq!(process_js_content(&ctx, js, dir.path()).await.unwrap(), js);
  }

  #[tokio::test]
  async fn module_scripts_are_bundled_as_esm_and_keep_their_marking() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("js")).unwrap();
    fs::write(dir.path().join("js/main.js"), "boot()").unwrap();
    let bundler = Arc::new(EchoBundler::default());
    let ctx = context(dir.path(), bundler.clone());

    let html = r#"<script type="module" src="js/main.js" defer></script><script src="js/main.js"></script>"#;
    let out = inline_js_scripts(&ctx, html, dir.path()).await.unwrap();
    assert_eq!(
      out,
      r#"<script defer type="module">/*bundled*/boot()</script><script>/*bundled*/boot()</script>"#
    );

    let formats: Vec<ModuleFormat> = bundler
      .formats
      .lock()
      .unwrap()
      .iter()
      .map(|(_, format)| *format)
      .collect();
    assert_eq!(formats, vec![ModuleFormat::Esm, ModuleFormat::Iife]);
  }

  #[tokio::test]
  async fn failed_bundling_falls_back_to_plain_inlining() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.js"), "show('logo.png')").unwrap();
    fs::write(dir.path().join("logo.png"), b"L").unwrap();
    let ctx = context(dir.path(), Arc::new(FailingBundler));

    let html = r#"<script src="app.js"></script>"#;
    let out = inline_js_scripts(&ctx, html, dir.path()).await.unwrap();
    assert_eq!(
      out,
      format!("<script>show('{}')</script>", encode_payload("image/png", b"L"))
    );
  }

  #[tokio::test]
  async fn assets_in_nested_modules_resolve_next_to_their_module() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("js/lib/img")).unwrap();
    fs::write(root.join("js/main.js"), "import './lib/sprite.js';\nshow(s);").unwrap();
    fs::write(root.join("js/lib/sprite.js"), "const s = 'img/hero.png';").unwrap();
    fs::write(root.join("js/lib/img/hero.png"), b"HERO").unwrap();
    let ctx = context(&root, Arc::new(ImportInliner));

    let html = r#"<script src="js/main.js"></script>"#;
    let out = inline_js_scripts(&ctx, html, &root).await.unwrap();
    assert_eq!(
      out,
      format!(
        "<script>const s = '{}';\nshow(s);</script>",
        encode_payload("image/png", b"HERO")
      )
    );

    let leftovers: Vec<String> = fs::read_dir(&root)
      .unwrap()
      .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    assert_eq!(leftovers, vec!["js".to_string()]);
  }

  #[tokio::test]
  async fn missing_and_remote_scripts_are_left_external() {
    let dir = tempdir().unwrap();
    let ctx = context(dir.path(), Arc::new(EchoBundler::default()));

    let html = r#"<script src="gone.js"></script><script async src="https://cdn.example.com/lib.js"></script>"#;
    let out = inline_js_scripts(&ctx, html, dir.path()).await.unwrap();
    assert_eq!(out, html);
  }

  #[tokio::test]
  async fn remote_scripts_are_fetched_when_enabled() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("hero.png"), b"H").unwrap();
    let addr = serve(vec![(
      "/lib.js",
      Route::ok(Some("application/javascript"), "use(\"hero.png\");"),
    )])
    .await;
    let mut config = InlineConfig::default();
    config.externals.fetch = true;
    let ctx = RunContext::new(dir.path(), config)
      .with_optimizers(OptimizerSet::empty())
      .with_bundler(Arc::new(FailingBundler))
      .with_http_client(direct_client());

    let html = format!(
      r#"<script async src="http://{addr}/lib.js"></script><script src="http://{addr}/nope.js"></script>"#
    );
    let out = inline_js_scripts(&ctx, &html, dir.path()).await.unwrap();
    assert_eq!(
      out,
      format!(
        r#"<script async>use("{}");</script><script src="http://{addr}/nope.js"></script>"#,
        encode_payload("image/png", b"H")
      )
    );
  }
}
