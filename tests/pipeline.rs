use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use tempfile::tempdir;

use offline_inliner::optimizers::{ModuleFormat, SourceLoader};
use offline_inliner::payload::decode_payload;
use offline_inliner::{
  InlineBuilder, InlineConfig, MediaCategory, MediaOptimizer, OptimizerSet, ScriptBundler,
};

const BG_PNG: &[u8] = b"\x89PNG-bg\0\0\0";
const ICON_PNG: &[u8] = b"\x89PNG-icon\0\0";

/// Removes trailing zero bytes; a second pass over its own output changes nothing.
#[derive(Default)]
struct TrimZeros {
  calls: AtomicUsize,
}

#[async_trait]
impl MediaOptimizer for TrimZeros {
  fn name(&self) -> &str {
    "trim-zeros"
  }

  async fn optimize(&self, bytes: &[u8], _media_type: &str) -> anyhow::Result<Vec<u8>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let end = bytes.iter().rposition(|byte| *byte != 0).map_or(0, |i| i + 1);
    Ok(bytes[..end].to_vec())
  }
}

struct Broken;

#[async_trait]
impl MediaOptimizer for Broken {
  fn name(&self) -> &str {
    "broken"
  }

  async fn optimize(&self, _bytes: &[u8], _media_type: &str) -> anyhow::Result<Vec<u8>> {
    Err(anyhow!("encoder crashed"))
  }
}

/// Stands in for esbuild: a single-file "bundle" is the entry's own text.
struct ConcatBundler;

#[async_trait]
impl ScriptBundler for ConcatBundler {
  async fn bundle(&self, entry: &Path, _format: ModuleFormat, _minify: bool) -> anyhow::Result<String> {
    Ok(tokio::fs::read_to_string(entry).await?)
  }

  async fn minify(&self, source: &str, _loader: SourceLoader) -> anyhow::Result<String> {
    Ok(source.to_string())
  }
}

fn write_site(root: &Path) -> std::io::Result<()> {
  fs::create_dir_all(root)?;
  fs::write(
    root.join("index.html"),
    concat!(
      "<!doctype html>\n<html>\n<head>\n",
      "  <link rel=\"stylesheet\" href=\"styles.css\">\n",
      "</head>\n<body>\n",
      "  <img src=\"icon.png\" alt=\"icon\">\n",
      "  <script src=\"app.js\"></script>\n",
      "</body>\n</html>\n"
    ),
  )?;
  fs::write(root.join("styles.css"), "body { background: url(bg.png); }")?;
  fs::write(root.join("app.js"), "const icon = \"icon.png\";\nshow(icon);")?;
  fs::write(root.join("bg.png"), BG_PNG)?;
  fs::write(root.join("icon.png"), ICON_PNG)?;
  Ok(())
}

fn builder(out_dir: &Path, optimizer: Arc<dyn MediaOptimizer>) -> InlineBuilder {
  let config = InlineConfig {
    output_dir: out_dir.to_string_lossy().into_owned(),
    ..InlineConfig::default()
  };
  InlineBuilder::new(config)
    .with_optimizers(OptimizerSet::empty().with_shared(MediaCategory::RasterImage, optimizer))
    .with_bundler(Arc::new(ConcatBundler))
}

fn assert_fully_inlined(html: &str) {
  assert!(!html.contains("<link"), "stylesheet link left in {html}");
  assert!(!html.contains("<script src"), "external script left in {html}");
  for marker in ["src=\"", "href=\"", "url("] {
    for (index, _) in html.match_indices(marker) {
      let rest = &html[index + marker.len()..];
      assert!(
        rest.starts_with("data:"),
        "external reference left after {marker}: {}",
        &rest[..rest.len().min(40)]
      );
    }
  }
}

fn payload_after<'a>(html: &'a str, marker: &str) -> &'a str {
  let start = html.find(marker).map(|index| index + marker.len()).unwrap_or(0);
  let rest = &html[start..];
  let end = rest.find(['"', ')', '\'']).unwrap_or(rest.len());
  &rest[..end]
}

#[tokio::test]
async fn inlines_every_reference_into_one_document() -> std::io::Result<()> {
  let temp = tempdir()?;
  let site = temp.path().join("site");
  write_site(&site)?;
  let optimizer = Arc::new(TrimZeros::default());

  let report = builder(&temp.path().join("out"), optimizer.clone())
    .build("index.html", &site)
    .await
    .map_err(std::io::Error::other)?;

  assert_eq!(report.output_path, temp.path().join("out/index.html"));
  let html = fs::read_to_string(&report.output_path)?;
  assert_fully_inlined(&html);
  assert!(html.contains("<style>body { background: url(data:image/png;base64,"));
  assert!(html.contains("<script>const icon = \"data:image/png;base64,"));

  let icon = decode_payload(payload_after(&html, "<img src=\"")).expect("icon payload");
  assert_eq!(icon.bytes, b"\x89PNG-icon");
  let background = decode_payload(payload_after(&html, "url(")).expect("background payload");
  assert_eq!(background.bytes, b"\x89PNG-bg");

  // icon.png is referenced twice (markup and script) but optimised once.
  assert_eq!(optimizer.calls.load(Ordering::SeqCst), 2);
  assert_eq!(report.stats.original_bytes, (BG_PNG.len() + ICON_PNG.len()) as u64);
  assert_eq!(report.stats.final_bytes, (7 + 9) as u64);
  Ok(())
}

#[tokio::test]
async fn inlining_its_own_output_is_a_fixed_point() -> std::io::Result<()> {
  let temp = tempdir()?;
  let site = temp.path().join("site");
  write_site(&site)?;

  let first = builder(&temp.path().join("out1"), Arc::new(TrimZeros::default()))
    .build("index.html", &site)
    .await
    .map_err(std::io::Error::other)?;

  let again = temp.path().join("again");
  fs::create_dir_all(&again)?;
  fs::copy(&first.output_path, again.join("index.html"))?;
  let second = builder(&temp.path().join("out2"), Arc::new(TrimZeros::default()))
    .build("index.html", &again)
    .await
    .map_err(std::io::Error::other)?;

  let first_html = fs::read_to_string(&first.output_path)?;
  let second_html = fs::read_to_string(&second.output_path)?;
  assert_eq!(first_html.len(), second_html.len());
  assert_eq!(first_html, second_html);
  assert_eq!(second.stats.saved_bytes(), 0);
  Ok(())
}

#[tokio::test]
async fn override_files_replace_source_assets() -> std::io::Result<()> {
  let temp = tempdir()?;
  let site = temp.path().join("site");
  write_site(&site)?;
  fs::create_dir_all(site.join("dir"))?;
  fs::write(site.join("dir/icon.png"), b"override-icon")?;

  let report = builder(&temp.path().join("out"), Arc::new(TrimZeros::default()))
    .build("index.html", &site)
    .await
    .map_err(std::io::Error::other)?;

  let html = fs::read_to_string(&report.output_path)?;
  let icon = decode_payload(payload_after(&html, "<img src=\"")).expect("icon payload");
  assert_eq!(icon.bytes, b"override-icon");
  let background = decode_payload(payload_after(&html, "url(")).expect("background payload");
  assert_eq!(background.bytes, b"\x89PNG-bg");
  Ok(())
}

#[tokio::test]
async fn failing_optimizers_keep_original_bytes() -> std::io::Result<()> {
  let temp = tempdir()?;
  let site = temp.path().join("site");
  write_site(&site)?;

  let report = builder(&temp.path().join("out"), Arc::new(Broken))
    .build("index.html", &site)
    .await
    .map_err(std::io::Error::other)?;

  let html = fs::read_to_string(&report.output_path)?;
  assert_fully_inlined(&html);
  let icon = decode_payload(payload_after(&html, "<img src=\"")).expect("icon payload");
  assert_eq!(icon.bytes, ICON_PNG);
  assert_eq!(report.stats.saved_bytes(), 0);
  Ok(())
}

#[tokio::test]
async fn missing_assets_degrade_without_failing_the_run() -> std::io::Result<()> {
  let temp = tempdir()?;
  let site = temp.path().join("site");
  write_site(&site)?;
  fs::remove_file(site.join("styles.css"))?;
  fs::remove_file(site.join("icon.png"))?;

  let report = builder(&temp.path().join("out"), Arc::new(TrimZeros::default()))
    .build("index.html", &site)
    .await
    .map_err(std::io::Error::other)?;

  let html = fs::read_to_string(&report.output_path)?;
  assert!(!html.contains("<link"));
  assert!(!html.contains("<style>"));
  assert!(html.contains("<img src=\"icon.png\" alt=\"icon\">"));
  assert!(html.contains("const icon = \"icon.png\";"));
  Ok(())
}
