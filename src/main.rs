//! Command-line front-end for the single-file inliner.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use offline_inliner::{InlineBuilder, InlineConfig};

/// Pack an HTML document and everything it references into one self-contained file.
#[derive(Parser, Debug)]
#[command(name = "offline-inline", version)]
struct Cli {
  /// Entry document name, searched for depth-first beneath the search root.
  #[arg(default_value = "index.html")]
  input: String,

  /// JSON configuration file (defaults to ./inline.config.json when present).
  #[arg(long)]
  config: Option<PathBuf>,

  /// Directory the entry document search starts from.
  #[arg(long, default_value = ".")]
  search_root: PathBuf,

  /// Directory the single-file document is written to.
  #[arg(long)]
  out_dir: Option<String>,

  /// Download and embed http(s) resources instead of leaving them external.
  #[arg(long)]
  fetch_externals: bool,

  /// Strip comments and inter-tag whitespace from the final document.
  #[arg(long)]
  minify_html: bool,

  /// Minify inlined stylesheets.
  #[arg(long)]
  minify_css: bool,

  /// Minify inlined scripts.
  #[arg(long)]
  minify_js: bool,

  /// Optimise the files under --assets-dir in place instead of inlining.
  #[arg(long)]
  optimize_only: bool,

  /// Assets directory for --optimize-only, relative to the entry document.
  #[arg(long)]
  assets_dir: Option<PathBuf>,

  /// JPEG quality (0-100).
  #[arg(long)]
  jpeg_quality: Option<u8>,

  /// WebP quality (0-100).
  #[arg(long)]
  webp_quality: Option<u8>,

  /// Upper PNG palette quality (0-100).
  #[arg(long)]
  png_quality: Option<u8>,

  /// Video constant rate factor.
  #[arg(long)]
  crf: Option<u8>,

  /// Downscale wider videos to this width.
  #[arg(long)]
  max_width: Option<u32>,

  /// Target video bitrate in megabits per second.
  #[arg(long)]
  target_mbps: Option<f32>,

  /// Run a two-pass video encode (requires --target-mbps).
  #[arg(long)]
  two_pass: bool,

  /// Audio bitrate in kbps.
  #[arg(long)]
  mp3_kbps: Option<u32>,

  /// Characters kept when subsetting fonts.
  #[arg(long)]
  font_subset: Option<String>,
}

impl Cli {
  fn load_config(&self) -> Result<InlineConfig> {
    let mut config = match &self.config {
      Some(path) => InlineConfig::from_path(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?,
      None => InlineConfig::discover(&std::env::current_dir()?),
    };

    if let Some(out_dir) = &self.out_dir {
      config.output_dir = out_dir.clone();
    }
    config.externals.fetch |= self.fetch_externals;
    config.html.minify |= self.minify_html;
    config.css.minify |= self.minify_css;
    config.js.minify |= self.minify_js;

    if let Some(quality) = self.jpeg_quality {
      config.image.jpeg_quality = quality;
    }
    if let Some(quality) = self.webp_quality {
      config.image.webp_quality = quality;
    }
    if let Some(quality) = self.png_quality {
      config.image.png_quality = quality;
    }
    if let Some(crf) = self.crf {
      config.video.crf = crf;
    }
    if let Some(width) = self.max_width {
      config.video.max_width = Some(width);
    }
    if let Some(mbps) = self.target_mbps {
      config.video.target_mbps = Some(mbps);
    }
    config.video.two_pass |= self.two_pass;
    if let Some(kbps) = self.mp3_kbps {
      config.audio.mp3_kbps = kbps;
    }
    if let Some(subset) = &self.font_subset {
      config.font.subset = subset.clone();
    }
    Ok(config)
  }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "offline_inliner=info,offline_inline=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_target(false))
    .init();

  let cli = Cli::parse();
  let builder = InlineBuilder::new(cli.load_config()?);

  if cli.optimize_only {
    builder
      .optimize_only(&cli.input, &cli.search_root, cli.assets_dir.as_deref())
      .await?;
  } else {
    builder.build(&cli.input, &cli.search_root).await?;
  }
  Ok(())
}
