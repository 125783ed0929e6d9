use std::ffi::OsString;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::MediaOptimizer;
use super::command::{ScratchDir, run_tool};
use crate::config::ImageConfig;

/// Re-encodes PNG (pngquant or ffmpeg), JPEG and WebP (ffmpeg) stills.
#[derive(Debug, Clone)]
pub struct RasterImageOptimizer {
  config: ImageConfig,
}

impl RasterImageOptimizer {
  /// Create an optimizer using the given quality settings.
  pub fn new(config: ImageConfig) -> Self {
    Self { config }
  }

  async fn optimize_png(&self, scratch: &ScratchDir, bytes: &[u8]) -> Result<Vec<u8>> {
    let input = scratch.write("in.png", bytes).await?;
    let output = scratch.path("out.png");

    let mut args: Vec<OsString> = Vec::new();
    let program = if self.config.png_palette {
      // pngquant speed runs 1 (slowest, best) to 11; map compression effort onto it.
      let speed = 11u8.saturating_sub(self.config.png_level.min(9) + 1).max(1);
      args.extend(["--force", "--skip-if-larger", "--quality"].map(OsString::from));
      args.push(format!("0-{}", self.config.png_quality.min(100)).into());
      args.push("--speed".into());
      args.push(speed.to_string().into());
      args.push("--output".into());
      args.push(output.into_os_string());
      args.push(input.into_os_string());
      "pngquant"
    } else {
      args.extend(["-y", "-loglevel", "error", "-i"].map(OsString::from));
      args.push(input.into_os_string());
      args.push("-compression_level".into());
      args.push(self.config.png_level.min(9).to_string().into());
      args.push(output.into_os_string());
      "ffmpeg"
    };
    run_tool(program, args).await?;

    scratch.read("out.png").await
  }

  async fn optimize_with_ffmpeg(
    &self,
    scratch: &ScratchDir,
    bytes: &[u8],
    extension: &str,
    codec_args: &[String],
  ) -> Result<Vec<u8>> {
    let input_name = format!("in.{extension}");
    let output_name = format!("out.{extension}");
    let input = scratch.write(&input_name, bytes).await?;
    let output = scratch.path(&output_name);

    let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-i"].map(OsString::from).into();
    args.push(input.into_os_string());
    args.extend(codec_args.iter().map(Into::into));
    args.push(output.into_os_string());
    run_tool("ffmpeg", args).await?;

    scratch.read(&output_name).await
  }
}

/// Map a 0-100 quality onto ffmpeg's 2 (best) to 31 (worst) JPEG qscale.
fn jpeg_qscale(quality: u8) -> u8 {
  let quality = u32::from(quality.min(100));
  (2 + (100 - quality) * 29 / 100) as u8
}

#[async_trait]
impl MediaOptimizer for RasterImageOptimizer {
  fn name(&self) -> &str {
    "raster-image"
  }

  async fn optimize(&self, bytes: &[u8], media_type: &str) -> Result<Vec<u8>> {
    let scratch = ScratchDir::new("inline-img-")?;
    match media_type {
      "image/png" => self.optimize_png(&scratch, bytes).await,
      "image/jpeg" | "image/jpg" => {
        let args = vec!["-q:v".into(), jpeg_qscale(self.config.jpeg_quality).to_string()];
        self.optimize_with_ffmpeg(&scratch, bytes, "jpg", &args).await
      }
      "image/webp" => {
        let args = vec![
          "-c:v".into(),
          "libwebp".into(),
          "-quality".into(),
          self.config.webp_quality.min(100).to_string(),
        ];
        self.optimize_with_ffmpeg(&scratch, bytes, "webp", &args).await
      }
      other => bail!("unsupported raster media type {other}"),
    }
  }
}

/// Shrinks GIFs with gifsicle's lossy mode and palette reduction.
#[derive(Debug, Clone)]
pub struct GifOptimizer {
  config: ImageConfig,
}

impl GifOptimizer {
  /// Create an optimizer using the given GIF settings.
  pub fn new(config: ImageConfig) -> Self {
    Self { config }
  }

  fn arguments(&self) -> Vec<String> {
    let mut args = vec!["-O3".to_string()];
    if self.config.gif_lossy > 0 {
      args.push(format!("--lossy={}", self.config.gif_lossy));
    }
    if (1..=256).contains(&self.config.gif_colors) {
      args.push("--colors".into());
      args.push(self.config.gif_colors.to_string());
    }
    args
  }
}

#[async_trait]
impl MediaOptimizer for GifOptimizer {
  fn name(&self) -> &str {
    "gifsicle"
  }

  async fn optimize(&self, bytes: &[u8], _media_type: &str) -> Result<Vec<u8>> {
    let scratch = ScratchDir::new("inline-gif-")?;
    let input = scratch.write("in.gif", bytes).await?;
    let output = scratch.path("out.gif");

    let mut args: Vec<OsString> = self.arguments().into_iter().map(Into::into).collect();
    args.push(input.into_os_string());
    args.push("-o".into());
    args.push(output.into_os_string());
    run_tool("gifsicle", args).await?;

    scratch.read("out.gif").await
  }
}
