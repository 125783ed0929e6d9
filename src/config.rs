//! Inliner configuration: codec knobs, feature toggles and project layout.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::project::ProjectLayout;

/// File name searched for by [`InlineConfig::discover`].
pub const DEFAULT_CONFIG_FILE: &str = "inline.config.json";

/// Glyphs kept by default when subsetting fonts.
pub const DEFAULT_FONT_SUBSET: &str =
  "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Top-level configuration consumed read-only by optimizers and minifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InlineConfig {
  /// Raster and GIF encoder settings.
  pub image: ImageConfig,
  /// Video transcoding settings.
  pub video: VideoConfig,
  /// Audio transcoding settings.
  pub audio: AudioConfig,
  /// Font subsetting settings.
  pub font: FontConfig,
  /// glTF binary mesh settings.
  pub mesh: MeshConfig,
  /// Final HTML minification toggle.
  pub html: MinifyToggle,
  /// Stylesheet minification toggle.
  pub css: MinifyToggle,
  /// Script minification toggle.
  pub js: MinifyToggle,
  /// Remote resource handling.
  pub externals: ExternalsConfig,
  /// Name of the reserved override directory under the project root.
  pub override_dir_name: String,
  /// Directory the single-file document is written to.
  pub output_dir: String,
  /// Directory names skipped while searching for the entry document.
  pub skipped_dir_names: Vec<String>,
}

impl Default for InlineConfig {
  fn default() -> Self {
    Self {
      image: ImageConfig::default(),
      video: VideoConfig::default(),
      audio: AudioConfig::default(),
      font: FontConfig::default(),
      mesh: MeshConfig::default(),
      html: MinifyToggle::default(),
      css: MinifyToggle::default(),
      js: MinifyToggle::default(),
      externals: ExternalsConfig::default(),
      override_dir_name: "dir".into(),
      output_dir: "dist".into(),
      skipped_dir_names: vec!["node_modules".into(), ".git".into()],
    }
  }
}

/// Raster image encoder settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
  /// JPEG quality (0-100).
  pub jpeg_quality: u8,
  /// WebP quality (0-100).
  pub webp_quality: u8,
  /// PNG compression effort (0-9).
  pub png_level: u8,
  /// Upper PNG palette quality (0-100).
  pub png_quality: u8,
  /// Quantise PNGs to a palette.
  pub png_palette: bool,
  /// gifsicle lossiness; 0 disables lossy compression.
  pub gif_lossy: u32,
  /// Maximum GIF palette size (1-256); 0 keeps the original palette.
  pub gif_colors: u32,
}

impl Default for ImageConfig {
  fn default() -> Self {
    Self {
      jpeg_quality: 50,
      webp_quality: 50,
      png_level: 1,
      png_quality: 50,
      png_palette: true,
      gif_lossy: 180,
      gif_colors: 48,
    }
  }
}

/// Video transcoding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
  /// ffmpeg video codec.
  pub codec: String,
  /// Constant rate factor.
  pub crf: u8,
  /// Encoder preset.
  pub preset: String,
  /// Optional encoder tune (`film`, `animation`, `grain`).
  pub tune: Option<String>,
  /// Downscale wider inputs to this width, preserving aspect ratio.
  pub max_width: Option<u32>,
  /// Output frame rate; the source rate is kept when unset.
  pub fps: Option<f32>,
  /// Run a two-pass encode (requires `target_mbps`).
  pub two_pass: bool,
  /// Target bitrate in megabits per second.
  pub target_mbps: Option<f32>,
  /// Multiplier applied to the target bitrate for `-maxrate`.
  pub max_rate_factor: f32,
  /// AAC audio bitrate in kbps.
  pub audio_kbps: u32,
  /// Move the moov atom to the front of the file.
  pub faststart: bool,
}

impl Default for VideoConfig {
  fn default() -> Self {
    Self {
      codec: "libx264".into(),
      crf: 26,
      preset: "slow".into(),
      tune: None,
      max_width: Some(540),
      fps: None,
      two_pass: false,
      target_mbps: None,
      max_rate_factor: 2.0,
      audio_kbps: 160,
      faststart: true,
    }
  }
}

/// Audio transcoding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
  /// Target bitrate in kbps.
  pub mp3_kbps: u32,
}

impl Default for AudioConfig {
  fn default() -> Self {
    Self { mp3_kbps: 128 }
  }
}

/// Font subsetting settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FontConfig {
  /// Characters retained in subset fonts.
  pub subset: String,
}

impl Default for FontConfig {
  fn default() -> Self {
    Self {
      subset: DEFAULT_FONT_SUBSET.into(),
    }
  }
}

/// glTF binary settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
  /// gltfpack simplification ratio (1.0 keeps every triangle).
  pub simplify: f32,
}

impl Default for MeshConfig {
  fn default() -> Self {
    Self { simplify: 1.0 }
  }
}

/// Single on/off minification switch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinifyToggle {
  /// Whether minification runs.
  pub minify: bool,
}

/// Remote resource handling.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExternalsConfig {
  /// Fetch `http(s)` references and embed them.
  pub fetch: bool,
}

impl InlineConfig {
  /// Attempt to load configuration from the provided directory.
  ///
  /// A missing or unparsable file falls back to defaults.
  pub fn discover(dir: &Path) -> Self {
    Self::from_path(&dir.join(DEFAULT_CONFIG_FILE)).unwrap_or_default()
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
  }

  /// Borrowing conversion into a layout description.
  pub fn to_layout(&self) -> ProjectLayout {
    ProjectLayout {
      override_dir_name: self.override_dir_name.clone(),
      output_dir: PathBuf::from(&self.output_dir),
      skipped_dir_names: self.skipped_dir_names.clone(),
    }
  }
}
