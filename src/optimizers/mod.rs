//! Best-effort media optimizers and the dispatch table that routes bytes to them.
//!
//! Concrete optimizers shell out to external codecs (`ffmpeg`, `pngquant`, `gifsicle`,
//! `pyftsubset`, `gltfpack`). Any failure degrades to the original bytes; callers never see
//! an error from [`OptimizerSet::optimize`].

mod audio;
pub mod bundler;
mod command;
mod font;
mod image;
mod mesh;
mod video;

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::config::InlineConfig;
use crate::models::OptimizationResult;

pub use audio::AudioOptimizer;
pub use bundler::{EsbuildBundler, ModuleFormat, ScriptBundler, SourceLoader};
pub use command::{ScratchDir, run_tool};
pub use font::FontOptimizer;
pub use image::{GifOptimizer, RasterImageOptimizer};
pub use mesh::MeshOptimizer;
pub use video::VideoOptimizer;

/// Media families that have a dedicated optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaCategory {
  /// PNG, JPEG and WebP stills.
  RasterImage,
  /// Animated or static GIFs.
  Gif,
  /// Any `video/*` type.
  Video,
  /// Any `audio/*` type.
  Audio,
  /// Any `font/*` type.
  Font,
  /// Binary glTF meshes.
  Mesh,
}

impl MediaCategory {
  /// Map a MIME type onto its optimizer category.
  ///
  /// SVG and every non-media type return `None` and pass through unchanged.
  pub fn from_media_type(media_type: &str) -> Option<Self> {
    let media_type = media_type.trim().to_ascii_lowercase();
    match media_type.as_str() {
      "image/gif" => Some(Self::Gif),
      "image/png" | "image/jpeg" | "image/jpg" | "image/webp" => Some(Self::RasterImage),
      "model/gltf-binary" => Some(Self::Mesh),
      other if other.starts_with("video/") => Some(Self::Video),
      other if other.starts_with("audio/") => Some(Self::Audio),
      other if other.starts_with("font/") => Some(Self::Font),
      _ => None,
    }
  }
}

/// A byte-reducing transform for one media category.
///
/// Implementations may return errors freely; the dispatcher converts them into
/// "keep the original bytes".
#[async_trait]
pub trait MediaOptimizer: Send + Sync {
  /// Short name used in diagnostics.
  fn name(&self) -> &str;

  /// Produce a (hopefully smaller) encoding of `bytes`.
  async fn optimize(&self, bytes: &[u8], media_type: &str) -> anyhow::Result<Vec<u8>>;
}

/// Registry that dispatches bytes to the optimizer for their media category.
#[derive(Clone, Default)]
pub struct OptimizerSet {
  optimizers: BTreeMap<MediaCategory, Arc<dyn MediaOptimizer>>,
}

impl std::fmt::Debug for OptimizerSet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_map()
      .entries(self.optimizers.iter().map(|(category, opt)| (category, opt.name())))
      .finish()
  }
}

impl OptimizerSet {
  /// A registry with no optimizers: every resource passes through unchanged.
  pub fn empty() -> Self {
    Self::default()
  }

  /// The external-tool optimizers configured from `config`.
  pub fn from_config(config: &InlineConfig) -> Self {
    Self::empty()
      .with(
        MediaCategory::RasterImage,
        RasterImageOptimizer::new(config.image.clone()),
      )
      .with(MediaCategory::Gif, GifOptimizer::new(config.image.clone()))
      .with(MediaCategory::Video, VideoOptimizer::new(config.video.clone()))
      .with(MediaCategory::Audio, AudioOptimizer::new(config.audio.clone()))
      .with(MediaCategory::Font, FontOptimizer::new(config.font.clone()))
      .with(MediaCategory::Mesh, MeshOptimizer::new(config.mesh.clone()))
  }

  /// Register (or replace) the optimizer for a category.
  pub fn with(mut self, category: MediaCategory, optimizer: impl MediaOptimizer + 'static) -> Self {
    self.optimizers.insert(category, Arc::new(optimizer));
    self
  }

  /// Register a shared optimizer instance for a category.
  pub fn with_shared(mut self, category: MediaCategory, optimizer: Arc<dyn MediaOptimizer>) -> Self {
    self.optimizers.insert(category, optimizer);
    self
  }

  /// Optimise `bytes`, never failing and never returning more bytes than the input.
  pub async fn optimize(&self, bytes: &[u8], media_type: &str) -> OptimizationResult {
    let Some(optimizer) = MediaCategory::from_media_type(media_type)
      .and_then(|category| self.optimizers.get(&category))
    else {
      return OptimizationResult::unsupported(bytes);
    };

    let attempt = AssertUnwindSafe(optimizer.optimize(bytes, media_type))
      .catch_unwind()
      .await;

    match attempt {
      Ok(Ok(candidate)) => {
        let result = OptimizationResult::from_candidate(bytes, candidate);
        debug!(optimizer = optimizer.name(), media_type, status = ?result.status, "optimizer finished");
        result
      }
      Ok(Err(err)) => {
        warn!(optimizer = optimizer.name(), media_type, "optimizer failed: {err:#}");
        OptimizationResult::failed(bytes, format!("{err:#}"))
      }
      Err(_) => {
        warn!(optimizer = optimizer.name(), media_type, "optimizer panicked");
        OptimizationResult::failed(bytes, "optimizer panicked")
      }
    }
  }
}
