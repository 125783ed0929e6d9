//! Single-file build orchestrator: locates the entry document, runs the content processors
//! in order and writes the inlined result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::asset_paths::{is_optimizable_path, media_type_for_path, to_forward_slashes};
use crate::bundle::{
  inline_css_links, inline_html_media_attrs, inline_js_scripts, inline_srcset,
  inline_styles_everywhere, maybe_minify_html, reencode_all_payloads,
};
use crate::config::InlineConfig;
use crate::context::RunContext;
use crate::error::{BuildResult, InlineError};
use crate::models::{StatsSnapshot, saving_percent};
use crate::optimizers::{OptimizerSet, ScriptBundler};
use crate::project::{EntryDocument, find_entry_document, walk_files};

/// Outcome of a successful inlining run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineReport {
  /// Where the single-file document was written.
  pub output_path: PathBuf,
  /// Byte totals across every resource embedded.
  pub stats: StatsSnapshot,
}

/// High-level entry point for turning a multi-file document into a single file.
///
/// Every call builds a fresh [`RunContext`], so one builder can drive repeated runs.
#[derive(Clone)]
pub struct InlineBuilder {
  config: InlineConfig,
  optimizers: Option<OptimizerSet>,
  bundler: Option<Arc<dyn ScriptBundler>>,
}

impl std::fmt::Debug for InlineBuilder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("InlineBuilder")
      .field("config", &self.config)
      .field("optimizers", &self.optimizers)
      .field("custom_bundler", &self.bundler.is_some())
      .finish()
  }
}

impl InlineBuilder {
  /// Create a builder using the external-tool optimizers and esbuild.
  pub fn new(config: InlineConfig) -> Self {
    Self {
      config,
      optimizers: None,
      bundler: None,
    }
  }

  /// Use a specific optimizer registry instead of the configured external tools.
  pub fn with_optimizers(mut self, optimizers: OptimizerSet) -> Self {
    self.optimizers = Some(optimizers);
    self
  }

  /// Use a specific script bundler instead of esbuild.
  pub fn with_bundler(mut self, bundler: Arc<dyn ScriptBundler>) -> Self {
    self.bundler = Some(bundler);
    self
  }

  /// Configuration shared by every run.
  pub fn config(&self) -> &InlineConfig {
    &self.config
  }

  fn context(&self, project_root: &Path) -> RunContext {
    let mut context = RunContext::new(project_root, self.config.clone());
    if let Some(optimizers) = &self.optimizers {
      context = context.with_optimizers(optimizers.clone());
    }
    if let Some(bundler) = &self.bundler {
      context = context.with_bundler(Arc::clone(bundler));
    }
    context
  }

  /// Locate `input_name` beneath `search_root`, inline it and write the result to the
  /// configured output directory under the same file name.
  pub async fn build(&self, input_name: &str, search_root: &Path) -> BuildResult<InlineReport> {
    let layout = self.config.to_layout();
    let entry = find_entry_document(&layout, input_name, search_root)?;
    let (html, stats) = self.inline_document(&entry).await?;

    let output_path = layout.output_path(&entry.path);
    if let Some(parent) = output_path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| InlineError::Write {
          path: parent.to_path_buf(),
          source,
        })?;
    }
    tokio::fs::write(&output_path, html)
      .await
      .map_err(|source| InlineError::Write {
        path: output_path.clone(),
        source,
      })?;

    info!("single-file document created at {}", output_path.display());
    log_totals(&stats);
    Ok(InlineReport { output_path, stats })
  }

  /// Run every content processor over the entry document and return the inlined text.
  pub async fn inline_document(&self, entry: &EntryDocument) -> BuildResult<(String, StatsSnapshot)> {
    let context = self.context(&entry.base_dir);
    let base_dir = entry.base_dir.as_path();
    let html = tokio::fs::read_to_string(&entry.path)
      .await
      .map_err(|source| InlineError::Read {
        path: entry.path.clone(),
        source,
      })?;

    let html = inline_css_links(&context, &html, base_dir).await?;
    let html = inline_js_scripts(&context, &html, base_dir).await?;
    let html = inline_html_media_attrs(&context, &html, base_dir).await?;
    let html = inline_srcset(&context, &html, base_dir).await?;
    let html = inline_styles_everywhere(&context, &html, base_dir).await?;
    let html = reencode_all_payloads(&context, &html).await?;
    let html = maybe_minify_html(&context, &html);

    Ok((html, context.stats_snapshot()))
  }

  /// Locate the entry document, then optimise `assets_dir` in place instead of inlining.
  ///
  /// A relative `assets_dir` is resolved against the entry document's directory.
  pub async fn optimize_only(
    &self,
    input_name: &str,
    search_root: &Path,
    assets_dir: Option<&Path>,
  ) -> BuildResult<StatsSnapshot> {
    let entry = find_entry_document(&self.config.to_layout(), input_name, search_root)?;
    let assets_dir = assets_dir.map(|dir| entry.base_dir.join(dir));
    self.optimize_assets_in_place(assets_dir.as_deref()).await
  }

  /// Optimise every recognised media file under `assets_dir`, rewriting a file only when
  /// the result is strictly smaller. The override directory is skipped.
  pub async fn optimize_assets_in_place(&self, assets_dir: Option<&Path>) -> BuildResult<StatsSnapshot> {
    let dir = assets_dir.ok_or(InlineError::MissingAssetsDir)?;
    if !tokio::fs::metadata(dir).await.is_ok_and(|meta| meta.is_dir()) {
      return Err(InlineError::AssetsDirNotFound(dir.to_path_buf()));
    }

    let context = self.context(dir);
    let files = walk_files(dir, &self.config.override_dir_name)?;
    for file in files.iter().filter(|file| is_optimizable_path(file)) {
      let original = tokio::fs::read(file)
        .await
        .map_err(|source| InlineError::Read {
          path: file.clone(),
          source,
        })?;
      let result = context
        .optimizers()
        .optimize(&original, media_type_for_path(file))
        .await;

      let final_size = if result.changed() {
        tokio::fs::write(file, &result.bytes)
          .await
          .map_err(|source| InlineError::Write {
            path: file.clone(),
            source,
          })?;
        result.bytes.len()
      } else {
        original.len()
      };

      context.stats().record(original.len(), final_size);
      let label = file
        .strip_prefix(dir)
        .map(to_forward_slashes)
        .unwrap_or_else(|_| file.display().to_string());
      info!(
        "{label}: {} -> {final_size} bytes ({}% saved)",
        original.len(),
        saving_percent(original.len(), final_size)
      );
    }

    let stats = context.stats_snapshot();
    info!("assets optimised in place: {}", dir.display());
    log_totals(&stats);
    Ok(stats)
  }
}

fn log_totals(stats: &StatsSnapshot) {
  info!(
    "Total size: {:.1} KB (saved {:.1} KB)",
    stats.final_bytes as f64 / 1024.0,
    stats.saved_bytes() as f64 / 1024.0
  );
}
