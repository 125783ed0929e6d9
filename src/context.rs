//! Run-scoped state shared by every component of one inlining pass.
//!
//! A fresh [`RunContext`] is built per run, so caches and statistics never leak between
//! invocations in the same process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::config::InlineConfig;
use crate::models::{RunStats, StatsSnapshot};
use crate::optimizers::{EsbuildBundler, OptimizerSet, ScriptBundler};
use crate::overrides::OverrideResolver;

/// Cache slot for an absolute local path; `None` records a missing file.
pub(crate) type FileSlot = Arc<OnceCell<Option<String>>>;

/// Cache slot for an embedded payload string.
pub(crate) type PayloadSlot = Arc<OnceCell<String>>;

/// Caches, statistics and collaborators for one run.
pub struct RunContext {
  project_root: PathBuf,
  config: InlineConfig,
  overrides: OverrideResolver,
  optimizers: OptimizerSet,
  bundler: Arc<dyn ScriptBundler>,
  http: reqwest::Client,
  file_cache: DashMap<PathBuf, FileSlot>,
  payload_cache: DashMap<String, PayloadSlot>,
  stats: RunStats,
}

impl std::fmt::Debug for RunContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RunContext")
      .field("project_root", &self.project_root)
      .field("optimizers", &self.optimizers)
      .field("cached_files", &self.file_cache.len())
      .field("cached_payloads", &self.payload_cache.len())
      .finish_non_exhaustive()
  }
}

impl RunContext {
  /// Create a context rooted at the entry document's directory, with the external-tool
  /// optimizers and esbuild configured from `config`.
  pub fn new(project_root: impl Into<PathBuf>, config: InlineConfig) -> Self {
    let project_root = project_root.into();
    let layout = config.to_layout();
    Self {
      overrides: OverrideResolver::new(&project_root, &layout.override_dir_name),
      optimizers: OptimizerSet::from_config(&config),
      bundler: Arc::new(EsbuildBundler::default()),
      http: reqwest::Client::new(),
      file_cache: DashMap::new(),
      payload_cache: DashMap::new(),
      stats: RunStats::default(),
      project_root,
      config,
    }
  }

  /// Replace the optimizer registry.
  pub fn with_optimizers(mut self, optimizers: OptimizerSet) -> Self {
    self.optimizers = optimizers;
    self
  }

  /// Replace the script bundler.
  pub fn with_bundler(mut self, bundler: Arc<dyn ScriptBundler>) -> Self {
    self.bundler = bundler;
    self
  }

  /// Replace the HTTP client used for remote fetches.
  pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
    self.http = http;
    self
  }

  /// Directory containing the entry document.
  pub fn project_root(&self) -> &Path {
    &self.project_root
  }

  /// Read-only configuration for this run.
  pub fn config(&self) -> &InlineConfig {
    &self.config
  }

  /// Override lookups for this project.
  pub fn overrides(&self) -> &OverrideResolver {
    &self.overrides
  }

  /// Media optimizer registry.
  pub fn optimizers(&self) -> &OptimizerSet {
    &self.optimizers
  }

  /// Script bundler and minifier.
  pub fn bundler(&self) -> &dyn ScriptBundler {
    self.bundler.as_ref()
  }

  /// Shared HTTP client for remote fetches.
  pub fn http(&self) -> &reqwest::Client {
    &self.http
  }

  /// Byte counters accumulated so far.
  pub fn stats(&self) -> &RunStats {
    &self.stats
  }

  /// Copy of the counters.
  pub fn stats_snapshot(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  /// Cache slot for an absolute path. The shard guard is released before returning.
  pub(crate) fn file_slot(&self, path: &Path) -> FileSlot {
    self
      .file_cache
      .entry(path.to_path_buf())
      .or_default()
      .value()
      .clone()
  }

  /// Cache slot for an embedded payload string.
  pub(crate) fn payload_slot(&self, payload: &str) -> PayloadSlot {
    if let Some(slot) = self.payload_cache.get(payload) {
      return slot.value().clone();
    }
    self
      .payload_cache
      .entry(payload.to_string())
      .or_default()
      .value()
      .clone()
  }

  /// Mark a payload produced by this run as already optimised.
  pub(crate) fn seed_payload(&self, payload: &str) {
    self
      .payload_cache
      .entry(payload.to_string())
      .or_insert_with(|| Arc::new(OnceCell::new_with(Some(payload.to_string()))));
  }
}
