//! Script bundling and text minification collaborator.

use std::ffi::OsString;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::command::{ScratchDir, run_tool};

/// Output format requested from the bundler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
  /// Self-executing classic script.
  Iife,
  /// ES module output; the inlined tag keeps `type="module"`.
  Esm,
}

impl ModuleFormat {
  fn as_flag(self) -> &'static str {
    match self {
      Self::Iife => "--format=iife",
      Self::Esm => "--format=esm",
    }
  }
}

/// Kind of source handed to [`ScriptBundler::minify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLoader {
  /// JavaScript.
  Js,
  /// CSS.
  Css,
}

impl SourceLoader {
  fn extension(self) -> &'static str {
    match self {
      Self::Js => "js",
      Self::Css => "css",
    }
  }
}

/// Resolves a script's nested imports into one file and minifies text assets.
#[async_trait]
pub trait ScriptBundler: Send + Sync {
  /// Bundle `entry` and everything it imports.
  async fn bundle(&self, entry: &Path, format: ModuleFormat, minify: bool) -> Result<String>;

  /// Minify a standalone source text.
  async fn minify(&self, source: &str, loader: SourceLoader) -> Result<String>;
}

/// [`ScriptBundler`] backed by the `esbuild` CLI.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
  program: String,
  target: String,
}

impl Default for EsbuildBundler {
  fn default() -> Self {
    Self {
      program: "esbuild".into(),
      target: "es2017".into(),
    }
  }
}

impl EsbuildBundler {
  /// Use a specific esbuild executable.
  pub fn with_program(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Self::default()
    }
  }
}

#[async_trait]
impl ScriptBundler for EsbuildBundler {
  async fn bundle(&self, entry: &Path, format: ModuleFormat, minify: bool) -> Result<String> {
    let mut args: Vec<OsString> = vec![entry.into(), "--bundle".into(), format.as_flag().into()];
    args.push(format!("--target={}", self.target).into());
    args.push("--log-level=error".into());
    if minify {
      args.push("--minify".into());
    }

    let output = run_tool(&self.program, args)
      .await
      .with_context(|| format!("bundling {} failed", entry.display()))?;
    String::from_utf8(output.stdout).context("bundler produced non UTF-8 output")
  }

  async fn minify(&self, source: &str, loader: SourceLoader) -> Result<String> {
    let scratch = ScratchDir::new("inline-minify-")?;
    let input = scratch
      .write(&format!("in.{}", loader.extension()), source.as_bytes())
      .await?;

    let mut args: Vec<OsString> = vec![input.into_os_string(), "--minify".into()];
    if loader == SourceLoader::Js {
      args.push(format!("--target={}", self.target).into());
    }
    args.push("--log-level=error".into());

    let output = run_tool(&self.program, args).await?;
    String::from_utf8(output.stdout).context("minifier produced non UTF-8 output")
  }
}
